//! # aod-locator - BLE Angle-of-Departure indoor positioning
//!
//! Signal-processing and geometry core for a BLE AoD locator. Stationary
//! beacons transmit Constant Tone Extensions while switching across a
//! known antenna array; this crate turns the resulting per-slot IQ sample
//! reports into directional fixes and fuses fixes from two beacons into a
//! 3-D position estimate. Provides:
//! - A bounded IQ work queue (LIFO processing, FIFO eviction) that keeps
//!   the receive path non-blocking
//! - The IQ pipeline: phase extraction, drift compensation, and
//!   paired-antenna interferometry down to direction cosines
//! - A skew-line midpoint solver with a position-history ring
//!
//! The radio itself, antenna-switch programming, and beacon configuration
//! loading are external collaborators: the receive callback only has to
//! build a [`RawIqFrame`] and submit it.
//!
//! ## Quick Start
//! ```
//! use std::sync::Arc;
//! use aod_locator::{AodPipeline, Beacon, BeaconRegistry, Mac, PipelineConfig};
//!
//! let mut registry = BeaconRegistry::new();
//! let mac = Mac::parse("F6:66:CD:FD:DC:EB").unwrap();
//! registry.put(Beacon::new(mac, 0.0, 0.0, 2.5, 0.0, 0.0, 0.0).unwrap()).unwrap();
//!
//! let pipeline = AodPipeline::new(Arc::new(registry), PipelineConfig::default());
//! let queue = aod_locator::IqWorkQueue::start(pipeline).unwrap();
//! assert!(queue.is_running());
//! // receive callback: queue.submit(&frame)
//! ```

pub mod antenna;
pub mod beacon;
pub mod channel;
pub mod error;
pub mod iq;
pub mod locator;
pub mod positioning;
pub mod queue;
pub mod stats;

pub use beacon::{Beacon, BeaconRegistry, Mac};
pub use error::AodError;
pub use iq::{AntennaPattern, IqData, PipelineConfig, RawIqFrame};
pub use locator::{Locator, Position};
pub use positioning::{AodPipeline, DirectionFix, PairArbiter};
pub use queue::{FnProcessor, IqProcessor, IqWorkQueue};

/// Result type alias for positioning operations.
pub type Result<T> = std::result::Result<T, AodError>;
