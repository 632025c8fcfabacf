//! Glue between the IQ pipeline and the locator solver.
//!
//! The pipeline emits one directional fix per frame. Fixes only become a
//! position once two of them originate from distinct beacons, so a small
//! arbiter holds the latest fix and waits for one from a different MAC.
//! [`AodPipeline`] wires the pieces together into an [`IqProcessor`] that
//! can be handed straight to the work queue.

use std::sync::Arc;

use crossbeam_channel::{Sender, TrySendError};

use crate::beacon::{BeaconRegistry, Mac};
use crate::iq::{IqData, PipelineConfig, RawIqFrame};
use crate::locator::{Locator, Position};
use crate::queue::IqProcessor;

/// One directional fix: the per-frame output of the IQ pipeline.
#[derive(Debug, Clone, Copy)]
pub struct DirectionFix {
    /// Beacon the CTE came from, in protocol order.
    pub beacon_mac: Mac,
    /// Local direction cosines toward the locator.
    pub local_direction: [f32; 3],
    /// Departure azimuth in radians.
    pub azimuth: f32,
    /// Departure elevation in radians.
    pub elevation: f32,
    /// Arrival time of the underlying report, in milliseconds since boot.
    pub timestamp_ms: i64,
}

impl From<&IqData> for DirectionFix {
    fn from(data: &IqData) -> DirectionFix {
        DirectionFix {
            beacon_mac: data.beacon_mac,
            local_direction: data.local_direction(),
            azimuth: data.azimuth,
            elevation: data.elevation,
            timestamp_ms: data.timestamp_ms,
        }
    }
}

/// Pairs consecutive fixes from distinct beacons.
///
/// Keeps only the immediately previous fix: a fix from the same beacon as
/// the held one is ignored, a fix from a different beacon completes a pair
/// and becomes the new held fix. Richer policies (per-MAC freshest buffer,
/// time windows) would live in a replacement for this type.
#[derive(Debug, Default)]
pub struct PairArbiter {
    held: Option<DirectionFix>,
}

impl PairArbiter {
    pub fn new() -> PairArbiter {
        PairArbiter::default()
    }

    /// Offer a fix; returns the completed `(older, newer)` pair when the
    /// fix comes from a different beacon than the held one.
    pub fn offer(&mut self, fix: DirectionFix) -> Option<(DirectionFix, DirectionFix)> {
        match self.held {
            None => {
                self.held = Some(fix);
                None
            }
            Some(held) if held.beacon_mac == fix.beacon_mac => {
                log::trace!("fix from {} holds, waiting for a second beacon", fix.beacon_mac);
                None
            }
            Some(held) => {
                self.held = Some(fix);
                Some((held, fix))
            }
        }
    }

    /// The fix currently waiting for a partner.
    pub fn held(&self) -> Option<DirectionFix> {
        self.held
    }
}

/// The full receive-side processing chain: IQ pipeline, pair arbiter, and
/// locator solver.
///
/// Implements [`IqProcessor`], so a work queue specialized to this type
/// runs the whole chain on its worker thread. Position fixes land in the
/// locator's history ring; optionally they are also pushed into a bounded
/// channel for live consumption, where a full channel drops the fix rather
/// than block the worker.
pub struct AodPipeline {
    config: PipelineConfig,
    locator: Locator,
    arbiter: PairArbiter,
    position_sink: Option<Sender<Position>>,
}

impl AodPipeline {
    pub fn new(registry: Arc<BeaconRegistry>, config: PipelineConfig) -> AodPipeline {
        AodPipeline {
            config,
            locator: Locator::new(registry),
            arbiter: PairArbiter::new(),
            position_sink: None,
        }
    }

    /// Attach a channel that receives every successful position fix.
    pub fn with_position_sink(mut self, sink: Sender<Position>) -> AodPipeline {
        self.position_sink = Some(sink);
        self
    }

    /// The locator, for inspecting the position history.
    pub fn locator(&self) -> &Locator {
        &self.locator
    }

    /// Process one raw frame end to end.
    ///
    /// Returns the position fix when this frame completed a beacon pair
    /// and the solver succeeded.
    pub fn process_frame(&mut self, frame: &RawIqFrame) -> Option<Position> {
        let data = IqData::process(frame, &self.config);
        log::debug!(
            "fix from {}: azimuth {:.2} rad, elevation {:.2} rad",
            data.beacon_mac,
            data.azimuth,
            data.elevation
        );

        let (older, newer) = self.arbiter.offer(DirectionFix::from(&data))?;

        match self.locator.estimate_position(
            older.beacon_mac,
            older.local_direction,
            newer.beacon_mac,
            newer.local_direction,
        ) {
            Ok(position) => {
                if let Some(sink) = &self.position_sink {
                    match sink.try_send(position) {
                        Ok(()) => {}
                        Err(TrySendError::Full(_)) => {
                            log::trace!("position sink full, dropping fix");
                        }
                        Err(TrySendError::Disconnected(_)) => {
                            log::debug!("position sink disconnected");
                            self.position_sink = None;
                        }
                    }
                }
                Some(position)
            }
            Err(error) => {
                log::warn!("position estimate failed: {}", error);
                None
            }
        }
    }
}

impl IqProcessor for AodPipeline {
    fn process(&mut self, frame: &RawIqFrame) {
        self.process_frame(frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::antenna;
    use crate::beacon::Beacon;
    use crate::channel;
    use crate::iq::{MEASUREMENT_MAX, REFERENCE_MAX};
    use crate::queue::IqWorkQueue;
    use std::time::Duration;

    const SQRT_HALF: f32 = std::f32::consts::FRAC_1_SQRT_2;

    fn mac(last_octet: u8) -> Mac {
        Mac::from_big_endian([0xF6, 0x66, 0xCD, 0xFD, 0xDC, last_octet])
    }

    fn fix(last_octet: u8, timestamp_ms: i64) -> DirectionFix {
        DirectionFix {
            beacon_mac: mac(last_octet),
            local_direction: [0.0, 0.0, 1.0],
            azimuth: 0.0,
            elevation: 0.0,
            timestamp_ms,
        }
    }

    /// Frame whose measurement phases place the locator at the given local
    /// direction cosines, as seen by a full-pattern beacon on channel 18.
    fn synthetic_frame(beacon: Mac, timestamp_ms: i64, cx: f32, cy: f32) -> RawIqFrame {
        let wavenumber = channel::wavenumber_rad_per_mm(18);
        let mut samples = Vec::new();
        for index in 0..REFERENCE_MAX {
            let sign = if index % 2 == 0 { 1i8 } else { -1i8 };
            samples.push((sign * 100, 0i8));
        }
        for slot in 0..MEASUREMENT_MAX {
            let antenna_number = antenna::FULL_SWITCH_SEQUENCE[slot] as usize;
            let (x, y) = antenna::ANTENNA_POSITIONS_MM[antenna_number];
            let phase = wavenumber * (x * cx + y * cy);
            samples.push((
                (100.0 * phase.cos()).round() as i8,
                (100.0 * phase.sin()).round() as i8,
            ));
        }
        RawIqFrame::new(timestamp_ms, 18, beacon, &samples)
    }

    fn two_beacon_registry() -> Arc<BeaconRegistry> {
        let mut registry = BeaconRegistry::new();
        registry
            .put(Beacon::new(mac(1), 0.0, 0.0, 0.0, 0.0, 0.0, 0.0).unwrap())
            .unwrap();
        registry
            .put(Beacon::new(mac(2), 10.0, 0.0, 0.0, 0.0, 0.0, 0.0).unwrap())
            .unwrap();
        Arc::new(registry)
    }

    #[test]
    fn test_arbiter_holds_same_beacon() {
        let mut arbiter = PairArbiter::new();
        assert!(arbiter.offer(fix(1, 100)).is_none());
        // Same beacon again: no pair, and the held fix stays.
        assert!(arbiter.offer(fix(1, 200)).is_none());
        assert_eq!(arbiter.held().unwrap().timestamp_ms, 100);
    }

    #[test]
    fn test_arbiter_pairs_distinct_beacons() {
        let mut arbiter = PairArbiter::new();
        assert!(arbiter.offer(fix(1, 100)).is_none());
        let (older, newer) = arbiter.offer(fix(2, 200)).unwrap();
        assert_eq!(older.beacon_mac, mac(1));
        assert_eq!(newer.beacon_mac, mac(2));
        // The newer fix is now held and pairs with the next new beacon.
        let (older, newer) = arbiter.offer(fix(3, 300)).unwrap();
        assert_eq!(older.beacon_mac, mac(2));
        assert_eq!(newer.beacon_mac, mac(3));
    }

    #[test]
    fn test_pipeline_end_to_end() {
        // Beacon 1 sees the locator up-right, beacon 2 up-left; the rays
        // meet at (5, 0, 5).
        let mut pipeline = AodPipeline::new(two_beacon_registry(), PipelineConfig::default());

        let first = pipeline.process_frame(&synthetic_frame(mac(1), 10, SQRT_HALF, 0.0));
        assert!(first.is_none());

        let second = pipeline.process_frame(&synthetic_frame(mac(2), 20, -SQRT_HALF, 0.0));
        let position = second.expect("pair from two beacons must produce a fix");
        assert!((position.x - 5.0).abs() < 0.3);
        assert!(position.y.abs() < 0.3);
        assert!((position.z - 5.0).abs() < 0.3);

        assert_eq!(pipeline.locator().history_len(), 1);
    }

    #[test]
    fn test_pipeline_skips_unregistered_beacon() {
        let mut pipeline = AodPipeline::new(two_beacon_registry(), PipelineConfig::default());
        pipeline.process_frame(&synthetic_frame(mac(1), 10, SQRT_HALF, 0.0));
        let result = pipeline.process_frame(&synthetic_frame(mac(9), 20, -SQRT_HALF, 0.0));
        assert!(result.is_none());
        assert_eq!(pipeline.locator().history_len(), 0);
    }

    #[test]
    fn test_position_sink_receives_fixes() {
        let (sink_tx, sink_rx) = crossbeam_channel::bounded(16);
        let pipeline = AodPipeline::new(two_beacon_registry(), PipelineConfig::default())
            .with_position_sink(sink_tx);

        let queue = IqWorkQueue::start(pipeline).unwrap();
        queue
            .submit(&synthetic_frame(mac(1), 10, SQRT_HALF, 0.0))
            .unwrap();
        queue
            .submit(&synthetic_frame(mac(2), 20, -SQRT_HALF, 0.0))
            .unwrap();

        let position = sink_rx
            .recv_timeout(Duration::from_secs(2))
            .expect("worker must deliver a position fix");
        assert!((position.x - 5.0).abs() < 0.3);
        assert!((position.z - 5.0).abs() < 0.3);
    }
}
