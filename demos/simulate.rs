//! Feed synthetic CTE reports from two simulated beacons through the full
//! queue -> pipeline -> solver path and print the position fixes.
//!
//! Usage: cargo run --example simulate

use std::sync::Arc;
use std::time::Duration;

use aod_locator::{
    antenna, channel, AodPipeline, Beacon, BeaconRegistry, IqWorkQueue, Mac, PipelineConfig,
    RawIqFrame,
};
use aod_locator::iq::{MEASUREMENT_MAX, REFERENCE_MAX};

/// Synthesize one full-pattern CTE report on channel 18 for a beacon that
/// sees the locator at the given local direction cosines.
fn synthetic_frame(beacon: Mac, timestamp_ms: i64, cx: f32, cy: f32) -> RawIqFrame {
    let wavenumber = channel::wavenumber_rad_per_mm(18);
    let mut samples = Vec::new();

    // Reference block: constant carrier with the on-air intersample sign
    // flip the pipeline's sign fix undoes.
    for index in 0..REFERENCE_MAX {
        let sign = if index % 2 == 0 { 1i8 } else { -1i8 };
        samples.push((sign * 100, 0i8));
    }

    // Measurement block: each slot carries the spatial phase of its
    // transmitting antenna.
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

fn main() {
    env_logger::init();

    let beacon_1_mac = Mac::parse("F6:66:CD:FD:DC:EB").unwrap();
    let beacon_2_mac = Mac::parse("F6:66:CD:FD:DC:EC").unwrap();

    // Two ceiling-height beacons 10 m apart, both facing the same way.
    let mut registry = BeaconRegistry::new();
    registry
        .put(Beacon::new(beacon_1_mac, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0).unwrap())
        .unwrap();
    registry
        .put(Beacon::new(beacon_2_mac, 10.0, 0.0, 0.0, 0.0, 0.0, 0.0).unwrap())
        .unwrap();

    let (position_tx, position_rx) = crossbeam_channel::bounded(64);
    let pipeline = AodPipeline::new(Arc::new(registry), PipelineConfig::default())
        .with_position_sink(position_tx);
    let queue = match IqWorkQueue::start(pipeline) {
        Ok(queue) => queue,
        Err(error) => {
            eprintln!("Failed to start IQ worker: {}", error);
            std::process::exit(1);
        }
    };

    println!("Simulating a locator at (5, 0, 5) between beacons at (0,0,0) and (10,0,0)...");

    // The locator sits up-right of beacon 1 and up-left of beacon 2; the
    // frames alternate so every second report completes a pair.
    let sqrt_half = std::f32::consts::FRAC_1_SQRT_2;
    for round in 0..5i64 {
        let timestamp = round * 100;
        if queue
            .submit(&synthetic_frame(beacon_1_mac, timestamp, sqrt_half, 0.0))
            .is_err()
        {
            break;
        }
        let _ = queue.submit(&synthetic_frame(beacon_2_mac, timestamp + 50, -sqrt_half, 0.0));
    }

    let mut count = 0;
    while let Ok(position) = position_rx.recv_timeout(Duration::from_millis(500)) {
        count += 1;
        println!(
            "fix {}: ({:+.3}, {:+.3}, {:+.3}) m, error radius {:.3} m",
            count, position.x, position.y, position.z, position.error_radius
        );
    }

    println!("{} position fixes computed", count);
}
