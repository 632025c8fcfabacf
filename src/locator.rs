//! Position estimation from two directional fixes.
//!
//! Each beacon's direction fix defines a ray in the global frame: the
//! beacon position plus a scaled global direction vector. Two rays from
//! distinct beacons would ideally intersect at the locator, but with the
//! extra degree of freedom in 3-D space a perfect intersection essentially
//! never happens. The solver instead finds the shortest segment connecting
//! the two skew lines (which is perpendicular to both) and takes its
//! midpoint as the position estimate, with half the segment length as the
//! error radius.

use std::sync::Arc;

use crate::beacon::{BeaconRegistry, Mac};
use crate::error::AodError;
use crate::Result;

/// Capacity of the position-history ring buffer.
pub const POSITION_HISTORY_CAPACITY: usize = 256;

/// Parallelity threshold for the solver denominator `1 - (D1 . D2)^2`.
pub const PARALLEL_EPSILON: f32 = 0.001;

/// One position fix in the global frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    /// Global coordinates in meters.
    pub x: f32,
    pub y: f32,
    pub z: f32,
    /// Half the minimum distance between the two rays that produced the
    /// fix, in meters.
    pub error_radius: f32,
}

/// The locator: fuses pairs of directional fixes into position estimates.
///
/// Holds a read-only handle to the beacon registry and a bounded ring of
/// recent fixes for inspection. Writes happen only from the processing
/// context, so no interior locking is needed.
pub struct Locator {
    registry: Arc<BeaconRegistry>,
    history: Vec<Position>,
    history_next: usize,
}

impl Locator {
    pub fn new(registry: Arc<BeaconRegistry>) -> Locator {
        Locator {
            registry,
            history: Vec::with_capacity(POSITION_HISTORY_CAPACITY),
            history_next: 0,
        }
    }

    /// The beacon registry this locator resolves MACs against.
    pub fn registry(&self) -> &BeaconRegistry {
        &self.registry
    }

    /// Estimate the locator position from two beacon direction fixes.
    ///
    /// Looks up both beacons, transforms the local direction cosines to
    /// global rays, and solves for the midpoint of the perpendicular
    /// common segment between the rays:
    ///
    /// ```text
    /// t1 = (D1.V - (D2.V)(D1.D2)) / (1 - (D1.D2)^2)
    /// t2 = ((D1.V)(D1.D2) - D2.V) / (1 - (D1.D2)^2)
    /// ```
    ///
    /// with `V = P2 - P1`. Near-collinear rays make the denominator vanish
    /// and the parameters unstable; those fail with
    /// [`AodError::ParallelLines`]. A successful fix is appended to the
    /// position history and returned.
    pub fn estimate_position(
        &mut self,
        beacon_1_mac: Mac,
        beacon_1_local_direction: [f32; 3],
        beacon_2_mac: Mac,
        beacon_2_local_direction: [f32; 3],
    ) -> Result<Position> {
        let beacon_1 = self.registry.get(beacon_1_mac)?;
        let beacon_2 = self.registry.get(beacon_2_mac)?;

        let p1 = beacon_1.position();
        let p2 = beacon_2.position();
        let d1 = beacon_1.global_direction(beacon_1_local_direction);
        let d2 = beacon_2.global_direction(beacon_2_local_direction);

        // D1 and D2 are unit vectors, so D1.D1 = D2.D2 = 1 and the
        // perpendicularity conditions reduce to the closed form below.
        let d1_dot_d2 = dot(d1, d2);
        let v21 = [p2[0] - p1[0], p2[1] - p1[1], p2[2] - p1[2]];
        let d1_dot_v21 = dot(d1, v21);
        let d2_dot_v21 = dot(d2, v21);

        let denominator = 1.0 - d1_dot_d2 * d1_dot_d2;
        if denominator.abs() < PARALLEL_EPSILON {
            return Err(AodError::ParallelLines);
        }

        let t1 = (d1_dot_v21 - d2_dot_v21 * d1_dot_d2) / denominator;
        let t2 = (d1_dot_v21 * d1_dot_d2 - d2_dot_v21) / denominator;

        // Closest points on each ray.
        let q1 = [p1[0] + t1 * d1[0], p1[1] + t1 * d1[1], p1[2] + t1 * d1[2]];
        let q2 = [p2[0] + t2 * d2[0], p2[1] + t2 * d2[1], p2[2] + t2 * d2[2]];

        let gap = [q2[0] - q1[0], q2[1] - q1[1], q2[2] - q1[2]];
        let gap_length = dot(gap, gap).sqrt();

        let position = Position {
            x: (q1[0] + q2[0]) / 2.0,
            y: (q1[1] + q2[1]) / 2.0,
            z: (q1[2] + q2[2]) / 2.0,
            error_radius: gap_length / 2.0,
        };

        log::debug!(
            "position fix ({:.2}, {:.2}, {:.2}) +/- {:.2} m",
            position.x,
            position.y,
            position.z,
            position.error_radius
        );

        self.push_history(position);
        Ok(position)
    }

    fn push_history(&mut self, position: Position) {
        if self.history_next < self.history.len() {
            self.history[self.history_next] = position;
        } else {
            self.history.push(position);
        }
        self.history_next = (self.history_next + 1) % POSITION_HISTORY_CAPACITY;
    }

    /// Number of fixes retained, at most
    /// [`POSITION_HISTORY_CAPACITY`].
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// The most recent fix, if any.
    pub fn latest_position(&self) -> Option<Position> {
        if self.history.is_empty() {
            return None;
        }
        let index = if self.history_next == 0 {
            self.history.len() - 1
        } else {
            self.history_next - 1
        };
        Some(self.history[index])
    }

    /// Retained fixes, newest first.
    pub fn history(&self) -> impl Iterator<Item = Position> + '_ {
        let len = self.history.len();
        (0..len).map(move |offset| {
            let index = (self.history_next + len - 1 - offset) % len;
            self.history[index]
        })
    }
}

fn dot(a: [f32; 3], b: [f32; 3]) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beacon::Beacon;

    const SQRT_HALF: f32 = std::f32::consts::FRAC_1_SQRT_2;

    fn mac(last_octet: u8) -> Mac {
        Mac::from_big_endian([0xF6, 0x66, 0xCD, 0xFD, 0xDC, last_octet])
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
    fn test_orthogonal_rays_intersect() {
        // Two on-axis beacons with orthogonal rays meeting at (5, 0, 5).
        let mut locator = Locator::new(two_beacon_registry());
        let position = locator
            .estimate_position(
                mac(1),
                [SQRT_HALF, 0.0, SQRT_HALF],
                mac(2),
                [-SQRT_HALF, 0.0, SQRT_HALF],
            )
            .unwrap();

        assert!((position.x - 5.0).abs() < 1e-4);
        assert!(position.y.abs() < 1e-4);
        assert!((position.z - 5.0).abs() < 1e-4);
        assert!(position.error_radius < 1e-4);
        assert_eq!(locator.history_len(), 1);
    }

    #[test]
    fn test_skew_rays_midpoint() {
        // Offset one ray sideways so the rays are skew: the fix lands on
        // the midpoint of the perpendicular segment with half its length
        // as the error radius.
        let mut registry = BeaconRegistry::new();
        registry
            .put(Beacon::new(mac(1), 0.0, 0.0, 0.0, 0.0, 0.0, 0.0).unwrap())
            .unwrap();
        registry
            .put(Beacon::new(mac(2), 10.0, 2.0, 0.0, 0.0, 0.0, 0.0).unwrap())
            .unwrap();
        let mut locator = Locator::new(Arc::new(registry));

        let position = locator
            .estimate_position(
                mac(1),
                [SQRT_HALF, 0.0, SQRT_HALF],
                mac(2),
                [-SQRT_HALF, 0.0, SQRT_HALF],
            )
            .unwrap();

        assert!((position.x - 5.0).abs() < 1e-4);
        assert!((position.y - 1.0).abs() < 1e-4);
        assert!((position.z - 5.0).abs() < 1e-4);
        assert!((position.error_radius - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_parallel_rays_rejected() {
        let mut registry = BeaconRegistry::new();
        registry
            .put(Beacon::new(mac(1), 0.0, 0.0, 0.0, 0.0, 0.0, 0.0).unwrap())
            .unwrap();
        registry
            .put(Beacon::new(mac(2), 0.0, 1.0, 0.0, 0.0, 0.0, 0.0).unwrap())
            .unwrap();
        let mut locator = Locator::new(Arc::new(registry));

        let direction = [0.001, 0.0, 0.9999995];
        let result = locator.estimate_position(mac(1), direction, mac(2), direction);
        assert!(matches!(result, Err(AodError::ParallelLines)));
        assert_eq!(locator.history_len(), 0);
    }

    #[test]
    fn test_identical_directions_rejected() {
        let mut locator = Locator::new(two_beacon_registry());
        let result =
            locator.estimate_position(mac(1), [0.0, 0.0, 1.0], mac(2), [0.0, 0.0, 1.0]);
        assert!(matches!(result, Err(AodError::ParallelLines)));
    }

    #[test]
    fn test_unknown_beacon_rejected() {
        let mut locator = Locator::new(two_beacon_registry());
        let result = locator.estimate_position(
            mac(1),
            [0.0, 0.0, 1.0],
            mac(9),
            [-SQRT_HALF, 0.0, SQRT_HALF],
        );
        assert!(matches!(result, Err(AodError::NotFound(_))));
    }

    #[test]
    fn test_estimate_is_symmetric() {
        let mut locator = Locator::new(two_beacon_registry());
        let forward = locator
            .estimate_position(
                mac(1),
                [SQRT_HALF, 0.1, SQRT_HALF],
                mac(2),
                [-SQRT_HALF, 0.0, SQRT_HALF],
            )
            .unwrap();
        let reverse = locator
            .estimate_position(
                mac(2),
                [-SQRT_HALF, 0.0, SQRT_HALF],
                mac(1),
                [SQRT_HALF, 0.1, SQRT_HALF],
            )
            .unwrap();

        assert!((forward.x - reverse.x).abs() < 1e-4);
        assert!((forward.y - reverse.y).abs() < 1e-4);
        assert!((forward.z - reverse.z).abs() < 1e-4);
        assert!((forward.error_radius - reverse.error_radius).abs() < 1e-4);
    }

    #[test]
    fn test_oriented_beacon_transform() {
        // Beacon 2 yawed +90 degrees: its local X-axis points along
        // global Y, its local Z-axis stays on global Z.
        let mut registry = BeaconRegistry::new();
        registry
            .put(Beacon::new(mac(1), 0.0, 0.0, 0.0, 0.0, 0.0, 0.0).unwrap())
            .unwrap();
        registry
            .put(
                Beacon::new(mac(2), 0.0, 10.0, 0.0, std::f32::consts::FRAC_PI_2, 0.0, 0.0)
                    .unwrap(),
            )
            .unwrap();
        let mut locator = Locator::new(Arc::new(registry));

        // Beacon 2 reports the locator at local (-X, +Z), which the yawed
        // basis maps to global (-Y, +Z).
        let position = locator
            .estimate_position(
                mac(1),
                [0.0, SQRT_HALF, SQRT_HALF],
                mac(2),
                [-SQRT_HALF, 0.0, SQRT_HALF],
            )
            .unwrap();

        assert!(position.x.abs() < 1e-4);
        assert!((position.y - 5.0).abs() < 1e-4);
        assert!((position.z - 5.0).abs() < 1e-4);
        assert!(position.error_radius < 1e-4);
    }

    #[test]
    fn test_history_ring_wraps() {
        let mut locator = Locator::new(two_beacon_registry());
        let fixes = POSITION_HISTORY_CAPACITY + 44;
        for n in 0..fixes {
            // Vary the elevation slightly so fixes are distinguishable.
            let tilt = 0.0001 * n as f32;
            let d1 = [SQRT_HALF, tilt, (1.0 - 0.5 - tilt * tilt).sqrt()];
            locator
                .estimate_position(mac(1), d1, mac(2), [-SQRT_HALF, 0.0, SQRT_HALF])
                .unwrap();
        }

        assert_eq!(locator.history_len(), POSITION_HISTORY_CAPACITY);
        let newest = locator.latest_position().unwrap();
        let from_iter: Vec<Position> = locator.history().collect();
        assert_eq!(from_iter.len(), POSITION_HISTORY_CAPACITY);
        assert_eq!(from_iter[0], newest);
    }
}
