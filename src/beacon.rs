//! Beacon identity, placement, and the fixed-capacity registry.
//!
//! A beacon is a stationary transmitter with a known global position and
//! orientation. The orientation is stored as an orthonormal basis
//! `(i, j, k)` that maps local array-frame direction vectors to the global
//! frame; it is derived once from Tait-Bryan yaw/pitch/roll angles at
//! construction time. The "global" frame here is the site frame shared by
//! all beacons, not a geographic coordinate system. Anchoring the site to
//! the Earth is someone else's job.

use std::fmt;

use crate::error::AodError;
use crate::Result;

/// Number of octets in a Bluetooth device address.
pub const MAC_SIZE: usize = 6;

/// Maximum number of beacons a registry can hold.
pub const REGISTRY_CAPACITY: usize = 16;

/// A Bluetooth device address, held in protocol (little-endian) octet
/// order.
///
/// "Multi-octet fields ... shall be transmitted with the least significant
/// octet first" (Bluetooth Core Specification 5.4, Vol 6, Part B), so the
/// on-air order is the reverse of the conventional human-readable form.
/// The protocol order is what the receive path reports and is therefore
/// the registry lookup key; equality is bytewise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Mac([u8; MAC_SIZE]);

impl Mac {
    /// Build a MAC from octets already in protocol (little-endian) order.
    pub const fn from_protocol_order(octets: [u8; MAC_SIZE]) -> Mac {
        Mac(octets)
    }

    /// Build a MAC from octets in conventional big-endian order, e.g. the
    /// order in `F6:66:CD:FD:DC:EB`.
    pub fn from_big_endian(octets: [u8; MAC_SIZE]) -> Mac {
        let mut reversed = octets;
        reversed.reverse();
        Mac(reversed)
    }

    /// Octets in protocol (little-endian) order.
    pub const fn octets(&self) -> [u8; MAC_SIZE] {
        self.0
    }

    /// Octets in conventional big-endian order.
    pub fn to_big_endian(&self) -> [u8; MAC_SIZE] {
        let mut reversed = self.0;
        reversed.reverse();
        reversed
    }

    /// Parse a colon-separated big-endian address like `F6:66:CD:FD:DC:EB`.
    pub fn parse(text: &str) -> Result<Mac> {
        let mut octets = [0u8; MAC_SIZE];
        let mut parts = text.split(':');
        for octet in octets.iter_mut() {
            let part = parts
                .next()
                .ok_or(AodError::InvalidArgument("MAC address has too few octets"))?;
            *octet = u8::from_str_radix(part, 16)
                .map_err(|_| AodError::InvalidArgument("MAC address octet is not hex"))?;
        }
        if parts.next().is_some() {
            return Err(AodError::InvalidArgument("MAC address has too many octets"));
        }
        Ok(Mac::from_big_endian(octets))
    }
}

impl fmt::Display for Mac {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let be = self.to_big_endian();
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            be[0], be[1], be[2], be[3], be[4], be[5]
        )
    }
}

/// A registered beacon: identity, global position, and orientation basis.
///
/// Read-only after construction. The basis columns `(i, j, k)` are the
/// local X/Y/Z axes expressed in global coordinates, so transforming a
/// local direction to the global frame is one matrix-vector product.
#[derive(Debug, Clone, Copy)]
pub struct Beacon {
    mac: Mac,
    position: [f32; 3],
    basis_i: [f32; 3],
    basis_j: [f32; 3],
    basis_k: [f32; 3],
}

impl Beacon {
    /// Create a beacon at global position `(x, y, z)` in meters with the
    /// given Tait-Bryan orientation angles in radians.
    ///
    /// Yaw is a rotation about the Z-axis in `[-pi, pi]`, pitch about the
    /// Y-axis in `[-pi/2, pi/2]`, roll about the X-axis in `[-pi, pi]`,
    /// applied in the extrinsic x-y-z order: `R = Rz(yaw) Ry(pitch)
    /// Rx(roll)`. Out-of-range angles fail with
    /// [`AodError::InvalidArgument`].
    pub fn new(mac: Mac, x: f32, y: f32, z: f32, yaw: f32, pitch: f32, roll: f32) -> Result<Beacon> {
        use std::f32::consts::{FRAC_PI_2, PI};

        if !(-PI..=PI).contains(&yaw) {
            return Err(AodError::InvalidArgument("yaw is outside [-pi, pi]"));
        }
        if !(-FRAC_PI_2..=FRAC_PI_2).contains(&pitch) {
            return Err(AodError::InvalidArgument("pitch is outside [-pi/2, pi/2]"));
        }
        if !(-PI..=PI).contains(&roll) {
            return Err(AodError::InvalidArgument("roll is outside [-pi, pi]"));
        }

        let (sin_yaw, cos_yaw) = yaw.sin_cos();
        let (sin_pitch, cos_pitch) = pitch.sin_cos();
        let (sin_roll, cos_roll) = roll.sin_cos();

        // Columns of R = Rz(yaw) Ry(pitch) Rx(roll).
        let basis_i = [cos_yaw * cos_pitch, sin_yaw * cos_pitch, -sin_pitch];
        let basis_j = [
            cos_yaw * sin_pitch * sin_roll - sin_yaw * cos_roll,
            sin_yaw * sin_pitch * sin_roll + cos_yaw * cos_roll,
            cos_pitch * sin_roll,
        ];
        let basis_k = [
            cos_yaw * sin_pitch * cos_roll + sin_yaw * sin_roll,
            sin_yaw * sin_pitch * cos_roll - cos_yaw * sin_roll,
            cos_pitch * cos_roll,
        ];

        Ok(Beacon {
            mac,
            position: [x, y, z],
            basis_i,
            basis_j,
            basis_k,
        })
    }

    /// The beacon address in protocol order.
    pub fn mac(&self) -> Mac {
        self.mac
    }

    /// Global position `(x, y, z)` in meters.
    pub fn position(&self) -> [f32; 3] {
        self.position
    }

    /// Transform a local direction-cosine triple to the global frame.
    ///
    /// The input must already be a unit direction; validation is
    /// deliberately omitted on this hot path.
    pub fn global_direction(&self, local: [f32; 3]) -> [f32; 3] {
        [
            local[0] * self.basis_i[0] + local[1] * self.basis_j[0] + local[2] * self.basis_k[0],
            local[0] * self.basis_i[1] + local[1] * self.basis_j[1] + local[2] * self.basis_k[1],
            local[0] * self.basis_i[2] + local[1] * self.basis_j[2] + local[2] * self.basis_k[2],
        ]
    }

    #[cfg(test)]
    fn basis(&self) -> [[f32; 3]; 3] {
        [self.basis_i, self.basis_j, self.basis_k]
    }
}

/// Fixed-capacity mapping from beacon MAC to beacon frame.
///
/// Populated at startup and read-only during steady state. MACs are unique;
/// a put for an existing MAC overwrites the stored beacon.
#[derive(Debug, Default)]
pub struct BeaconRegistry {
    beacons: Vec<Beacon>,
}

impl BeaconRegistry {
    pub fn new() -> BeaconRegistry {
        BeaconRegistry {
            beacons: Vec::with_capacity(REGISTRY_CAPACITY),
        }
    }

    /// Insert or update a beacon.
    ///
    /// Overwrites the existing entry when the MAC is already registered,
    /// appends when there is room, and fails with [`AodError::NoSpace`]
    /// when the registry is at capacity.
    pub fn put(&mut self, beacon: Beacon) -> Result<()> {
        for existing in self.beacons.iter_mut() {
            if existing.mac == beacon.mac {
                *existing = beacon;
                return Ok(());
            }
        }

        if self.beacons.len() >= REGISTRY_CAPACITY {
            return Err(AodError::NoSpace);
        }

        self.beacons.push(beacon);
        Ok(())
    }

    /// Look up a beacon by its protocol-order MAC.
    pub fn get(&self, mac: Mac) -> Result<Beacon> {
        self.beacons
            .iter()
            .find(|beacon| beacon.mac == mac)
            .copied()
            .ok_or(AodError::NotFound(mac))
    }

    /// Number of registered beacons.
    pub fn len(&self) -> usize {
        self.beacons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.beacons.is_empty()
    }
}
