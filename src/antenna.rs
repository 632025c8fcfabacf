//! CoreHW CHW1010-ANT2-1.1 antenna array geometry.
//!
//! The array is a 4x4 grid of patch antennas with 37.5 mm center-to-center
//! spacing, centered at the origin of a right-handed coordinate system:
//!
//! ```text
//!            Y
//!            |
//!    13   12 | 11    9
//!            |
//!    14   15 | 10    8
//!            +------------ X
//!     1    0    5    7
//!
//!     2    3    4    6
//! ```
//!
//! The X-axis points rightward when facing the array, the Y-axis points
//! upward, and the Z-axis points outward from the array toward the locator.

/// Number of antennas in the array.
pub const ANTENNA_COUNT: usize = 16;

/// Center-to-center spacing of orthogonally adjacent antennas, in
/// millimeters.
pub const SPACING_ORTHOGONAL_MM: f32 = 37.5;

/// Center-to-center spacing of diagonally adjacent antennas, in
/// millimeters.
pub const SPACING_DIAGONAL_MM: f32 = 53.033009;

/// Per-antenna `(x, y)` positions in millimeters, indexed by antenna
/// number.
pub const ANTENNA_POSITIONS_MM: [(f32, f32); ANTENNA_COUNT] = [
    (-18.75, -18.75), // antenna  0, in bottom left quadrant.
    (-56.25, -18.75), // antenna  1, in bottom left quadrant.
    (-56.25, -56.25), // antenna  2, in bottom left quadrant.
    (-18.75, -56.25), // antenna  3, in bottom left quadrant.
    (18.75, -56.25),  // antenna  4, in bottom right quadrant.
    (18.75, -18.75),  // antenna  5, in bottom right quadrant.
    (56.25, -56.25),  // antenna  6, in bottom right quadrant.
    (56.25, -18.75),  // antenna  7, in bottom right quadrant.
    (56.25, 18.75),   // antenna  8, in top right quadrant.
    (56.25, 56.25),   // antenna  9, in top right quadrant.
    (18.75, 18.75),   // antenna 10, in top right quadrant.
    (18.75, 56.25),   // antenna 11, in top right quadrant.
    (-18.75, 56.25),  // antenna 12, in top left quadrant.
    (-56.25, 56.25),  // antenna 13, in top left quadrant.
    (-56.25, 18.75),  // antenna 14, in top left quadrant.
    (-18.75, 18.75),  // antenna 15, in top left quadrant.
];

/// Antenna switching sequence for the bottom-row beacon configuration.
///
/// `ROW_SWITCH_SEQUENCE[i]` is the antenna number that produced
/// measurement slot `i`. The beacon cycles antennas 2, 3, 4 and 6 (the
/// bottom row of the grid) across the 37 measurement slots.
pub const ROW_SWITCH_SEQUENCE: [u8; 37] = [
    3, 4, 6, 2, 3, 4, 6, 2, 3, 4, //
    6, 2, 3, 4, 6, 2, 3, 4, 6, 2, //
    3, 4, 6, 2, 3, 4, 6, 2, 3, 4, //
    6, 2, 3, 4, 6, 2, 3,
];

/// Antenna switching sequence for the full-array beacon configuration.
///
/// `FULL_SWITCH_SEQUENCE[i]` is the antenna number that produced
/// measurement slot `i`. The beacon steps through all 16 antennas in
/// numeric order, which traces a snake pattern over the grid.
pub const FULL_SWITCH_SEQUENCE: [u8; 37] = [
    1, 2, 3, 4, 5, 6, 7, 8, 9, 10, //
    11, 12, 13, 14, 15, 0, 1, 2, 3, 4, //
    5, 6, 7, 8, 9, 10, 11, 12, 13, 14, //
    15, 0, 1, 2, 3, 4, 5,
];
