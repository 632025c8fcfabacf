//! IQ sample frames and the direction-finding pipeline.
//!
//! Each Constant Tone Extension report carries up to 45 raw IQ samples: the
//! first 8 are reference samples taken 1 microsecond apart while a single
//! antenna transmits, and the remaining samples (up to 37) are measurement
//! samples taken 4 microseconds apart while the beacon switches across its
//! antenna array.
//!
//! The pipeline turns one raw frame into local direction cosines:
//! split -> reference sign fix -> reference phases -> unwrap -> linear
//! drift estimate -> measurement compensation -> paired-antenna
//! interferometry.
//!
//! The interferometry step rests on a key observation: at the default
//! 4 microsecond measurement spacing and the 250 kHz CTE frequency, each
//! slot is exactly one carrier cycle apart, so all measurement samples are
//! phase-equivalent modulo drift. Once the systematic linear drift is
//! compensated, any residual phase difference between temporally adjacent
//! samples of physically adjacent antennas encodes the spatial phase
//! gradient across the array, the same first difference a conventional
//! interferometer measures.

use std::f32::consts::PI;

use crate::antenna;
use crate::beacon::Mac;
use crate::channel;
use crate::stats;

/// Maximum number of reference samples per report.
pub const REFERENCE_MAX: usize = 8;

/// Maximum number of measurement samples per report.
pub const MEASUREMENT_MAX: usize = 37;

/// Maximum number of raw IQ samples per report.
pub const SAMPLE_MAX: usize = REFERENCE_MAX + MEASUREMENT_MAX;

/// Interval between reference samples, in microseconds.
pub const REFERENCE_SPACING_US: f32 = 1.0;

/// Interval between measurement samples, in microseconds.
pub const MEASUREMENT_SPACING_US: f32 = 4.0;

/// Snapshot of one CTE report, captured in the receive callback.
///
/// Deliberately minimal: the receive path must return promptly, so it only
/// copies the samples and stamps the frame before handing it to the work
/// queue. Fixed-size and `Copy` so it can live inline in the queue's ring
/// buffer without allocation.
#[derive(Debug, Clone, Copy)]
pub struct RawIqFrame {
    /// Arrival time of the report, in milliseconds since boot.
    pub timestamp_ms: i64,
    /// BLE channel index the report was received on.
    pub channel_index: u8,
    /// Address of the transmitting beacon, in protocol order.
    pub beacon_mac: Mac,
    /// Number of valid entries in `i` and `q`.
    pub sample_count: u8,
    /// Raw I (in-phase) samples.
    pub i: [i8; SAMPLE_MAX],
    /// Raw Q (quadrature) samples.
    pub q: [i8; SAMPLE_MAX],
}

impl RawIqFrame {
    /// Build a frame from `(i, q)` sample pairs, truncating at
    /// [`SAMPLE_MAX`].
    pub fn new(timestamp_ms: i64, channel_index: u8, beacon_mac: Mac, samples: &[(i8, i8)]) -> RawIqFrame {
        let mut frame = RawIqFrame {
            timestamp_ms,
            channel_index,
            beacon_mac,
            sample_count: samples.len().min(SAMPLE_MAX) as u8,
            i: [0; SAMPLE_MAX],
            q: [0; SAMPLE_MAX],
        };
        for (index, &(i, q)) in samples.iter().take(SAMPLE_MAX).enumerate() {
            frame.i[index] = i;
            frame.q[index] = q;
        }
        frame
    }
}

impl Default for RawIqFrame {
    fn default() -> RawIqFrame {
        RawIqFrame {
            timestamp_ms: 0,
            channel_index: 0,
            beacon_mac: Mac::from_protocol_order([0; 6]),
            sample_count: 0,
            i: [0; SAMPLE_MAX],
            q: [0; SAMPLE_MAX],
        }
    }
}

/// Which antenna pattern the beacon transmits with, and therefore which
/// measurement pair table the pipeline uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AntennaPattern {
    /// Bottom-row pattern over antennas 2, 3, 4 and 6; horizontal pairs
    /// only.
    Row,
    /// Snake pattern over all 16 antennas; horizontal and vertical pairs.
    Full,
}

/// Pipeline configuration, fixed per receive-side setup.
#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    /// Pair table to use for interferometry.
    pub pattern: AntennaPattern,
    /// Whether to rotate every other reference sample by 180 degrees
    /// before drift estimation.
    ///
    /// Observed reference periods show a systematic 180 degree intersample
    /// phase shift whose physical cause is unsettled; undoing it yields
    /// good drift estimates, so the fix defaults to on.
    pub reference_sign_fix: bool,
}

impl Default for PipelineConfig {
    fn default() -> PipelineConfig {
        PipelineConfig {
            pattern: AntennaPattern::Full,
            reference_sign_fix: true,
        }
    }
}

/// Direction of a measurement pair on the antenna grid, first antenna to
/// second antenna.
///
/// The sign convention for the phase delta is positive X and positive Y:
/// `delta = phase(left) - phase(right)` is positive when the locator is to
/// the right of the array origin, and `delta = phase(bottom) - phase(top)`
/// is positive when the locator is above it. Right-to-left and
/// top-to-bottom pairs therefore contribute their delta negated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairDirection {
    LeftToRight,
    RightToLeft,
    BottomToTop,
    TopToBottom,
}

/// One interferometry pair: two measurement-slot indices whose samples
/// came from temporally adjacent slots on physically adjacent antennas.
#[derive(Debug, Clone, Copy)]
pub struct MeasurementPair {
    /// Measurement index of the first sample.
    pub first: u8,
    /// Measurement index of the second sample.
    pub second: u8,
    /// Physical direction from the first antenna to the second.
    pub direction: PairDirection,
    /// Center-to-center distance between the two antennas, in millimeters.
    /// Bounds the physically possible phase delta for this pair.
    pub spacing_mm: f32,
}

const fn orthogonal_pair(first: u8, second: u8, direction: PairDirection) -> MeasurementPair {
    MeasurementPair {
        first,
        second,
        direction,
        spacing_mm: antenna::SPACING_ORTHOGONAL_MM,
    }
}

/// Measurement pairs for the bottom-row antenna pattern: 27 horizontal
/// pairs, no vertical pairs.
///
/// These are measurement-slot indices, not antenna numbers; see
/// [`antenna::ROW_SWITCH_SEQUENCE`] for the slot-to-antenna mapping.
/// Restricting pairs to temporally adjacent slots keeps the effect of any
/// residual (uncompensated) phase drift to a single slot interval.
pub const ROW_PAIRS: [MeasurementPair; 27] = {
    use PairDirection::LeftToRight;
    [
        orthogonal_pair(0, 1, LeftToRight),
        orthogonal_pair(1, 2, LeftToRight),
        orthogonal_pair(3, 4, LeftToRight),
        orthogonal_pair(4, 5, LeftToRight),
        orthogonal_pair(5, 6, LeftToRight),
        orthogonal_pair(7, 8, LeftToRight),
        orthogonal_pair(8, 9, LeftToRight),
        orthogonal_pair(9, 10, LeftToRight),
        orthogonal_pair(11, 12, LeftToRight),
        orthogonal_pair(12, 13, LeftToRight),
        orthogonal_pair(13, 14, LeftToRight),
        orthogonal_pair(15, 16, LeftToRight),
        orthogonal_pair(16, 17, LeftToRight),
        orthogonal_pair(17, 18, LeftToRight),
        orthogonal_pair(19, 20, LeftToRight),
        orthogonal_pair(20, 21, LeftToRight),
        orthogonal_pair(21, 22, LeftToRight),
        orthogonal_pair(23, 24, LeftToRight),
        orthogonal_pair(24, 25, LeftToRight),
        orthogonal_pair(25, 26, LeftToRight),
        orthogonal_pair(27, 28, LeftToRight),
        orthogonal_pair(28, 29, LeftToRight),
        orthogonal_pair(29, 30, LeftToRight),
        orthogonal_pair(31, 32, LeftToRight),
        orthogonal_pair(32, 33, LeftToRight),
        orthogonal_pair(33, 34, LeftToRight),
        orthogonal_pair(35, 36, LeftToRight),
    ]
};

/// Measurement pairs for the full snake pattern over all 16 antennas:
/// 14 horizontal and 18 vertical pairs.
///
/// These are measurement-slot indices, not antenna numbers; see
/// [`antenna::FULL_SWITCH_SEQUENCE`] for the slot-to-antenna mapping.
pub const FULL_PAIRS: [MeasurementPair; 32] = {
    use PairDirection::{BottomToTop, LeftToRight, RightToLeft, TopToBottom};
    [
        orthogonal_pair(0, 1, TopToBottom),
        orthogonal_pair(1, 2, LeftToRight),
        orthogonal_pair(2, 3, LeftToRight),
        orthogonal_pair(3, 4, BottomToTop),
        orthogonal_pair(5, 6, BottomToTop),
        orthogonal_pair(6, 7, BottomToTop),
        orthogonal_pair(7, 8, BottomToTop),
        orthogonal_pair(9, 10, BottomToTop),
        orthogonal_pair(10, 11, RightToLeft),
        orthogonal_pair(11, 12, RightToLeft),
        orthogonal_pair(12, 13, TopToBottom),
        orthogonal_pair(13, 14, LeftToRight),
        orthogonal_pair(14, 15, TopToBottom),
        orthogonal_pair(15, 16, RightToLeft),
        orthogonal_pair(16, 17, TopToBottom),
        orthogonal_pair(17, 18, LeftToRight),
        orthogonal_pair(18, 19, LeftToRight),
        orthogonal_pair(19, 20, BottomToTop),
        orthogonal_pair(21, 22, BottomToTop),
        orthogonal_pair(22, 23, BottomToTop),
        orthogonal_pair(23, 24, BottomToTop),
        orthogonal_pair(25, 26, BottomToTop),
        orthogonal_pair(26, 27, RightToLeft),
        orthogonal_pair(27, 28, RightToLeft),
        orthogonal_pair(28, 29, TopToBottom),
        orthogonal_pair(29, 30, LeftToRight),
        orthogonal_pair(30, 31, TopToBottom),
        orthogonal_pair(31, 32, RightToLeft),
        orthogonal_pair(32, 33, TopToBottom),
        orthogonal_pair(33, 34, LeftToRight),
        orthogonal_pair(34, 35, LeftToRight),
        orthogonal_pair(35, 36, BottomToTop),
    ]
};

/// Derived per-frame record: the raw splits plus every intermediate buffer
/// of the pipeline, ending in local direction cosines.
///
/// The intermediates are kept rather than discarded so tests and debugging
/// tools can inspect each stage.
#[derive(Debug, Clone, Copy)]
pub struct IqData {
    /// Arrival time of the report, in milliseconds since boot.
    pub timestamp_ms: i64,
    /// BLE channel index the report was received on.
    pub channel_index: u8,
    /// Address of the transmitting beacon, in protocol order.
    pub beacon_mac: Mac,

    /// Number of valid reference samples, at most [`REFERENCE_MAX`].
    pub reference_count: usize,
    /// Number of valid measurement samples, at most [`MEASUREMENT_MAX`].
    pub measurement_count: usize,

    /// Reference samples, split from the head of the raw frame.
    pub reference_i: [i8; REFERENCE_MAX],
    pub reference_q: [i8; REFERENCE_MAX],
    /// Measurement samples, split from the tail of the raw frame.
    pub measurement_i: [i8; MEASUREMENT_MAX],
    pub measurement_q: [i8; MEASUREMENT_MAX],

    /// Reference phase angles in radians, principal values.
    pub reference_phases: [f32; REFERENCE_MAX],
    /// Reference phase angles unwrapped across the +/-pi seam.
    pub reference_phases_unwrapped: [f32; REFERENCE_MAX],

    /// Estimated linear phase drift, in radians per microsecond.
    pub drift_rate: f32,

    /// Measurement samples rotated to undo the linear phase drift.
    pub measurement_i_compensated: [f32; MEASUREMENT_MAX],
    pub measurement_q_compensated: [f32; MEASUREMENT_MAX],
    /// Phase angles of the compensated measurement samples.
    pub measurement_phases_compensated: [f32; MEASUREMENT_MAX],

    /// Local direction cosine toward the locator along the array X-axis.
    pub direction_cosine_x: f32,
    /// Local direction cosine toward the locator along the array Y-axis.
    pub direction_cosine_y: f32,
    /// Local direction cosine toward the locator along the array Z-axis
    /// (outward from the array; the locator is in front of it).
    pub direction_cosine_z: f32,

    /// Departure azimuth: angle in the XZ-plane with respect to the
    /// Z-axis, positive when the locator is to the right of the array.
    pub azimuth: f32,
    /// Departure elevation: angle from the XZ-plane toward the Y-axis,
    /// positive when the locator is above it.
    pub elevation: f32,
}

impl IqData {
    /// Split a raw frame into its reference and measurement blocks.
    ///
    /// The derived buffers start zeroed; [`IqData::process`] fills them in.
    pub fn from_raw(raw: &RawIqFrame) -> IqData {
        let sample_count = (raw.sample_count as usize).min(SAMPLE_MAX);
        let reference_count = sample_count.min(REFERENCE_MAX);
        let measurement_count = sample_count - reference_count;

        let mut data = IqData {
            timestamp_ms: raw.timestamp_ms,
            channel_index: raw.channel_index,
            beacon_mac: raw.beacon_mac,
            reference_count,
            measurement_count,
            reference_i: [0; REFERENCE_MAX],
            reference_q: [0; REFERENCE_MAX],
            measurement_i: [0; MEASUREMENT_MAX],
            measurement_q: [0; MEASUREMENT_MAX],
            reference_phases: [0.0; REFERENCE_MAX],
            reference_phases_unwrapped: [0.0; REFERENCE_MAX],
            drift_rate: 0.0,
            measurement_i_compensated: [0.0; MEASUREMENT_MAX],
            measurement_q_compensated: [0.0; MEASUREMENT_MAX],
            measurement_phases_compensated: [0.0; MEASUREMENT_MAX],
            direction_cosine_x: 0.0,
            direction_cosine_y: 0.0,
            direction_cosine_z: 1.0,
            azimuth: 0.0,
            elevation: 0.0,
        };

        data.reference_i[..reference_count].copy_from_slice(&raw.i[..reference_count]);
        data.reference_q[..reference_count].copy_from_slice(&raw.q[..reference_count]);
        data.measurement_i[..measurement_count]
            .copy_from_slice(&raw.i[reference_count..sample_count]);
        data.measurement_q[..measurement_count]
            .copy_from_slice(&raw.q[reference_count..sample_count]);

        data
    }

    /// Run the full pipeline on one raw frame.
    pub fn process(raw: &RawIqFrame, config: &PipelineConfig) -> IqData {
        let mut data = IqData::from_raw(raw);

        if config.reference_sign_fix {
            data.apply_reference_sign_fix();
        }

        data.estimate_drift_rate();
        data.compensate_measurements();
        data.calculate_compensated_phases();

        let pairs: &[MeasurementPair] = match config.pattern {
            AntennaPattern::Row => &ROW_PAIRS,
            AntennaPattern::Full => &FULL_PAIRS,
        };
        data.run_interferometry(pairs);

        data
    }

    /// Rotate every other reference sample by 180 degrees.
    ///
    /// Reference periods show a systematic 180 degree intersample phase
    /// shift. The expected shift at 250 kHz over 1 microsecond is about 90
    /// degrees, so the observed value is not understood; negating the odd
    /// samples nevertheless restores a cleanly linear phase ramp for the
    /// drift estimate. `-128` has no negation in two's complement and
    /// saturates to `+127`.
    fn apply_reference_sign_fix(&mut self) {
        for index in (1..self.reference_count).step_by(2) {
            self.reference_i[index] = match self.reference_i[index] {
                -128 => 127,
                value => -value,
            };
            self.reference_q[index] = match self.reference_q[index] {
                -128 => 127,
                value => -value,
            };
        }
    }

    /// Phase angle of each reference sample: `Arg(I + iQ)`, the principal
    /// value in `(-pi, pi]`.
    fn calculate_reference_phases(&mut self) {
        for index in 0..self.reference_count {
            self.reference_phases[index] =
                (self.reference_q[index] as f32).atan2(self.reference_i[index] as f32);
        }
    }

    /// Unwrap the reference phases so the drift fit sees a continuous ramp
    /// instead of principal values jumping across the +/-pi seam.
    fn unwrap_reference_phases(&mut self) {
        if self.reference_count == 0 {
            return;
        }

        self.reference_phases_unwrapped[0] = self.reference_phases[0];

        for index in 1..self.reference_count {
            let difference =
                self.reference_phases[index] - self.reference_phases_unwrapped[index - 1];
            self.reference_phases_unwrapped[index] = if difference > PI {
                self.reference_phases[index] - 2.0 * PI
            } else if difference < -PI {
                self.reference_phases[index] + 2.0 * PI
            } else {
                self.reference_phases[index]
            };
        }
    }

    /// Least-squares estimate of the linear phase drift over the reference
    /// block, in radians per microsecond.
    ///
    /// Fits `y = mx + b` over the unwrapped reference phases with
    /// `m = (n*sum(xy) - sum(x)*sum(y)) / (n*sum(x^2) - sum(x)^2)` in
    /// radians per reference sample, then divides by the reference
    /// spacing. Fewer than two reference samples leave the rate at zero.
    fn estimate_drift_rate(&mut self) {
        if self.reference_count == 0 {
            self.drift_rate = 0.0;
            return;
        }

        self.calculate_reference_phases();
        self.unwrap_reference_phases();

        if self.reference_count == 1 {
            self.drift_rate = 0.0;
            return;
        }

        let n = self.reference_count as f32;
        let mut sum_x = 0.0f32;
        let mut sum_y = 0.0f32;
        let mut sum_xy = 0.0f32;
        let mut sum_xx = 0.0f32;
        for index in 0..self.reference_count {
            let x = index as f32;
            let y = self.reference_phases_unwrapped[index];
            sum_x += x;
            sum_y += y;
            sum_xy += x * y;
            sum_xx += x * x;
        }
        let slope = (n * sum_xy - sum_x * sum_y) / (n * sum_xx - sum_x * sum_x);

        self.drift_rate = slope / REFERENCE_SPACING_US;
    }

    /// Rotate each measurement sample to undo the estimated linear drift.
    ///
    /// Sample `i` is rotated by `theta_i = -drift_rate * 4us * i`:
    /// `i_c = i*cos(theta) - q*sin(theta)`,
    /// `q_c = i*sin(theta) + q*cos(theta)`.
    fn compensate_measurements(&mut self) {
        let rate = -self.drift_rate * MEASUREMENT_SPACING_US;
        for index in 0..self.measurement_count {
            let theta = rate * index as f32;
            let (sin_theta, cos_theta) = theta.sin_cos();

            let i = self.measurement_i[index] as f32;
            let q = self.measurement_q[index] as f32;
            self.measurement_i_compensated[index] = i * cos_theta - q * sin_theta;
            self.measurement_q_compensated[index] = i * sin_theta + q * cos_theta;
        }
    }

    /// Phase angle of each compensated measurement sample.
    fn calculate_compensated_phases(&mut self) {
        for index in 0..self.measurement_count {
            self.measurement_phases_compensated[index] = self.measurement_q_compensated[index]
                .atan2(self.measurement_i_compensated[index]);
        }
    }

    /// Estimate local direction cosines, azimuth, and elevation from the
    /// compensated measurement samples.
    ///
    /// For each pair, the phase delta `phase(first) - phase(second)` is
    /// computed as the argument of the complex cross product
    /// `(I1 + iQ1) * conj(I2 + iQ2)`, one atan2 per pair instead of one
    /// per slot. Deltas are clamped to the physically possible maximum for
    /// the pair's antenna spacing at this channel's wavenumber, signed by
    /// the pair direction, and bucketed into horizontal and vertical sets.
    /// The intrinsic circular mean of each bucket, normalized by the
    /// orthogonal phase separation, yields the direction cosines.
    fn run_interferometry(&mut self, pairs: &[MeasurementPair]) {
        if self.measurement_count < 3 {
            self.set_neutral_direction();
            return;
        }

        let wavenumber = channel::wavenumber_rad_per_mm(self.channel_index);
        if wavenumber <= 0.0 {
            log::debug!(
                "unknown BLE channel {}, skipping direction estimate",
                self.channel_index
            );
            self.set_neutral_direction();
            return;
        }

        // Maximum phase separation of orthogonally adjacent antennas at
        // this channel, e.g. 0.051181 rad/mm * 37.5 mm = 1.9193 rad on
        // channel 18.
        let d_orthogonal = wavenumber * antenna::SPACING_ORTHOGONAL_MM;

        let mut horizontal_deltas: Vec<f32> = Vec::with_capacity(pairs.len());
        let mut vertical_deltas: Vec<f32> = Vec::with_capacity(pairs.len());

        for pair in pairs {
            let first = pair.first as usize;
            let second = pair.second as usize;
            if first >= self.measurement_count || second >= self.measurement_count {
                continue;
            }

            let i1 = self.measurement_i_compensated[first];
            let q1 = self.measurement_q_compensated[first];
            let i2 = self.measurement_i_compensated[second];
            let q2 = self.measurement_q_compensated[second];

            // Arg((I1 + iQ1) * conj(I2 + iQ2)) = phase(first) - phase(second).
            let real = i1 * i2 + q1 * q2;
            let imag = q1 * i2 - i1 * q2;
            let mut delta = imag.atan2(real);

            // A delta beyond k * spacing would imply a path difference
            // larger than the antenna separation itself.
            let bound = wavenumber * pair.spacing_mm;
            if delta > bound {
                log::trace!(
                    "pair ({}, {}): clamping delta {:.6} to {:.6}",
                    first,
                    second,
                    delta,
                    bound
                );
                delta = bound;
            } else if delta < -bound {
                log::trace!(
                    "pair ({}, {}): clamping delta {:.6} to {:.6}",
                    first,
                    second,
                    delta,
                    -bound
                );
                delta = -bound;
            }

            match pair.direction {
                PairDirection::LeftToRight => horizontal_deltas.push(delta),
                PairDirection::RightToLeft => horizontal_deltas.push(-delta),
                PairDirection::BottomToTop => vertical_deltas.push(delta),
                PairDirection::TopToBottom => vertical_deltas.push(-delta),
            }
        }

        let mut direction_cosine_x = 0.0f32;
        if !horizontal_deltas.is_empty() {
            let horizontal_mean = stats::circular_mean(&horizontal_deltas, 5, 0.01);
            direction_cosine_x = (-horizontal_mean / d_orthogonal).clamp(-1.0, 1.0);
        }

        let mut direction_cosine_y = 0.0f32;
        if !vertical_deltas.is_empty() {
            let vertical_mean = stats::circular_mean(&vertical_deltas, 5, 0.01);
            direction_cosine_y = (-vertical_mean / d_orthogonal).clamp(-1.0, 1.0);
        }

        // cos^2(theta_x) + cos^2(theta_y) + cos^2(theta_z) = 1, with the
        // positive root: the locator is in front of the array.
        let direction_cosine_z_squared = (1.0
            - (direction_cosine_x * direction_cosine_x
                + direction_cosine_y * direction_cosine_y))
            .max(0.0);

        self.direction_cosine_x = direction_cosine_x;
        self.direction_cosine_y = direction_cosine_y;
        self.direction_cosine_z = direction_cosine_z_squared.sqrt();

        self.azimuth = self.direction_cosine_x.atan2(self.direction_cosine_z);
        self.elevation = self.direction_cosine_y.asin();
    }

    fn set_neutral_direction(&mut self) {
        self.direction_cosine_x = 0.0;
        self.direction_cosine_y = 0.0;
        self.direction_cosine_z = 1.0;
        self.azimuth = 0.0;
        self.elevation = 0.0;
    }

    /// Local direction cosines as a triple.
    pub fn local_direction(&self) -> [f32; 3] {
        [
            self.direction_cosine_x,
            self.direction_cosine_y,
            self.direction_cosine_z,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_mac() -> Mac {
        Mac::from_big_endian([0xF6, 0x66, 0xCD, 0xFD, 0xDC, 0xEB])
    }

    /// Synthesize a 45-sample frame for a locator at the given local
    /// direction cosines, seen from the full snake pattern on channel 18.
    ///
    /// The reference block alternates sign so the default sign fix
    /// restores a constant phase (zero drift). Measurement sample `m` gets
    /// the phase `k * (x_ant * cx + y_ant * cy)` of its transmitting
    /// antenna.
    fn synthetic_frame(cx: f32, cy: f32) -> RawIqFrame {
        let wavenumber = channel::wavenumber_rad_per_mm(18);
        let mut samples = Vec::with_capacity(SAMPLE_MAX);

        for index in 0..REFERENCE_MAX {
            if index % 2 == 0 {
                samples.push((100i8, 0i8));
            } else {
                samples.push((-100i8, 0i8));
            }
        }

        for slot in 0..MEASUREMENT_MAX {
            let antenna_number = antenna::FULL_SWITCH_SEQUENCE[slot] as usize;
            let (x, y) = antenna::ANTENNA_POSITIONS_MM[antenna_number];
            let phase = wavenumber * (x * cx + y * cy);
            let i = (100.0 * phase.cos()).round() as i8;
            let q = (100.0 * phase.sin()).round() as i8;
            samples.push((i, q));
        }

        RawIqFrame::new(0, 18, test_mac(), &samples)
    }

    #[test]
    fn test_split_counts() {
        let samples = vec![(1i8, 2i8); 45];
        let frame = RawIqFrame::new(7, 18, test_mac(), &samples);
        let data = IqData::from_raw(&frame);
        assert_eq!(data.reference_count, 8);
        assert_eq!(data.measurement_count, 37);

        let short = RawIqFrame::new(7, 18, test_mac(), &samples[..10]);
        let data = IqData::from_raw(&short);
        assert_eq!(data.reference_count, 8);
        assert_eq!(data.measurement_count, 2);
    }

    #[test]
    fn test_oversized_frame_is_truncated() {
        let samples = vec![(1i8, 2i8); 60];
        let frame = RawIqFrame::new(7, 18, test_mac(), &samples);
        assert_eq!(frame.sample_count as usize, SAMPLE_MAX);
    }

    #[test]
    fn test_reference_sign_fix() {
        let samples: Vec<(i8, i8)> = vec![
            (10, 20),
            (30, -40),
            (-50, 60),
            (-128, -128),
            (0, 1),
            (2, 3),
            (4, 5),
            (6, 7),
        ];
        let frame = RawIqFrame::new(0, 18, test_mac(), &samples);
        let mut data = IqData::from_raw(&frame);
        data.apply_reference_sign_fix();

        // Even indices untouched.
        assert_eq!(data.reference_i[0], 10);
        assert_eq!(data.reference_q[0], 20);
        assert_eq!(data.reference_i[2], -50);
        // Odd indices negated, with -128 saturating to +127.
        assert_eq!(data.reference_i[1], -30);
        assert_eq!(data.reference_q[1], 40);
        assert_eq!(data.reference_i[3], 127);
        assert_eq!(data.reference_q[3], 127);
        assert_eq!(data.reference_q[5], -3);
    }

    #[test]
    fn test_phase_unwrapping() {
        // Phases stepping past +pi must unwrap downward continuation-free.
        let mut data = IqData::from_raw(&RawIqFrame::default());
        data.reference_count = 4;
        data.reference_phases[..4].copy_from_slice(&[2.8, -3.0, -2.8, -2.6]);
        data.unwrap_reference_phases();
        let unwrapped = &data.reference_phases_unwrapped[..4];
        assert!((unwrapped[0] - 2.8).abs() < 1e-6);
        assert!((unwrapped[1] - (2.0 * PI - 3.0)).abs() < 1e-5);
        assert!((unwrapped[2] - (2.0 * PI - 2.8)).abs() < 1e-5);
        assert!((unwrapped[3] - (2.0 * PI - 2.6)).abs() < 1e-5);
    }

    #[test]
    fn test_drift_estimate_on_linear_ramp() {
        // Reference phases advancing 0.1 rad per sample.
        let mut samples = Vec::new();
        for index in 0..REFERENCE_MAX {
            let phase = 0.1 * index as f32;
            samples.push(((100.0 * phase.cos()).round() as i8, (100.0 * phase.sin()).round() as i8));
        }
        let frame = RawIqFrame::new(0, 18, test_mac(), &samples);
        let mut data = IqData::from_raw(&frame);
        data.estimate_drift_rate();
        assert!((data.drift_rate - 0.1).abs() < 0.01);
    }

    #[test]
    fn test_zero_drift_leaves_measurements_unchanged() {
        let frame = synthetic_frame(0.3, -0.2);
        let data = IqData::process(&frame, &PipelineConfig::default());

        assert!(data.drift_rate.abs() < 1e-6);
        for index in 0..data.measurement_count {
            assert_eq!(
                data.measurement_i_compensated[index],
                data.measurement_i[index] as f32
            );
            assert_eq!(
                data.measurement_q_compensated[index],
                data.measurement_q[index] as f32
            );
        }
    }

    #[test]
    fn test_short_frame_yields_neutral_direction() {
        let frame = RawIqFrame::new(0, 18, test_mac(), &[(5, 5), (6, 6)]);
        let data = IqData::process(&frame, &PipelineConfig::default());
        assert_eq!(data.local_direction(), [0.0, 0.0, 1.0]);
        assert_eq!(data.azimuth, 0.0);
        assert_eq!(data.elevation, 0.0);
    }

    #[test]
    fn test_direction_recovery_full_pattern() {
        let targets = [(0.0f32, 0.0f32), (0.5, 0.0), (-0.3, 0.4), (0.7071, 0.0)];
        for (cx, cy) in targets {
            let frame = synthetic_frame(cx, cy);
            let data = IqData::process(&frame, &PipelineConfig::default());
            assert!(
                (data.direction_cosine_x - cx).abs() < 0.02,
                "cx: expected {}, got {}",
                cx,
                data.direction_cosine_x
            );
            assert!(
                (data.direction_cosine_y - cy).abs() < 0.02,
                "cy: expected {}, got {}",
                cy,
                data.direction_cosine_y
            );
            let norm = data.direction_cosine_x.powi(2)
                + data.direction_cosine_y.powi(2)
                + data.direction_cosine_z.powi(2);
            assert!(norm <= 1.0 + 1e-5);
        }
    }

    #[test]
    fn test_direction_recovery_row_pattern() {
        // The row pattern only resolves the horizontal component.
        let wavenumber = channel::wavenumber_rad_per_mm(18);
        let cx = 0.4f32;
        let mut samples = Vec::with_capacity(SAMPLE_MAX);
        for index in 0..REFERENCE_MAX {
            let sign = if index % 2 == 0 { 1.0 } else { -1.0 };
            samples.push(((sign * 100.0) as i8, 0i8));
        }
        for slot in 0..MEASUREMENT_MAX {
            let antenna_number = antenna::ROW_SWITCH_SEQUENCE[slot] as usize;
            let (x, _) = antenna::ANTENNA_POSITIONS_MM[antenna_number];
            let phase = wavenumber * x * cx;
            samples.push(((100.0 * phase.cos()).round() as i8, (100.0 * phase.sin()).round() as i8));
        }
        let frame = RawIqFrame::new(0, 18, test_mac(), &samples);

        let config = PipelineConfig {
            pattern: AntennaPattern::Row,
            ..PipelineConfig::default()
        };
        let data = IqData::process(&frame, &config);
        assert!((data.direction_cosine_x - cx).abs() < 0.02);
        assert_eq!(data.direction_cosine_y, 0.0);
    }

    #[test]
    fn test_azimuth_and_elevation() {
        let frame = synthetic_frame(0.7071, 0.0);
        let data = IqData::process(&frame, &PipelineConfig::default());
        assert!((data.azimuth - std::f32::consts::FRAC_PI_4).abs() < 0.05);
        assert!(data.elevation.abs() < 0.05);
    }

    #[test]
    fn test_unknown_channel_yields_neutral_direction() {
        let mut frame = synthetic_frame(0.5, 0.0);
        frame.channel_index = 40;
        let data = IqData::process(&frame, &PipelineConfig::default());
        assert_eq!(data.local_direction(), [0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_pair_table_shapes() {
        assert_eq!(ROW_PAIRS.len(), 27);
        assert!(ROW_PAIRS
            .iter()
            .all(|pair| pair.direction == PairDirection::LeftToRight));

        assert_eq!(FULL_PAIRS.len(), 32);
        let horizontal = FULL_PAIRS
            .iter()
            .filter(|pair| {
                matches!(
                    pair.direction,
                    PairDirection::LeftToRight | PairDirection::RightToLeft
                )
            })
            .count();
        assert_eq!(horizontal, 14);
        assert_eq!(FULL_PAIRS.len() - horizontal, 18);

        // Pairs reference temporally adjacent slots only.
        for pair in ROW_PAIRS.iter().chain(FULL_PAIRS.iter()) {
            assert_eq!(pair.second, pair.first + 1);
            assert!((pair.second as usize) < MEASUREMENT_MAX);
        }
    }
}
