//! Directional statistics on the unit circle.
//!
//! Phase angles live on a circle, so the arithmetic mean breaks down at the
//! +/-pi seam: the angles `0.9*pi` and `-0.9*pi` cluster around the negative
//! X-axis and have a circular mean of +/-pi, while their arithmetic mean is
//! 0, a point 180 degrees away on the positive X-axis. The functions here
//! compute proper circular means instead.

use std::f32::consts::PI;

/// Floor applied to the convergence tolerance. A tolerance argument of 0 or
/// anything smaller falls back to this value.
const TOLERANCE_MINIMUM: f32 = 1e-6;

/// Compute the intrinsic circular mean of a set of angles in radians.
///
/// The extrinsic mean `atan2(sum(sin), sum(cos))` seeds the search; up to
/// `max_intrinsic_iterations` refinement steps then minimize the angular
/// distances directly on the circle. Each step wraps the residuals
/// `phi - mu` into `[-pi, pi]`, nudges the mean by
/// `atan2(sum(sin(eps)), sum(cos(eps)))`, and terminates early once the
/// residual imbalance or the step size drops below `tolerance`.
///
/// The function is total. Empty input returns 0, a single angle is returned
/// unchanged, and scattered inputs may converge to a local optimum; callers
/// tolerate this. The result is in `[-pi, pi]`.
pub fn circular_mean(angles: &[f32], max_intrinsic_iterations: u32, tolerance: f32) -> f32 {
    if angles.len() < 2 {
        return angles.first().copied().unwrap_or(0.0);
    }

    // Extrinsic seed. The (1/n) factors in the vector average cancel inside
    // atan2, so the plain sums suffice.
    let mut sum_cos_phi = 0.0f32;
    let mut sum_sin_phi = 0.0f32;
    for &phi in angles {
        sum_cos_phi += phi.cos();
        sum_sin_phi += phi.sin();
    }
    let extrinsic_mean = sum_sin_phi.atan2(sum_cos_phi);

    if max_intrinsic_iterations == 0 {
        return extrinsic_mean;
    }

    let tolerance = tolerance.max(TOLERANCE_MINIMUM);

    // Intrinsic refinement. sum(cos(eps)) measures how clustered the angles
    // are about the current mean and dampens the atan2 step accordingly;
    // sum(sin(eps)) carries the direction and magnitude of the imbalance.
    let mut intrinsic_mean = extrinsic_mean;
    let mut previous_intrinsic_mean = intrinsic_mean;
    for _ in 0..max_intrinsic_iterations {
        let mut sum_cos_epsilon = 0.0f32;
        let mut sum_sin_epsilon = 0.0f32;

        for &phi in angles {
            // Shortest angular distance from the current mean.
            let mut epsilon = phi - intrinsic_mean;
            if epsilon > PI {
                epsilon -= 2.0 * PI;
            }
            if epsilon < -PI {
                epsilon += 2.0 * PI;
            }

            sum_cos_epsilon += epsilon.cos();
            sum_sin_epsilon += epsilon.sin();
        }

        intrinsic_mean += sum_sin_epsilon.atan2(sum_cos_epsilon);

        if intrinsic_mean > PI {
            intrinsic_mean -= 2.0 * PI;
        }
        if intrinsic_mean < -PI {
            intrinsic_mean += 2.0 * PI;
        }

        if sum_sin_epsilon.abs() < tolerance {
            return intrinsic_mean;
        }

        if (intrinsic_mean - previous_intrinsic_mean).abs() < tolerance {
            return intrinsic_mean;
        }
        previous_intrinsic_mean = intrinsic_mean;
    }

    intrinsic_mean
}

/// Compute the extrinsic circular mean of a set of angles in radians.
///
/// Maps the angles to points on the unit circle, averages them in the
/// plane, and projects the average back onto the circle. A good
/// approximation of the true mean for clustered angles.
pub fn circular_mean_extrinsic(angles: &[f32]) -> f32 {
    circular_mean(angles, 0, 0.0)
}
