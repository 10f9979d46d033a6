//! # Signal Conditioning
//!
//! Stateless transforms shared by every processor strategy.
//!
//! ## Order of Operations
//!
//! Axis processors always apply the deadzone before clamping:
//!
//! ```text
//! raw / sensitivity ──► apply_deadzone ──► clamp ──► stick axis
//! ```
//!
//! Unlike a stick calibration curve, the deadzone here is a hard cutoff:
//! values outside it pass through unchanged and are not rescaled.
//!
//! ## Usage
//!
//! ```
//! use motion_gamepad::signal::conditioning::{apply_deadzone, clamp_axis};
//!
//! assert_eq!(clamp_axis(apply_deadzone(2.0, 0.1)), 1.0);
//! assert_eq!(clamp_axis(apply_deadzone(0.05, 0.1)), 0.0);
//! assert_eq!(clamp_axis(apply_deadzone(0.5, 0.1)), 0.5);
//! ```

use serde::Deserialize;

/// Lower bound of a stick axis.
pub const AXIS_MIN: f32 = -1.0;
/// Upper bound of a stick axis.
pub const AXIS_MAX: f32 = 1.0;

/// Three-component vector in the device frame (m/s² for acceleration).
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(from = "[f32; 3]")]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    /// The zero vector.
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Euclidean length.
    ///
    /// ```
    /// use motion_gamepad::signal::conditioning::Vec3;
    ///
    /// assert!((Vec3::new(3.0, 4.0, 0.0).magnitude() - 5.0).abs() < 1e-6);
    /// ```
    #[must_use]
    pub fn magnitude(&self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Component-wise `self + other * factor`.
    #[must_use]
    pub fn add_scaled(&self, other: Vec3, factor: f32) -> Vec3 {
        Vec3 {
            x: self.x + other.x * factor,
            y: self.y + other.y * factor,
            z: self.z + other.z * factor,
        }
    }
}

impl From<[f32; 3]> for Vec3 {
    fn from(v: [f32; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }
}

/// Saturates a value to an arbitrary range.
///
/// NaN maps to the midpoint of the range so a bad sample can never
/// escape it.
#[must_use]
pub fn clamp(value: f32, lo: f32, hi: f32) -> f32 {
    if value.is_nan() {
        return (lo + hi) * 0.5;
    }
    value.clamp(lo, hi)
}

/// Saturates a value to the stick range `[-1, 1]`.
///
/// ```
/// use motion_gamepad::signal::conditioning::clamp_axis;
///
/// assert_eq!(clamp_axis(2.0), 1.0);
/// assert_eq!(clamp_axis(-3.5), -1.0);
/// assert_eq!(clamp_axis(0.25), 0.25);
/// ```
#[must_use]
pub fn clamp_axis(value: f32) -> f32 {
    clamp(value, AXIS_MIN, AXIS_MAX)
}

/// Returns 0 when `|value| < deadzone`, otherwise `value` unchanged.
#[must_use]
pub fn apply_deadzone(value: f32, deadzone: f32) -> f32 {
    if value.abs() < deadzone {
        0.0
    } else {
        value
    }
}

/// Maps a raw pair to stick axes: divide by sensitivity, deadzone, clamp.
///
/// Sensitivities are validated to be positive before they reach this point.
#[must_use]
pub fn condition_axes(raw_x: f32, raw_y: f32, sens_x: f32, sens_y: f32, deadzone: f32) -> (f32, f32) {
    let x = clamp_axis(apply_deadzone(raw_x / sens_x, deadzone));
    let y = clamp_axis(apply_deadzone(raw_y / sens_y, deadzone));
    (x, y)
}

/// Exponential low-pass filter, per component.
///
/// `alpha` close to 1 follows the new sample, close to 0 follows history.
/// The caller owns `previous` and feeds the result back on the next call.
///
/// ```
/// use motion_gamepad::signal::conditioning::{low_pass_filter, Vec3};
///
/// let out = low_pass_filter(Vec3::new(10.0, 0.0, 0.0), Vec3::ZERO, 0.25);
/// assert!((out.x - 2.5).abs() < 1e-6);
/// ```
#[must_use]
pub fn low_pass_filter(sample: Vec3, previous: Vec3, alpha: f32) -> Vec3 {
    let keep = 1.0 - alpha;
    Vec3 {
        x: alpha * sample.x + keep * previous.x,
        y: alpha * sample.y + keep * previous.y,
        z: alpha * sample.z + keep * previous.z,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLES: [f32; 11] = [-100.0, -2.0, -1.0, -0.75, -0.1, 0.0, 0.1, 0.5, 1.0, 1.0001, 42.0];

    #[test]
    fn test_clamp_axis_stays_in_range() {
        for &v in &SAMPLES {
            let out = clamp_axis(v);
            assert!((AXIS_MIN..=AXIS_MAX).contains(&out), "{} -> {}", v, out);
        }
    }

    #[test]
    fn test_clamp_axis_identity_inside_range() {
        for &v in SAMPLES.iter().filter(|v| v.abs() <= 1.0) {
            assert_eq!(clamp_axis(v), v);
        }
    }

    #[test]
    fn test_clamp_nan_maps_to_center() {
        assert_eq!(clamp_axis(f32::NAN), 0.0);
        assert_eq!(clamp(f32::NAN, 0.0, 10.0), 5.0);
    }

    #[test]
    fn test_clamp_infinities() {
        assert_eq!(clamp_axis(f32::INFINITY), 1.0);
        assert_eq!(clamp_axis(f32::NEG_INFINITY), -1.0);
    }

    #[test]
    fn test_deadzone_zeroes_small_values() {
        for &v in &[-0.19, -0.05, 0.0, 0.05, 0.19] {
            assert_eq!(apply_deadzone(v, 0.2), 0.0);
        }
    }

    #[test]
    fn test_deadzone_passes_large_values_unchanged() {
        for &v in &[-5.0, -0.2, 0.2, 0.21, 0.9, 3.0] {
            assert_eq!(apply_deadzone(v, 0.2), v, "value {} should pass through", v);
        }
    }

    #[test]
    fn test_zero_deadzone_is_identity() {
        for &v in &SAMPLES {
            assert_eq!(apply_deadzone(v, 0.0), v);
        }
    }

    #[test]
    fn test_condition_axes_deadzone_before_clamp() {
        // 0.05 / 0.1 = 0.5: outside a 0.3 deadzone, inside the range
        let (x, y) = condition_axes(0.05, 0.02, 0.1, 0.1, 0.3);
        assert!((x - 0.5).abs() < 1e-6);
        assert_eq!(y, 0.0);
    }

    #[test]
    fn test_low_pass_converges_monotonically() {
        let target = Vec3::new(9.81, -3.0, 0.5);
        let mut filtered = Vec3::ZERO;
        let mut last_error = f32::MAX;

        for _ in 0..200 {
            filtered = low_pass_filter(target, filtered, 0.1);
            let error = Vec3::new(
                target.x - filtered.x,
                target.y - filtered.y,
                target.z - filtered.z,
            )
            .magnitude();
            assert!(error <= last_error, "error grew: {} > {}", error, last_error);
            last_error = error;
        }

        assert!(last_error < 1e-4, "did not converge: {}", last_error);
    }

    #[test]
    fn test_low_pass_alpha_one_tracks_sample() {
        let sample = Vec3::new(1.0, 2.0, 3.0);
        let out = low_pass_filter(sample, Vec3::new(-7.0, 7.0, 0.0), 1.0);
        assert_eq!(out, sample);
    }

    #[test]
    fn test_vec3_from_array() {
        let v: Vec3 = [1.0, -2.0, 0.5].into();
        assert_eq!(v, Vec3::new(1.0, -2.0, 0.5));
    }

    #[test]
    fn test_add_scaled() {
        let v = Vec3::new(1.0, 1.0, 1.0).add_scaled(Vec3::new(2.0, -4.0, 0.0), 0.5);
        assert_eq!(v, Vec3::new(2.0, -1.0, 1.0));
    }
}
