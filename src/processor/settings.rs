//! # Processor Settings
//!
//! Tunable parameters shared between a worker thread (reads every cycle)
//! and the control plane (writes at any time).
//!
//! Every parameter is its own atomic scalar, so a reader never observes a
//! torn value and a write is visible from the next processed packet. Values
//! are validated before they are stored; a rejected value leaves the
//! previous one in effect.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use crate::error::{MotionPadError, Result};

/// `f32` stored as its bit pattern in an `AtomicU32`.
#[derive(Debug)]
struct AtomicF32(AtomicU32);

impl AtomicF32 {
    fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Acquire))
    }

    fn store(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Release);
    }
}

/// Plain copy of all settings, read once per processed packet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SettingsSnapshot {
    /// Divisor for the X axis (> 0).
    pub sensitivity_x: f32,
    /// Divisor for the Y axis (> 0).
    pub sensitivity_y: f32,
    /// Hard-cutoff deadzone, `0 <= deadzone < 1`.
    pub deadzone: f32,
    /// Button press threshold on filtered magnitude (> 0).
    pub threshold: f32,
    /// Release happens at `threshold - hysteresis` (>= 0).
    pub hysteresis: f32,
    /// Minimum time between two presses.
    pub debounce: Duration,
    /// Low-pass smoothing factor, `0 < alpha <= 1`.
    pub alpha: f32,
}

impl Default for SettingsSnapshot {
    fn default() -> Self {
        Self {
            sensitivity_x: 1.0,
            sensitivity_y: 1.0,
            deadzone: 0.0,
            threshold: 7.0,
            hysteresis: 1.0,
            debounce: Duration::from_millis(500),
            alpha: 0.3,
        }
    }
}

fn invalid(name: &'static str, value: f32, expected: &'static str) -> MotionPadError {
    MotionPadError::InvalidParameter {
        name,
        value,
        expected,
    }
}

fn check_sensitivity(name: &'static str, value: f32) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(name, value, "a finite value > 0"))
    }
}

fn check_deadzone(value: f32) -> Result<()> {
    if (0.0..1.0).contains(&value) {
        Ok(())
    } else {
        Err(invalid("deadzone", value, "0.0 <= deadzone < 1.0"))
    }
}

fn check_band(threshold: f32, hysteresis: f32) -> Result<()> {
    if !(threshold.is_finite() && threshold > 0.0) {
        return Err(invalid("threshold", threshold, "a finite value > 0"));
    }
    if !(hysteresis.is_finite() && hysteresis >= 0.0) {
        return Err(invalid("hysteresis", hysteresis, "a finite value >= 0"));
    }
    if hysteresis >= threshold {
        return Err(invalid("threshold", threshold, "a value above the hysteresis buffer"));
    }
    Ok(())
}

fn debounce_micros(debounce: Duration) -> Result<u64> {
    u64::try_from(debounce.as_micros())
        .map_err(|_| invalid("debounce", debounce.as_secs_f32(), "at most u64::MAX microseconds"))
}

fn check_alpha(value: f32) -> Result<()> {
    if value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(invalid("alpha", value, "0.0 < alpha <= 1.0"))
    }
}

impl SettingsSnapshot {
    /// Checks every field against its valid range.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        check_sensitivity("sensitivity_x", self.sensitivity_x)?;
        check_sensitivity("sensitivity_y", self.sensitivity_y)?;
        check_deadzone(self.deadzone)?;
        check_band(self.threshold, self.hysteresis)?;
        debounce_micros(self.debounce)?;
        check_alpha(self.alpha)
    }
}

/// Live, thread-safe settings for one processor.
///
/// # Examples
///
/// ```
/// use motion_gamepad::processor::settings::{ProcessorSettings, SettingsSnapshot};
///
/// let settings = ProcessorSettings::new(SettingsSnapshot::default())?;
/// settings.set_deadzone(0.1)?;
/// assert!(settings.set_deadzone(1.0).is_err());
/// assert_eq!(settings.snapshot().deadzone, 0.1);
/// # Ok::<(), motion_gamepad::error::MotionPadError>(())
/// ```
#[derive(Debug)]
pub struct ProcessorSettings {
    sensitivity_x: AtomicF32,
    sensitivity_y: AtomicF32,
    deadzone: AtomicF32,
    threshold: AtomicF32,
    hysteresis: AtomicF32,
    debounce_us: AtomicU64,
    alpha: AtomicF32,
    reset_requested: AtomicBool,
}

impl ProcessorSettings {
    /// Creates settings from validated initial values.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` when any initial value is out of range.
    pub fn new(initial: SettingsSnapshot) -> Result<Self> {
        initial.validate()?;
        let debounce_us = debounce_micros(initial.debounce)?;
        Ok(Self {
            sensitivity_x: AtomicF32::new(initial.sensitivity_x),
            sensitivity_y: AtomicF32::new(initial.sensitivity_y),
            deadzone: AtomicF32::new(initial.deadzone),
            threshold: AtomicF32::new(initial.threshold),
            hysteresis: AtomicF32::new(initial.hysteresis),
            debounce_us: AtomicU64::new(debounce_us),
            alpha: AtomicF32::new(initial.alpha),
            reset_requested: AtomicBool::new(false),
        })
    }

    /// Current values.
    #[must_use]
    pub fn snapshot(&self) -> SettingsSnapshot {
        SettingsSnapshot {
            sensitivity_x: self.sensitivity_x.load(),
            sensitivity_y: self.sensitivity_y.load(),
            deadzone: self.deadzone.load(),
            threshold: self.threshold.load(),
            hysteresis: self.hysteresis.load(),
            debounce: Duration::from_micros(self.debounce_us.load(Ordering::Acquire)),
            alpha: self.alpha.load(),
        }
    }

    /// Sets both sensitivity divisors. Both are checked before either is stored.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` unless both values are finite and > 0.
    pub fn set_sensitivity(&self, x: f32, y: f32) -> Result<()> {
        check_sensitivity("sensitivity_x", x)?;
        check_sensitivity("sensitivity_y", y)?;
        self.sensitivity_x.store(x);
        self.sensitivity_y.store(y);
        Ok(())
    }

    /// Sets the button press threshold.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` unless `threshold > 0` and above the
    /// current hysteresis buffer.
    pub fn set_threshold(&self, threshold: f32) -> Result<()> {
        check_band(threshold, self.hysteresis.load())?;
        self.threshold.store(threshold);
        Ok(())
    }

    /// Sets the deadzone.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` unless `0 <= deadzone < 1`.
    pub fn set_deadzone(&self, deadzone: f32) -> Result<()> {
        check_deadzone(deadzone)?;
        self.deadzone.store(deadzone);
        Ok(())
    }

    /// Asks the owning worker to clear filter, integrator and latch state
    /// before its next packet.
    pub fn request_reset(&self) {
        self.reset_requested.store(true, Ordering::Release);
    }

    /// Consumes a pending reset request.
    pub fn take_reset_request(&self) -> bool {
        self.reset_requested.swap(false, Ordering::AcqRel)
    }
}
