//! # Processor Module
//!
//! Strategies that turn one sensor packet into at most one controller
//! action.
//!
//! | Kind | Reads | Output |
//! |------|-------|--------|
//! | Tilt | roll / pitch | right stick |
//! | Acceleration | free acceleration X / Y | right stick |
//! | Position | double-integrated acceleration | right stick |
//! | Button | low-passed acceleration magnitude | press / release |
//!
//! A packet lacking the field a strategy needs yields `None`: nothing is
//! sent that cycle and the previous controller state persists.
//!
//! Filter, integrator and latch state belong to the processor and are only
//! touched by the worker thread that owns it. Tunable parameters live in a
//! shared [`ProcessorSettings`] so the control plane can change them while
//! the worker runs.

pub mod acceleration;
pub mod button;
pub mod position;
pub mod settings;
pub mod tilt;

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use serde::Deserialize;

use crate::error::Result;
use crate::gamepad::button::Button;
use crate::gamepad::sink::ControllerAction;
use crate::sensor::packet::Packet;

pub use acceleration::AccelerationProcessor;
pub use button::ButtonProcessor;
pub use position::PositionProcessor;
pub use settings::{ProcessorSettings, SettingsSnapshot};
pub use tilt::TiltProcessor;

/// The four strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessorKind {
    Tilt,
    Acceleration,
    Position,
    Button,
}

impl ProcessorKind {
    /// Default `(x, y)` sensitivity divisors for this strategy.
    #[must_use]
    pub const fn default_sensitivity(self) -> (f32, f32) {
        match self {
            // degrees per full stick deflection
            ProcessorKind::Tilt => (40.0, 20.0),
            ProcessorKind::Acceleration | ProcessorKind::Position | ProcessorKind::Button => {
                (1.0, 1.0)
            }
        }
    }
}

impl fmt::Display for ProcessorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessorKind::Tilt => write!(f, "tilt"),
            ProcessorKind::Acceleration => write!(f, "acceleration"),
            ProcessorKind::Position => write!(f, "position"),
            ProcessorKind::Button => write!(f, "button"),
        }
    }
}

/// A packet-to-action strategy.
pub trait InputProcessor: Send {
    /// Which strategy this is.
    fn kind(&self) -> ProcessorKind;

    /// Shared tunable parameters.
    fn settings(&self) -> &Arc<ProcessorSettings>;

    /// Consumes one packet. `now` is the packet's arrival time.
    fn process_input(&mut self, packet: &Packet, now: Instant) -> Option<ControllerAction>;

    /// Clears accumulated state (filters, integrator, latch). Returns an
    /// action when the controller must be brought back in line, such as
    /// releasing a button that was held.
    fn reset(&mut self) -> Option<ControllerAction>;

    /// # Errors
    ///
    /// Returns `InvalidParameter` unless both values are finite and > 0.
    fn set_sensitivity(&self, x: f32, y: f32) -> Result<()> {
        self.settings().set_sensitivity(x, y)
    }

    /// # Errors
    ///
    /// Returns `InvalidParameter` unless the threshold is > 0 and above the
    /// hysteresis buffer.
    fn set_threshold(&self, threshold: f32) -> Result<()> {
        self.settings().set_threshold(threshold)
    }

    /// # Errors
    ///
    /// Returns `InvalidParameter` unless `0 <= deadzone < 1`.
    fn set_deadzone(&self, deadzone: f32) -> Result<()> {
        self.settings().set_deadzone(deadzone)
    }
}

/// Builds a processor of the given kind around shared settings.
///
/// `button` is only used by [`ProcessorKind::Button`].
#[must_use]
pub fn build_processor(
    kind: ProcessorKind,
    settings: Arc<ProcessorSettings>,
    button: Button,
) -> Box<dyn InputProcessor> {
    match kind {
        ProcessorKind::Tilt => Box::new(TiltProcessor::new(settings)),
        ProcessorKind::Acceleration => Box::new(AccelerationProcessor::new(settings)),
        ProcessorKind::Position => Box::new(PositionProcessor::new(settings)),
        ProcessorKind::Button => Box::new(ButtonProcessor::new(settings, button)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shared(snapshot: SettingsSnapshot) -> Arc<ProcessorSettings> {
        Arc::new(ProcessorSettings::new(snapshot).unwrap())
    }

    #[test]
    fn test_build_processor_kinds() {
        for kind in [
            ProcessorKind::Tilt,
            ProcessorKind::Acceleration,
            ProcessorKind::Position,
            ProcessorKind::Button,
        ] {
            let p = build_processor(kind, shared(SettingsSnapshot::default()), Button::A);
            assert_eq!(p.kind(), kind);
        }
    }

    #[test]
    fn test_tuning_through_trait_is_shared() {
        let settings = shared(SettingsSnapshot::default());
        let p = build_processor(ProcessorKind::Tilt, Arc::clone(&settings), Button::A);

        p.set_sensitivity(30.0, 15.0).unwrap();
        p.set_deadzone(0.2).unwrap();
        p.set_threshold(4.0).unwrap();

        let snap = settings.snapshot();
        assert_eq!((snap.sensitivity_x, snap.sensitivity_y), (30.0, 15.0));
        assert_eq!(snap.deadzone, 0.2);
        assert_eq!(snap.threshold, 4.0);
    }

    #[test]
    fn test_rejected_tuning_keeps_previous() {
        let settings = shared(SettingsSnapshot::default());
        let p = build_processor(ProcessorKind::Button, Arc::clone(&settings), Button::A);
        assert!(p.set_threshold(-1.0).is_err());
        assert_eq!(settings.snapshot().threshold, SettingsSnapshot::default().threshold);
    }

    #[test]
    fn test_default_sensitivity() {
        assert_eq!(ProcessorKind::Tilt.default_sensitivity(), (40.0, 20.0));
        assert_eq!(ProcessorKind::Position.default_sensitivity(), (1.0, 1.0));
    }

    #[test]
    fn test_kind_deserialize_and_display() {
        #[derive(Deserialize)]
        struct Holder {
            kind: ProcessorKind,
        }
        let h: Holder = toml::from_str(r#"kind = "acceleration""#).unwrap();
        assert_eq!(h.kind, ProcessorKind::Acceleration);
        assert_eq!(h.kind.to_string(), "acceleration");
    }
}
