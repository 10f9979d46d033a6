//! Tilt strategy: device orientation drives the right stick directly.
//!
//! `x = roll / sensitivity_x`, `y = pitch / sensitivity_y`, then deadzone,
//! then clamp. With the default divisors a 40° roll or a 20° pitch is full
//! deflection.

use std::sync::Arc;
use std::time::Instant;

use crate::gamepad::sink::ControllerAction;
use crate::processor::{InputProcessor, ProcessorKind, ProcessorSettings};
use crate::sensor::packet::Packet;
use crate::signal::conditioning::condition_axes;

/// Orientation-to-stick mapping. Stateless beyond its settings.
#[derive(Debug)]
pub struct TiltProcessor {
    settings: Arc<ProcessorSettings>,
}

impl TiltProcessor {
    #[must_use]
    pub fn new(settings: Arc<ProcessorSettings>) -> Self {
        Self { settings }
    }
}

impl InputProcessor for TiltProcessor {
    fn kind(&self) -> ProcessorKind {
        ProcessorKind::Tilt
    }

    fn settings(&self) -> &Arc<ProcessorSettings> {
        &self.settings
    }

    fn process_input(&mut self, packet: &Packet, _now: Instant) -> Option<ControllerAction> {
        let euler = packet.orientation?;
        let s = self.settings.snapshot();
        let (x, y) = condition_axes(euler.roll, euler.pitch, s.sensitivity_x, s.sensitivity_y, s.deadzone);
        Some(ControllerAction::RightStick { x, y })
    }

    fn reset(&mut self) -> Option<ControllerAction> {
        None
    }
}
