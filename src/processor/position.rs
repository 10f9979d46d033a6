//! # Position Strategy
//!
//! Double-integrates free acceleration into a displacement and maps X/Y of
//! that displacement to the right stick.
//!
//! ```text
//! velocity += acceleration * dt
//! position += velocity * dt
//! ```
//!
//! `dt` is the arrival-time gap to the previous integrated packet. The first
//! packet only primes the time reference. This is an open-loop integrator:
//! sensor bias makes the position drift without bound, which is accepted
//! for this strategy. Use [`InputProcessor::reset`] to re-center.

use std::sync::Arc;
use std::time::Instant;

use crate::gamepad::sink::ControllerAction;
use crate::processor::{InputProcessor, ProcessorKind, ProcessorSettings};
use crate::sensor::packet::Packet;
use crate::signal::conditioning::{condition_axes, Vec3};

/// Integrator state, per axis.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct IntegratorState {
    pub velocity: Vec3,
    pub position: Vec3,
    pub last_time: Option<Instant>,
}

#[derive(Debug)]
pub struct PositionProcessor {
    settings: Arc<ProcessorSettings>,
    state: IntegratorState,
}

impl PositionProcessor {
    #[must_use]
    pub fn new(settings: Arc<ProcessorSettings>) -> Self {
        Self {
            settings,
            state: IntegratorState::default(),
        }
    }

    /// Current integrator state.
    #[must_use]
    pub fn state(&self) -> &IntegratorState {
        &self.state
    }
}

impl InputProcessor for PositionProcessor {
    fn kind(&self) -> ProcessorKind {
        ProcessorKind::Position
    }

    fn settings(&self) -> &Arc<ProcessorSettings> {
        &self.settings
    }

    fn process_input(&mut self, packet: &Packet, now: Instant) -> Option<ControllerAction> {
        let Some(last) = self.state.last_time else {
            self.state.last_time = Some(now);
            return None;
        };
        // Skipped packets leave the time reference alone; the next dt spans the gap.
        let acc = packet.free_acceleration?;

        let dt = now.saturating_duration_since(last).as_secs_f32();
        self.state.last_time = Some(now);
        self.state.velocity = self.state.velocity.add_scaled(acc, dt);
        self.state.position = self.state.position.add_scaled(self.state.velocity, dt);

        let s = self.settings.snapshot();
        let (x, y) = condition_axes(
            self.state.position.x,
            self.state.position.y,
            s.sensitivity_x,
            s.sensitivity_y,
            s.deadzone,
        );
        Some(ControllerAction::RightStick { x, y })
    }

    fn reset(&mut self) -> Option<ControllerAction> {
        self.state = IntegratorState::default();
        None
    }
}
