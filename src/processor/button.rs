//! # Button Strategy
//!
//! Turns a motion gesture (a shake or a punch) into a press of one logical
//! button:
//!
//! ```text
//! free acceleration ──► low-pass (alpha) ──► |v| ──► hysteresis latch ──► press / release
//! ```
//!
//! The filtered vector persists across packets and starts at zero.

use std::sync::Arc;
use std::time::Instant;

use crate::gamepad::button::Button;
use crate::gamepad::sink::ControllerAction;
use crate::processor::{InputProcessor, ProcessorKind, ProcessorSettings};
use crate::sensor::packet::Packet;
use crate::signal::conditioning::{low_pass_filter, Vec3};
use crate::signal::hysteresis::{hysteresis_debounce, ButtonLatchState, HysteresisBand, LatchEdge};

#[derive(Debug)]
pub struct ButtonProcessor {
    settings: Arc<ProcessorSettings>,
    button: Button,
    filtered: Vec3,
    latch: ButtonLatchState,
}

impl ButtonProcessor {
    #[must_use]
    pub fn new(settings: Arc<ProcessorSettings>, button: Button) -> Self {
        Self {
            settings,
            button,
            filtered: Vec3::ZERO,
            latch: ButtonLatchState::new(),
        }
    }

    /// The button this processor drives.
    #[must_use]
    pub fn button(&self) -> Button {
        self.button
    }

    /// Current low-passed acceleration.
    #[must_use]
    pub fn filtered(&self) -> Vec3 {
        self.filtered
    }

    #[must_use]
    pub fn is_pressed(&self) -> bool {
        self.latch.is_pressed()
    }
}

impl InputProcessor for ButtonProcessor {
    fn kind(&self) -> ProcessorKind {
        ProcessorKind::Button
    }

    fn settings(&self) -> &Arc<ProcessorSettings> {
        &self.settings
    }

    fn process_input(&mut self, packet: &Packet, now: Instant) -> Option<ControllerAction> {
        let acc = packet.free_acceleration?;
        let s = self.settings.snapshot();

        self.filtered = low_pass_filter(acc, self.filtered, s.alpha);
        let band = HysteresisBand {
            on_threshold: s.threshold,
            buffer: s.hysteresis,
            debounce: s.debounce,
        };

        match hysteresis_debounce(self.filtered.magnitude(), &mut self.latch, &band, now)? {
            LatchEdge::Pressed => Some(ControllerAction::Press(self.button)),
            LatchEdge::Released => Some(ControllerAction::Release(self.button)),
        }
    }

    /// Clears the filter and the latch. A held button is released so the
    /// controller does not keep it down.
    fn reset(&mut self) -> Option<ControllerAction> {
        let held = self.latch.is_pressed();
        self.filtered = Vec3::ZERO;
        self.latch.reset();
        held.then_some(ControllerAction::Release(self.button))
    }
}
