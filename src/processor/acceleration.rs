//! Acceleration strategy: free acceleration X/Y drives the right stick,
//! unfiltered.

use std::sync::Arc;
use std::time::Instant;

use crate::gamepad::sink::ControllerAction;
use crate::processor::{InputProcessor, ProcessorKind, ProcessorSettings};
use crate::sensor::packet::Packet;
use crate::signal::conditioning::condition_axes;

#[derive(Debug)]
pub struct AccelerationProcessor {
    settings: Arc<ProcessorSettings>,
}

impl AccelerationProcessor {
    #[must_use]
    pub fn new(settings: Arc<ProcessorSettings>) -> Self {
        Self { settings }
    }
}

impl InputProcessor for AccelerationProcessor {
    fn kind(&self) -> ProcessorKind {
        ProcessorKind::Acceleration
    }

    fn settings(&self) -> &Arc<ProcessorSettings> {
        &self.settings
    }

    fn process_input(&mut self, packet: &Packet, _now: Instant) -> Option<ControllerAction> {
        let acc = packet.free_acceleration?;
        let s = self.settings.snapshot();
        let (x, y) = condition_axes(acc.x, acc.y, s.sensitivity_x, s.sensitivity_y, s.deadzone);
        Some(ControllerAction::RightStick { x, y })
    }

    fn reset(&mut self) -> Option<ControllerAction> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::SettingsSnapshot;

    fn processor(snapshot: SettingsSnapshot) -> AccelerationProcessor {
        AccelerationProcessor::new(Arc::new(ProcessorSettings::new(snapshot).unwrap()))
    }

    #[test]
    fn test_unit_sensitivity_maps_directly() {
        let mut p = processor(SettingsSnapshot::default());
        let action = p.process_input(&Packet::with_acceleration(0.4, -0.6, 9.0), Instant::now());
        assert_eq!(action, Some(ControllerAction::RightStick { x: 0.4, y: -0.6 }));
    }

    #[test]
    fn test_large_acceleration_clamps() {
        let mut p = processor(SettingsSnapshot::default());
        let action = p.process_input(&Packet::with_acceleration(12.0, -30.0, 0.0), Instant::now());
        assert_eq!(action, Some(ControllerAction::RightStick { x: 1.0, y: -1.0 }));
    }

    #[test]
    fn test_sensitivity_divides() {
        let mut p = processor(SettingsSnapshot {
            sensitivity_x: 10.0,
            sensitivity_y: 4.0,
            ..SettingsSnapshot::default()
        });
        let action = p.process_input(&Packet::with_acceleration(5.0, 1.0, 0.0), Instant::now());
        assert_eq!(action, Some(ControllerAction::RightStick { x: 0.5, y: 0.25 }));
    }

    #[test]
    fn test_deadzone_suppresses_noise() {
        let mut p = processor(SettingsSnapshot {
            deadzone: 0.15,
            ..SettingsSnapshot::default()
        });
        let action = p.process_input(&Packet::with_acceleration(0.1, -0.14, 0.0), Instant::now());
        assert_eq!(action, Some(ControllerAction::RightStick { x: 0.0, y: 0.0 }));
    }

    #[test]
    fn test_missing_acceleration_is_skipped() {
        let mut p = processor(SettingsSnapshot::default());
        assert!(p
            .process_input(&Packet::with_orientation(1.0, 2.0, 3.0), Instant::now())
            .is_none());
    }
}
