//! # Virtual Gamepad Reports
//!
//! A [`ControllerSink`] that keeps an XUSB-style report and writes every
//! commit as one JSON line:
//!
//! ```text
//! {"ts":"2024-05-01T12:00:00.000Z","buttons":4096,"thumb_rx":32767,"thumb_ry":-16384,"rx":1.0,"ry":-0.5}
//! ```
//!
//! The driver that turns these reports into a USB device lives outside
//! this crate.

use std::io::Write;

use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::error::{MotionPadError, Result};
use crate::gamepad::button::Button;
use crate::gamepad::sink::ControllerSink;
use crate::signal::conditioning::clamp_axis;

/// Full-scale value of a signed 16-bit thumb axis.
pub const THUMB_MAX: f32 = 32767.0;

/// Converts a stick axis in `[-1, 1]` to a signed 16-bit thumb value.
///
/// # Examples
///
/// ```
/// use motion_gamepad::gamepad::report::axis_to_thumb;
///
/// assert_eq!(axis_to_thumb(1.0), 32767);
/// assert_eq!(axis_to_thumb(0.0), 0);
/// assert_eq!(axis_to_thumb(-1.0), -32767);
/// assert_eq!(axis_to_thumb(5.0), 32767);
/// ```
#[must_use]
pub fn axis_to_thumb(value: f32) -> i16 {
    (clamp_axis(value) * THUMB_MAX).round() as i16
}

/// Buffered controller state.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GamepadReport {
    /// Pressed buttons, one bit each (see [`Button::mask`]).
    pub buttons: u16,
    /// Right stick X in `[-1, 1]`.
    pub right_x: f32,
    /// Right stick Y in `[-1, 1]`.
    pub right_y: f32,
}

impl GamepadReport {
    #[must_use]
    pub fn is_pressed(&self, button: Button) -> bool {
        self.buttons & button.mask() != 0
    }
}

#[derive(Serialize)]
struct ReportLine {
    ts: String,
    buttons: u16,
    thumb_rx: i16,
    thumb_ry: i16,
    rx: f32,
    ry: f32,
}

/// Report-writing virtual pad.
pub struct VirtualGamepad<W: Write + Send> {
    writer: W,
    pending: GamepadReport,
    committed: GamepadReport,
    commits: u64,
}

impl<W: Write + Send> std::fmt::Debug for VirtualGamepad<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualGamepad")
            .field("pending", &self.pending)
            .field("commits", &self.commits)
            .finish_non_exhaustive()
    }
}

impl<W: Write + Send> VirtualGamepad<W> {
    /// Creates a pad with a neutral report (stick centered, nothing pressed).
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            pending: GamepadReport::default(),
            committed: GamepadReport::default(),
            commits: 0,
        }
    }

    /// The last report sent.
    #[must_use]
    pub fn committed(&self) -> GamepadReport {
        self.committed
    }

    /// Number of reports sent.
    #[must_use]
    pub fn commits(&self) -> u64 {
        self.commits
    }

    /// Consumes the pad, returning its writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> ControllerSink for VirtualGamepad<W> {
    fn set_right_stick(&mut self, x: f32, y: f32) {
        self.pending.right_x = clamp_axis(x);
        self.pending.right_y = clamp_axis(y);
    }

    fn press_button(&mut self, button: Button) {
        self.pending.buttons |= button.mask();
    }

    fn release_button(&mut self, button: Button) {
        self.pending.buttons &= !button.mask();
    }

    fn commit(&mut self) -> Result<()> {
        let line = ReportLine {
            ts: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            buttons: self.pending.buttons,
            thumb_rx: axis_to_thumb(self.pending.right_x),
            thumb_ry: axis_to_thumb(self.pending.right_y),
            rx: self.pending.right_x,
            ry: self.pending.right_y,
        };

        let sink_err = |e: std::io::Error| MotionPadError::SinkUnavailable(e.to_string());
        serde_json::to_writer(&mut self.writer, &line)
            .map_err(|e| MotionPadError::SinkUnavailable(e.to_string()))?;
        self.writer.write_all(b"\n").map_err(sink_err)?;
        self.writer.flush().map_err(sink_err)?;

        self.committed = self.pending;
        self.commits += 1;
        Ok(())
    }
}
