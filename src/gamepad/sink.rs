//! # Controller Sink
//!
//! Contract with the virtual controller driver, and the serialized handle
//! all workers write through.
//!
//! Each processed packet yields at most one [`ControllerAction`]. Applying it
//! performs the buffered mutation and exactly one `commit`, all while the
//! sink lock is held, so a report never mixes a half-applied action from
//! one worker with another worker's write.

use std::sync::{Arc, Mutex};

use crate::error::{MotionPadError, Result};
use crate::gamepad::button::Button;

/// Virtual controller driver. Mutations are buffered until `commit`.
#[cfg_attr(test, mockall::automock)]
pub trait ControllerSink: Send {
    /// Buffers a new right-stick position; both axes in `[-1, 1]`.
    fn set_right_stick(&mut self, x: f32, y: f32);

    /// Buffers a button press.
    fn press_button(&mut self, button: Button);

    /// Buffers a button release.
    fn release_button(&mut self, button: Button);

    /// Sends the buffered state as one report.
    ///
    /// # Errors
    ///
    /// Returns `SinkUnavailable` when the driver cannot accept the report.
    fn commit(&mut self) -> Result<()>;
}

/// Output of one processed packet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControllerAction {
    /// New right-stick position, already clamped.
    RightStick { x: f32, y: f32 },
    /// Button went down.
    Press(Button),
    /// Button went up.
    Release(Button),
}

/// Cloneable, thread-safe handle to one controller sink.
#[derive(Clone)]
pub struct SharedController {
    inner: Arc<Mutex<Box<dyn ControllerSink>>>,
}

impl std::fmt::Debug for SharedController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedController").finish_non_exhaustive()
    }
}

impl SharedController {
    pub fn new<S: ControllerSink + 'static>(sink: S) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Box::new(sink))),
        }
    }

    /// Applies an action and commits it under a single lock hold.
    ///
    /// # Errors
    ///
    /// Returns `SinkUnavailable` when the lock is poisoned or the commit fails.
    pub fn apply(&self, action: &ControllerAction) -> Result<()> {
        let mut sink = self
            .inner
            .lock()
            .map_err(|_| MotionPadError::SinkUnavailable("controller lock poisoned".to_string()))?;

        match *action {
            ControllerAction::RightStick { x, y } => sink.set_right_stick(x, y),
            ControllerAction::Press(button) => sink.press_button(button),
            ControllerAction::Release(button) => sink.release_button(button),
        }
        sink.commit()
    }
}
