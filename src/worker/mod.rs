//! # Worker Module
//!
//! One polling loop per (processor, device) pairing.
//!
//! ## Cycle
//!
//! ```text
//! ┌──────────────┐  stop requested   ┌─────────┐
//! │  check stop  │ ─────────────────►│ Stopped │
//! └──────┬───────┘                   └─────────┘
//!        │
//!        ▼
//!   reset requested? ── yes ──► processor.reset()
//!        │
//!        ▼
//!   source alive? ── no ──► exit with UpstreamUnavailable
//!        │
//!        ▼
//!   packets available and one for our device?
//!        │ yes                         │ no
//!        ▼                             ▼
//!   process_input ──► apply       idle back-off
//! ```
//!
//! Workers never block on packet arrival. The idle back-off is a short
//! sleep (or a `yield_now` when the interval is zero), so a stop request is
//! observed within one polling interval.

pub mod orchestrator;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tokio::sync::Notify;
use tracing::{debug, info, trace, warn};

use crate::error::{MotionPadError, Result};
use crate::gamepad::sink::{ControllerAction, SharedController};
use crate::processor::{InputProcessor, ProcessorKind};
use crate::sensor::packet::DeviceAddress;
use crate::sensor::source::PacketSource;

pub use orchestrator::{Orchestrator, Session, SessionSummary, WorkerEntry, WorkerRegistry, WorkerSpec};

/// Message recorded for a worker whose thread panicked.
const PANIC_MESSAGE: &str = "worker thread panicked";

#[derive(Debug, Default)]
struct StopState {
    requested: AtomicBool,
    notify: Notify,
}

/// Shared cooperative cancellation flag.
///
/// Worker threads poll the flag; async supervisors await [`StopHandle::stopped`].
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    state: Arc<StopState>,
}

impl StopHandle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Asks every worker sharing this handle to leave its loop.
    pub fn request_stop(&self) {
        self.state.requested.store(true, Ordering::Release);
        self.state.notify.notify_waiters();
    }

    #[must_use]
    pub fn is_stop_requested(&self) -> bool {
        self.state.requested.load(Ordering::Acquire)
    }

    /// Resolves once a stop has been requested.
    pub async fn stopped(&self) {
        loop {
            // Registered before the check, so a concurrent request is not missed
            let notified = self.state.notify.notified();
            if self.is_stop_requested() {
                return;
            }
            notified.await;
        }
    }
}

/// Per-worker counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    /// Packets pulled for this worker's device.
    pub packets: u64,
    /// Actions committed to the controller.
    pub actions: u64,
}

/// What made a worker leave its loop without a stop request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCause {
    /// The packet source closed or no longer knows the device.
    Upstream,
    /// The controller sink rejected a commit.
    Sink,
    Panic,
    Other,
}

/// A worker's fatal error, kept after the thread has ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerFailure {
    pub cause: FailureCause,
    pub message: String,
}

impl WorkerFailure {
    #[must_use]
    pub fn panicked() -> Self {
        Self {
            cause: FailureCause::Panic,
            message: PANIC_MESSAGE.to_string(),
        }
    }
}

impl From<&MotionPadError> for WorkerFailure {
    fn from(err: &MotionPadError) -> Self {
        let cause = match err {
            MotionPadError::UpstreamUnavailable(_) => FailureCause::Upstream,
            MotionPadError::SinkUnavailable(_) => FailureCause::Sink,
            _ => FailureCause::Other,
        };
        Self {
            cause,
            message: err.to_string(),
        }
    }
}

impl std::fmt::Display for WorkerFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// How a worker ended.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerReport {
    pub name: String,
    pub kind: ProcessorKind,
    pub device: usize,
    pub stats: WorkerStats,
    /// `None` when the worker left because a stop was requested.
    pub failure: Option<WorkerFailure>,
}

/// A processor bound to one device, plus everything it needs to run.
pub struct Worker {
    name: String,
    device: usize,
    address: DeviceAddress,
    processor: Box<dyn InputProcessor>,
    source: Arc<dyn PacketSource>,
    controller: SharedController,
    stop: StopHandle,
    poll_interval: Duration,
    stats: WorkerStats,
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("name", &self.name)
            .field("kind", &self.processor.kind())
            .field("device", &self.device)
            .field("address", &self.address)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl Worker {
    /// Binds `processor` to the device at `device` / `address`.
    ///
    /// # Arguments
    ///
    /// * `poll_interval` - Back-off after an empty poll. Zero yields the
    ///   thread instead of sleeping.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        device: usize,
        address: DeviceAddress,
        processor: Box<dyn InputProcessor>,
        source: Arc<dyn PacketSource>,
        controller: SharedController,
        stop: StopHandle,
        poll_interval: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            device,
            address,
            processor,
            source,
            controller,
            stop,
            poll_interval,
            stats: WorkerStats::default(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn stats(&self) -> WorkerStats {
        self.stats
    }

    /// Runs until a stop is requested or the worker fails.
    ///
    /// Processor state is reset before the first poll.
    pub fn run(mut self) -> WorkerReport {
        info!(
            "Worker '{}' started ({} on device {} [{}])",
            self.name,
            self.processor.kind(),
            self.device,
            self.address
        );

        let failure = match self.poll_loop() {
            Ok(()) => {
                info!("Worker '{}' stopped", self.name);
                None
            }
            Err(e) => {
                warn!("Worker '{}' exiting: {}", self.name, e);
                Some(WorkerFailure::from(&e))
            }
        };

        debug!(
            "Worker '{}': {} packets, {} actions",
            self.name, self.stats.packets, self.stats.actions
        );

        WorkerReport {
            name: self.name,
            kind: self.processor.kind(),
            device: self.device,
            stats: self.stats,
            failure,
        }
    }

    fn poll_loop(&mut self) -> Result<()> {
        self.reset_processor()?;

        while !self.stop.is_stop_requested() {
            if !self.poll_once()? {
                self.idle();
            }
        }
        Ok(())
    }

    /// One cycle. Returns whether a packet was dispatched.
    fn poll_once(&mut self) -> Result<bool> {
        if self.processor.settings().take_reset_request() {
            debug!("Worker '{}': reset requested", self.name);
            self.reset_processor()?;
        }

        self.source.ensure_connected()?;

        if !self.source.packets_available() {
            return Ok(false);
        }
        let Some(packet) = self.source.next_packet(&self.address)? else {
            return Ok(false);
        };

        self.stats.packets += 1;
        trace!("[{}] {}", self.name, packet);

        if let Some(action) = self.processor.process_input(&packet, Instant::now()) {
            self.commit(&action)?;
        }
        Ok(true)
    }

    fn reset_processor(&mut self) -> Result<()> {
        match self.processor.reset() {
            Some(action) => self.commit(&action),
            None => Ok(()),
        }
    }

    fn commit(&mut self, action: &ControllerAction) -> Result<()> {
        self.controller.apply(action)?;
        self.stats.actions += 1;
        Ok(())
    }

    fn idle(&self) {
        if self.poll_interval.is_zero() {
            thread::yield_now();
        } else {
            thread::sleep(self.poll_interval);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gamepad::button::Button;
    use crate::gamepad::sink::ControllerSink;
    use crate::processor::{build_processor, ProcessorSettings, SettingsSnapshot};
    use crate::sensor::packet::Packet;
    use crate::sensor::source::QueuedPacketSource;
    use std::sync::Mutex;

    /// Sink that records every committed action.
    #[derive(Default, Clone)]
    struct RecordingSink {
        pending: Vec<ControllerAction>,
        committed: Arc<Mutex<Vec<ControllerAction>>>,
    }

    impl ControllerSink for RecordingSink {
        fn set_right_stick(&mut self, x: f32, y: f32) {
            self.pending.push(ControllerAction::RightStick { x, y });
        }

        fn press_button(&mut self, button: Button) {
            self.pending.push(ControllerAction::Press(button));
        }

        fn release_button(&mut self, button: Button) {
            self.pending.push(ControllerAction::Release(button));
        }

        fn commit(&mut self) -> Result<()> {
            self.committed.lock().unwrap().append(&mut self.pending);
            Ok(())
        }
    }

    struct FailingSink;

    impl ControllerSink for FailingSink {
        fn set_right_stick(&mut self, _x: f32, _y: f32) {}
        fn press_button(&mut self, _button: Button) {}
        fn release_button(&mut self, _button: Button) {}
        fn commit(&mut self) -> Result<()> {
            Err(MotionPadError::SinkUnavailable("driver gone".to_string()))
        }
    }

    fn addr() -> DeviceAddress {
        DeviceAddress::new("D4:22:CD:00:36:80")
    }

    fn tilt_worker(
        source: Arc<QueuedPacketSource>,
        controller: SharedController,
        stop: StopHandle,
    ) -> Worker {
        let settings = ProcessorSettings::new(SettingsSnapshot {
            sensitivity_x: 40.0,
            sensitivity_y: 20.0,
            ..SettingsSnapshot::default()
        })
        .unwrap();
        Worker::new(
            "tilt",
            0,
            addr(),
            build_processor(ProcessorKind::Tilt, Arc::new(settings), Button::A),
            source,
            controller,
            stop,
            Duration::from_micros(100),
        )
    }

    #[test]
    fn test_drains_device_then_fails_on_closed_source() {
        let source = Arc::new(QueuedPacketSource::new(vec![addr()], 16));
        source.push(&addr(), Packet::with_orientation(80.0, -20.0, 0.0));
        source.push(&addr(), Packet::with_acceleration(1.0, 1.0, 1.0));
        source.push(&addr(), Packet::with_orientation(0.0, 0.0, 0.0));
        source.close();

        let sink = RecordingSink::default();
        let committed = Arc::clone(&sink.committed);
        let worker = tilt_worker(source, SharedController::new(sink), StopHandle::new());

        let report = worker.run();

        assert_eq!(report.stats, WorkerStats { packets: 3, actions: 2 });
        let failure = report.failure.unwrap();
        assert_eq!(failure.cause, FailureCause::Upstream);
        assert!(failure.message.contains("Packet source unavailable"));
        assert_eq!(
            *committed.lock().unwrap(),
            vec![
                ControllerAction::RightStick { x: 1.0, y: -1.0 },
                ControllerAction::RightStick { x: 0.0, y: 0.0 },
            ]
        );
    }

    #[test]
    fn test_stop_before_start_exits_cleanly() {
        let source = Arc::new(QueuedPacketSource::new(vec![addr()], 16));
        source.push(&addr(), Packet::with_orientation(10.0, 0.0, 0.0));

        let stop = StopHandle::new();
        stop.request_stop();
        let report = tilt_worker(source, SharedController::new(RecordingSink::default()), stop).run();

        assert_eq!(report.failure, None);
        assert_eq!(report.stats.packets, 0);
    }

    #[test]
    fn test_stop_from_another_thread_ends_idle_worker() {
        let source = Arc::new(QueuedPacketSource::new(vec![addr()], 16));
        let stop = StopHandle::new();
        let worker = tilt_worker(source, SharedController::new(RecordingSink::default()), stop.clone());

        let handle = thread::spawn(move || worker.run());
        thread::sleep(Duration::from_millis(20));
        stop.request_stop();

        let report = handle.join().unwrap();
        assert_eq!(report.failure, None);
        assert_eq!(report.name, "tilt");
    }

    #[tokio::test]
    async fn test_stopped_resolves_after_request() {
        let stop = StopHandle::new();
        let waiter = stop.clone();
        let task = tokio::spawn(async move { waiter.stopped().await });

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!task.is_finished());
        stop.request_stop();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_stopped_wakes_on_request_from_worker_thread() {
        let stop = StopHandle::new();
        let requester = stop.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(5));
            requester.request_stop();
        });

        tokio::time::timeout(Duration::from_secs(1), stop.stopped())
            .await
            .unwrap();
        assert!(stop.is_stop_requested());
        handle.join().unwrap();

        // Already stopped resolves immediately
        stop.stopped().await;
    }

    #[test]
    fn test_sink_failure_is_fatal() {
        let source = Arc::new(QueuedPacketSource::new(vec![addr()], 16));
        source.push(&addr(), Packet::with_orientation(10.0, 0.0, 0.0));

        let report = tilt_worker(source, SharedController::new(FailingSink), StopHandle::new()).run();

        assert_eq!(report.stats, WorkerStats { packets: 1, actions: 0 });
        let failure = report.failure.unwrap();
        assert_eq!(failure.cause, FailureCause::Sink);
        assert!(failure.message.contains("driver gone"));
    }

    #[test]
    fn test_reset_request_releases_held_button() {
        let source = Arc::new(QueuedPacketSource::new(vec![addr()], 16));
        source.push(&addr(), Packet::with_acceleration(9.0, 0.0, 0.0));
        source.close();

        let settings = Arc::new(
            ProcessorSettings::new(SettingsSnapshot {
                alpha: 1.0,
                ..SettingsSnapshot::default()
            })
            .unwrap(),
        );
        let sink = RecordingSink::default();
        let committed = Arc::clone(&sink.committed);
        let mut worker = Worker::new(
            "punch",
            0,
            addr(),
            build_processor(ProcessorKind::Button, Arc::clone(&settings), Button::B),
            source,
            SharedController::new(sink),
            StopHandle::new(),
            Duration::ZERO,
        );

        assert!(worker.poll_once().unwrap());
        settings.request_reset();
        // The source is drained and closed, so the cycle fails after the reset.
        assert!(worker.poll_once().is_err());

        assert_eq!(
            *committed.lock().unwrap(),
            vec![
                ControllerAction::Press(Button::B),
                ControllerAction::Release(Button::B),
            ]
        );
        assert_eq!(worker.stats().actions, 2);
    }
}
