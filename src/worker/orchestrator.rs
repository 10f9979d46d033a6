//! # Orchestrator
//!
//! Starts one named OS thread per (processor, device) pairing and ties them
//! together with a single [`StopHandle`].
//!
//! Every worker thread carries an exit signal that raises the shared stop
//! flag when the thread ends for any reason (clean stop, error or panic).
//! One worker going down therefore brings the whole session down within one
//! polling interval, instead of leaving a partial set of workers running.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::error::{MotionPadError, Result};
use crate::gamepad::sink::SharedController;
use crate::processor::{InputProcessor, ProcessorKind, ProcessorSettings};
use crate::sensor::source::PacketSource;
use crate::worker::{FailureCause, StopHandle, Worker, WorkerFailure, WorkerReport, WorkerStats};

/// A processor waiting to be bound to a device.
pub struct WorkerSpec {
    pub name: String,
    /// Index into the source's connected devices.
    pub device: usize,
    pub processor: Box<dyn InputProcessor>,
}

impl std::fmt::Debug for WorkerSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerSpec")
            .field("name", &self.name)
            .field("device", &self.device)
            .field("kind", &self.processor.kind())
            .finish()
    }
}

/// A running worker as seen from the control plane.
#[derive(Debug, Clone)]
pub struct WorkerEntry {
    pub name: String,
    pub kind: ProcessorKind,
    pub device: usize,
    pub settings: Arc<ProcessorSettings>,
}

/// Name lookup for the tunable settings of every started worker.
#[derive(Debug, Clone, Default)]
pub struct WorkerRegistry {
    entries: Vec<WorkerEntry>,
}

impl WorkerRegistry {
    #[must_use]
    pub fn new(entries: Vec<WorkerEntry>) -> Self {
        Self { entries }
    }

    /// Settings of the worker called `name`.
    ///
    /// # Errors
    ///
    /// Returns `UnknownWorker` when no started worker has that name.
    pub fn settings(&self, name: &str) -> Result<&Arc<ProcessorSettings>> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| &e.settings)
            .ok_or_else(|| MotionPadError::UnknownWorker(name.to_string()))
    }

    #[must_use]
    pub fn entries(&self) -> &[WorkerEntry] {
        &self.entries
    }

    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }
}

/// Raises the stop flag when dropped, so even a panicking worker ends the session.
struct ExitSignal {
    name: String,
    stop: StopHandle,
    first_exit: Arc<OnceLock<String>>,
}

impl Drop for ExitSignal {
    fn drop(&mut self) {
        if self.first_exit.set(self.name.clone()).is_ok() {
            debug!("Worker '{}' exited first, stopping session", self.name);
        }
        self.stop.request_stop();
    }
}

struct WorkerThread {
    name: String,
    kind: ProcessorKind,
    device: usize,
    handle: JoinHandle<WorkerReport>,
}

/// Builds sessions over one packet source and one controller.
#[derive(Clone)]
pub struct Orchestrator {
    source: Arc<dyn PacketSource>,
    controller: SharedController,
    poll_interval: Duration,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("devices", &self.source.connected_devices().len())
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    #[must_use]
    pub fn new(
        source: Arc<dyn PacketSource>,
        controller: SharedController,
        poll_interval: Duration,
    ) -> Self {
        Self {
            source,
            controller,
            poll_interval,
        }
    }

    /// Validates the pairings and starts one thread per pairing.
    ///
    /// Pairings whose device index is not connected are skipped with a
    /// warning. The number of workers is thus capped at the number of
    /// connected devices.
    ///
    /// # Errors
    ///
    /// - `WorkerFailed` when two pairings share a name or a device
    /// - `UpstreamUnavailable` when no pairing has a connected device
    /// - `Io` when a thread cannot be spawned
    pub fn start(&self, specs: Vec<WorkerSpec>) -> Result<Session> {
        let devices = self.source.connected_devices();
        let mut bound: HashMap<usize, String> = HashMap::new();
        let mut accepted = Vec::with_capacity(specs.len());

        for spec in specs {
            let Some(device) = devices.get(spec.device) else {
                warn!(
                    "Skipping worker '{}': device {} not connected ({} connected)",
                    spec.name,
                    spec.device,
                    devices.len()
                );
                continue;
            };
            if let Some(owner) = bound.get(&spec.device) {
                return Err(MotionPadError::WorkerFailed {
                    worker: spec.name,
                    reason: format!("device {} is already bound to '{}'", spec.device, owner),
                });
            }
            if bound.values().any(|n| *n == spec.name) {
                return Err(MotionPadError::WorkerFailed {
                    worker: spec.name,
                    reason: "duplicate worker name".to_string(),
                });
            }
            bound.insert(spec.device, spec.name.clone());
            accepted.push((spec, device.address.clone()));
        }

        if accepted.is_empty() {
            return Err(MotionPadError::UpstreamUnavailable(
                "no configured processor has a connected device".to_string(),
            ));
        }

        let stop = StopHandle::new();
        let first_exit = Arc::new(OnceLock::new());
        let mut registry = WorkerRegistry::default();
        let mut threads = Vec::with_capacity(accepted.len());

        for (spec, address) in accepted {
            let kind = spec.processor.kind();
            registry.entries.push(WorkerEntry {
                name: spec.name.clone(),
                kind,
                device: spec.device,
                settings: Arc::clone(spec.processor.settings()),
            });

            let exit = ExitSignal {
                name: spec.name.clone(),
                stop: stop.clone(),
                first_exit: Arc::clone(&first_exit),
            };
            let worker = Worker::new(
                spec.name.clone(),
                spec.device,
                address,
                spec.processor,
                Arc::clone(&self.source),
                self.controller.clone(),
                stop.clone(),
                self.poll_interval,
            );

            let spawned = thread::Builder::new()
                .name(format!("worker-{}", spec.name))
                .spawn(move || {
                    let _exit = exit;
                    worker.run()
                });

            match spawned {
                Ok(handle) => threads.push(WorkerThread {
                    name: spec.name,
                    kind,
                    device: spec.device,
                    handle,
                }),
                Err(e) => {
                    error!("Failed to spawn worker '{}': {}", spec.name, e);
                    stop.request_stop();
                    for t in threads {
                        let _ = t.handle.join();
                    }
                    return Err(e.into());
                }
            }
        }

        info!("Started {} worker(s): {}", threads.len(), registry.names().join(", "));

        Ok(Session {
            stop,
            registry: Arc::new(registry),
            threads,
            first_exit,
        })
    }
}

/// A set of running workers sharing one stop flag.
pub struct Session {
    stop: StopHandle,
    registry: Arc<WorkerRegistry>,
    threads: Vec<WorkerThread>,
    first_exit: Arc<OnceLock<String>>,
}

impl Session {
    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Registry used by the control plane for runtime tuning.
    #[must_use]
    pub fn registry(&self) -> Arc<WorkerRegistry> {
        Arc::clone(&self.registry)
    }

    /// Settings of one worker.
    ///
    /// # Errors
    ///
    /// Returns `UnknownWorker` when no worker has that name.
    pub fn settings(&self, name: &str) -> Result<&Arc<ProcessorSettings>> {
        self.registry.settings(name)
    }

    #[must_use]
    pub fn worker_names(&self) -> Vec<&str> {
        self.registry.names()
    }

    pub fn request_stop(&self) {
        self.stop.request_stop();
    }

    /// Whether any worker has exited. Once true, the rest follow.
    #[must_use]
    pub fn is_finishing(&self) -> bool {
        self.first_exit.get().is_some()
    }

    /// Blocks until every worker thread has exited.
    ///
    /// Returns immediately-ish once a stop is requested or any worker ends.
    #[must_use]
    pub fn join(self) -> SessionSummary {
        let reports = self
            .threads
            .into_iter()
            .map(|t| match t.handle.join() {
                Ok(report) => report,
                Err(_) => {
                    error!("Worker '{}' panicked", t.name);
                    WorkerReport {
                        name: t.name,
                        kind: t.kind,
                        device: t.device,
                        stats: WorkerStats::default(),
                        failure: Some(WorkerFailure::panicked()),
                    }
                }
            })
            .collect();

        SessionSummary {
            reports,
            first_exit: self.first_exit.get().cloned(),
        }
    }
}

/// Outcome of a finished session.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub reports: Vec<WorkerReport>,
    /// Worker whose exit ended the session, if one did.
    pub first_exit: Option<String>,
}

impl SessionSummary {
    /// The failure that brought the session down, if any.
    ///
    /// Prefers the worker that exited first; other workers may have failed
    /// afterwards for the same upstream reason.
    #[must_use]
    pub fn first_failure(&self) -> Option<&WorkerReport> {
        self.fatal_failure(false)
    }

    /// Like [`SessionSummary::first_failure`], but once the input has ended
    /// a worker that only lost its packet source is not counted.
    #[must_use]
    pub fn fatal_failure(&self, input_ended: bool) -> Option<&WorkerReport> {
        let fatal = |r: &&WorkerReport| {
            r.failure
                .as_ref()
                .is_some_and(|f| !(input_ended && f.cause == FailureCause::Upstream))
        };
        self.first_exit
            .as_deref()
            .and_then(|name| self.reports.iter().filter(fatal).find(|r| r.name == name))
            .or_else(|| self.reports.iter().find(fatal))
    }

    /// `Ok` when every worker stopped on request.
    ///
    /// # Errors
    ///
    /// Returns `WorkerFailed` naming the worker that brought the session down.
    pub fn check(&self) -> Result<()> {
        match self.first_failure() {
            Some(report) => Err(MotionPadError::WorkerFailed {
                worker: report.name.clone(),
                reason: report
                    .failure
                    .as_ref()
                    .map(|f| f.message.clone())
                    .unwrap_or_default(),
            }),
            None => Ok(()),
        }
    }

    #[must_use]
    pub fn total_packets(&self) -> u64 {
        self.reports.iter().map(|r| r.stats.packets).sum()
    }
}
