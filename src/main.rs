//! # Motion Gamepad
//!
//! Turn wearable IMU motion into virtual gamepad input.
//!
//! Reads sensor packets as JSON lines (stdin or TCP), runs one worker thread
//! per configured (strategy, device) pairing, and writes one JSON report
//! line to stdout per controller commit. Logs go to stderr.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use motion_gamepad::config::{Config, LoggingConfig};
use motion_gamepad::control;
use motion_gamepad::gamepad::report::VirtualGamepad;
use motion_gamepad::gamepad::sink::SharedController;
use motion_gamepad::relay::RollRelay;
use motion_gamepad::sensor::feed;
use motion_gamepad::sensor::packet::DeviceAddress;
use motion_gamepad::sensor::source::QueuedPacketSource;
use motion_gamepad::worker::{Orchestrator, SessionSummary, StopHandle};

/// Configuration file used when no path is given on the command line
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// File name prefix of the daily rolling log
const LOG_FILE_PREFIX: &str = "motion-gamepad.log";

/// Main entry point for Motion Gamepad
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Load configuration (first argument, or `config/default.toml`)
///    - Set up logging to stderr and an optional rolling file
///    - Start the packet feed and the virtual pad on stdout
///
/// 2. **Session**
///    - Start one worker thread per configured processor
///    - Start the control listener and the roll relay when configured
///    - Run until Ctrl+C, end of input, or any worker failing
///
/// 3. **Shutdown**
///    - Raise the shared stop flag and join every worker
///    - Log per-worker packet and action counts
///
/// # Errors
///
/// Returns error if the configuration cannot be loaded or the workers
/// cannot be started.
///
/// # Examples
///
/// ```bash
/// cargo run --release -- config/default.toml < recording.jsonl
/// ```
#[tokio::main]
async fn main() -> Result<()> {
    let path = std::env::args_os()
        .nth(1)
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
    let config = Config::load(&path)
        .with_context(|| format!("failed to load configuration from {}", path.display()))?;

    let log_guard = init_logging(&config.logging);
    info!("Motion Gamepad v{} starting...", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded from {}", path.display());

    let failed = match run_session(&config).await {
        Ok(failed) => failed,
        Err(e) => {
            error!("{:#}", e);
            true
        }
    };

    info!("Motion Gamepad stopped");
    drop(log_guard);

    // A stdin read may still be parked on a blocking thread; exit without
    // waiting for it.
    std::process::exit(i32::from(failed));
}

/// Runs one session until Ctrl+C or its end. Returns whether it failed.
async fn run_session(config: &Config) -> Result<bool> {
    let specs = config.worker_specs()?;
    let relay_address = if config.relay.enabled {
        let address = config
            .source
            .devices
            .get(config.relay.device)
            .map(DeviceAddress::new)
            .context("relay device is not configured")?;
        Some(address)
    } else {
        None
    };

    let addresses: Vec<DeviceAddress> = config.source.devices.iter().map(DeviceAddress::new).collect();
    let source = Arc::new(QueuedPacketSource::new(addresses, config.source.queue_capacity));

    let feed_source = Arc::clone(&source);
    let source_config = config.source.clone();
    let feed_task = tokio::spawn(async move { feed::run_input(&source_config, feed_source).await });

    let poll_interval = config.worker.poll_interval();
    let mut session_task = None;
    let stop = if specs.is_empty() {
        StopHandle::new()
    } else {
        let controller = SharedController::new(VirtualGamepad::new(std::io::stdout()));
        let orchestrator = Orchestrator::new(source.clone(), controller, poll_interval);
        let session = orchestrator.start(specs)?;
        let stop = session.stop_handle();

        if let Some(listen) = config.control.listen.clone() {
            let registry = session.registry();
            tokio::spawn(async move {
                if let Err(e) = control::run_control(&listen, registry).await {
                    error!("Control listener failed: {}", e);
                }
            });
        }

        session_task = Some(tokio::task::spawn_blocking(move || session.join()));
        stop
    };

    if config.control.listen.is_some() && session_task.is_none() {
        warn!("Control listener not started: no processors to tune");
    }

    let relay_task = relay_address.map(|address| {
        let relay = RollRelay::new(source.clone(), address, stop.clone(), poll_interval);
        let listen = config.relay.listen.clone();
        tokio::spawn(async move { relay.serve(&listen).await })
    });

    info!("Press Ctrl+C to exit");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
        () = stop.stopped() => {
            info!("Session ending, shutting down...");
        }
    }
    stop.request_stop();

    let mut failed = false;

    if let Some(task) = session_task {
        match task.await {
            Ok(summary) => failed |= log_summary(&summary, source.is_closed()),
            Err(e) => {
                error!("Failed to join workers: {}", e);
                failed = true;
            }
        }
    }

    if let Some(task) = relay_task {
        match task.await {
            Ok(Ok(sent)) => info!("Relay sent {} values", sent),
            Ok(Err(e)) => {
                error!("Relay ended: {}", e);
                failed = true;
            }
            Err(e) => error!("Relay task failed: {}", e),
        }
    }

    if feed_task.is_finished() {
        match feed_task.await {
            Ok(Ok(stats)) => info!(
                "Input ended: {} packets accepted, {} rejected, {} dropped",
                stats.accepted,
                stats.rejected,
                source.dropped()
            ),
            Ok(Err(e)) => error!("Input failed: {}", e),
            Err(e) => error!("Input task failed: {}", e),
        }
    } else {
        feed_task.abort();
    }

    Ok(failed)
}

/// Installs the stderr subscriber, plus a daily rolling file when `log_dir` is set.
///
/// `RUST_LOG` overrides the configured level.
fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let stderr_layer = fmt::layer().with_writer(std::io::stderr);

    match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry().with(filter).with(stderr_layer).init();
            None
        }
    }
}

/// Logs per-worker counts. Returns whether the session counts as failed.
///
/// Workers that lost their packet source because the input ended are a
/// normal end of session. Any other failure still fails it.
fn log_summary(summary: &SessionSummary, input_ended: bool) -> bool {
    for report in &summary.reports {
        info!(
            "Worker '{}' ({} on device {}): {} packets processed, {} actions committed",
            report.name, report.kind, report.device, report.stats.packets, report.stats.actions
        );
    }

    if let Some(report) = summary.fatal_failure(input_ended) {
        let reason = report.failure.as_ref().map(ToString::to_string).unwrap_or_default();
        error!(
            "Session ended: worker '{}' ({} on device {}) failed: {}",
            report.name, report.kind, report.device, reason
        );
        return true;
    }

    match summary.check() {
        Ok(()) => info!("All workers stopped cleanly"),
        Err(e) => info!("Input ended: {}", e),
    }
    false
}
