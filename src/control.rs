//! # Control Module
//!
//! Runtime tuning over a line protocol. One command per line, one reply per
//! command:
//!
//! ```text
//! sensitivity <worker> <x> <y>   -> ok | error: ...
//! threshold <worker> <value>     -> ok | error: ...
//! deadzone <worker> <value>      -> ok | error: ...
//! reset <worker>                 -> ok | error: ...
//! list                           -> one line per worker, then ok
//! ```
//!
//! Values go through the validated setters of
//! [`ProcessorSettings`](crate::processor::ProcessorSettings): a rejected
//! value leaves the previous one in effect. Changes apply from the next
//! packet the worker processes.

use std::str::FromStr;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::error::{MotionPadError, Result};
use crate::worker::WorkerRegistry;

/// A parsed control line.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlCommand {
    Sensitivity { worker: String, x: f32, y: f32 },
    Threshold { worker: String, value: f32 },
    Deadzone { worker: String, value: f32 },
    Reset { worker: String },
    List,
}

fn parse_value(token: Option<&str>, what: &str) -> Result<f32> {
    let token = token.ok_or_else(|| MotionPadError::Control(format!("missing {}", what)))?;
    token
        .parse::<f32>()
        .map_err(|_| MotionPadError::Control(format!("{} '{}' is not a number", what, token)))
}

fn parse_worker(token: Option<&str>) -> Result<String> {
    token
        .map(str::to_string)
        .ok_or_else(|| MotionPadError::Control("missing worker name".to_string()))
}

impl FromStr for ControlCommand {
    type Err = MotionPadError;

    fn from_str(line: &str) -> Result<Self> {
        let mut tokens = line.split_whitespace();
        let verb = tokens
            .next()
            .ok_or_else(|| MotionPadError::Control("empty command".to_string()))?;

        let command = match verb.to_ascii_lowercase().as_str() {
            "sensitivity" => ControlCommand::Sensitivity {
                worker: parse_worker(tokens.next())?,
                x: parse_value(tokens.next(), "x sensitivity")?,
                y: parse_value(tokens.next(), "y sensitivity")?,
            },
            "threshold" => ControlCommand::Threshold {
                worker: parse_worker(tokens.next())?,
                value: parse_value(tokens.next(), "threshold")?,
            },
            "deadzone" => ControlCommand::Deadzone {
                worker: parse_worker(tokens.next())?,
                value: parse_value(tokens.next(), "deadzone")?,
            },
            "reset" => ControlCommand::Reset {
                worker: parse_worker(tokens.next())?,
            },
            "list" => ControlCommand::List,
            other => return Err(MotionPadError::Control(format!("unknown command '{}'", other))),
        };

        if let Some(extra) = tokens.next() {
            return Err(MotionPadError::Control(format!("unexpected argument '{}'", extra)));
        }
        Ok(command)
    }
}

impl ControlCommand {
    /// Applies the command and returns the reply body (without the final `ok`).
    ///
    /// # Errors
    ///
    /// `UnknownWorker` for a name not in `registry`, `InvalidParameter`
    /// for a rejected value.
    pub fn execute(&self, registry: &WorkerRegistry) -> Result<Vec<String>> {
        match self {
            ControlCommand::Sensitivity { worker, x, y } => {
                registry.settings(worker)?.set_sensitivity(*x, *y)?;
                info!("Worker '{}': sensitivity set to ({}, {})", worker, x, y);
            }
            ControlCommand::Threshold { worker, value } => {
                registry.settings(worker)?.set_threshold(*value)?;
                info!("Worker '{}': threshold set to {}", worker, value);
            }
            ControlCommand::Deadzone { worker, value } => {
                registry.settings(worker)?.set_deadzone(*value)?;
                info!("Worker '{}': deadzone set to {}", worker, value);
            }
            ControlCommand::Reset { worker } => {
                registry.settings(worker)?.request_reset();
                info!("Worker '{}': reset requested", worker);
            }
            ControlCommand::List => {
                return Ok(registry
                    .entries()
                    .iter()
                    .map(|e| {
                        let s = e.settings.snapshot();
                        format!(
                            "{} {} device={} sensitivity={},{} deadzone={} threshold={}",
                            e.name, e.kind, e.device, s.sensitivity_x, s.sensitivity_y, s.deadzone, s.threshold
                        )
                    })
                    .collect());
            }
        }
        Ok(Vec::new())
    }
}

/// Handles one line and renders the full reply, `ok` or `error: ...` last.
#[must_use]
pub fn handle_line(line: &str, registry: &WorkerRegistry) -> String {
    let outcome = line.parse::<ControlCommand>().and_then(|cmd| cmd.execute(registry));
    match outcome {
        Ok(mut lines) => {
            lines.push("ok".to_string());
            lines.join("\n")
        }
        Err(e) => format!("error: {}", e),
    }
}

/// Serves one client until it disconnects.
///
/// # Errors
///
/// Returns `Io` when the connection fails.
pub async fn serve_connection<S>(stream: S, registry: &WorkerRegistry) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (reader, mut writer) = tokio::io::split(stream);
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        debug!("Control command: {}", line.trim());
        let mut reply = handle_line(&line, registry);
        reply.push('\n');
        writer.write_all(reply.as_bytes()).await?;
        writer.flush().await?;
    }
    Ok(())
}

/// Accepts control clients on `listen` until the task is cancelled.
///
/// # Errors
///
/// Returns `Io` when the listener cannot be bound.
pub async fn run_control(listen: &str, registry: Arc<WorkerRegistry>) -> Result<()> {
    let listener = TcpListener::bind(listen).await?;
    info!("Control listener on {}", listen);

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!("Control accept failed: {}", e);
                continue;
            }
        };
        debug!("Control client connected from {}", peer);

        let registry = Arc::clone(&registry);
        tokio::spawn(async move {
            if let Err(e) = serve_connection(stream, &registry).await {
                warn!("Control client {} dropped: {}", peer, e);
            }
        });
    }
}
