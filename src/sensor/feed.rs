//! # Packet Feed
//!
//! Reads sensor packets as JSON lines and pushes them into a
//! [`QueuedPacketSource`]. One record per line:
//!
//! ```text
//! {"address": "D4:22:CD:00:36:80", "euler": [12.5, -3.0, 90.0]}
//! {"address": "D4:22:CD:00:36:81", "free_acc": [0.1, 9.2, -0.4]}
//! ```
//!
//! Malformed lines are logged and skipped. End of input closes the source,
//! which ends every worker with `UpstreamUnavailable`.

use std::sync::Arc;

use serde::Deserialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::config::{InputKind, SourceConfig};
use crate::error::Result;
use crate::sensor::packet::{DeviceAddress, EulerAngles, Packet};
use crate::sensor::source::QueuedPacketSource;
use crate::signal::conditioning::Vec3;

/// One JSON line.
#[derive(Debug, Deserialize)]
struct PacketRecord {
    address: DeviceAddress,
    #[serde(default)]
    euler: Option<EulerAngles>,
    #[serde(default)]
    free_acc: Option<Vec3>,
}

/// Counters for one feed run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedStats {
    /// Packets accepted by the source.
    pub accepted: u64,
    /// Lines that failed to parse or named an unknown device.
    pub rejected: u64,
}

/// Parses one line into its device address and packet.
///
/// # Errors
///
/// Returns `Packet` when the line is not a valid record.
pub fn parse_record(line: &str) -> Result<(DeviceAddress, Packet)> {
    let record: PacketRecord = serde_json::from_str(line)?;
    Ok((
        record.address,
        Packet {
            orientation: record.euler,
            free_acceleration: record.free_acc,
        },
    ))
}

/// Pushes every line of `reader` into `source`, then closes it.
///
/// # Errors
///
/// Returns `Io` when reading fails; the source is closed either way.
pub async fn feed_lines<R>(reader: R, source: &QueuedPacketSource) -> Result<FeedStats>
where
    R: AsyncBufRead + Unpin,
{
    let mut stats = FeedStats::default();
    let mut lines = reader.lines();

    let outcome = loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break Ok(stats),
            Err(e) => break Err(e.into()),
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match parse_record(line) {
            Ok((address, packet)) => {
                if source.push(&address, packet) {
                    stats.accepted += 1;
                } else {
                    stats.rejected += 1;
                }
            }
            Err(e) => {
                warn!("Skipping malformed packet line: {}", e);
                stats.rejected += 1;
            }
        }
    };

    debug!("Feed finished: {} accepted, {} rejected", stats.accepted, stats.rejected);
    source.close();
    outcome
}

/// Opens the configured input and feeds it into `source` until it ends.
///
/// # Errors
///
/// Returns `Io` when the TCP listener cannot be bound or accepted.
pub async fn run_input(config: &SourceConfig, source: Arc<QueuedPacketSource>) -> Result<FeedStats> {
    match config.input {
        InputKind::Stdin => {
            info!("Reading sensor packets from stdin");
            feed_lines(BufReader::new(tokio::io::stdin()), &source).await
        }
        InputKind::Tcp => {
            let listener = match TcpListener::bind(&config.listen).await {
                Ok(listener) => listener,
                Err(e) => {
                    source.close();
                    return Err(e.into());
                }
            };
            info!("Waiting for sensor stream on {}", config.listen);
            let (stream, peer) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    source.close();
                    return Err(e.into());
                }
            };
            info!("Sensor stream connected from {}", peer);
            feed_lines(BufReader::new(stream), &source).await
        }
    }
}
