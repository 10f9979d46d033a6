//! # Roll Relay
//!
//! Streams the roll angle of one device to a single external consumer over
//! TCP, e.g. a game that steers with the sensor.
//!
//! ## Wire Format
//!
//! One value per orientation packet, fixed width text with no separator:
//!
//! ```text
//! "  12.50" " -45.00" "   3.14"
//!  └─7─┘
//! ```
//!
//! The relay consumes its device's packets itself, so that device must not
//! also be bound to a processor.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::error::{MotionPadError, Result};
use crate::sensor::packet::DeviceAddress;
use crate::sensor::source::PacketSource;
use crate::worker::StopHandle;

/// Width of one encoded roll value, in bytes.
pub const ROLL_WIDTH: usize = 7;

/// Formats a roll angle as 7 characters with 2 decimals.
///
/// # Examples
///
/// ```
/// use motion_gamepad::relay::format_roll;
///
/// assert_eq!(format_roll(12.5), "  12.50");
/// assert_eq!(format_roll(-145.257), "-145.26");
/// ```
#[must_use]
pub fn format_roll(roll: f32) -> String {
    format!("{:7.2}", roll)
}

/// Forwards one device's roll angles to a consumer.
pub struct RollRelay {
    source: Arc<dyn PacketSource>,
    address: DeviceAddress,
    stop: StopHandle,
    poll_interval: Duration,
}

impl RollRelay {
    #[must_use]
    pub fn new(
        source: Arc<dyn PacketSource>,
        address: DeviceAddress,
        stop: StopHandle,
        poll_interval: Duration,
    ) -> Self {
        Self {
            source,
            address,
            stop,
            poll_interval,
        }
    }

    /// Writes one value per orientation packet until a stop is requested or
    /// the source is closed and this device's queue is drained. Returns the
    /// number of values sent.
    ///
    /// # Errors
    ///
    /// Returns `UpstreamUnavailable` when the consumer stops accepting data
    /// or the device is unknown to the source.
    pub async fn forward<W>(&self, writer: &mut W) -> Result<u64>
    where
        W: AsyncWrite + Unpin,
    {
        if !self
            .source
            .connected_devices()
            .iter()
            .any(|d| d.address == self.address)
        {
            return Err(MotionPadError::UpstreamUnavailable(format!(
                "relay device {} is not connected",
                self.address
            )));
        }

        let mut sent = 0;

        while !self.stop.is_stop_requested() {
            let packet = match self.source.next_packet(&self.address) {
                Ok(Some(packet)) => packet,
                Ok(None) => {
                    if self.poll_interval.is_zero() {
                        tokio::task::yield_now().await;
                    } else {
                        tokio::time::sleep(self.poll_interval).await;
                    }
                    continue;
                }
                Err(e) => {
                    debug!("Relay source ended after {} values: {}", sent, e);
                    break;
                }
            };

            // Packets without orientation carry nothing to relay
            let Some(euler) = packet.orientation else {
                continue;
            };

            writer
                .write_all(format_roll(euler.roll).as_bytes())
                .await
                .map_err(|e| MotionPadError::UpstreamUnavailable(format!("relay consumer: {}", e)))?;
            sent += 1;
        }

        Ok(sent)
    }

    /// Accepts one consumer on `listener` and forwards to it.
    ///
    /// Requests a session stop when it ends, whatever the outcome.
    ///
    /// # Errors
    ///
    /// Returns `Io` if accepting fails, otherwise as [`RollRelay::forward`].
    pub async fn serve_listener(&self, listener: TcpListener) -> Result<u64> {
        let outcome = self.accept_and_forward(listener).await;
        match &outcome {
            Ok(sent) => info!("Relay finished after {} values", sent),
            Err(e) => warn!("Relay failed: {}", e),
        }
        self.stop.request_stop();
        outcome
    }

    /// Binds `listen`, then behaves as [`RollRelay::serve_listener`].
    ///
    /// # Errors
    ///
    /// Returns `Io` if the address cannot be bound.
    pub async fn serve(&self, listen: &str) -> Result<u64> {
        let listener = match TcpListener::bind(listen).await {
            Ok(listener) => listener,
            Err(e) => {
                self.stop.request_stop();
                return Err(e.into());
            }
        };
        info!("Relay waiting for consumer on {} (device {})", listen, self.address);
        self.serve_listener(listener).await
    }

    async fn accept_and_forward(&self, listener: TcpListener) -> Result<u64> {
        let accepted = tokio::select! {
            accepted = listener.accept() => accepted?,
            () = self.stop.stopped() => return Ok(0),
        };
        let (mut stream, peer) = accepted;
        stream.set_nodelay(true)?;
        info!("Relay consumer connected from {}", peer);
        self.forward(&mut stream).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::packet::Packet;
    use crate::sensor::source::QueuedPacketSource;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpStream;

    fn addr() -> DeviceAddress {
        DeviceAddress::new("D4:22:CD:00:36:80")
    }

    fn relay(source: Arc<QueuedPacketSource>, stop: StopHandle) -> RollRelay {
        RollRelay::new(source, addr(), stop, Duration::from_millis(1))
    }

    #[test]
    fn test_format_roll_fixed_width() {
        for roll in [0.0, 1.005, -12.3, 179.99, -179.99] {
            assert_eq!(format_roll(roll).len(), ROLL_WIDTH, "roll {}", roll);
        }
        assert_eq!(format_roll(0.0), "   0.00");
        assert_eq!(format_roll(-3.14159), "  -3.14");
    }

    #[tokio::test]
    async fn test_forward_writes_roll_per_orientation_packet() {
        let source = Arc::new(QueuedPacketSource::new(vec![addr()], 16));
        source.push(&addr(), Packet::with_orientation(12.5, 1.0, 2.0));
        source.push(&addr(), Packet::with_acceleration(1.0, 2.0, 3.0));
        source.push(&addr(), Packet::with_orientation(-45.0, 0.0, 0.0));
        source.close();

        let mut writer = tokio_test::io::Builder::new()
            .write(b"  12.50")
            .write(b" -45.00")
            .build();

        let sent = relay(source, StopHandle::new()).forward(&mut writer).await.unwrap();
        assert_eq!(sent, 2);
    }

    #[tokio::test]
    async fn test_write_error_is_upstream_unavailable() {
        let source = Arc::new(QueuedPacketSource::new(vec![addr()], 16));
        source.push(&addr(), Packet::with_orientation(1.0, 0.0, 0.0));

        let mut writer = tokio_test::io::Builder::new()
            .write_error(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "consumer gone"))
            .build();

        let result = relay(source, StopHandle::new()).forward(&mut writer).await;
        assert!(matches!(result, Err(MotionPadError::UpstreamUnavailable(_))));
    }

    #[tokio::test]
    async fn test_stop_ends_forwarding() {
        let source = Arc::new(QueuedPacketSource::new(vec![addr()], 16));
        let stop = StopHandle::new();
        stop.request_stop();

        let mut writer = tokio_test::io::Builder::new().build();
        let sent = relay(source, stop).forward(&mut writer).await.unwrap();
        assert_eq!(sent, 0);
    }

    #[tokio::test]
    async fn test_forward_ends_while_other_device_keeps_packets() {
        let other = DeviceAddress::new("D4:22:CD:00:36:81");
        let source = Arc::new(QueuedPacketSource::new(vec![addr(), other.clone()], 16));
        source.push(&addr(), Packet::with_orientation(3.0, 0.0, 0.0));
        source.push(&other, Packet::with_orientation(9.0, 0.0, 0.0));
        source.close();

        let mut writer = tokio_test::io::Builder::new().write(b"   3.00").build();
        let sent = tokio::time::timeout(
            Duration::from_secs(2),
            relay(Arc::clone(&source), StopHandle::new()).forward(&mut writer),
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(sent, 1);
        assert_eq!(source.pending(), 1);
    }

    #[tokio::test]
    async fn test_forward_rejects_unknown_device() {
        let source = Arc::new(QueuedPacketSource::new(
            vec![DeviceAddress::new("D4:22:CD:00:36:81")],
            16,
        ));
        let mut writer = tokio_test::io::Builder::new().build();
        let result = relay(source, StopHandle::new()).forward(&mut writer).await;
        assert!(matches!(result, Err(MotionPadError::UpstreamUnavailable(_))));
    }

    #[tokio::test]
    async fn test_serve_listener_over_tcp() {
        let source = Arc::new(QueuedPacketSource::new(vec![addr()], 16));
        let stop = StopHandle::new();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let local = listener.local_addr().unwrap();

        let relay = relay(Arc::clone(&source), stop.clone());
        let server = tokio::spawn(async move { relay.serve_listener(listener).await });

        let mut consumer = TcpStream::connect(local).await.unwrap();
        source.push(&addr(), Packet::with_orientation(7.25, 0.0, 0.0));
        source.push(&addr(), Packet::with_orientation(-0.5, 0.0, 0.0));
        source.close();

        let mut received = String::new();
        consumer.read_to_string(&mut received).await.unwrap();
        assert_eq!(received, "   7.25  -0.50");

        assert_eq!(server.await.unwrap().unwrap(), 2);
        assert!(stop.is_stop_requested());
    }
}
