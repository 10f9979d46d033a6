//! # Packet Source
//!
//! The boundary to the sensor SDK. Workers poll a source: they ask whether
//! any packets are available and then pull the next packet for the one
//! device they are bound to. There is no blocking wait on packet arrival.
//!
//! ## Per-Device Isolation
//!
//! Workers bound to different devices must never consume each other's
//! packets. [`QueuedPacketSource`] keeps one FIFO per device behind its own
//! lock, so pulling from one device never touches another device's queue.
//! The orchestrator refuses to bind two workers to the same device.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

use tracing::{debug, info, warn};

use crate::error::{MotionPadError, Result};
use crate::sensor::packet::{Device, DeviceAddress, Packet};

/// Polled packet source shared by all workers.
pub trait PacketSource: Send + Sync {
    /// Whether any device has at least one queued packet.
    fn packets_available(&self) -> bool;

    /// Next packet for `address`, or `None` when that device has nothing queued.
    ///
    /// # Errors
    ///
    /// Returns `UpstreamUnavailable` when the source can no longer deliver
    /// packets for this device.
    fn next_packet(&self, address: &DeviceAddress) -> Result<Option<Packet>>;

    /// Connected devices in stable connection order.
    fn connected_devices(&self) -> Vec<Device>;

    /// Checked by workers every cycle, including idle ones.
    ///
    /// # Errors
    ///
    /// Returns `UpstreamUnavailable` once the source is gone for good.
    fn ensure_connected(&self) -> Result<()> {
        Ok(())
    }
}

/// In-process stand-in for the SDK packet queue.
///
/// One bounded FIFO per device. When a queue is full the oldest packet is
/// dropped, keeping latency bounded for a real-time controller.
#[derive(Debug)]
pub struct QueuedPacketSource {
    devices: Vec<Device>,
    queues: HashMap<DeviceAddress, Mutex<VecDeque<Packet>>>,
    capacity: usize,
    pending: AtomicUsize,
    dropped: AtomicU64,
    closed: AtomicBool,
}

impl QueuedPacketSource {
    /// Creates a source for the given device addresses, in connection order.
    ///
    /// # Examples
    ///
    /// ```
    /// use motion_gamepad::sensor::packet::{DeviceAddress, Packet};
    /// use motion_gamepad::sensor::source::{PacketSource, QueuedPacketSource};
    ///
    /// let addr = DeviceAddress::new("D4:22:CD:00:36:80");
    /// let source = QueuedPacketSource::new(vec![addr.clone()], 16);
    ///
    /// assert!(!source.packets_available());
    /// source.push(&addr, Packet::with_orientation(10.0, 0.0, 0.0));
    /// assert!(source.packets_available());
    /// assert!(source.next_packet(&addr)?.is_some());
    /// # Ok::<(), motion_gamepad::error::MotionPadError>(())
    /// ```
    #[must_use]
    pub fn new(addresses: Vec<DeviceAddress>, capacity: usize) -> Self {
        let devices: Vec<Device> = addresses
            .into_iter()
            .enumerate()
            .map(|(index, address)| Device { index, address })
            .collect();
        let queues = devices
            .iter()
            .map(|d| (d.address.clone(), Mutex::new(VecDeque::with_capacity(capacity))))
            .collect();

        Self {
            devices,
            queues,
            capacity: capacity.max(1),
            pending: AtomicUsize::new(0),
            dropped: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// Queues a packet for a device.
    ///
    /// Returns `false` when the address is unknown or the source is closed.
    pub fn push(&self, address: &DeviceAddress, packet: Packet) -> bool {
        if self.closed.load(Ordering::Acquire) {
            return false;
        }
        let Some(queue) = self.queues.get(address) else {
            warn!("Dropping packet for unknown device {}", address);
            return false;
        };
        let Ok(mut queue) = queue.lock() else {
            return false;
        };

        if queue.len() >= self.capacity {
            queue.pop_front();
            let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            debug!("Queue for {} full, dropped oldest packet ({} total)", address, dropped);
        } else {
            self.pending.fetch_add(1, Ordering::AcqRel);
        }
        queue.push_back(packet);
        true
    }

    /// Marks the upstream as finished. Queued packets can still be drained;
    /// a consumer gets `UpstreamUnavailable` once its own device queue is empty.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            info!("Packet source closed ({} packets still queued)", self.pending());
        }
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Packets queued across all devices.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    /// Packets discarded because a device queue was full.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Looks up a device address by connection index.
    #[must_use]
    pub fn address_of(&self, index: usize) -> Option<&DeviceAddress> {
        self.devices.get(index).map(|d| &d.address)
    }
}

impl PacketSource for QueuedPacketSource {
    fn packets_available(&self) -> bool {
        self.pending() > 0
    }

    fn next_packet(&self, address: &DeviceAddress) -> Result<Option<Packet>> {
        let queue = self.queues.get(address).ok_or_else(|| {
            MotionPadError::UpstreamUnavailable(format!("device {} is not connected", address))
        })?;
        let mut queue = queue.lock().map_err(|_| {
            MotionPadError::UpstreamUnavailable(format!("queue for {} is poisoned", address))
        })?;

        match queue.pop_front() {
            Some(packet) => {
                self.pending.fetch_sub(1, Ordering::AcqRel);
                Ok(Some(packet))
            }
            // Other devices' queues may never be drained, so only this one counts
            None if self.is_closed() => Err(MotionPadError::UpstreamUnavailable(
                "packet source closed".to_string(),
            )),
            None => Ok(None),
        }
    }

    fn connected_devices(&self) -> Vec<Device> {
        self.devices.clone()
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.is_closed() && self.pending() == 0 {
            return Err(MotionPadError::UpstreamUnavailable(
                "packet source closed".to_string(),
            ));
        }
        Ok(())
    }
}
