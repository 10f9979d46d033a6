//! # Sensor Module
//!
//! IMU packet model and the polled packet source boundary.
//!
//! This module handles:
//! - Orientation / free-acceleration packets
//! - Per-device packet queues shared by the workers
//! - Ingesting packets as JSON lines from stdin or TCP

pub mod feed;
pub mod packet;
pub mod source;
