//! # Motion Gamepad Library
//!
//! Turn wearable IMU motion into virtual gamepad input.
//!
//! Sensor packets (orientation and free acceleration) are polled per device
//! by worker threads. Each worker runs one strategy (tilt, acceleration,
//! position or button) and commits the resulting action to a shared
//! virtual controller.
//!
//! ```text
//! packet source ──► worker (processor) ──► shared controller ──► reports
//!                      ▲
//!                      └── control plane (runtime tuning)
//! ```

pub mod config;
pub mod control;
pub mod error;
pub mod gamepad;
pub mod processor;
pub mod relay;
pub mod sensor;
pub mod signal;
pub mod worker;
