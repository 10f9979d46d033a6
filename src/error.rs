//! # Error Types
//!
//! Custom error types for Motion Gamepad using `thiserror`.
//!
//! Packets missing the data a processor needs are not errors: processors
//! return `None` for that cycle. Out-of-range axis values are not errors
//! either, they are clamped.

use thiserror::Error;

/// Main error type for Motion Gamepad
#[derive(Debug, Error)]
pub enum MotionPadError {
    /// Configuration file errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// A tuning value was rejected; the previous value stays in effect
    #[error("Invalid {name}: {value} (expected {expected})")]
    InvalidParameter {
        name: &'static str,
        value: f32,
        expected: &'static str,
    },

    /// The packet source can no longer deliver packets
    #[error("Packet source unavailable: {0}")]
    UpstreamUnavailable(String),

    /// The virtual controller can no longer accept reports
    #[error("Controller sink unavailable: {0}")]
    SinkUnavailable(String),

    /// A worker stopped because of a fatal error
    #[error("Worker '{worker}' failed: {reason}")]
    WorkerFailed { worker: String, reason: String },

    /// No worker with this name exists in the session
    #[error("Unknown worker: {0}")]
    UnknownWorker(String),

    /// Malformed control-plane command
    #[error("Control command error: {0}")]
    Control(String),

    /// Malformed JSON packet record
    #[error("Packet decode error: {0}")]
    Packet(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Motion Gamepad
pub type Result<T> = std::result::Result<T, MotionPadError>;
