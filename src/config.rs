//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! ```toml
//! [source]
//! input = "stdin"
//! devices = ["D4:22:CD:00:36:80", "D4:22:CD:00:36:81"]
//!
//! [[processors]]
//! kind = "tilt"
//! device = 0
//!
//! [[processors]]
//! kind = "button"
//! device = 1
//! button = "a"
//! threshold = 7.0
//! ```

use serde::de::Error;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{MotionPadError, Result};
use crate::gamepad::button::Button;
use crate::processor::{build_processor, ProcessorKind, ProcessorSettings, SettingsSnapshot};
use crate::worker::WorkerSpec;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub source: SourceConfig,

    #[serde(default)]
    pub worker: WorkerConfig,

    #[serde(default)]
    pub relay: RelayConfig,

    #[serde(default)]
    pub control: ControlConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub processors: Vec<ProcessorConfig>,
}

/// Where sensor packets come from
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InputKind {
    /// JSON lines on standard input
    Stdin,
    /// JSON lines from the first client accepted on `listen`
    Tcp,
}

/// Packet source configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    #[serde(default = "default_input")]
    pub input: InputKind,

    #[serde(default)]
    pub listen: String,

    /// Device addresses in connection order; the position is the device index.
    #[serde(default)]
    pub devices: Vec<String>,

    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

/// Worker loop configuration
#[derive(Debug, Deserialize, Clone)]
pub struct WorkerConfig {
    /// Back-off after an empty poll. 0 yields instead of sleeping.
    #[serde(default = "default_poll_interval_us")]
    pub poll_interval_us: u64,
}

/// Roll relay configuration
#[derive(Debug, Deserialize, Clone)]
pub struct RelayConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_relay_listen")]
    pub listen: String,

    #[serde(default)]
    pub device: usize,
}

/// Runtime tuning listener configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ControlConfig {
    /// No listener when unset.
    #[serde(default)]
    pub listen: Option<String>,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Daily rolling log file directory, in addition to stderr.
    #[serde(default)]
    pub log_dir: Option<String>,
}

/// One (strategy, device) pairing
#[derive(Debug, Deserialize, Clone)]
pub struct ProcessorConfig {
    pub kind: ProcessorKind,

    #[serde(default)]
    pub device: usize,

    /// Defaults to `<kind>-<device>`.
    #[serde(default)]
    pub name: Option<String>,

    /// Kind default when unset (tilt 40, others 1).
    #[serde(default)]
    pub sensitivity_x: Option<f32>,

    /// Kind default when unset (tilt 20, others 1).
    #[serde(default)]
    pub sensitivity_y: Option<f32>,

    #[serde(default)]
    pub deadzone: f32,

    #[serde(default = "default_threshold")]
    pub threshold: f32,

    #[serde(default = "default_hysteresis")]
    pub hysteresis: f32,

    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    #[serde(default = "default_alpha")]
    pub alpha: f32,

    /// Required for `kind = "button"`.
    #[serde(default)]
    pub button: Option<Button>,
}

// Default value functions
fn default_input() -> InputKind { InputKind::Stdin }
fn default_queue_capacity() -> usize { 256 }

fn default_poll_interval_us() -> u64 { 500 }

fn default_relay_listen() -> String { "127.0.0.1:65432".to_string() }

fn default_log_level() -> String { "info".to_string() }

fn default_threshold() -> f32 { 7.0 }
fn default_hysteresis() -> f32 { 1.0 }
fn default_debounce_ms() -> u64 { 500 }
fn default_alpha() -> f32 { 0.3 }

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

impl Default for WorkerConfig {
    fn default() -> Self {
        Self { poll_interval_us: default_poll_interval_us() }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen: default_relay_listen(),
            device: 0,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            log_dir: None,
        }
    }
}

fn config_error(msg: impl std::fmt::Display) -> MotionPadError {
    MotionPadError::Config(toml::de::Error::custom(msg))
}

impl WorkerConfig {
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_micros(self.poll_interval_us)
    }
}

impl ProcessorConfig {
    /// Worker name, explicit or derived from kind and device.
    #[must_use]
    pub fn worker_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("{}-{}", self.kind, self.device))
    }

    /// Initial tunable values, with kind defaults filled in.
    #[must_use]
    pub fn to_snapshot(&self) -> SettingsSnapshot {
        let (sx, sy) = self.kind.default_sensitivity();
        SettingsSnapshot {
            sensitivity_x: self.sensitivity_x.unwrap_or(sx),
            sensitivity_y: self.sensitivity_y.unwrap_or(sy),
            deadzone: self.deadzone,
            threshold: self.threshold,
            hysteresis: self.hysteresis,
            debounce: Duration::from_millis(self.debounce_ms),
            alpha: self.alpha,
        }
    }

    /// Builds the processor and its shared settings.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` if a value is out of range. [`Config::load`]
    /// rejects those earlier.
    pub fn to_worker_spec(&self) -> Result<WorkerSpec> {
        let settings = Arc::new(ProcessorSettings::new(self.to_snapshot())?);
        let button = self.button.unwrap_or(Button::A);
        Ok(WorkerSpec {
            name: self.worker_name(),
            device: self.device,
            processor: build_processor(self.kind, settings, button),
        })
    }

    fn validate(&self, device_count: usize) -> Result<()> {
        let name = self.worker_name();
        if let Err(e) = self.to_snapshot().validate() {
            return Err(config_error(format!("processor '{}': {}", name, e)));
        }

        if self.kind == ProcessorKind::Button && self.button.is_none() {
            return Err(config_error(format!(
                "processor '{}': button kind requires a button",
                name
            )));
        }

        if self.device >= device_count {
            return Err(config_error(format!(
                "processor '{}': device {} is not configured ({} devices)",
                name, self.device, device_count
            )));
        }

        Ok(())
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use motion_gamepad::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from a TOML string
    ///
    /// # Errors
    ///
    /// Returns `Config` on parse or validation failure.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// One worker spec per configured processor, in file order.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` if a processor carries out-of-range values.
    pub fn worker_specs(&self) -> Result<Vec<WorkerSpec>> {
        self.processors.iter().map(ProcessorConfig::to_worker_spec).collect()
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    fn validate(&self) -> Result<()> {
        // Validate source configuration
        if self.source.devices.is_empty() {
            return Err(config_error("at least one device must be configured"));
        }

        if self.source.devices.iter().any(|d| d.trim().is_empty()) {
            return Err(config_error("device addresses cannot be empty"));
        }

        let unique: HashSet<&str> = self.source.devices.iter().map(String::as_str).collect();
        if unique.len() != self.source.devices.len() {
            return Err(config_error("device addresses must be unique"));
        }

        if self.source.input == InputKind::Tcp && self.source.listen.is_empty() {
            return Err(config_error("tcp input requires a listen address"));
        }

        if self.source.queue_capacity == 0 {
            return Err(config_error("queue_capacity must be greater than 0"));
        }

        if self.worker.poll_interval_us > 1_000_000 {
            return Err(config_error("poll_interval_us must be between 0 and 1000000"));
        }

        if !LOG_LEVELS.contains(&self.logging.level.to_ascii_lowercase().as_str()) {
            return Err(config_error(format!(
                "logging level must be one of {}",
                LOG_LEVELS.join(", ")
            )));
        }

        // Validate processors
        if self.processors.is_empty() && !self.relay.enabled {
            return Err(config_error("at least one processor or the relay must be configured"));
        }

        let device_count = self.source.devices.len();
        let mut names = HashSet::new();
        let mut bound = HashSet::new();

        for processor in &self.processors {
            processor.validate(device_count)?;

            let name = processor.worker_name();
            if !names.insert(name.clone()) {
                return Err(config_error(format!("duplicate worker name '{}'", name)));
            }

            // Per-device queues are only isolated if each device has one consumer
            if !bound.insert(processor.device) {
                return Err(config_error(format!(
                    "device {} is bound to more than one processor",
                    processor.device
                )));
            }
        }

        // Validate relay
        if self.relay.enabled {
            if self.relay.listen.is_empty() {
                return Err(config_error("relay listen address cannot be empty"));
            }
            if self.relay.device >= device_count {
                return Err(config_error(format!(
                    "relay device {} is not configured ({} devices)",
                    self.relay.device, device_count
                )));
            }
            if bound.contains(&self.relay.device) {
                return Err(config_error(format!(
                    "relay device {} is also bound to a processor",
                    self.relay.device
                )));
            }
        }

        if matches!(&self.control.listen, Some(addr) if addr.is_empty()) {
            return Err(config_error("control listen address cannot be empty"));
        }

        Ok(())
    }
}
