//! Configuration file format.
//!
//! Every section is optional and falls back to its defaults:
//!
//! ```toml
//! [capture]
//! device_id = 0
//! frame_timeout_ms = 250
//!
//! [attendance]
//! cooldown_window_secs = 5
//! guest_fallback_enabled = true
//!
//! [pipeline]
//! display_interval_ms = 33
//!
//! [output]
//! metrics_port = 9090
//!
//! [[students]]
//! id = "114477"
//! first_name = "Ada"
//! last_name = "Lovelace"
//! ```

use crate::attendance::{Roster, RosterEntry};
use crate::capture::{CaptureConfig, CaptureConfigError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid capture settings: {0}")]
    Capture(#[from] CaptureConfigError),
    #[error("{0} must be at least 1")]
    InvalidCapacity(&'static str),
    #[error("failed to read config file: {0}")]
    FileReadError(String),
    #[error("failed to parse config file: {0}")]
    ParseError(String),
}

/// Attendance policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttendanceConfig {
    /// Minimum seconds between two accepted scans of one identifier.
    pub cooldown_window_secs: u64,
    /// Admit unregistered identifiers as guests.
    pub guest_fallback_enabled: bool,
}

impl Default for AttendanceConfig {
    fn default() -> Self {
        Self {
            cooldown_window_secs: 5,
            guest_fallback_enabled: true,
        }
    }
}

impl AttendanceConfig {
    pub fn cooldown_window(&self) -> Duration {
        Duration::from_secs(self.cooldown_window_secs)
    }
}

/// Worker-to-UI queue settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Minimum milliseconds between frames published for preview.
    pub display_interval_ms: u64,
    /// Preview frames buffered for the UI.
    pub display_capacity: usize,
    /// Notifications buffered for the UI.
    pub notification_capacity: usize,
    /// Typed entries buffered for the worker.
    pub manual_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            display_interval_ms: 33,
            display_capacity: 2,
            notification_capacity: 32,
            manual_capacity: 16,
        }
    }
}

/// Output configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Metrics server port (0 to disable).
    pub metrics_port: u16,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { metrics_port: 9090 }
    }
}

/// Full configuration file format.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub attendance: AttendanceConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub students: Vec<RosterEntry>,
}

impl FileConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileReadError(e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Parses and validates configuration text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: FileConfig =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.capture.validate()?;
        let p = &self.pipeline;
        if p.display_capacity == 0 {
            return Err(ConfigError::InvalidCapacity("display_capacity"));
        }
        if p.notification_capacity == 0 {
            return Err(ConfigError::InvalidCapacity("notification_capacity"));
        }
        if p.manual_capacity == 0 {
            return Err(ConfigError::InvalidCapacity("manual_capacity"));
        }
        Ok(())
    }

    /// Builds the registration table from `[[students]]`.
    pub fn roster(&self) -> Roster {
        self.students.iter().cloned().collect()
    }
}
