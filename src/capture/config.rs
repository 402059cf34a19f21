//! Camera capture configuration.
//!
//! Defaults match the preview pane of the attendance window.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for camera capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Camera device index.
    pub device_id: u32,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Target frames per second.
    pub fps: u32,
    /// Upper bound on a single blocking frame acquisition, in milliseconds.
    pub frame_timeout_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device_id: 0,
            width: 610,
            height: 400,
            fps: 30,
            frame_timeout_ms: 250,
        }
    }
}

impl CaptureConfig {
    /// Creates a new configuration with the specified dimensions.
    pub fn with_dimensions(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }

    /// Returns the acquisition timeout as a `Duration`.
    pub fn frame_timeout(&self) -> Duration {
        Duration::from_millis(self.frame_timeout_ms)
    }

    /// Returns the nominal interval between frames.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs(1) / self.fps.max(1)
    }

    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), CaptureConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(CaptureConfigError::InvalidDimensions);
        }
        if self.fps == 0 || self.fps > 120 {
            return Err(CaptureConfigError::InvalidFrameRate);
        }
        if self.frame_timeout_ms == 0 {
            return Err(CaptureConfigError::InvalidTimeout);
        }
        Ok(())
    }
}

/// Capture configuration validation errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureConfigError {
    #[error("invalid frame dimensions")]
    InvalidDimensions,
    #[error("invalid frame rate (must be 1-120 fps)")]
    InvalidFrameRate,
    #[error("frame timeout must be non-zero")]
    InvalidTimeout,
}
