//! Camera input and frame handling.
//!
//! This module provides the `FrameSource` abstraction the capture loop
//! pulls frames from, the frame type itself, and the camera
//! configuration.

mod camera;
mod config;
mod frame;
#[cfg(feature = "camera")]
mod native;

pub use camera::{CaptureError, DeviceGuard, FrameSource, MockCamera, MockStep};
pub use config::{CaptureConfig, CaptureConfigError};
pub use frame::Frame;
#[cfg(feature = "camera")]
pub use native::NativeCamera;
