//! Camera abstraction for frame capture.
//!
//! This module provides a trait-based abstraction over camera hardware,
//! allowing for both real camera input and scripted mock sources for
//! testing and demos.

use super::{CaptureConfig, Frame};
use crate::decode::code39;
use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during camera operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    #[error("camera device unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("camera device disconnected: {0}")]
    DeviceDisconnected(String),
    #[error("no frame within {0:?}")]
    Timeout(Duration),
    #[error("camera not initialized")]
    NotInitialized,
}

impl CaptureError {
    /// Returns true for errors the capture loop retries.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, CaptureError::Timeout(_))
    }
}

/// Trait for frame sources.
///
/// This abstraction allows swapping between real camera hardware
/// and mock implementations for testing. Sources are moved onto the
/// capture worker thread, hence the `Send` bound.
pub trait FrameSource: Send {
    /// Acquires the device. Fails with `DeviceUnavailable` if no device
    /// exists or it is already claimed.
    fn open(&mut self) -> Result<(), CaptureError>;

    /// Blocks for at most `timeout` waiting for the next frame.
    fn next_frame(&mut self, timeout: Duration) -> Result<Frame, CaptureError>;

    /// Checks if the device is currently held.
    fn is_open(&self) -> bool;

    /// Releases the device. Calling it on a closed source is a no-op.
    fn close(&mut self);
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn open(&mut self) -> Result<(), CaptureError> {
        (**self).open()
    }

    fn next_frame(&mut self, timeout: Duration) -> Result<Frame, CaptureError> {
        (**self).next_frame(timeout)
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn close(&mut self) {
        (**self).close()
    }
}

/// Holds an opened source and closes it when dropped.
///
/// Every exit path of the owner, early returns and unwinding included,
/// releases the device exactly once.
pub struct DeviceGuard<'a, S: FrameSource + ?Sized> {
    source: &'a mut S,
}

impl<'a, S: FrameSource + ?Sized> DeviceGuard<'a, S> {
    /// Opens `source` and takes responsibility for closing it.
    pub fn open(source: &'a mut S) -> Result<Self, CaptureError> {
        source.open()?;
        Ok(Self { source })
    }
}

impl<S: FrameSource + ?Sized> Deref for DeviceGuard<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        self.source
    }
}

impl<S: FrameSource + ?Sized> DerefMut for DeviceGuard<'_, S> {
    fn deref_mut(&mut self) -> &mut S {
        self.source
    }
}

impl<S: FrameSource + ?Sized> Drop for DeviceGuard<'_, S> {
    fn drop(&mut self) {
        self.source.close();
    }
}

/// One scripted outcome of a `MockCamera::next_frame` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockStep {
    /// A frame with no barcode in it.
    Blank,
    /// A frame showing a Code 39 barcode with the given content.
    Barcode(String),
    /// No frame arrives; the call waits out its timeout.
    Timeout,
    /// The device goes away.
    Disconnect,
}

/// Mock camera that replays a script of frames and failures.
///
/// Once the script is exhausted the idle step repeats forever.
#[derive(Debug)]
pub struct MockCamera {
    config: CaptureConfig,
    open: bool,
    available: bool,
    disconnected: bool,
    paced: bool,
    sequence: u64,
    script: VecDeque<MockStep>,
    idle: MockStep,
    closes: Arc<AtomicUsize>,
}

impl Default for MockCamera {
    fn default() -> Self {
        Self::new(CaptureConfig::default())
    }
}

impl MockCamera {
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            open: false,
            available: true,
            disconnected: false,
            paced: false,
            sequence: 0,
            script: VecDeque::new(),
            idle: MockStep::Blank,
            closes: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A camera whose `open` always fails, as if no device were attached.
    pub fn unavailable(config: CaptureConfig) -> Self {
        Self {
            available: false,
            ..Self::new(config)
        }
    }

    /// Queues steps to replay in order.
    pub fn with_script(mut self, steps: impl IntoIterator<Item = MockStep>) -> Self {
        self.script.extend(steps);
        self
    }

    /// Sets the step repeated after the script runs out.
    pub fn then_idle(mut self, step: MockStep) -> Self {
        self.idle = step;
        self
    }

    /// Sleeps one frame interval per frame, like a real device would.
    pub fn paced(mut self) -> Self {
        self.paced = true;
        self
    }

    /// Shared counter of `close` calls, readable after the camera has
    /// been moved to another thread.
    pub fn close_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.closes)
    }

    fn render(&mut self, content: Option<&str>) -> Frame {
        let (width, height) = (self.config.width, self.config.height);
        let mut pixels = vec![200u8; (width as usize) * (height as usize)];

        if let Some(content) = content {
            paint_barcode(&mut pixels, width as usize, height as usize, content);
        }

        self.sequence += 1;
        Frame::new(pixels, width, height, self.sequence)
    }
}

/// Draws a Code 39 symbol across the middle band of a frame.
fn paint_barcode(pixels: &mut [u8], width: usize, height: usize, content: &str) {
    let Some(modules) = code39::render(content, 2) else {
        tracing::warn!(content, "Mock barcode content not encodable");
        return;
    };
    let offset = width.saturating_sub(modules.len()) / 2;
    let band = (height / 3)..(height - height / 3);

    for y in band {
        let row = &mut pixels[y * width..(y + 1) * width];
        for (x, &dark) in modules.iter().enumerate() {
            if let Some(px) = row.get_mut(offset + x) {
                *px = if dark { 20 } else { 235 };
            }
        }
    }
}

impl FrameSource for MockCamera {
    fn open(&mut self) -> Result<(), CaptureError> {
        if !self.available {
            return Err(CaptureError::DeviceUnavailable(format!(
                "no mock device at index {}",
                self.config.device_id
            )));
        }
        if self.open {
            return Err(CaptureError::DeviceUnavailable(
                "device already claimed".to_string(),
            ));
        }
        self.config
            .validate()
            .map_err(|e| CaptureError::DeviceUnavailable(e.to_string()))?;
        self.open = true;
        self.disconnected = false;
        self.sequence = 0;
        tracing::info!(device = self.config.device_id, "MockCamera opened");
        Ok(())
    }

    fn next_frame(&mut self, timeout: Duration) -> Result<Frame, CaptureError> {
        if !self.open {
            return Err(CaptureError::NotInitialized);
        }
        if self.disconnected {
            return Err(CaptureError::DeviceDisconnected("mock device gone".into()));
        }

        let step = self.script.pop_front().unwrap_or_else(|| self.idle.clone());
        match step {
            MockStep::Timeout => {
                std::thread::sleep(timeout);
                Err(CaptureError::Timeout(timeout))
            }
            MockStep::Disconnect => {
                self.disconnected = true;
                Err(CaptureError::DeviceDisconnected("mock device gone".into()))
            }
            MockStep::Blank => {
                if self.paced {
                    std::thread::sleep(self.config.frame_interval().min(timeout));
                }
                Ok(self.render(None))
            }
            MockStep::Barcode(content) => {
                if self.paced {
                    std::thread::sleep(self.config.frame_interval().min(timeout));
                }
                Ok(self.render(Some(content.as_str())))
            }
        }
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn close(&mut self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
        if self.open {
            self.open = false;
            tracing::info!("MockCamera closed");
        }
    }
}
