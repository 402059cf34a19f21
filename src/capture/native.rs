//! Hardware camera source backed by `nokhwa`.
//!
//! `nokhwa::Camera::frame` blocks with no deadline, so the device lives on
//! its own reader thread. Frames cross over a one-slot channel and
//! `next_frame` waits on that channel with the caller's timeout.

use super::{CaptureConfig, CaptureError, Frame, FrameSource};
use nokhwa::pixel_format::LumaFormat;
use nokhwa::utils::{CameraIndex, RequestedFormat, RequestedFormatType};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TrySendError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// How long `open` waits for the reader thread to report the device state.
const OPEN_TIMEOUT: Duration = Duration::from_secs(5);

type Reading = Result<Frame, CaptureError>;

struct Reader {
    frames: Receiver<Reading>,
    stop: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

/// Camera attached to the host, read through the platform's native API.
pub struct NativeCamera {
    config: CaptureConfig,
    reader: Option<Reader>,
}

impl NativeCamera {
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            reader: None,
        }
    }
}

impl FrameSource for NativeCamera {
    fn open(&mut self) -> Result<(), CaptureError> {
        if self.reader.is_some() {
            return Err(CaptureError::DeviceUnavailable(
                "device already claimed".to_string(),
            ));
        }
        self.config
            .validate()
            .map_err(|e| CaptureError::DeviceUnavailable(e.to_string()))?;

        let (ready_tx, ready_rx) = mpsc::channel();
        let (frame_tx, frame_rx) = mpsc::sync_channel(1);
        let stop = Arc::new(AtomicBool::new(false));
        let device_id = self.config.device_id;

        let thread = std::thread::Builder::new()
            .name("camera-reader".into())
            .spawn({
                let stop = Arc::clone(&stop);
                move || read_frames(device_id, ready_tx, frame_tx, stop)
            })
            .map_err(|e| CaptureError::DeviceUnavailable(e.to_string()))?;

        match ready_rx.recv_timeout(OPEN_TIMEOUT) {
            Ok(Ok(())) => {
                tracing::info!(device = device_id, "Camera opened");
                self.reader = Some(Reader {
                    frames: frame_rx,
                    stop,
                    thread,
                });
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                stop.store(true, Ordering::SeqCst);
                Err(CaptureError::DeviceUnavailable(format!(
                    "device {} did not start within {:?}",
                    device_id, OPEN_TIMEOUT
                )))
            }
        }
    }

    fn next_frame(&mut self, timeout: Duration) -> Result<Frame, CaptureError> {
        let reader = self.reader.as_ref().ok_or(CaptureError::NotInitialized)?;
        match reader.frames.recv_timeout(timeout) {
            Ok(reading) => reading,
            Err(RecvTimeoutError::Timeout) => Err(CaptureError::Timeout(timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(CaptureError::DeviceDisconnected(
                "camera reader stopped".to_string(),
            )),
        }
    }

    fn is_open(&self) -> bool {
        self.reader.is_some()
    }

    fn close(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.stop.store(true, Ordering::SeqCst);
            // Unblock a reader parked on a full channel.
            drop(reader.frames);
            if reader.thread.join().is_err() {
                tracing::error!("Camera reader thread panicked");
            }
            tracing::info!(device = self.config.device_id, "Camera closed");
        }
    }
}

impl Drop for NativeCamera {
    fn drop(&mut self) {
        self.close();
    }
}

fn read_frames(
    device_id: u32,
    ready: mpsc::Sender<Result<(), CaptureError>>,
    frames: mpsc::SyncSender<Reading>,
    stop: Arc<AtomicBool>,
) {
    let requested =
        RequestedFormat::new::<LumaFormat>(RequestedFormatType::AbsoluteHighestFrameRate);
    let mut camera = match nokhwa::Camera::new(CameraIndex::Index(device_id), requested) {
        Ok(camera) => camera,
        Err(e) => {
            let _ = ready.send(Err(CaptureError::DeviceUnavailable(e.to_string())));
            return;
        }
    };
    if let Err(e) = camera.open_stream() {
        let _ = ready.send(Err(CaptureError::DeviceUnavailable(e.to_string())));
        return;
    }
    if ready.send(Ok(())).is_err() {
        let _ = camera.stop_stream();
        return;
    }

    let mut sequence = 0u64;
    while !stop.load(Ordering::SeqCst) {
        let reading = camera
            .frame()
            .and_then(|buffer| buffer.decode_image::<LumaFormat>())
            .map(|image| {
                sequence += 1;
                let (width, height) = (image.width(), image.height());
                Frame::new(image.into_raw(), width, height, sequence)
            })
            .map_err(|e| CaptureError::DeviceDisconnected(e.to_string()));
        let fatal = reading.is_err();

        match frames.try_send(reading) {
            // A stale frame is still queued; drop this one.
            Ok(()) | Err(TrySendError::Full(_)) => {}
            Err(TrySendError::Disconnected(_)) => break,
        }
        if fatal {
            break;
        }
    }

    if let Err(e) = camera.stop_stream() {
        tracing::warn!(error = %e, "Failed to stop camera stream");
    }
}
