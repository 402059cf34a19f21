//! Capture worker orchestration and its link to the UI.
//!
//! The UI thread never blocks on the worker: preview frames and alerts
//! arrive through bounded lossy queues, typed identifiers leave through
//! another, and shutdown is a shared cancel flag.

mod cancel;
mod capture_loop;
mod events;
pub mod queue;

pub use cancel::CancelToken;
pub use capture_loop::{CaptureLoop, LoopConfig, UiChannels};
pub use events::{LoopExit, LoopReport, LoopStats, Notification, ScanSource, SubmitError};

use crate::attendance::{AttendanceLedger, LedgerView};
use crate::capture::{Frame, FrameSource};
use crate::decode::BarcodeDecoder;
use crate::metrics::MetricsRegistry;
use std::sync::Arc;
use std::thread::JoinHandle;
use thiserror::Error;

/// Errors starting or joining the capture worker.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to spawn capture thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("capture thread panicked")]
    WorkerPanicked,
    #[error("manual entry queue is full")]
    ManualQueueFull,
}

/// UI-side handle to a running capture worker.
pub struct CaptureHandle {
    thread: JoinHandle<LoopReport>,
    cancel: CancelToken,
    channels: UiChannels,
    ledger: LedgerView,
}

/// Starts a capture loop on a dedicated thread.
pub fn spawn<S, D>(
    source: S,
    decoder: D,
    ledger: AttendanceLedger,
    config: &LoopConfig,
    metrics: Option<Arc<MetricsRegistry>>,
) -> Result<CaptureHandle, PipelineError>
where
    S: FrameSource + 'static,
    D: BarcodeDecoder + 'static,
{
    let cancel = CancelToken::new();
    let view = ledger.view();
    let (mut capture, channels) = CaptureLoop::new(source, decoder, ledger, config, cancel.clone());
    if let Some(registry) = metrics {
        capture = capture.with_metrics(registry);
    }

    let thread = std::thread::Builder::new()
        .name("capture".into())
        .spawn(move || capture.run())?;

    Ok(CaptureHandle {
        thread,
        cancel,
        channels,
        ledger: view,
    })
}

impl CaptureHandle {
    /// Returns the newest preview frame, discarding older ones.
    pub fn latest_frame(&self) -> Option<Frame> {
        self.channels.display.latest()
    }

    /// Takes all pending alerts, oldest first.
    pub fn notifications(&self) -> Vec<Notification> {
        self.channels.notifications.drain()
    }

    /// Queues typed text for the worker. Fails rather than evicting an
    /// earlier entry when the queue is full.
    pub fn submit_manual(&self, text: impl Into<String>) -> Result<(), PipelineError> {
        self.channels
            .manual
            .try_push(text.into())
            .map_err(|_| PipelineError::ManualQueueFull)
    }

    /// Read access to the attendance records.
    pub fn ledger(&self) -> &LedgerView {
        &self.ledger
    }

    /// A token that stops the worker when cancelled, e.g. from a
    /// signal handler.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Waits for the worker to exit.
    pub fn join(self) -> Result<LoopReport, PipelineError> {
        self.thread.join().map_err(|_| PipelineError::WorkerPanicked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attendance::{Identifier, MemoryJournal, Person, Roster};
    use crate::capture::{CaptureConfig, MockCamera, MockStep};
    use crate::decode::Code39Decoder;
    use std::time::{Duration, Instant};

    fn loop_config() -> LoopConfig {
        LoopConfig {
            frame_timeout: Duration::from_millis(5),
            display_interval: Duration::ZERO,
            ..LoopConfig::default()
        }
    }

    fn wait_for<T>(mut poll: impl FnMut() -> Option<T>) -> Option<T> {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if let Some(v) = poll() {
                return Some(v);
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        None
    }

    #[test]
    fn test_spawned_worker_logs_in_scanned_badge() {
        let mut roster = Roster::new();
        roster.insert(Identifier::parse("5150").unwrap(), Person::new("Grace", "Hopper"));
        let ledger = AttendanceLedger::new(roster, MemoryJournal::new());
        let camera = MockCamera::new(CaptureConfig::with_dimensions(320, 60))
            .with_script([MockStep::Barcode("5150".into())])
            .then_idle(MockStep::Timeout);

        let handle = spawn(camera, Code39Decoder::new(), ledger, &loop_config(), None).unwrap();

        let seen = wait_for(|| (handle.ledger().logged_in_count() == 1).then_some(()));
        assert!(seen.is_some());
        assert!(handle.latest_frame().is_some());
        assert!(!handle.is_finished());

        handle.cancel();
        let report = handle.join().unwrap();
        assert_eq!(report.exit, LoopExit::Cancelled);
        assert_eq!(report.stats.logins, 1);
    }

    #[test]
    fn test_manual_queue_full() {
        let ledger = AttendanceLedger::new(Roster::new(), MemoryJournal::new());
        let camera = MockCamera::unavailable(CaptureConfig::default());
        let config = LoopConfig {
            manual_capacity: 1,
            ..loop_config()
        };
        let handle = spawn(camera, Code39Decoder::new(), ledger, &config, None).unwrap();
        // The worker stops at once and never drains the queue.
        assert!(wait_for(|| handle.is_finished().then_some(())).is_some());

        handle.submit_manual("1").unwrap();
        assert!(matches!(
            handle.submit_manual("2"),
            Err(PipelineError::ManualQueueFull)
        ));
        let notes = handle.notifications();
        assert!(matches!(notes.last(), Some(Notification::Shutdown(LoopExit::DeviceFailed(_)))));
    }
}
