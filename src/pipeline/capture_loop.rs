//! The capture worker: frame source to decoder to gate to ledger.
//!
//! ```text
//! FrameSource ──frame──▶ display queue (throttled, lossy)
//!      │
//!      ▼
//! BarcodeDecoder ─▶ DebounceGate ─▶ AttendanceLedger ─▶ notification queue
//!                                          ▲
//!                         manual queue ────┘
//! ```
//!
//! Everything runs on one thread, so frames are handled in source order
//! and the ledger sees one submission at a time.

use super::events::{LoopExit, LoopReport, LoopStats, Notification, ScanSource, SubmitError};
use super::queue::{self, Consumer, Producer};
use super::CancelToken;
use crate::attendance::{AttendanceLedger, DebounceGate, Identifier, LedgerEvent};
use crate::capture::{DeviceGuard, Frame, FrameSource};
use crate::config::FileConfig;
use crate::decode::BarcodeDecoder;
use crate::metrics::{MetricsRegistry, MetricsSnapshot};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Minimum spacing of "queue full" warnings.
const DROP_WARN_INTERVAL: Duration = Duration::from_secs(10);

/// Timing and queue sizing for the capture loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopConfig {
    /// Upper bound on one blocking frame acquisition.
    pub frame_timeout: Duration,
    /// Cooldown between accepted scans of the same identifier.
    pub cooldown_window: Duration,
    /// Minimum spacing of preview frames.
    pub display_interval: Duration,
    pub display_capacity: usize,
    pub notification_capacity: usize,
    pub manual_capacity: usize,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self::from_file(&FileConfig::default())
    }
}

impl LoopConfig {
    pub fn from_file(config: &FileConfig) -> Self {
        Self {
            frame_timeout: config.capture.frame_timeout(),
            cooldown_window: config.attendance.cooldown_window(),
            display_interval: Duration::from_millis(config.pipeline.display_interval_ms),
            display_capacity: config.pipeline.display_capacity,
            notification_capacity: config.pipeline.notification_capacity,
            manual_capacity: config.pipeline.manual_capacity,
        }
    }
}

/// UI-side ends of the loop's queues.
pub struct UiChannels {
    /// Preview frames.
    pub display: Consumer<Frame>,
    /// Login/logout/rejection/shutdown alerts.
    pub notifications: Consumer<Notification>,
    /// Typed identifiers headed for the ledger.
    pub manual: Producer<String>,
}

/// Everything the loop touches besides the frame source.
struct Stages<D> {
    decoder: D,
    gate: DebounceGate,
    ledger: AttendanceLedger,
    display: Producer<Frame>,
    notifications: Producer<Notification>,
    manual: Consumer<String>,
    display_interval: Duration,
    last_display: Option<Instant>,
    stats: LoopStats,
    metrics: Option<Arc<MetricsRegistry>>,
    /// Latest time handed to the gate or ledger. Never moves backwards.
    clock: Option<DateTime<Utc>>,
    last_drop_warning: Option<Instant>,
}

/// Long-running capture worker. Call [`CaptureLoop::run`] on a
/// dedicated thread.
pub struct CaptureLoop<S, D> {
    source: S,
    stages: Stages<D>,
    frame_timeout: Duration,
    cancel: CancelToken,
}

impl<S: FrameSource, D: BarcodeDecoder> CaptureLoop<S, D> {
    /// Builds a loop and the UI ends of its queues.
    pub fn new(
        source: S,
        decoder: D,
        ledger: AttendanceLedger,
        config: &LoopConfig,
        cancel: CancelToken,
    ) -> (Self, UiChannels) {
        let (display_tx, display_rx) = queue::bounded(config.display_capacity);
        let (notify_tx, notify_rx) = queue::bounded(config.notification_capacity);
        let (manual_tx, manual_rx) = queue::bounded(config.manual_capacity);

        let capture = Self {
            source,
            stages: Stages {
                decoder,
                gate: DebounceGate::new(config.cooldown_window),
                ledger,
                display: display_tx,
                notifications: notify_tx,
                manual: manual_rx,
                display_interval: config.display_interval,
                last_display: None,
                stats: LoopStats::default(),
                metrics: None,
                clock: None,
                last_drop_warning: None,
            },
            frame_timeout: config.frame_timeout,
            cancel,
        };
        let channels = UiChannels {
            display: display_rx,
            notifications: notify_rx,
            manual: manual_tx,
        };
        (capture, channels)
    }

    /// Publishes loop counters to `registry` after every iteration.
    pub fn with_metrics(mut self, registry: Arc<MetricsRegistry>) -> Self {
        self.stages.metrics = Some(registry);
        self
    }

    /// Runs until cancelled or the source fails for good.
    ///
    /// The device is closed exactly once on the way out, and a
    /// `Notification::Shutdown` is always the last message queued.
    pub fn run(mut self) -> LoopReport {
        tracing::info!(timeout = ?self.frame_timeout, "Capture loop starting");
        let exit = self.run_until_exit();

        let stages = &mut self.stages;
        stages.refresh_eviction_counts();
        stages.publish_metrics(false);
        stages.notify(Notification::Shutdown(exit.clone()));

        match &exit {
            LoopExit::Cancelled => tracing::info!(
                frames = stages.stats.frames,
                logins = stages.stats.logins,
                logouts = stages.stats.logouts,
                "Capture loop stopped"
            ),
            LoopExit::DeviceFailed(e) => tracing::error!(
                error = %e,
                frames = stages.stats.frames,
                "Capture loop stopped on device failure"
            ),
        }

        LoopReport {
            exit,
            stats: stages.stats,
        }
    }

    fn run_until_exit(&mut self) -> LoopExit {
        let mut device = match DeviceGuard::open(&mut self.source) {
            Ok(device) => device,
            Err(e) => {
                tracing::error!(error = %e, "Could not open frame source");
                return LoopExit::DeviceFailed(e);
            }
        };
        let stages = &mut self.stages;

        loop {
            if self.cancel.is_cancelled() {
                return LoopExit::Cancelled;
            }

            match device.next_frame(self.frame_timeout) {
                Ok(frame) => stages.on_frame(frame),
                Err(e) if e.is_recoverable() => {
                    stages.stats.timeouts += 1;
                    tracing::trace!(error = %e, "Frame acquisition timed out");
                }
                Err(e) => {
                    tracing::error!(error = %e, "Frame source failed");
                    return LoopExit::DeviceFailed(e);
                }
            }

            stages.drain_manual();
            stages.refresh_eviction_counts();
            stages.publish_metrics(true);
        }
    }
}

impl<D: BarcodeDecoder> Stages<D> {
    fn on_frame(&mut self, frame: Frame) {
        self.stats.frames += 1;
        self.publish_display(&frame);

        let Some(decoded) = self.decoder.decode(&frame) else {
            return;
        };
        self.stats.decodes += 1;

        let identifier = match Identifier::parse(&decoded.text) {
            Ok(id) => id,
            Err(e) => {
                tracing::debug!(text = %decoded.text, error = %e, "Ignoring unusable barcode");
                return;
            }
        };

        // A frame may have been captured before a typed entry that was
        // already applied.
        let now = self.stamp(decoded.decoded_at);
        if self.gate.accept(&identifier, now) {
            self.submit(&identifier, now, ScanSource::Camera);
        } else {
            self.stats.debounced += 1;
        }
    }

    fn publish_display(&mut self, frame: &Frame) {
        let due = self
            .last_display
            .map_or(true, |last| frame.instant().duration_since(last) >= self.display_interval);
        if !due {
            return;
        }
        self.last_display = Some(frame.instant());
        self.stats.display_published += 1;
        if !self.display.push(frame.clone()) {
            tracing::trace!(sequence = frame.sequence(), "Display queue full, oldest frame dropped");
            self.warn_dropped("display");
        }
    }

    fn drain_manual(&mut self) {
        while let Some(text) = self.manual.pop() {
            self.stats.manual_entries += 1;
            match Identifier::parse(&text) {
                Ok(identifier) => {
                    let now = self.stamp(Utc::now());
                    // The badge is probably still in front of the camera.
                    self.gate.mark(&identifier, now);
                    self.submit(&identifier, now, ScanSource::Manual);
                }
                Err(e) => {
                    self.stats.rejections += 1;
                    tracing::warn!(input = %text, error = %e, "Typed identifier rejected");
                    self.notify(Notification::Rejected {
                        input: text,
                        source: ScanSource::Manual,
                        error: SubmitError::Identifier(e),
                    });
                }
            }
        }
    }

    fn submit(&mut self, identifier: &Identifier, now: DateTime<Utc>, source: ScanSource) {
        match self.ledger.submit(identifier, now) {
            Ok(event) => {
                match event {
                    LedgerEvent::Login { .. } => self.stats.logins += 1,
                    LedgerEvent::Logout { .. } => self.stats.logouts += 1,
                }
                self.notify(Notification::Accepted { event, source });
            }
            Err(e) => {
                self.stats.rejections += 1;
                tracing::warn!(%identifier, error = %e, ?source, "Submission rejected");
                self.notify(Notification::Rejected {
                    input: identifier.to_string(),
                    source,
                    error: SubmitError::Ledger(e),
                });
            }
        }
    }

    fn notify(&mut self, notification: Notification) {
        if !self.notifications.push(notification) {
            tracing::debug!("Notification queue full, oldest alert dropped");
            self.warn_dropped("notification");
        }
    }

    fn stamp(&mut self, at: DateTime<Utc>) -> DateTime<Utc> {
        let at = self.clock.map_or(at, |clock| clock.max(at));
        self.clock = Some(at);
        at
    }

    fn warn_dropped(&mut self, queue: &'static str) {
        let due = self
            .last_drop_warning
            .map_or(true, |last| last.elapsed() >= DROP_WARN_INTERVAL);
        if due {
            self.last_drop_warning = Some(Instant::now());
            tracing::warn!(
                queue,
                display_evicted = self.display.evicted(),
                notifications_evicted = self.notifications.evicted(),
                "UI is not keeping up; queued items dropped"
            );
        }
    }

    fn refresh_eviction_counts(&mut self) {
        self.stats.display_evicted = self.display.evicted();
        self.stats.notifications_evicted = self.notifications.evicted();
    }

    fn publish_metrics(&self, running: bool) {
        if let Some(registry) = &self.metrics {
            let view = self.ledger.view();
            registry.update(&MetricsSnapshot::from_components(&self.stats, &view, running));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attendance::{LedgerError, MemoryJournal, Person, Roster};
    use crate::capture::{CaptureConfig, CaptureError, MockCamera, MockStep};
    use crate::decode::Code39Decoder;
    use std::sync::atomic::Ordering;

    fn config() -> LoopConfig {
        LoopConfig {
            frame_timeout: Duration::from_millis(5),
            cooldown_window: Duration::from_secs(5),
            display_interval: Duration::ZERO,
            display_capacity: 2,
            notification_capacity: 64,
            manual_capacity: 8,
        }
    }

    fn mock_camera() -> MockCamera {
        MockCamera::new(CaptureConfig::with_dimensions(320, 60))
    }

    fn test_ledger() -> (AttendanceLedger, MemoryJournal) {
        let mut roster = Roster::new();
        roster.insert(Identifier::parse("1234").unwrap(), Person::new("Ada", "Lovelace"));
        let journal = MemoryJournal::new();
        (AttendanceLedger::new(roster, journal.clone()), journal)
    }

    fn accepted(notes: &[Notification]) -> Vec<&LedgerEvent> {
        notes
            .iter()
            .filter_map(|n| match n {
                Notification::Accepted { event, .. } => Some(event),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_disconnect_stops_loop_and_closes_once() {
        let camera = mock_camera().with_script([MockStep::Blank, MockStep::Disconnect]);
        let closes = camera.close_counter();
        let (ledger, _) = test_ledger();
        let (capture, ui) =
            CaptureLoop::new(camera, Code39Decoder::new(), ledger, &config(), CancelToken::new());

        let report = capture.run();

        assert!(matches!(
            report.exit,
            LoopExit::DeviceFailed(CaptureError::DeviceDisconnected(_))
        ));
        assert_eq!(report.stats.frames, 1);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        let notes = ui.notifications.drain();
        assert!(matches!(notes.last(), Some(Notification::Shutdown(LoopExit::DeviceFailed(_)))));
    }

    #[test]
    fn test_unavailable_device_reports_shutdown() {
        let camera = MockCamera::unavailable(CaptureConfig::default());
        let closes = camera.close_counter();
        let (ledger, _) = test_ledger();
        let (capture, ui) =
            CaptureLoop::new(camera, Code39Decoder::new(), ledger, &config(), CancelToken::new());

        let report = capture.run();

        assert!(matches!(
            report.exit,
            LoopExit::DeviceFailed(CaptureError::DeviceUnavailable(_))
        ));
        assert_eq!(closes.load(Ordering::SeqCst), 0);
        assert!(matches!(ui.notifications.pop(), Some(Notification::Shutdown(_))));
    }

    #[test]
    fn test_lingering_badge_toggles_once() {
        let scans = std::iter::repeat(MockStep::Barcode("1234".into())).take(6);
        let camera = mock_camera()
            .with_script(scans.chain([MockStep::Disconnect]));
        let (ledger, journal) = test_ledger();
        let (capture, ui) =
            CaptureLoop::new(camera, Code39Decoder::new(), ledger, &config(), CancelToken::new());

        let report = capture.run();

        assert_eq!(report.stats.decodes, 6);
        assert_eq!(report.stats.debounced, 5);
        assert_eq!(report.stats.logins, 1);
        assert_eq!(report.stats.logouts, 0);
        assert_eq!(journal.events().len(), 1);

        let notes = ui.notifications.drain();
        let events = accepted(&notes);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], LedgerEvent::Login { .. }));
    }

    #[test]
    fn test_unknown_badge_reported_once_per_acceptance() {
        let scans = std::iter::repeat(MockStep::Barcode("9999".into())).take(3);
        let camera = mock_camera().with_script(scans.chain([MockStep::Disconnect]));
        let (ledger, _) = test_ledger();
        let (capture, ui) =
            CaptureLoop::new(camera, Code39Decoder::new(), ledger, &config(), CancelToken::new());

        let report = capture.run();

        assert_eq!(report.stats.rejections, 1);
        let rejected: Vec<_> = ui
            .notifications
            .drain()
            .into_iter()
            .filter(|n| matches!(n, Notification::Rejected { .. }))
            .collect();
        assert_eq!(rejected.len(), 1);
        assert!(matches!(
            &rejected[0],
            Notification::Rejected {
                source: ScanSource::Camera,
                error: SubmitError::Ledger(LedgerError::UnknownIdentifier(_)),
                ..
            }
        ));
    }

    #[test]
    fn test_manual_entries_bypass_debounce() {
        let camera = mock_camera().then_idle(MockStep::Timeout);
        let (ledger, _) = test_ledger();
        let cancel = CancelToken::new();
        let (capture, ui) =
            CaptureLoop::new(camera, Code39Decoder::new(), ledger, &config(), cancel.clone());

        ui.manual.try_push("1234".into()).unwrap();
        ui.manual.try_push(" 1234 ".into()).unwrap();
        ui.manual.try_push("".into()).unwrap();

        let worker = std::thread::spawn(move || capture.run());
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut notes = Vec::new();
        while notes.len() < 3 && Instant::now() < deadline {
            notes.extend(ui.notifications.drain());
            std::thread::sleep(Duration::from_millis(2));
        }
        cancel.cancel();
        let report = worker.join().unwrap();

        assert_eq!(report.stats.manual_entries, 3);
        assert_eq!(report.stats.logins, 1);
        assert_eq!(report.stats.logouts, 1);
        assert!(matches!(
            notes[2],
            Notification::Rejected {
                source: ScanSource::Manual,
                error: SubmitError::Identifier(_),
                ..
            }
        ));
    }

    fn badge_frame(content: &str, captured_at: DateTime<Utc>) -> Frame {
        let mut camera = mock_camera().with_script([MockStep::Barcode(content.into())]);
        camera.open().unwrap();
        let frame = camera.next_frame(Duration::from_millis(1)).unwrap();
        Frame::captured_at(
            frame.pixels().to_vec(),
            frame.width(),
            frame.height(),
            frame.sequence(),
            captured_at,
        )
    }

    #[test]
    fn test_frame_older_than_typed_entry_is_debounced() {
        let (ledger, journal) = test_ledger();
        let (mut capture, ui) =
            CaptureLoop::new(mock_camera(), Code39Decoder::new(), ledger, &config(), CancelToken::new());
        let stale = badge_frame("1234", Utc::now() - chrono::Duration::seconds(1));

        ui.manual.try_push("1234".into()).unwrap();
        capture.stages.drain_manual();
        capture.stages.on_frame(stale);

        let stats = capture.stages.stats;
        assert_eq!(stats.logins, 1);
        assert_eq!(stats.debounced, 1);
        assert_eq!(stats.rejections, 0);
        assert_eq!(journal.events().len(), 1);
        let record = capture.stages.ledger.record(&Identifier::parse("1234").unwrap()).unwrap();
        assert!(record.is_logged_in());
    }

    #[test]
    fn test_submission_clock_never_runs_backwards() {
        let mut cfg = config();
        cfg.cooldown_window = Duration::ZERO;
        let (ledger, _) = test_ledger();
        let (mut capture, ui) =
            CaptureLoop::new(mock_camera(), Code39Decoder::new(), ledger, &cfg, CancelToken::new());
        let stale = badge_frame("1234", Utc::now() - chrono::Duration::seconds(1));

        ui.manual.try_push("1234".into()).unwrap();
        capture.stages.drain_manual();
        capture.stages.on_frame(stale);

        // The stale scan logs out at the typed entry's time, not before it.
        let stats = capture.stages.stats;
        assert_eq!(stats.logins, 1);
        assert_eq!(stats.logouts, 1);
        assert_eq!(stats.rejections, 0);
        let record = capture.stages.ledger.record(&Identifier::parse("1234").unwrap()).unwrap();
        assert_eq!(record.last_login(), record.last_logout());
        assert_eq!(record.total_hours(), 0.0);
    }

    #[test]
    fn test_drop_warning_throttled() {
        let (ledger, _) = test_ledger();
        let (mut capture, _ui) =
            CaptureLoop::new(mock_camera(), Code39Decoder::new(), ledger, &config(), CancelToken::new());
        let frame = badge_frame("1234", Utc::now());

        // Capacity 2: the third unthrottled publish evicts.
        for _ in 0..3 {
            capture.stages.publish_display(&frame);
        }
        let first = capture.stages.last_drop_warning;
        assert!(first.is_some());

        capture.stages.publish_display(&frame);
        assert_eq!(capture.stages.display.evicted(), 2);
        assert_eq!(capture.stages.last_drop_warning, first);
    }

    #[test]
    fn test_timeouts_retried_until_cancelled() {
        let camera = mock_camera().then_idle(MockStep::Timeout);
        let closes = camera.close_counter();
        let (ledger, _) = test_ledger();
        let cancel = CancelToken::new();
        let (capture, ui) =
            CaptureLoop::new(camera, Code39Decoder::new(), ledger, &config(), cancel.clone());

        let worker = std::thread::spawn(move || capture.run());
        std::thread::sleep(Duration::from_millis(100));
        assert!(!worker.is_finished());

        cancel.cancel();
        let report = worker.join().unwrap();

        assert_eq!(report.exit, LoopExit::Cancelled);
        assert!(report.stats.timeouts >= 5);
        assert_eq!(report.stats.frames, 0);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert!(matches!(
            ui.notifications.drain().last(),
            Some(Notification::Shutdown(LoopExit::Cancelled))
        ));
    }

    #[test]
    fn test_cancel_exits_within_one_timeout() {
        let mut cfg = config();
        cfg.frame_timeout = Duration::from_millis(50);
        let camera = mock_camera().then_idle(MockStep::Timeout);
        let closes = camera.close_counter();
        let (ledger, _) = test_ledger();
        let cancel = CancelToken::new();
        let (capture, _ui) =
            CaptureLoop::new(camera, Code39Decoder::new(), ledger, &cfg, cancel.clone());

        let worker = std::thread::spawn(move || capture.run());
        std::thread::sleep(Duration::from_millis(75));

        let started = Instant::now();
        cancel.cancel();
        let report = worker.join().unwrap();
        let waited = started.elapsed();

        assert_eq!(report.exit, LoopExit::Cancelled);
        // One in-flight acquisition plus scheduling slack.
        assert!(waited < Duration::from_millis(50 + 250), "waited {:?}", waited);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_display_throttle_and_eviction() {
        let mut cfg = config();
        cfg.display_interval = Duration::from_secs(3600);
        let camera = mock_camera().with_script(
            std::iter::repeat(MockStep::Blank)
                .take(4)
                .chain([MockStep::Disconnect]),
        );
        let (ledger, _) = test_ledger();
        let (capture, ui) =
            CaptureLoop::new(camera, Code39Decoder::new(), ledger, &cfg, CancelToken::new());
        let report = capture.run();

        assert_eq!(report.stats.frames, 4);
        assert_eq!(report.stats.display_published, 1);
        assert_eq!(ui.display.latest().map(|f| f.sequence()), Some(1));

        // Unthrottled: capacity 2 keeps the newest two.
        let camera = mock_camera().with_script(
            std::iter::repeat(MockStep::Blank)
                .take(4)
                .chain([MockStep::Disconnect]),
        );
        let (ledger, _) = test_ledger();
        let (capture, ui) =
            CaptureLoop::new(camera, Code39Decoder::new(), ledger, &config(), CancelToken::new());
        let report = capture.run();

        assert_eq!(report.stats.display_published, 4);
        assert_eq!(report.stats.display_evicted, 2);
        let seqs: Vec<u64> = ui.display.drain().iter().map(|f| f.sequence()).collect();
        assert_eq!(seqs, vec![3, 4]);
    }

    #[test]
    fn test_metrics_follow_loop() {
        let registry = Arc::new(MetricsRegistry::new().unwrap());
        let camera = mock_camera().with_script([
            MockStep::Barcode("1234".into()),
            MockStep::Timeout,
            MockStep::Disconnect,
        ]);
        let (ledger, _) = test_ledger();
        let (capture, _ui) =
            CaptureLoop::new(camera, Code39Decoder::new(), ledger, &config(), CancelToken::new());
        capture.with_metrics(Arc::clone(&registry)).run();

        let output = registry.encode().unwrap();
        assert!(output.contains("grizzlytime_frames_total 1"));
        assert!(output.contains("grizzlytime_frame_timeouts_total 1"));
        assert!(output.contains("grizzlytime_logins_total 1"));
        assert!(output.contains("grizzlytime_logged_in 1"));
        assert!(!registry.capture_running());
    }
}
