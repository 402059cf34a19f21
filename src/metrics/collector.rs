//! Metrics collection and registry.

use crate::attendance::LedgerView;
use crate::pipeline::LoopStats;
use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};
use thiserror::Error;

/// Errors that can occur during metrics operations.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
}

/// A snapshot of system state for metrics update.
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    /// Whether the capture loop is running.
    pub running: bool,
    /// Capture loop counters.
    pub stats: LoopStats,
    /// Students currently logged in.
    pub logged_in: usize,
    /// Records held by the ledger.
    pub records: usize,
}

impl MetricsSnapshot {
    /// Creates a snapshot from the loop counters and the ledger.
    pub fn from_components(stats: &LoopStats, ledger: &LedgerView, running: bool) -> Self {
        Self {
            running,
            stats: *stats,
            logged_in: ledger.logged_in_count(),
            records: ledger.len(),
        }
    }
}

/// Prometheus metrics registry for the attendance pipeline.
pub struct MetricsRegistry {
    registry: Registry,

    // Loop state
    loop_running: IntGauge,

    // Capture metrics
    frames_total: IntCounter,
    timeouts_total: IntCounter,
    display_published_total: IntCounter,
    display_evicted_total: IntCounter,

    // Scan metrics
    decodes_total: IntCounter,
    debounced_total: IntCounter,
    manual_entries_total: IntCounter,

    // Ledger metrics
    logins_total: IntCounter,
    logouts_total: IntCounter,
    rejections_total: IntCounter,
    notifications_evicted_total: IntCounter,
    logged_in: IntGauge,
    records: IntGauge,
}

fn counter(registry: &Registry, name: &str, help: &str) -> Result<IntCounter, MetricsError> {
    let c = IntCounter::new(name, help)?;
    registry.register(Box::new(c.clone()))?;
    Ok(c)
}

fn gauge(registry: &Registry, name: &str, help: &str) -> Result<IntGauge, MetricsError> {
    let g = IntGauge::new(name, help)?;
    registry.register(Box::new(g.clone()))?;
    Ok(g)
}

/// Moves a counter forward to `value`; counters never go backwards.
fn advance(counter: &IntCounter, value: u64) {
    let current = counter.get();
    if value > current {
        counter.inc_by(value - current);
    }
}

impl MetricsRegistry {
    /// Creates a new metrics registry with all pipeline metrics registered.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();
        let r = &registry;

        Ok(Self {
            loop_running: gauge(
                r,
                "grizzlytime_capture_running",
                "Capture loop state (1=running, 0=stopped)",
            )?,
            frames_total: counter(r, "grizzlytime_frames_total", "Frames captured")?,
            timeouts_total: counter(
                r,
                "grizzlytime_frame_timeouts_total",
                "Frame acquisitions that timed out",
            )?,
            display_published_total: counter(
                r,
                "grizzlytime_display_frames_total",
                "Frames published for preview",
            )?,
            display_evicted_total: counter(
                r,
                "grizzlytime_display_frames_dropped_total",
                "Preview frames dropped before the UI took them",
            )?,
            decodes_total: counter(r, "grizzlytime_decodes_total", "Barcodes decoded")?,
            debounced_total: counter(
                r,
                "grizzlytime_debounced_scans_total",
                "Decoded scans suppressed by the cooldown window",
            )?,
            manual_entries_total: counter(
                r,
                "grizzlytime_manual_entries_total",
                "Identifiers typed into the ID field",
            )?,
            logins_total: counter(r, "grizzlytime_logins_total", "Accepted logins")?,
            logouts_total: counter(r, "grizzlytime_logouts_total", "Accepted logouts")?,
            rejections_total: counter(
                r,
                "grizzlytime_rejections_total",
                "Submissions rejected by the ledger or identifier parsing",
            )?,
            notifications_evicted_total: counter(
                r,
                "grizzlytime_notifications_dropped_total",
                "Notifications dropped before the UI took them",
            )?,
            logged_in: gauge(
                r,
                "grizzlytime_logged_in",
                "Students currently logged in",
            )?,
            records: gauge(r, "grizzlytime_records", "Attendance records in the ledger")?,
            registry,
        })
    }

    /// Updates all metrics from a snapshot of system state.
    pub fn update(&self, snapshot: &MetricsSnapshot) {
        let s = &snapshot.stats;
        self.loop_running.set(i64::from(snapshot.running));

        advance(&self.frames_total, s.frames);
        advance(&self.timeouts_total, s.timeouts);
        advance(&self.display_published_total, s.display_published);
        advance(&self.display_evicted_total, s.display_evicted);
        advance(&self.decodes_total, s.decodes);
        advance(&self.debounced_total, s.debounced);
        advance(&self.manual_entries_total, s.manual_entries);
        advance(&self.logins_total, s.logins);
        advance(&self.logouts_total, s.logouts);
        advance(&self.rejections_total, s.rejections);
        advance(&self.notifications_evicted_total, s.notifications_evicted);

        self.logged_in.set(snapshot.logged_in as i64);
        self.records.set(snapshot.records as i64);
    }

    /// Returns true if the last snapshot reported a running loop.
    pub fn capture_running(&self) -> bool {
        self.loop_running.get() == 1
    }

    /// Returns the underlying Prometheus registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encodes all metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}
