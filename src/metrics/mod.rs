//! Prometheus metrics for the attendance pipeline.
//!
//! The capture worker pushes a [`MetricsSnapshot`] into the registry
//! after every iteration; the registry is shared behind an `Arc` with the
//! optional HTTP exporter.
//!
//! # Metrics Exposed
//!
//! ## Capture
//! - `grizzlytime_capture_running` - Capture loop state (1=running, 0=stopped)
//! - `grizzlytime_frames_total` - Frames captured
//! - `grizzlytime_frame_timeouts_total` - Acquisitions that timed out
//! - `grizzlytime_display_frames_total` / `grizzlytime_display_frames_dropped_total`
//!
//! ## Scans
//! - `grizzlytime_decodes_total` - Barcodes decoded
//! - `grizzlytime_debounced_scans_total` - Scans suppressed by the cooldown
//! - `grizzlytime_manual_entries_total` - Typed identifiers
//!
//! ## Ledger
//! - `grizzlytime_logins_total` / `grizzlytime_logouts_total`
//! - `grizzlytime_rejections_total` - Unknown identifiers, clock skew, bad input
//! - `grizzlytime_notifications_dropped_total`
//! - `grizzlytime_logged_in` - Students currently logged in
//! - `grizzlytime_records` - Records held by the ledger
//!
//! # Example
//!
//! ```no_run
//! use grizzlytime::metrics::{MetricsRegistry, MetricsSnapshot};
//!
//! let registry = MetricsRegistry::new().expect("Failed to create registry");
//! registry.update(&MetricsSnapshot {
//!     running: true,
//!     logged_in: 4,
//!     ..Default::default()
//! });
//! println!("{}", registry.encode().unwrap());
//! ```

mod collector;
#[cfg(feature = "metrics")]
mod server;

pub use collector::{MetricsError, MetricsRegistry, MetricsSnapshot};
#[cfg(feature = "metrics")]
pub use server::{MetricsServer, MetricsServerConfig, ServerError};
