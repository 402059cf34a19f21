//! Messages and bookkeeping passed from the capture worker to the UI.

use crate::attendance::{IdentifierError, LedgerError, LedgerEvent};
use crate::capture::CaptureError;
use thiserror::Error;

/// Where a submission came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanSource {
    /// Decoded from a camera frame.
    Camera,
    /// Typed into the ID field.
    Manual,
}

/// Why a submission was turned away.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Identifier(#[from] IdentifierError),
}

/// Why the capture loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopExit {
    /// The cancel token was set.
    Cancelled,
    /// The frame source could not be opened or failed for good.
    DeviceFailed(CaptureError),
}

/// User-facing alert produced by the worker.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    Accepted {
        event: LedgerEvent,
        source: ScanSource,
    },
    Rejected {
        input: String,
        source: ScanSource,
        error: SubmitError,
    },
    /// Last message from a stopping worker.
    Shutdown(LoopExit),
}

/// Counters kept by the capture loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub frames: u64,
    pub timeouts: u64,
    pub decodes: u64,
    pub debounced: u64,
    pub logins: u64,
    pub logouts: u64,
    pub rejections: u64,
    pub manual_entries: u64,
    pub display_published: u64,
    pub display_evicted: u64,
    pub notifications_evicted: u64,
}

/// Final outcome of a capture loop run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopReport {
    pub exit: LoopExit,
    pub stats: LoopStats,
}
