//! Cooperative cancellation flag shared between the UI and the worker.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Set once by any holder; observed by the capture worker between
/// frame acquisitions.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}
