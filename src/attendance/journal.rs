//! Session events handed to durable storage.

use super::Identifier;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;

/// One ledger transition, as storage sees it.
///
/// A login carries no logout and a zero delta; a logout carries both
/// timestamps and the session length.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionEvent {
    pub identifier: Identifier,
    pub login: DateTime<Utc>,
    pub logout: Option<DateTime<Utc>>,
    pub hours_delta: f64,
}

/// Consumer of session events.
pub trait Persistence: Send {
    fn record(&mut self, event: &SessionEvent);
}

/// Writes events to the log instead of storage.
#[derive(Debug, Default)]
pub struct TracingJournal;

impl Persistence for TracingJournal {
    fn record(&mut self, event: &SessionEvent) {
        match event.logout {
            None => tracing::info!(
                identifier = %event.identifier,
                login = %event.login,
                "Session opened"
            ),
            Some(logout) => tracing::info!(
                identifier = %event.identifier,
                login = %event.login,
                logout = %logout,
                hours = event.hours_delta,
                "Session closed"
            ),
        }
    }
}

/// Keeps events in memory. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemoryJournal {
    events: Arc<Mutex<Vec<SessionEvent>>>,
}

impl MemoryJournal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies out everything recorded so far.
    pub fn events(&self) -> Vec<SessionEvent> {
        self.events.lock().clone()
    }
}

impl Persistence for MemoryJournal {
    fn record(&mut self, event: &SessionEvent) {
        self.events.lock().push(event.clone());
    }
}
