//! The attendance ledger: authoritative login/logout state.
//!
//! Each identifier toggles strictly between `LoggedOut` and `LoggedIn`.
//! The ledger is the only writer of its record map; other threads read
//! it through a [`LedgerView`].

use super::{
    AttendanceRecord, AttendanceState, Identifier, Person, Persistence, Registration,
    SessionEvent,
};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

type RecordMap = BTreeMap<Identifier, AttendanceRecord>;

/// Rejected submissions. No variant changes any record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("unknown identifier {0}; register before scanning")]
    UnknownIdentifier(Identifier),
    #[error("logout of {identifier} at {now} precedes its login at {last_login}")]
    NegativeDuration {
        identifier: Identifier,
        last_login: DateTime<Utc>,
        now: DateTime<Utc>,
    },
    #[error("login of {identifier} at {now} precedes its logout at {last_logout}")]
    LoginBeforeLogout {
        identifier: Identifier,
        last_logout: DateTime<Utc>,
        now: DateTime<Utc>,
    },
}

/// Result of an accepted submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum LedgerEvent {
    Login {
        identifier: Identifier,
        name: String,
        at: DateTime<Utc>,
        guest: bool,
    },
    Logout {
        identifier: Identifier,
        name: String,
        at: DateTime<Utc>,
        session_hours: f64,
        total_hours: f64,
    },
}

impl LedgerEvent {
    pub fn identifier(&self) -> &Identifier {
        match self {
            LedgerEvent::Login { identifier, .. } | LedgerEvent::Logout { identifier, .. } => {
                identifier
            }
        }
    }
}

/// Owns the attendance records and applies scans to them.
pub struct AttendanceLedger {
    records: Arc<RwLock<RecordMap>>,
    registration: Box<dyn Registration>,
    persistence: Box<dyn Persistence>,
    guest_fallback: bool,
}

impl AttendanceLedger {
    pub fn new(
        registration: impl Registration + 'static,
        persistence: impl Persistence + 'static,
    ) -> Self {
        Self {
            records: Arc::new(RwLock::new(BTreeMap::new())),
            registration: Box::new(registration),
            persistence: Box::new(persistence),
            guest_fallback: false,
        }
    }

    /// Lets unregistered identifiers in as guests instead of failing.
    pub fn with_guest_fallback(mut self, enabled: bool) -> Self {
        self.guest_fallback = enabled;
        self
    }

    /// Adds a logged-out record. Returns false if one already exists.
    pub fn register(&mut self, identifier: Identifier, person: Person) -> bool {
        match self.records.write().entry(identifier) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                tracing::debug!(identifier = %slot.key(), "Registered student");
                let record = AttendanceRecord::new(slot.key().clone(), person);
                slot.insert(record);
                true
            }
        }
    }

    /// Toggles `identifier` at time `now`.
    pub fn submit(
        &mut self,
        identifier: &Identifier,
        now: DateTime<Utc>,
    ) -> Result<LedgerEvent, LedgerError> {
        let (event, session) = {
            let mut records = self.records.write();
            let record = match records.entry(identifier.clone()) {
                Entry::Occupied(slot) => slot.into_mut(),
                Entry::Vacant(slot) => {
                    let record = create_record(
                        self.registration.as_ref(),
                        self.guest_fallback,
                        identifier,
                    )?;
                    slot.insert(record)
                }
            };
            transition(record, now)?
        };

        self.persistence.record(&session);
        Ok(event)
    }

    /// Returns a copy of one record.
    pub fn record(&self, identifier: &Identifier) -> Option<AttendanceRecord> {
        self.records.read().get(identifier).cloned()
    }

    /// Returns a read-only handle for other threads.
    pub fn view(&self) -> LedgerView {
        LedgerView {
            records: Arc::clone(&self.records),
        }
    }
}

fn create_record(
    registration: &dyn Registration,
    guest_fallback: bool,
    identifier: &Identifier,
) -> Result<AttendanceRecord, LedgerError> {
    match registration.lookup(identifier) {
        Some(person) => Ok(AttendanceRecord::new(identifier.clone(), person)),
        None if guest_fallback => {
            tracing::info!(%identifier, "Unregistered identifier admitted as guest");
            Ok(AttendanceRecord::guest(identifier.clone()))
        }
        None => Err(LedgerError::UnknownIdentifier(identifier.clone())),
    }
}

fn transition(
    record: &mut AttendanceRecord,
    now: DateTime<Utc>,
) -> Result<(LedgerEvent, SessionEvent), LedgerError> {
    let identifier = record.identifier().clone();
    match record.state() {
        AttendanceState::LoggedOut => {
            record.login(now)?;
            tracing::info!(%identifier, at = %now, "Login");
            Ok((
                LedgerEvent::Login {
                    identifier: identifier.clone(),
                    name: record.display_name(),
                    at: now,
                    guest: record.is_guest(),
                },
                SessionEvent {
                    identifier,
                    login: now,
                    logout: None,
                    hours_delta: 0.0,
                },
            ))
        }
        AttendanceState::LoggedIn => {
            let session_hours = record.logout(now)?;
            let login = record.last_login().unwrap_or(now);
            tracing::info!(%identifier, at = %now, hours = session_hours, "Logout");
            Ok((
                LedgerEvent::Logout {
                    identifier: identifier.clone(),
                    name: record.display_name(),
                    at: now,
                    session_hours,
                    total_hours: record.total_hours(),
                },
                SessionEvent {
                    identifier,
                    login,
                    logout: Some(now),
                    hours_delta: session_hours,
                },
            ))
        }
    }
}

/// Synchronized read access to the ledger's records.
#[derive(Clone)]
pub struct LedgerView {
    records: Arc<RwLock<RecordMap>>,
}

impl LedgerView {
    /// Copies every record, ordered by identifier.
    pub fn snapshot(&self) -> Vec<AttendanceRecord> {
        self.records.read().values().cloned().collect()
    }

    /// Copies the records currently logged in.
    pub fn logged_in(&self) -> Vec<AttendanceRecord> {
        self.records
            .read()
            .values()
            .filter(|r| r.is_logged_in())
            .cloned()
            .collect()
    }

    pub fn logged_in_count(&self) -> usize {
        self.records
            .read()
            .values()
            .filter(|r| r.is_logged_in())
            .count()
    }

    pub fn get(&self, identifier: &Identifier) -> Option<AttendanceRecord> {
        self.records.read().get(identifier).cloned()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}
