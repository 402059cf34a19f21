//! Attendance bookkeeping.
//!
//! Identifiers coming off the scanner are normalized, passed through a
//! cooldown gate, and applied to the ledger, which toggles each student
//! between logged in and logged out and accumulates their hours.
//!
//! Registration (who is a student) and persistence (where sessions are
//! stored) are collaborators behind the [`Registration`] and
//! [`Persistence`] traits.

mod debounce;
mod identifier;
mod journal;
mod ledger;
mod record;
mod roster;

pub use debounce::DebounceGate;
pub use identifier::{Identifier, IdentifierError, IdentifierKind};
pub use journal::{MemoryJournal, Persistence, SessionEvent, TracingJournal};
pub use ledger::{AttendanceLedger, LedgerError, LedgerEvent, LedgerView};
pub use record::{AttendanceRecord, AttendanceState, Person};
pub use roster::{Registration, Roster, RosterEntry};
