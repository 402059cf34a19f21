//! Per-student attendance record and its login/logout transitions.

use super::{Identifier, LedgerError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

/// Whether a student is currently checked in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttendanceState {
    LoggedOut,
    LoggedIn,
}

/// Name details supplied by registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub first_name: String,
    pub last_name: String,
}

impl Person {
    pub fn new(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
        }
    }
}

/// One student's attendance.
///
/// Invariant: when logged in, `last_login` is set and is not earlier
/// than `last_logout`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttendanceRecord {
    identifier: Identifier,
    person: Person,
    last_login: Option<DateTime<Utc>>,
    last_logout: Option<DateTime<Utc>>,
    total_hours: f64,
    logged_in: bool,
    guest: bool,
}

impl AttendanceRecord {
    /// Creates a logged-out record with no history.
    pub fn new(identifier: Identifier, person: Person) -> Self {
        Self {
            identifier,
            person,
            last_login: None,
            last_logout: None,
            total_hours: 0.0,
            logged_in: false,
            guest: false,
        }
    }

    /// Creates a provisional record for an unregistered identifier.
    pub fn guest(identifier: Identifier) -> Self {
        let person = Person::new("Guest", identifier.as_str());
        Self {
            guest: true,
            ..Self::new(identifier, person)
        }
    }

    pub fn identifier(&self) -> &Identifier {
        &self.identifier
    }

    pub fn person(&self) -> &Person {
        &self.person
    }

    /// "First Last" for notifications.
    pub fn display_name(&self) -> String {
        format!("{} {}", self.person.first_name, self.person.last_name)
    }

    pub fn last_login(&self) -> Option<DateTime<Utc>> {
        self.last_login
    }

    pub fn last_logout(&self) -> Option<DateTime<Utc>> {
        self.last_logout
    }

    /// Cumulative hours over all completed sessions.
    pub fn total_hours(&self) -> f64 {
        self.total_hours
    }

    pub fn is_guest(&self) -> bool {
        self.guest
    }

    pub fn state(&self) -> AttendanceState {
        if self.logged_in {
            AttendanceState::LoggedIn
        } else {
            AttendanceState::LoggedOut
        }
    }

    pub fn is_logged_in(&self) -> bool {
        self.logged_in
    }

    /// LoggedOut -> LoggedIn.
    ///
    /// A login stamped before the previous logout changes nothing.
    pub(super) fn login(&mut self, now: DateTime<Utc>) -> Result<(), LedgerError> {
        debug_assert!(!self.logged_in);
        if let Some(last_logout) = self.last_logout.filter(|&out| now < out) {
            return Err(LedgerError::LoginBeforeLogout {
                identifier: self.identifier.clone(),
                last_logout,
                now,
            });
        }
        self.last_login = Some(now);
        self.logged_in = true;
        Ok(())
    }

    /// LoggedIn -> LoggedOut, returning the session length in hours.
    ///
    /// On clock skew (`now` before the login) nothing changes.
    pub(super) fn logout(&mut self, now: DateTime<Utc>) -> Result<f64, LedgerError> {
        debug_assert!(self.logged_in);
        let login = self.last_login.ok_or_else(|| LedgerError::NegativeDuration {
            identifier: self.identifier.clone(),
            last_login: now,
            now,
        })?;
        if now < login {
            return Err(LedgerError::NegativeDuration {
                identifier: self.identifier.clone(),
                last_login: login,
                now,
            });
        }

        let hours = (now - login).num_milliseconds() as f64 / MILLIS_PER_HOUR;
        self.total_hours += hours;
        self.last_logout = Some(now);
        self.logged_in = false;
        Ok(hours)
    }
}
