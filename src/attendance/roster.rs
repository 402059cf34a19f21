//! Student registration lookup.

use super::{Identifier, Person};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Source of names for identifiers the ledger has not seen yet.
pub trait Registration: Send {
    /// Returns the registered person for `identifier`, if any.
    fn lookup(&self, identifier: &Identifier) -> Option<Person>;
}

/// One roster line as written in the configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub id: Identifier,
    pub first_name: String,
    pub last_name: String,
}

/// In-memory registration table.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    people: HashMap<Identifier, Person>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces an entry.
    pub fn insert(&mut self, identifier: Identifier, person: Person) {
        self.people.insert(identifier, person);
    }

    pub fn len(&self) -> usize {
        self.people.len()
    }

    pub fn is_empty(&self) -> bool {
        self.people.is_empty()
    }
}

impl FromIterator<RosterEntry> for Roster {
    fn from_iter<I: IntoIterator<Item = RosterEntry>>(iter: I) -> Self {
        let mut roster = Roster::new();
        for entry in iter {
            roster.insert(entry.id, Person::new(entry.first_name, entry.last_name));
        }
        roster
    }
}

impl Registration for Roster {
    fn lookup(&self, identifier: &Identifier) -> Option<Person> {
        self.people.get(identifier).cloned()
    }
}
