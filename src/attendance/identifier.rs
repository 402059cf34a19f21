//! Normalized student identifiers.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Identifier parsing errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifierError {
    #[error("identifier is empty")]
    Empty,
    #[error("identifier contains invalid character {0:?}")]
    InvalidCharacter(char),
}

/// What kind of identifier a student presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierKind {
    /// A school-issued student number.
    StudentId,
    /// An 8-digit `MMDDYYYY` birth date, used by students without an ID.
    BirthDate(NaiveDate),
}

/// Ledger key: trimmed, uppercased scan or typed text.
///
/// Two identifiers are equal iff their normalized strings are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identifier(String);

impl Identifier {
    /// Normalizes raw input into an identifier.
    pub fn parse(raw: &str) -> Result<Self, IdentifierError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(IdentifierError::Empty);
        }
        if let Some(bad) = trimmed
            .chars()
            .find(|c| c.is_control() || c.is_whitespace())
        {
            return Err(IdentifierError::InvalidCharacter(bad));
        }
        Ok(Self(trimmed.to_uppercase()))
    }

    /// Returns the normalized string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Classifies the identifier.
    pub fn kind(&self) -> IdentifierKind {
        let s = self.0.as_str();
        if s.len() == 8 && s.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(date) = NaiveDate::parse_from_str(s, "%m%d%Y") {
                return IdentifierKind::BirthDate(date);
            }
        }
        IdentifierKind::StudentId
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Identifier {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Identifier {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Identifier> for String {
    fn from(id: Identifier) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalization() {
        let id = Identifier::parse("  ab123 \n").unwrap();
        assert_eq!(id.as_str(), "AB123");
        assert_eq!(id, Identifier::parse("AB123").unwrap());
    }

    #[test]
    fn test_rejects_empty_and_interior_space() {
        assert_eq!(Identifier::parse("   "), Err(IdentifierError::Empty));
        assert_eq!(
            Identifier::parse("12 34"),
            Err(IdentifierError::InvalidCharacter(' '))
        );
        assert_eq!(
            Identifier::parse("12\u{7}34"),
            Err(IdentifierError::InvalidCharacter('\u{7}'))
        );
    }

    #[test]
    fn test_birth_date_fallback() {
        let id = Identifier::parse("07041999").unwrap();
        assert_eq!(
            id.kind(),
            IdentifierKind::BirthDate(NaiveDate::from_ymd_opt(1999, 7, 4).unwrap())
        );
    }

    #[test]
    fn test_eight_digits_not_a_date_is_student_id() {
        let id = Identifier::parse("13452019").unwrap();
        assert_eq!(id.kind(), IdentifierKind::StudentId);
        assert_eq!(Identifier::parse("114477").unwrap().kind(), IdentifierKind::StudentId);
    }

    #[test]
    fn test_serde_normalizes() {
        #[derive(Deserialize)]
        struct Wrapper {
            id: Identifier,
        }
        let w: Wrapper = toml::from_str("id = \" x9 \"").unwrap();
        assert_eq!(w.id.as_str(), "X9");
        assert!(toml::from_str::<Wrapper>("id = \"\"").is_err());
    }
}
