use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("identifier must not be empty")]
pub struct InvalidIdError;

/// Client-generated identifier for a habit, reward, or punishment.
///
/// Random and unique per creation; never reused after deletion.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntryId(String);

impl EntryId {
    pub fn new(value: impl Into<String>) -> Result<Self, InvalidIdError> {
        let value = value.into();
        if value.trim().is_empty() {
            Err(InvalidIdError)
        } else {
            Ok(Self(value))
        }
    }

    /// A fresh random identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for EntryId {
    type Error = InvalidIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<EntryId> for String {
    fn from(value: EntryId) -> Self {
        value.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The opaque id of an authenticated identity.
///
/// The only access-control key in the system: the first two distinct ids to
/// appear in a ledger claim its two role slots.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IdentityId(String);

impl IdentityId {
    pub fn new(value: impl Into<String>) -> Result<Self, InvalidIdError> {
        let value = value.into();
        if value.trim().is_empty() {
            Err(InvalidIdError)
        } else {
            Ok(Self(value))
        }
    }

    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for IdentityId {
    type Error = InvalidIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<IdentityId> for String {
    fn from(value: IdentityId) -> Self {
        value.0
    }
}

impl fmt::Display for IdentityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LedgerIdError {
    #[error("ledger code must not be empty")]
    Empty,
    #[error("ledger code must be ASCII alphanumeric (got {0:?})")]
    InvalidCharacter(char),
    #[error("ledger code must be at most 32 characters")]
    TooLong,
}

/// Identifies one shared ledger document: a short room code in most
/// deployments, or a fixed constant for single-ledger ones.
///
/// Normalized to uppercase so codes can be read over a shoulder and typed
/// back in any case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LedgerId(String);

impl LedgerId {
    pub fn new(value: impl Into<String>) -> Result<Self, LedgerIdError> {
        let value: String = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(LedgerIdError::Empty);
        }
        if trimmed.len() > 32 {
            return Err(LedgerIdError::TooLong);
        }
        if let Some(bad) = trimmed.chars().find(|c| !c.is_ascii_alphanumeric()) {
            return Err(LedgerIdError::InvalidCharacter(bad));
        }
        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for LedgerId {
    type Error = LedgerIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<LedgerId> for String {
    fn from(value: LedgerId) -> Self {
        value.0
    }
}

impl fmt::Display for LedgerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_entry_ids_are_unique() {
        let a = EntryId::generate();
        let b = EntryId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn entry_id_rejects_empty() {
        assert!(EntryId::new("").is_err());
        assert!(EntryId::new("  ").is_err());
    }

    #[test]
    fn ledger_id_normalizes_case() {
        let id = LedgerId::new("ab3x9k").unwrap();
        assert_eq!(id.as_str(), "AB3X9K");
    }

    #[test]
    fn ledger_id_rejects_punctuation() {
        assert_eq!(
            LedgerId::new("AB-3X9"),
            Err(LedgerIdError::InvalidCharacter('-'))
        );
        assert_eq!(LedgerId::new(""), Err(LedgerIdError::Empty));
    }
}
