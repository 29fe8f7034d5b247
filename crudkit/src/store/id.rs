use crate::error::{CrudkitError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Strategy for generating document identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdStrategy {
    #[default]
    Uuid,
    Ulid,
}

/// A system-generated document identifier in canonical string form.
///
/// External input is only turned into a `DocumentId` through
/// [`IdStrategy::parse`], so a held value is always well-formed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl IdStrategy {
    /// Generate a fresh identifier.
    pub fn generate(self) -> DocumentId {
        match self {
            IdStrategy::Uuid => DocumentId(uuid::Uuid::new_v4().to_string()),
            IdStrategy::Ulid => DocumentId(ulid::Ulid::new().to_string()),
        }
    }

    /// Parse an external string form, normalizing to the canonical
    /// representation. Malformed strings are rejected so relational
    /// validation can distinguish a bad id from a missing document.
    pub fn parse(self, raw: &str) -> Result<DocumentId> {
        match self {
            IdStrategy::Uuid => raw
                .parse::<uuid::Uuid>()
                .map(|u| DocumentId(u.to_string()))
                .map_err(|_| CrudkitError::InvalidId(raw.to_string())),
            IdStrategy::Ulid => raw
                .parse::<ulid::Ulid>()
                .map(|u| DocumentId(u.to_string()))
                .map_err(|_| CrudkitError::InvalidId(raw.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuid_round_trip() {
        let id = IdStrategy::Uuid.generate();
        let parsed = IdStrategy::Uuid.parse(id.as_str()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn uuid_rejects_malformed() {
        let err = IdStrategy::Uuid.parse("not-a-uuid").unwrap_err();
        assert!(matches!(err, CrudkitError::InvalidId(_)));
    }

    #[test]
    fn ulid_round_trip() {
        let id = IdStrategy::Ulid.generate();
        let parsed = IdStrategy::Ulid.parse(id.as_str()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn ulid_rejects_malformed() {
        let err = IdStrategy::Ulid.parse("zz!").unwrap_err();
        assert!(matches!(err, CrudkitError::InvalidId(_)));
    }
}
