//! Opaque string identifiers for users and offers.
//!
//! Both are compared byte-wise; ordering is only used to make traversal
//! deterministic, never to imply meaning.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a user (the `person` column of a transcript).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

/// Identifier of an offer in the portfolio catalog.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OfferId(String);

impl UserId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl OfferId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for OfferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<&str> for OfferId {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_as_bare_string() {
        let json = serde_json::to_string(&OfferId::new("ae264e36")).expect("serialize");
        assert_eq!(json, "\"ae264e36\"");

        let back: UserId = serde_json::from_str("\"78afa995\"").expect("deserialize");
        assert_eq!(back.as_str(), "78afa995");
    }

    #[test]
    fn ordering_is_bytewise() {
        let mut ids = vec![UserId::new("b"), UserId::new("A"), UserId::new("a")];
        ids.sort();
        let raw: Vec<&str> = ids.iter().map(UserId::as_str).collect();
        assert_eq!(raw, ["A", "a", "b"]);
    }
}
