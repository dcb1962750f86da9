//! Event kinds recorded in a transcript.
//!
//! The string form is the one the transcript export uses (`offer received`,
//! `offer viewed`, `offer completed`, `transaction`).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The four event kinds of a user/offer transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    /// An offer was sent to the user.
    Received,
    /// The user opened the offer.
    Viewed,
    /// The offer's spend condition was met.
    Completed,
    /// A purchase unrelated to any specific offer.
    Purchase,
}

/// Error returned when parsing an unknown event type string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownEventType {
    /// The unrecognised input string.
    pub raw: String,
}

impl fmt::Display for UnknownEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown event type '{}': expected one of offer received, offer viewed, \
             offer completed, transaction",
            self.raw
        )
    }
}

impl std::error::Error for UnknownEventType {}

impl EventType {
    pub const ALL: [Self; 4] = [Self::Received, Self::Viewed, Self::Completed, Self::Purchase];

    /// Return the transcript string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Received => "offer received",
            Self::Viewed => "offer viewed",
            Self::Completed => "offer completed",
            Self::Purchase => "transaction",
        }
    }

    /// True for the three kinds that must carry an offer id.
    #[must_use]
    pub const fn requires_offer(self) -> bool {
        !matches!(self, Self::Purchase)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = UnknownEventType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "offer received" | "received" => Ok(Self::Received),
            "offer viewed" | "viewed" => Ok(Self::Viewed),
            "offer completed" | "completed" => Ok(Self::Completed),
            "transaction" | "purchase" => Ok(Self::Purchase),
            _ => Err(UnknownEventType { raw: s.to_string() }),
        }
    }
}

impl Serialize for EventType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_str(&s).map_err(serde::de::Error::custom)
    }
}
