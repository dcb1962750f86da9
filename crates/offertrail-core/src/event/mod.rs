//! Normalized event model for the user/offer transcript.
//!
//! An [`Event`] is one transcript row after the heterogeneous `value` column
//! has been reshaped into an optional offer id and an optional amount.
//! Events are immutable once parsed; the attribution passes only read them.

pub mod parser;
pub mod types;

pub use parser::{RawTranscriptRow, normalize_row, parse_transcript};
pub use types::{EventType, UnknownEventType};

use serde::{Deserialize, Serialize};

use crate::error::AttributionError;
use crate::model::{OfferId, UserId};

/// Event time: whole hours since the start of the experiment.
pub type Hours = u64;

/// A single normalized transcript event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub user_id: UserId,

    /// Absent for plain purchases.
    pub offer_id: Option<OfferId>,

    pub event_type: EventType,

    pub time: Hours,

    /// Present only for purchases.
    pub amount: Option<f64>,
}

impl Event {
    #[must_use]
    pub fn received(user: &str, offer: &str, time: Hours) -> Self {
        Self::offer_event(user, offer, EventType::Received, time)
    }

    #[must_use]
    pub fn viewed(user: &str, offer: &str, time: Hours) -> Self {
        Self::offer_event(user, offer, EventType::Viewed, time)
    }

    #[must_use]
    pub fn completed(user: &str, offer: &str, time: Hours) -> Self {
        Self::offer_event(user, offer, EventType::Completed, time)
    }

    #[must_use]
    pub fn purchase(user: &str, amount: f64, time: Hours) -> Self {
        Self {
            user_id: UserId::new(user),
            offer_id: None,
            event_type: EventType::Purchase,
            time,
            amount: Some(amount),
        }
    }

    fn offer_event(user: &str, offer: &str, event_type: EventType, time: Hours) -> Self {
        Self {
            user_id: UserId::new(user),
            offer_id: Some(OfferId::new(offer)),
            event_type,
            time,
            amount: None,
        }
    }

    /// True when this event is of `kind` and concerns `offer`.
    #[must_use]
    pub fn is(&self, kind: EventType, offer: &OfferId) -> bool {
        self.event_type == kind && self.offer_id.as_ref() == Some(offer)
    }

    /// Check that the fields required by this event's type are present.
    ///
    /// # Errors
    ///
    /// Returns [`AttributionError::MalformedEvent`] when an offer event has
    /// no offer id or a purchase has no amount.
    pub fn validate(&self, line: Option<usize>) -> Result<(), AttributionError> {
        let reason = if self.event_type.requires_offer() && self.offer_id.is_none() {
            Some(format!("'{}' event without offer id", self.event_type))
        } else if self.event_type == EventType::Purchase && self.amount.is_none() {
            Some(format!("'{}' event without amount", self.event_type))
        } else {
            None
        };

        match reason {
            Some(reason) => Err(AttributionError::MalformedEvent {
                line,
                user_id: self.user_id.clone(),
                reason,
            }),
            None => Ok(()),
        }
    }
}
