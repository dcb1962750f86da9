//! The offer instance: one occurrence of one offer sent to one user.
//!
//! Instances are created by the window matcher, stamped by the instance
//! enumerator with the per-pair receipt summary, and filled in once by the
//! prior-completion counter. Nothing mutates them after that pass.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::event::Hours;

use super::ids::{OfferId, UserId};

/// Ordered receipt timestamps for one `(user, offer)` pair.
///
/// Serialized as the timestamps joined with `.` (`"0.168.336"`), the flat
/// form downstream spreadsheets already expect.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimePoints(Vec<Hours>);

impl TimePoints {
    #[must_use]
    pub const fn new(times: Vec<Hours>) -> Self {
        Self(times)
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Hours] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for TimePoints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, t) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{t}")?;
        }
        Ok(())
    }
}

impl FromStr for TimePoints {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(Self::default());
        }
        s.split('.')
            .map(str::parse::<Hours>)
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }
}

impl Serialize for TimePoints {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimePoints {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// One row of the attribution output table.
///
/// Field order is the output column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferInstance {
    pub user_id: UserId,
    pub offer_id: OfferId,

    /// A completion event fell inside the window.
    pub completed: bool,

    /// A view event fell inside the window.
    pub viewed: bool,

    /// Defined only when `completed`. True when the first completion is no
    /// earlier than the first view; false when completed strictly before the
    /// view or without any view.
    pub viewed_before: Option<bool>,

    pub time_received: Hours,
    pub time_viewed: Option<Hours>,
    pub time_completed: Option<Hours>,
    pub offer_duration: Hours,

    /// Number of receipts of this offer by this user, shared by every
    /// instance of the pair.
    pub offer_count: usize,
    pub time_points: TimePoints,

    /// Completed instances of the same pair received earlier.
    pub same_offer_completed_before: u32,

    /// Completed instances of any offer, for this user, received earlier.
    pub any_offer_completed_before: u32,
}

impl OfferInstance {
    /// Inclusive end of the activity window.
    #[must_use]
    pub const fn window_end(&self) -> Hours {
        self.time_received.saturating_add(self.offer_duration)
    }

    /// True when `t` lies within `[time_received, time_received + offer_duration]`.
    #[must_use]
    pub const fn in_window(&self, t: Hours) -> bool {
        t >= self.time_received && t <= self.window_end()
    }
}
