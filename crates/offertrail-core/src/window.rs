//! Window matching for a single offer receipt.
//!
//! Given one user's chronological events, an offer id, a receipt time `t0`
//! and the offer's duration `d`, classify what happened to that offer inside
//! `[t0, t0 + d]`:
//!
//! 1. keep events for the target offer whose time lies in the window;
//! 2. `completed` / `time_completed` come from the first completion event;
//! 3. `viewed` / `time_viewed` come from the first view event;
//! 4. `viewed_before` is derived from the two (see [`viewed_before`]).
//!
//! Events are never consumed. When receipts of the same offer overlap, one
//! view or completion can be attributed to several instances.

use crate::event::{Event, EventType, Hours};
use crate::model::{OfferId, OfferInstance, TimePoints, UserId};

/// Classification of one receipt window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowOutcome {
    pub completed: bool,
    pub viewed: bool,
    pub viewed_before: Option<bool>,
    pub time_viewed: Option<Hours>,
    pub time_completed: Option<Hours>,
}

/// Scan `user_events` for the window `[time_received, time_received + duration]`.
///
/// `user_events` must be in chronological order; "first" means the earliest
/// event in that order. An empty window is the normal outcome for an ignored
/// offer and yields `completed = viewed = false`.
#[must_use]
pub fn classify(
    user_events: &[Event],
    offer_id: &OfferId,
    time_received: Hours,
    duration: Hours,
) -> WindowOutcome {
    let end = time_received.saturating_add(duration);
    let in_window = user_events
        .iter()
        .filter(|e| e.time >= time_received && e.time <= end)
        .filter(|e| e.offer_id.as_ref() == Some(offer_id));

    let mut time_viewed = None;
    let mut time_completed = None;
    for event in in_window {
        match event.event_type {
            EventType::Viewed if time_viewed.is_none() => time_viewed = Some(event.time),
            EventType::Completed if time_completed.is_none() => time_completed = Some(event.time),
            _ => {}
        }
        if time_viewed.is_some() && time_completed.is_some() {
            break;
        }
    }

    WindowOutcome {
        completed: time_completed.is_some(),
        viewed: time_viewed.is_some(),
        viewed_before: viewed_before(time_completed, time_viewed),
        time_viewed,
        time_completed,
    }
}

/// Derive the `viewed_before` flag from the first completion and view times.
///
/// - not completed: undefined;
/// - completed, never viewed: `false`;
/// - completed strictly before the view: `false`;
/// - otherwise (completion at or after the view): `true`.
#[must_use]
pub const fn viewed_before(time_completed: Option<Hours>, time_viewed: Option<Hours>) -> Option<bool> {
    match (time_completed, time_viewed) {
        (None, _) => None,
        (Some(_), None) => Some(false),
        (Some(completed), Some(viewed)) => Some(completed >= viewed),
    }
}

/// Run [`classify`] and emit the instance for this receipt.
///
/// `offer_count` and `time_points` are left empty; the instance enumerator
/// stamps them once every receipt of the pair is known. The prior-completion
/// counters start at zero.
#[must_use]
pub fn match_window(
    user_id: &UserId,
    user_events: &[Event],
    offer_id: &OfferId,
    time_received: Hours,
    duration: Hours,
) -> OfferInstance {
    let outcome = classify(user_events, offer_id, time_received, duration);

    OfferInstance {
        user_id: user_id.clone(),
        offer_id: offer_id.clone(),
        completed: outcome.completed,
        viewed: outcome.viewed,
        viewed_before: outcome.viewed_before,
        time_received,
        time_viewed: outcome.time_viewed,
        time_completed: outcome.time_completed,
        offer_duration: duration,
        offer_count: 0,
        time_points: TimePoints::default(),
        same_offer_completed_before: 0,
        any_offer_completed_before: 0,
    }
}
