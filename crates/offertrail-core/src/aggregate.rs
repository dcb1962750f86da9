//! Per-user aggregation: every offer a user received, every receipt.
//!
//! Offers are processed in order of first receipt in the user's
//! chronological event stream, so the output order is stable across runs.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::catalog::OfferCatalog;
use crate::enumerate::enumerate_instances;
use crate::error::AttributionError;
use crate::event::{Event, EventType};
use crate::model::{OfferId, OfferInstance, UserId};

/// Distinct offers received by the user, in order of first receipt.
#[must_use]
pub fn received_offers(user_events: &[Event]) -> Vec<OfferId> {
    let mut seen = HashSet::new();
    user_events
        .iter()
        .filter(|e| e.event_type == EventType::Received)
        .filter_map(|e| e.offer_id.as_ref())
        .filter(|offer| seen.insert(*offer))
        .cloned()
        .collect()
}

/// Offers the user viewed or completed without ever receiving them.
fn orphan_offers<'a>(user_events: &'a [Event], received: &[OfferId]) -> Vec<&'a OfferId> {
    let received: HashSet<&OfferId> = received.iter().collect();
    let mut seen = HashSet::new();
    user_events
        .iter()
        .filter_map(|e| e.offer_id.as_ref())
        .filter(|offer| !received.contains(offer) && seen.insert(*offer))
        .collect()
}

/// All instances for one user.
///
/// `user_events` must contain only this user's events, in chronological
/// order.
///
/// # Errors
///
/// Propagates the first [`AttributionError`] from instance enumeration.
pub fn aggregate_user(
    user_id: &UserId,
    user_events: &[Event],
    catalog: &OfferCatalog,
) -> Result<Vec<OfferInstance>, AttributionError> {
    let offers = received_offers(user_events);

    for orphan in orphan_offers(user_events, &offers) {
        warn!(user = %user_id, offer = %orphan, "offer events without a receipt are ignored");
    }

    let mut instances = Vec::new();
    for offer_id in &offers {
        instances.extend(enumerate_instances(user_id, user_events, offer_id, catalog)?);
    }

    debug!(
        user = %user_id,
        offers = offers.len(),
        instances = instances.len(),
        "aggregated user"
    );
    Ok(instances)
}
