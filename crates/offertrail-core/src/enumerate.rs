//! Instance enumeration for one `(user, offer)` pair.
//!
//! Every receipt of the offer becomes its own instance. Receipts keep their
//! chronological order and duplicates are allowed: the same offer can be
//! sent to the same user several times, even at the same hour.

use tracing::trace;

use crate::catalog::OfferCatalog;
use crate::error::AttributionError;
use crate::event::{Event, EventType, Hours};
use crate::model::{OfferId, OfferInstance, TimePoints, UserId};
use crate::window::match_window;

/// Receipt times of `offer_id` in `user_events`, in event order.
#[must_use]
pub fn receipt_times(user_events: &[Event], offer_id: &OfferId) -> Vec<Hours> {
    user_events
        .iter()
        .filter(|e| e.is(EventType::Received, offer_id))
        .map(|e| e.time)
        .collect()
}

/// Produce one instance per receipt of `offer_id` by `user_id`.
///
/// Every instance of the pair is stamped with the same `offer_count` (number
/// of receipts) and `time_points` (the receipt times). A pair with no
/// receipts yields no instances.
///
/// # Errors
///
/// Returns [`AttributionError::UnknownOffer`] when the offer is not in the
/// catalog; the error names the first receipt.
pub fn enumerate_instances(
    user_id: &UserId,
    user_events: &[Event],
    offer_id: &OfferId,
    catalog: &OfferCatalog,
) -> Result<Vec<OfferInstance>, AttributionError> {
    let receipts = receipt_times(user_events, offer_id);
    let Some(&first_receipt) = receipts.first() else {
        return Ok(Vec::new());
    };

    let duration = catalog
        .duration(offer_id)
        .map_err(|_| AttributionError::UnknownOffer {
            offer_id: offer_id.clone(),
            user_id: user_id.clone(),
            time_received: first_receipt,
        })?;

    trace!(
        user = %user_id,
        offer = %offer_id,
        receipts = receipts.len(),
        duration,
        "enumerating offer instances"
    );

    let time_points = TimePoints::new(receipts.clone());
    let offer_count = receipts.len();

    Ok(receipts
        .into_iter()
        .map(|t0| {
            let mut instance = match_window(user_id, user_events, offer_id, t0, duration);
            instance.offer_count = offer_count;
            instance.time_points = time_points.clone();
            instance
        })
        .collect())
}
