//! The attribution pipeline: events + catalog to the instance table.
//!
//! ```text
//! events ──validate──▶ per-user shards ──aggregate_user──▶ concat ──counters──▶ table
//!                        (by user id)      (parallel)       (barrier)
//! ```
//!
//! Users are visited in ascending id order and each shard's events are
//! stable-sorted by time, so the table is identical whether shards run
//! sequentially or on the rayon pool.

use std::collections::BTreeMap;

use rayon::prelude::*;
use tracing::info;

use crate::aggregate::aggregate_user;
use crate::catalog::OfferCatalog;
use crate::counter::apply_prior_completions;
use crate::error::AttributionError;
use crate::event::Event;
use crate::model::{OfferInstance, UserId};
use crate::timing;

/// Knobs for [`attribute_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributionOptions {
    /// Run user shards on the rayon pool.
    pub parallel: bool,
}

impl Default for AttributionOptions {
    fn default() -> Self {
        Self { parallel: true }
    }
}

/// Attribute `events` to offer instances with default options.
///
/// # Errors
///
/// See [`attribute_with`].
pub fn attribute(
    events: &[Event],
    catalog: &OfferCatalog,
) -> Result<Vec<OfferInstance>, AttributionError> {
    attribute_with(events, catalog, &AttributionOptions::default())
}

/// Attribute `events` to offer instances.
///
/// Returns one row per receipt, grouped by user (ascending id), then by offer
/// (first receipt order), then by receipt time. The table is not re-sorted by
/// time; callers that need that order sort it themselves.
///
/// # Errors
///
/// Aborts on the first malformed event, or on the first receipt of an offer
/// missing from the catalog (first in user order, even when shards run in
/// parallel). No partial table is returned.
pub fn attribute_with(
    events: &[Event],
    catalog: &OfferCatalog,
    options: &AttributionOptions,
) -> Result<Vec<OfferInstance>, AttributionError> {
    for event in events {
        event.validate(None)?;
    }

    let shards = timing::timed("attribute.shard", || shard_by_user(events));

    let per_user: Vec<Result<Vec<OfferInstance>, AttributionError>> =
        timing::timed("attribute.users", || {
            if options.parallel {
                shards
                    .par_iter()
                    .map(|(user, user_events)| aggregate_user(user, user_events, catalog))
                    .collect()
            } else {
                shards
                    .iter()
                    .map(|(user, user_events)| aggregate_user(user, user_events, catalog))
                    .collect()
            }
        });

    let mut instances = Vec::new();
    for rows in per_user {
        instances.extend(rows?);
    }

    timing::timed("attribute.counters", || apply_prior_completions(&mut instances));

    info!(
        events = events.len(),
        users = shards.len(),
        instances = instances.len(),
        parallel = options.parallel,
        "attribution complete"
    );
    Ok(instances)
}

/// Split events into per-user, time-ordered shards, users in ascending order.
fn shard_by_user(events: &[Event]) -> Vec<(UserId, Vec<Event>)> {
    let mut by_user: BTreeMap<&UserId, Vec<Event>> = BTreeMap::new();
    for event in events {
        by_user.entry(&event.user_id).or_default().push(event.clone());
    }

    by_user
        .into_iter()
        .map(|(user, mut user_events)| {
            user_events.sort_by_key(|e| e.time);
            (user.clone(), user_events)
        })
        .collect()
}
