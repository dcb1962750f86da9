//! Demographic and catalog enrichment of the instance table.
//!
//! Two collaborators sit around the attribution core:
//!
//! - [`eligible_events`] drops events of users without demographics before
//!   attribution;
//! - [`enrich`] joins each instance with its user's profile, the months of
//!   membership at receipt and the offer's catalog metadata.

use chrono::{Datelike, Days, NaiveDate};
use serde::Serialize;
use tracing::debug;

use crate::catalog::OfferCatalog;
use crate::config::EnrichConfig;
use crate::event::{Event, Hours};
use crate::model::OfferInstance;
use crate::profile::ProfileTable;

/// One output row: the instance plus joined columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedRow {
    #[serde(flatten)]
    pub instance: OfferInstance,
    pub gender: Option<String>,
    pub age: Option<u32>,
    pub income: Option<f64>,
    pub became_member_on: Option<NaiveDate>,
    /// Calendar months between joining and receiving this offer.
    pub member_months: Option<i32>,
    pub reward: Option<f64>,
    pub difficulty: Option<f64>,
    pub channels: Vec<String>,
    pub offer_type: Option<String>,
}

/// Events of users that pass the demographics filter.
///
/// With `require_demographics` off every event is kept.
#[must_use]
pub fn eligible_events(
    events: Vec<Event>,
    profiles: &ProfileTable,
    require_demographics: bool,
) -> Vec<Event> {
    if !require_demographics {
        return events;
    }

    let before = events.len();
    let kept: Vec<Event> = events
        .into_iter()
        .filter(|e| profiles.is_eligible(&e.user_id))
        .collect();
    debug!(before, kept = kept.len(), "filtered events by demographics");
    kept
}

/// Calendar date of an event time, counting whole days from `experiment_start`.
#[must_use]
pub fn offer_date(experiment_start: NaiveDate, time_received: Hours) -> Option<NaiveDate> {
    experiment_start.checked_add_days(Days::new(time_received / 24))
}

/// Month difference between the offer date and the membership date.
///
/// Only year and month count: joining on Jan 31 and receiving on Feb 1 is
/// one month.
#[must_use]
pub fn member_months(
    experiment_start: NaiveDate,
    time_received: Hours,
    member_since: NaiveDate,
) -> Option<i32> {
    let offered = offer_date(experiment_start, time_received)?;
    let months = 12 * (offered.year() - member_since.year());
    let offered_month = i32::try_from(offered.month()).ok()?;
    let member_month = i32::try_from(member_since.month()).ok()?;
    Some(months + offered_month - member_month)
}

/// Join profiles and catalog metadata onto the instance table.
///
/// Row order is kept. Users without a profile get empty demographic
/// columns.
#[must_use]
pub fn enrich(
    instances: Vec<OfferInstance>,
    profiles: &ProfileTable,
    catalog: &OfferCatalog,
    config: &EnrichConfig,
) -> Vec<EnrichedRow> {
    instances
        .into_iter()
        .map(|instance| {
            let profile = profiles.get(&instance.user_id);
            let spec = catalog.get(&instance.offer_id);
            let became_member_on = profile.and_then(|p| p.became_member_on);

            EnrichedRow {
                gender: profile.and_then(|p| p.gender.clone()),
                age: profile.and_then(|p| p.age),
                income: profile.and_then(|p| p.income),
                became_member_on,
                member_months: became_member_on.and_then(|since| {
                    member_months(config.experiment_start, instance.time_received, since)
                }),
                reward: spec.and_then(|s| s.reward),
                difficulty: spec.and_then(|s| s.difficulty),
                channels: spec.map(|s| s.channels.clone()).unwrap_or_default(),
                offer_type: spec.and_then(|s| s.offer_type.clone()),
                instance,
            }
        })
        .collect()
}
