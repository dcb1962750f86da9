//! Offer catalog: offer id to validity duration and metadata.
//!
//! The catalog is loaded once from the portfolio table and shared read-only
//! by every attribution shard. Durations are stored in event-time hours;
//! the portfolio expresses them in days, converted on load.

use std::collections::BTreeMap;
use std::io::BufRead;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::IngestError;
use crate::event::Hours;
use crate::model::OfferId;

/// Catalog entry for one offer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfferSpec {
    pub offer_id: OfferId,
    /// Validity window length in event-time hours.
    pub duration_hours: Hours,
    #[serde(default)]
    pub reward: Option<f64>,
    #[serde(default)]
    pub difficulty: Option<f64>,
    #[serde(default)]
    pub channels: Vec<String>,
    #[serde(default)]
    pub offer_type: Option<String>,
}

impl OfferSpec {
    /// Entry with a duration and no metadata.
    #[must_use]
    pub fn with_duration(offer_id: &str, duration_hours: Hours) -> Self {
        Self {
            offer_id: OfferId::new(offer_id),
            duration_hours,
            reward: None,
            difficulty: None,
            channels: Vec::new(),
            offer_type: None,
        }
    }
}

/// Lookup failure: the id is absent from the catalog.
///
/// Callers attach the user and receipt context before surfacing it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("offer '{0}' is not in the catalog")]
pub struct UnknownOffer(pub OfferId);

/// Read-only offer catalog.
#[derive(Debug, Clone, Default)]
pub struct OfferCatalog {
    offers: BTreeMap<OfferId, OfferSpec>,
}

impl OfferCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an entry.
    pub fn insert(&mut self, spec: OfferSpec) {
        self.offers.insert(spec.offer_id.clone(), spec);
    }

    /// Validity duration of `offer_id` in hours.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownOffer`] if the id is absent.
    pub fn duration(&self, offer_id: &OfferId) -> Result<Hours, UnknownOffer> {
        self.offers
            .get(offer_id)
            .map(|spec| spec.duration_hours)
            .ok_or_else(|| UnknownOffer(offer_id.clone()))
    }

    #[must_use]
    pub fn get(&self, offer_id: &OfferId) -> Option<&OfferSpec> {
        self.offers.get(offer_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.offers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.offers.is_empty()
    }
}

impl FromIterator<OfferSpec> for OfferCatalog {
    fn from_iter<I: IntoIterator<Item = OfferSpec>>(iter: I) -> Self {
        let mut catalog = Self::new();
        for spec in iter {
            catalog.insert(spec);
        }
        catalog
    }
}

/// A portfolio row as exported.
#[derive(Debug, Clone, Deserialize)]
struct PortfolioRow {
    id: String,
    duration: Option<f64>,
    #[serde(default)]
    reward: Option<f64>,
    #[serde(default)]
    difficulty: Option<f64>,
    #[serde(default)]
    channels: Vec<String>,
    #[serde(default)]
    offer_type: Option<String>,
}

/// Read the portfolio JSON Lines table into a catalog.
///
/// `hours_per_unit` converts the portfolio's duration unit (days) into
/// event-time hours.
///
/// # Errors
///
/// Fails on unreadable or unparsable lines, and on entries whose duration is
/// missing, negative or fractional in hours.
pub fn parse_portfolio<R: BufRead>(
    reader: R,
    hours_per_unit: Hours,
) -> Result<OfferCatalog, IngestError> {
    let mut catalog = OfferCatalog::new();

    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let raw = line?;
        if raw.trim().is_empty() {
            continue;
        }

        let row: PortfolioRow = serde_json::from_str(&raw).map_err(|source| IngestError::Json {
            line: line_no,
            source,
        })?;
        let offer_id = OfferId::new(row.id);
        let duration_hours = row
            .duration
            .and_then(|units| to_hours(units, hours_per_unit))
            .ok_or_else(|| IngestError::MissingDuration {
                line: line_no,
                offer_id: offer_id.clone(),
            })?;

        catalog.insert(OfferSpec {
            offer_id,
            duration_hours,
            reward: row.reward,
            difficulty: row.difficulty,
            channels: row.channels,
            offer_type: row.offer_type,
        });
    }

    debug!(offers = catalog.len(), "parsed portfolio");
    Ok(catalog)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
fn to_hours(units: f64, hours_per_unit: Hours) -> Option<Hours> {
    let hours = units * hours_per_unit as f64;
    if !hours.is_finite() || hours < 0.0 || hours.fract() != 0.0 {
        return None;
    }
    Some(hours as Hours)
}
