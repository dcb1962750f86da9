//! Identifiers and the offer-instance output record.

pub mod ids;
pub mod instance;

pub use ids::{OfferId, UserId};
pub use instance::{OfferInstance, TimePoints};
