//! offertrail-core library.
//!
//! Attributes a closed log of user/offer events to offer instances, one per
//! `(user, offer, receipt time)`, and counts each user's earlier completions.
//!
//! # Conventions
//!
//! - **Errors**: `thiserror` enums ([`AttributionError`], [`IngestError`]) in
//!   the library; `anyhow::Result` only for config loading.
//! - **Logging**: `tracing` macros (`info!`, `warn!`, `debug!`, `trace!`).

pub mod aggregate;
pub mod attribute;
pub mod catalog;
pub mod config;
pub mod counter;
pub mod enrich;
pub mod enumerate;
pub mod error;
pub mod event;
pub mod model;
pub mod profile;
pub mod summary;
pub mod timing;
pub mod window;

pub use attribute::{AttributionOptions, attribute, attribute_with};
pub use catalog::{OfferCatalog, OfferSpec};
pub use error::{AttributionError, ErrorCode, IngestError};
pub use event::{Event, EventType, Hours};
pub use model::{OfferId, OfferInstance, TimePoints, UserId};
