//! Run summary over an instance table.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::model::OfferInstance;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Summary {
    pub instances: usize,
    pub users: usize,
    pub offers: usize,
    pub viewed: usize,
    pub completed: usize,
    /// Completed instances whose completion came at or after the view.
    pub viewed_before_completion: usize,
    /// Instances received more than once by the same user.
    pub repeat_receipts: usize,
    pub view_rate: f64,
    pub completion_rate: f64,
}

impl Summary {
    #[must_use]
    pub fn from_instances(instances: &[OfferInstance]) -> Self {
        let users: BTreeSet<_> = instances.iter().map(|i| &i.user_id).collect();
        let offers: BTreeSet<_> = instances.iter().map(|i| &i.offer_id).collect();
        let viewed = instances.iter().filter(|i| i.viewed).count();
        let completed = instances.iter().filter(|i| i.completed).count();

        Self {
            instances: instances.len(),
            users: users.len(),
            offers: offers.len(),
            viewed,
            completed,
            viewed_before_completion: instances
                .iter()
                .filter(|i| i.viewed_before == Some(true))
                .count(),
            repeat_receipts: instances.iter().filter(|i| i.offer_count > 1).count(),
            view_rate: ratio(viewed, instances.len()),
            completion_rate: ratio(completed, instances.len()),
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}
