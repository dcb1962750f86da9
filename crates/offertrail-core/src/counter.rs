//! Prior-completion counters.
//!
//! Runs once, after every user's instances exist. Two independent passes
//! order the same instance table by different keys:
//!
//! - `same_offer_completed_before`: grouped by `(user, offer)`;
//! - `any_offer_completed_before`: grouped by `user`.
//!
//! Within a group instances are ordered by `time_received`, ties keeping
//! their table order. Each pass is an exclusive prefix sum of `completed`
//! and returns a column indexed like the input table; the columns are merged
//! back by index afterwards, so neither pass observes the other.

use std::cmp::Ordering;

use rayon::prelude::*;

use crate::model::OfferInstance;

/// The two counter columns, indexed like the instance table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PriorCompletions {
    pub same_offer: Vec<u32>,
    pub any_offer: Vec<u32>,
}

/// Compute both counter columns without touching `instances`.
#[must_use]
pub fn count_prior_completions(instances: &[OfferInstance]) -> PriorCompletions {
    let (same_offer, any_offer) = rayon::join(
        || {
            exclusive_prefix_counts(instances, |a, b| {
                a.user_id
                    .cmp(&b.user_id)
                    .then_with(|| a.offer_id.cmp(&b.offer_id))
            })
        },
        || exclusive_prefix_counts(instances, |a, b| a.user_id.cmp(&b.user_id)),
    );

    PriorCompletions {
        same_offer,
        any_offer,
    }
}

/// Compute the counters and write them into the table.
pub fn apply_prior_completions(instances: &mut [OfferInstance]) {
    let counts = count_prior_completions(instances);
    instances
        .par_iter_mut()
        .zip(counts.same_offer.par_iter().zip(counts.any_offer.par_iter()))
        .for_each(|(instance, (&same, &any))| {
            instance.same_offer_completed_before = same;
            instance.any_offer_completed_before = any;
        });
}

/// Exclusive running count of completed instances per group.
///
/// `group` orders and delimits groups; within a group rows are ordered by
/// `time_received` with a stable sort, so equal receipt times keep table
/// order.
fn exclusive_prefix_counts<F>(instances: &[OfferInstance], group: F) -> Vec<u32>
where
    F: Fn(&OfferInstance, &OfferInstance) -> Ordering + Sync,
{
    let mut order: Vec<usize> = (0..instances.len()).collect();
    order.par_sort_by(|&a, &b| {
        let (a, b) = (&instances[a], &instances[b]);
        group(a, b).then_with(|| a.time_received.cmp(&b.time_received))
    });

    let mut counts = vec![0_u32; instances.len()];
    let mut running = 0_u32;
    let mut previous: Option<usize> = None;

    for idx in order {
        let current = &instances[idx];
        if previous.is_some_and(|prev| group(&instances[prev], current) != Ordering::Equal) {
            running = 0;
        }
        counts[idx] = running;
        if current.completed {
            running = running.saturating_add(1);
        }
        previous = Some(idx);
    }

    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Hours;
    use crate::model::{OfferId, TimePoints, UserId};

    fn inst(user: &str, offer: &str, t: Hours, completed: bool) -> OfferInstance {
        OfferInstance {
            user_id: UserId::new(user),
            offer_id: OfferId::new(offer),
            completed,
            viewed: false,
            viewed_before: completed.then_some(false),
            time_received: t,
            time_viewed: None,
            time_completed: completed.then_some(t + 1),
            offer_duration: 72,
            offer_count: 1,
            time_points: TimePoints::new(vec![t]),
            same_offer_completed_before: 0,
            any_offer_completed_before: 0,
        }
    }

    #[test]
    fn same_offer_is_exclusive_prefix_sum() {
        let rows = vec![
            inst("u", "x", 0, true),
            inst("u", "x", 100, true),
            inst("u", "x", 200, false),
            inst("u", "x", 300, true),
        ];
        let counts = count_prior_completions(&rows);
        assert_eq!(counts.same_offer, vec![0, 1, 2, 2]);
        assert_eq!(counts.any_offer, vec![0, 1, 2, 2]);
    }

    #[test]
    fn groups_reset_and_table_order_is_preserved() {
        // Table order is traversal order: offer y first, then x.
        let rows = vec![
            inst("u", "y", 50, true),
            inst("u", "y", 150, false),
            inst("u", "x", 0, true),
            inst("u", "x", 100, false),
            inst("v", "x", 10, true),
        ];
        let counts = count_prior_completions(&rows);
        assert_eq!(counts.same_offer, vec![0, 1, 0, 1, 0]);
        // u sorted by receipt: x@0(c) y@50(c) x@100 y@150
        assert_eq!(counts.any_offer, vec![1, 2, 0, 2, 0]);
    }

    #[test]
    fn equal_receipt_times_keep_table_order() {
        let rows = vec![
            inst("u", "a", 24, true),
            inst("u", "b", 24, true),
            inst("u", "c", 24, false),
        ];
        let counts = count_prior_completions(&rows);
        assert_eq!(counts.any_offer, vec![0, 1, 2]);
    }

    #[test]
    fn apply_writes_columns_in_place() {
        let mut rows = vec![inst("u", "x", 0, true), inst("u", "x", 100, false)];
        apply_prior_completions(&mut rows);
        assert_eq!(rows[1].same_offer_completed_before, 1);
        assert_eq!(rows[1].any_offer_completed_before, 1);
        assert_eq!(rows[0].same_offer_completed_before, 0);
    }

    #[test]
    fn empty_table() {
        assert_eq!(count_prior_completions(&[]), PriorCompletions::default());
    }

    #[test]
    fn counts_key_on_receipt_order_not_completion_time() {
        // x received at 2 and completed at 5; y received at 1, z at 10.
        let mut x = inst("u", "x", 2, true);
        x.time_completed = Some(5);
        let rows = vec![inst("u", "y", 1, false), x, inst("u", "z", 10, false)];
        let counts = count_prior_completions(&rows);
        assert_eq!(counts.any_offer, vec![0, 0, 1]);
    }
}
