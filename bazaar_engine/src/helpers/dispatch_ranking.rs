use std::cmp::Ordering;

use crate::db_types::Courier;

/// Filters out couriers that cannot take a job and orders the rest by preference.
///
/// Couriers with the fewest deliveries per rating point come first. Ties go to the courier with fewer total
/// deliveries, then to the lower id so that the order is deterministic.
pub fn rank_dispatch_candidates(couriers: Vec<Courier>) -> Vec<Courier> {
    let mut candidates = couriers.into_iter().filter(Courier::is_dispatchable).collect::<Vec<_>>();
    candidates.sort_by(|a, b| {
        a.load_ratio()
            .partial_cmp(&b.load_ratio())
            .unwrap_or(Ordering::Equal)
            .then(a.total_deliveries.cmp(&b.total_deliveries))
            .then(a.id.cmp(&b.id))
    });
    candidates
}
