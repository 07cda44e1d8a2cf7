use std::fmt::Debug;

use chrono::Utc;
use log::*;

use crate::{
    db_types::OrderId,
    events::{CourierAssignedEvent, EventProducers},
    market_api::order_objects::DispatchPolicy,
    traits::{CourierAssignment, MarketplaceDatabase, MarketplaceError},
};

/// Allocates couriers to orders that are ready to ship.
#[derive(Clone)]
pub struct DispatchApi<B> {
    db: B,
    policy: DispatchPolicy,
    producers: EventProducers,
}

impl<B> Debug for DispatchApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DispatchApi")
    }
}

impl<B> DispatchApi<B> {
    pub fn new(db: B, policy: DispatchPolicy, producers: EventProducers) -> Self {
        Self { db, policy, producers }
    }
}

impl<B> DispatchApi<B>
where B: MarketplaceDatabase
{
    /// Assigns the best available courier to the order.
    ///
    /// Candidates are verified couriers that are online and not already on a job, ranked by deliveries per rating
    /// point. The chosen courier becomes busy and the order moves to `assigned` with a delivery estimate.
    ///
    /// If nobody is available the order is left untouched and `None` is returned. It can be dispatched again later.
    pub async fn dispatch_order(&self, order_id: &OrderId) -> Result<Option<CourierAssignment>, MarketplaceError> {
        let eta = Utc::now() + self.policy.estimated_delivery;
        match self.db.assign_courier(order_id, eta).await? {
            Some(assignment) => {
                info!(
                    "🚚 Courier #{} ({}) assigned to order {order_id}. Estimated delivery at {eta}",
                    assignment.courier.id, assignment.courier.name
                );
                let event = CourierAssignedEvent::new(assignment.order.clone(), assignment.courier.clone());
                self.producers.publish_courier_assigned(event).await;
                Ok(Some(assignment))
            },
            None => {
                warn!("🚚 No courier is available for order {order_id}. It will wait for re-dispatch.");
                Ok(None)
            },
        }
    }
}
