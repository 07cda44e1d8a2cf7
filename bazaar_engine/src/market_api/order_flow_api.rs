use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{DeliveryEvent, NewDeliveryEvent, Order, OrderId, OrderStatusType, OwnerKey, SettlementState, VendorTransfer},
    events::{EventProducers, OrderCancelledEvent, OrderStatusChangedEvent},
    market_api::{
        dispatch_api::DispatchApi,
        order_objects::SettlementReport,
        order_state::{authorize_transition, TransitionActor},
        settlement_api::SettlementApi,
    },
    traits::{CourierAssignment, MarketplaceDatabase, MarketplaceError, OrderChanged, PaymentProcessor, SettlementOutcome},
};

/// Order lookups and every status change that does not come from a payment outcome.
pub struct OrderFlowApi<B, P> {
    db: B,
    settlement: SettlementApi<B, P>,
    dispatcher: DispatchApi<B>,
    producers: EventProducers,
}

impl<B, P> Debug for OrderFlowApi<B, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B, P> OrderFlowApi<B, P> {
    pub fn new(db: B, settlement: SettlementApi<B, P>, dispatcher: DispatchApi<B>, producers: EventProducers) -> Self {
        Self { db, settlement, dispatcher, producers }
    }
}

impl<B, P> OrderFlowApi<B, P>
where
    B: MarketplaceDatabase,
    P: PaymentProcessor,
{
    pub async fn fetch_order(&self, order_id: &OrderId) -> Result<Order, MarketplaceError> {
        self.db.fetch_order(order_id).await?.ok_or_else(|| MarketplaceError::OrderNotFound(order_id.clone()))
    }

    /// Fetches the order on behalf of its owner. Orders belonging to somebody else are reported as not found.
    pub async fn fetch_order_for_owner(&self, owner: &OwnerKey, order_id: &OrderId) -> Result<Order, MarketplaceError> {
        let order = self.fetch_order(order_id).await?;
        if &order.owner_key != owner {
            debug!("🔀 {owner} asked for order {order_id}, which belongs to somebody else");
            return Err(MarketplaceError::OrderNotFound(order_id.clone()));
        }
        Ok(order)
    }

    pub async fn delivery_history(&self, order_id: &OrderId) -> Result<Vec<DeliveryEvent>, MarketplaceError> {
        let _ = self.fetch_order(order_id).await?;
        self.db.fetch_delivery_events(order_id).await
    }

    pub async fn transfers_for_order(&self, order_id: &OrderId) -> Result<Vec<VendorTransfer>, MarketplaceError> {
        self.db.fetch_transfers_for_order(order_id).await
    }

    /// Requests a regular status change on behalf of `actor`.
    ///
    /// The change is checked against the order state machine and the actor's permissions. `completed` can only be
    /// reached through a settled payment, so asking for it here is always refused. Cancellation goes through the
    /// payment processor first, so a payment that sneaks through at the last moment completes the order instead.
    pub async fn update_status(
        &self,
        order_id: &OrderId,
        to: OrderStatusType,
        actor: TransitionActor,
    ) -> Result<Order, MarketplaceError> {
        let order = self.fetch_order(order_id).await?;
        match to {
            OrderStatusType::Completed => Err(MarketplaceError::Forbidden(
                "Orders are completed by their payment settling, not by request".to_string(),
            )),
            OrderStatusType::Cancelled => {
                authorize_transition(&order, to, actor)?;
                let report = self.settlement.cancel_unpaid_order(&order, &format!("cancelled by {actor}")).await?;
                report.order.ok_or_else(|| MarketplaceError::OrderNotFound(order_id.clone()))
            },
            OrderStatusType::Assigned => {
                authorize_transition(&order, to, actor)?;
                match self.dispatcher.dispatch_order(order_id).await? {
                    Some(assignment) => Ok(assignment.order),
                    None => Err(MarketplaceError::ValidationError("No courier is available right now".to_string())),
                }
            },
            _ => {
                authorize_transition(&order, to, actor)?;
                let event = NewDeliveryEvent::new(to, actor.delivery_actor(), order.courier_id);
                let updated = self.db.advance_order_status(order_id, order.status, to, event).await?;
                info!("🔀 Order {order_id} moved from {} to {to} by {actor}", order.status);
                self.producers.publish_status_changed(OrderStatusChangedEvent::new(updated.clone(), order.status)).await;
                Ok(updated)
            },
        }
    }

    /// Cancels an unpaid order on behalf of its owner.
    pub async fn cancel_order(&self, owner: &OwnerKey, order_id: &OrderId) -> Result<SettlementReport, MarketplaceError> {
        let order = self.fetch_order_for_owner(owner, order_id).await?;
        authorize_transition(&order, OrderStatusType::Cancelled, TransitionActor::Owner)?;
        self.settlement.cancel_unpaid_order(&order, "cancelled by customer").await
    }

    /// Forces an order into `to`, bypassing the state machine. `reason` is mandatory and lands in the audit trail.
    ///
    /// When cancelling an order whose payment is still open, the payment is cancelled with the processor first. If the
    /// processor reports that it settled after all, the settlement is recorded before the order is cancelled, and the
    /// funds have to be refunded by hand.
    pub async fn override_status(
        &self,
        order_id: &OrderId,
        to: OrderStatusType,
        reason: &str,
    ) -> Result<OrderChanged, MarketplaceError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(MarketplaceError::ValidationError("An override needs a reason".to_string()));
        }
        let order = self.fetch_order(order_id).await?;
        if to == OrderStatusType::Cancelled {
            let payment = self.db.fetch_payment_record(&order.payment_reference).await?;
            if matches!(payment, Some(p) if p.state == SettlementState::Initiated) {
                let outcome = self.settlement.release_payment(&order).await?;
                if outcome == SettlementOutcome::Settled {
                    warn!("🔀 Payment for order {order_id} settled before it could be cancelled. Refund it manually.");
                    self.settlement.apply_outcome(&order.payment_reference, outcome, reason).await?;
                }
            }
        }
        let changed = self.db.force_order_status(order_id, to, reason).await?;
        warn!(
            "🔀 Order {order_id} forced from {} to {} by an administrator. Reason: {reason}",
            changed.old_order.status, changed.new_order.status
        );
        let event = OrderStatusChangedEvent::new(changed.new_order.clone(), changed.old_order.status);
        self.producers.publish_status_changed(event).await;
        if to == OrderStatusType::Cancelled {
            self.producers.publish_order_cancelled(OrderCancelledEvent::new(changed.new_order.clone(), reason)).await;
        }
        Ok(changed)
    }

    /// Tries to find a courier for an order that is still waiting for one.
    pub async fn redispatch(&self, order_id: &OrderId) -> Result<Option<CourierAssignment>, MarketplaceError> {
        let order = self.fetch_order(order_id).await?;
        if order.courier_id.is_some() || !matches!(order.status, OrderStatusType::Pending | OrderStatusType::Completed) {
            return Err(MarketplaceError::InvalidTransition { from: order.status, to: OrderStatusType::Assigned });
        }
        self.dispatcher.dispatch_order(order_id).await
    }
}
