use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{DeliveryRecord, Money, Order, OrderId, OrderStatusType, OwnerKey},
    traits::{SettlementApplied, SettlementOutcome},
};

#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub owner: OwnerKey,
    pub delivery: Option<DeliveryRecord>,
}

impl CheckoutRequest {
    pub fn new(owner: OwnerKey) -> Self {
        Self { owner, delivery: None }
    }

    pub fn with_delivery(mut self, delivery: DeliveryRecord) -> Self {
        self.delivery = Some(delivery);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutResult {
    pub order_id: OrderId,
    pub payment_reference: String,
    /// Hand this to the client so it can complete the payment with the processor.
    pub client_secret: String,
    pub total: Money,
    /// The part of `total` the platform keeps.
    pub commission: Money,
    pub currency: String,
}

/// The result of feeding a payment outcome into the reconciler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementReport {
    pub outcome: SettlementOutcome,
    /// False if the outcome was a duplicate, was not final, or referenced an unknown payment.
    pub applied: bool,
    pub order: Option<Order>,
}

impl SettlementReport {
    pub fn new(outcome: SettlementOutcome, applied: &SettlementApplied) -> Self {
        Self { outcome, applied: applied.is_applied(), order: applied.order().cloned() }
    }

    pub fn order_id(&self) -> Option<&OrderId> {
        self.order.as_ref().map(|o| &o.order_id)
    }

    pub fn status(&self) -> Option<OrderStatusType> {
        self.order.as_ref().map(|o| o.status)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DispatchPolicy {
    /// Added to the assignment time to produce the delivery estimate.
    pub estimated_delivery: Duration,
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self { estimated_delivery: Duration::minutes(45) }
    }
}
