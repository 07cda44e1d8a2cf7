use serde::{Deserialize, Serialize};

use crate::db_types::{Courier, Order, OrderStatusType, VendorTransfer};

/// Published once, when a payment settles and the order becomes `completed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCompletedEvent {
    pub order: Order,
    pub transfers: Vec<VendorTransfer>,
}

impl OrderCompletedEvent {
    pub fn new(order: Order, transfers: Vec<VendorTransfer>) -> Self {
        Self { order, transfers }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCancelledEvent {
    pub order: Order,
    pub reason: String,
}

impl OrderCancelledEvent {
    pub fn new<S: Into<String>>(order: Order, reason: S) -> Self {
        Self { order, reason: reason.into() }
    }
}

/// Published for delivery progress and administrative overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusChangedEvent {
    pub order: Order,
    pub old_status: OrderStatusType,
}

impl OrderStatusChangedEvent {
    pub fn new(order: Order, old_status: OrderStatusType) -> Self {
        Self { order, old_status }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourierAssignedEvent {
    pub order: Order,
    pub courier: Courier,
}

impl CourierAssignedEvent {
    pub fn new(order: Order, courier: Courier) -> Self {
        Self { order, courier }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventType {
    OrderCompleted(OrderCompletedEvent),
    OrderCancelled(OrderCancelledEvent),
    OrderStatusChanged(OrderStatusChangedEvent),
    CourierAssigned(CourierAssignedEvent),
}
