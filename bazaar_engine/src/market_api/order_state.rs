//! The order state machine.
//!
//! | From \ To   | completed | assigned | picked_up | in_transit | delivered | cancelled |
//! |-------------|-----------|----------|-----------|------------|-----------|-----------|
//! | pending     | payment   | dispatch |           |            |           | owner, payment, admin |
//! | completed   |           | dispatch |           |            |           |           |
//! | assigned    |           |          | courier   |            |           |           |
//! | picked_up   |           |          |           | courier    |           |           |
//! | in_transit  |           |          |           |            | courier   |           |
//!
//! `courier` means the courier assigned to the order, or an administrator. Every other change, including cancelling
//! a paid order, is only possible through an administrative override, which bypasses this table and is recorded in
//! the audit trail.
use std::fmt::Display;

use crate::{
    db_types::{DeliveryActor, Order, OrderStatusType},
    traits::MarketplaceError,
};

/// Who is asking for a status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionActor {
    /// The payment reconciler, acting on a processor outcome.
    Payment,
    Dispatch,
    Courier(i64),
    /// The customer or session that owns the order.
    Owner,
    Admin,
}

impl TransitionActor {
    pub fn delivery_actor(&self) -> DeliveryActor {
        match self {
            TransitionActor::Courier(_) => DeliveryActor::Courier,
            TransitionActor::Dispatch => DeliveryActor::Dispatch,
            TransitionActor::Payment | TransitionActor::Owner | TransitionActor::Admin => DeliveryActor::Admin,
        }
    }
}

impl Display for TransitionActor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransitionActor::Payment => write!(f, "payment"),
            TransitionActor::Dispatch => write!(f, "dispatch"),
            TransitionActor::Courier(id) => write!(f, "courier #{id}"),
            TransitionActor::Owner => write!(f, "owner"),
            TransitionActor::Admin => write!(f, "admin"),
        }
    }
}

const TRANSITIONS: [(OrderStatusType, OrderStatusType); 7] = {
    use OrderStatusType::*;
    [
        (Pending, Completed),
        (Pending, Assigned),
        (Completed, Assigned),
        (Assigned, PickedUp),
        (PickedUp, InTransit),
        (InTransit, Delivered),
        (Pending, Cancelled),
    ]
};

pub fn is_valid_transition(from: OrderStatusType, to: OrderStatusType) -> bool {
    TRANSITIONS.contains(&(from, to))
}

/// The statuses an order may move to next without an override.
pub fn next_statuses(from: OrderStatusType) -> Vec<OrderStatusType> {
    TRANSITIONS.iter().filter(|(f, _)| *f == from).map(|(_, t)| *t).collect()
}

pub fn check_transition(from: OrderStatusType, to: OrderStatusType) -> Result<(), MarketplaceError> {
    if is_valid_transition(from, to) {
        Ok(())
    } else {
        Err(MarketplaceError::InvalidTransition { from, to })
    }
}

fn actor_may_perform(actor: TransitionActor, to: OrderStatusType) -> bool {
    use OrderStatusType::*;
    use TransitionActor::*;
    match to {
        Completed => actor == Payment,
        Assigned => actor == Dispatch,
        PickedUp | InTransit | Delivered => matches!(actor, Courier(_) | Admin),
        Cancelled => matches!(actor, Owner | Payment | Admin),
        Pending => false,
    }
}

/// Checks that `actor` may move `order` to `to`.
///
/// Fails with [`MarketplaceError::InvalidTransition`] if the table does not allow the change at all, and with
/// [`MarketplaceError::Forbidden`] if it does but not for this actor. Couriers may only move orders assigned to them.
pub fn authorize_transition(order: &Order, to: OrderStatusType, actor: TransitionActor) -> Result<(), MarketplaceError> {
    check_transition(order.status, to)?;
    if !actor_may_perform(actor, to) {
        return Err(MarketplaceError::Forbidden(format!("{actor} may not move an order to {to}")));
    }
    if let TransitionActor::Courier(courier_id) = actor {
        if order.courier_id != Some(courier_id) {
            return Err(MarketplaceError::Forbidden(format!(
                "Order {} is not assigned to courier #{courier_id}",
                order.order_id
            )));
        }
    }
    Ok(())
}
