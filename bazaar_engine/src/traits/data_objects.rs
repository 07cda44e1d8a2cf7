use bazaar_common::{Money, DEFAULT_CURRENCY_CODE};
use serde::{Deserialize, Serialize};

use crate::db_types::{Courier, Order, OrderItem, OwnerKey, PaymentRecord, VendorTransfer};

/// A priced snapshot of a cart, taken just before checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartQuote {
    pub owner_key: OwnerKey,
    pub items: Vec<OrderItem>,
    pub total: Money,
}

impl CartQuote {
    pub fn vendor_ids(&self) -> Vec<i64> {
        let mut ids = self.items.iter().map(|i| i.vendor_id).collect::<Vec<_>>();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

/// Platform-wide money settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementPolicy {
    /// The platform commission in basis points (300 = 3%).
    pub commission_bps: u32,
    pub currency: String,
}

impl Default for SettlementPolicy {
    fn default() -> Self {
        Self { commission_bps: 300, currency: DEFAULT_CURRENCY_CODE.to_string() }
    }
}

/// What [`crate::MarketplaceDatabase::apply_settlement`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettlementApplied {
    /// No payment record exists for the reference.
    UnknownReference,
    /// The payment already reached a final state. Nothing was changed.
    AlreadyApplied { order: Order, payment: PaymentRecord },
    /// The outcome was not final. Nothing was changed.
    StillPending { order: Order },
    /// The payment settled. `transfers` holds the ledger entries written for the vendor payouts.
    Settled { order: Order, transfers: Vec<VendorTransfer>, status_changed: bool },
    /// The payment failed and the order was cancelled, releasing its stock.
    Cancelled { order: Order, released_courier: Option<i64> },
}

impl SettlementApplied {
    pub fn order(&self) -> Option<&Order> {
        match self {
            SettlementApplied::UnknownReference => None,
            SettlementApplied::AlreadyApplied { order, .. } |
            SettlementApplied::StillPending { order } |
            SettlementApplied::Settled { order, .. } |
            SettlementApplied::Cancelled { order, .. } => Some(order),
        }
    }

    /// True if this call changed the ledger.
    pub fn is_applied(&self) -> bool {
        matches!(self, SettlementApplied::Settled { .. } | SettlementApplied::Cancelled { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CourierAssignment {
    pub order: Order,
    pub courier: Courier,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderChanged {
    pub old_order: Order,
    pub new_order: Order,
}

impl OrderChanged {
    pub fn new(old_order: Order, new_order: Order) -> Self {
        Self { old_order, new_order }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferResult {
    /// Carries the processor's transfer id.
    Sent(String),
    /// Carries the reason the payout could not be made.
    Failed(String),
}

/// Summary of a sweep over stale unpaid orders.
#[derive(Debug, Clone, Default)]
pub struct ExpiryResult {
    /// Orders cancelled because their payment never arrived.
    pub expired: Vec<Order>,
    /// Orders whose payment turned out to have settled.
    pub settled: Vec<Order>,
    /// Orders that could not be resolved this time round, with the reason.
    pub skipped: Vec<(Order, String)>,
}

impl ExpiryResult {
    pub fn total_count(&self) -> usize {
        self.expired.len() + self.settled.len() + self.skipped.len()
    }
}
