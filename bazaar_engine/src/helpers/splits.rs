use std::collections::BTreeMap;

use bazaar_common::Money;

use crate::db_types::OrderItem;

/// The amount owed to one vendor for one order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VendorSplit {
    pub vendor_id: i64,
    pub subtotal: Money,
    pub payout: Money,
}

/// Groups the order lines by vendor and computes each vendor's payout: the vendor subtotal less the platform
/// commission, rounded down.
///
/// Rounding each share down means the sum of payouts never exceeds `total - platform_commission(total, bps)`.
/// Splits are returned in ascending vendor id order. Returns `None` if a subtotal overflows.
pub fn vendor_splits(items: &[OrderItem], commission_bps: u32) -> Option<Vec<VendorSplit>> {
    let mut subtotals = BTreeMap::<i64, Money>::new();
    for item in items {
        let subtotal = subtotals.entry(item.vendor_id).or_default();
        *subtotal = subtotal.checked_add(item.subtotal()?)?;
    }
    let splits = subtotals
        .into_iter()
        .map(|(vendor_id, subtotal)| VendorSplit { vendor_id, subtotal, payout: subtotal.share_floor(commission_bps) })
        .collect();
    Some(splits)
}

/// The sum of all line subtotals, or `None` if it does not fit in a money amount.
pub fn order_total(items: &[OrderItem]) -> Option<Money> {
    items.iter().try_fold(Money::default(), |total, item| total.checked_add(item.subtotal()?))
}

/// The commission the platform retains on an order total, rounded up to the nearest minor unit.
pub fn platform_commission(total: Money, commission_bps: u32) -> Money {
    total.fee_ceil(commission_bps)
}
