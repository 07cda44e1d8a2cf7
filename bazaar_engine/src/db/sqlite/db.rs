use std::{fmt::Debug, sync::Arc};

use chrono::{DateTime, Utc};
use log::*;
use sqlx::{SqliteConnection, SqlitePool};
use tokio::sync::Mutex;

use super::{carts, couriers, db_url, deliveries, new_pool, orders, payments, products, transfers, vendors};
use crate::{
    db_types::{
        CartLine,
        Courier,
        CourierAvailability,
        DeliveryActor,
        DeliveryEvent,
        NewCourier,
        NewDeliveryEvent,
        NewOrder,
        NewProduct,
        NewVendorTransfer,
        Order,
        OrderId,
        OrderItem,
        OrderStatusType,
        OwnerKey,
        PaymentRecord,
        PayoutStatus,
        Product,
        ProductUpdate,
        SettlementState,
        TransferStatus,
        Vendor,
        VendorTransfer,
    },
    helpers::{order_total, rank_dispatch_candidates, vendor_splits},
    traits::{
        CartQuote,
        CatalogManagement,
        CourierAssignment,
        CourierManagement,
        MarketplaceDatabase,
        MarketplaceError,
        OrderChanged,
        OrderManagement,
        SettlementApplied,
        SettlementOutcome,
        SettlementPolicy,
        TransferResult,
    },
};

/// SQLite backend for the marketplace ledger.
///
/// SQLite allows a single writer at a time. Every write transaction first takes the in-process write gate, so that
/// concurrent writers queue up here instead of failing with `SQLITE_BUSY` when a deferred transaction tries to upgrade
/// its lock. Clones share the gate.
#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
    write_gate: Arc<Mutex<()>>,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SqliteDatabase ({})", self.url)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object using the URL in `BZR_DATABASE_URL`.
    pub async fn new(max_connections: u32) -> Result<Self, MarketplaceError> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, MarketplaceError> {
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool, write_gate: Arc::new(Mutex::new(())) })
    }

    /// Brings the schema up to date.
    pub async fn migrate(&self) -> Result<(), MarketplaceError> {
        sqlx::migrate!("./src/db/sqlite/migrations")
            .run(&self.pool)
            .await
            .map_err(|e| MarketplaceError::DatabaseError(format!("Migration failed. {e}")))?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Returns the order's stock to the catalog, frees its courier and marks it cancelled.
///
/// Stock is not returned for orders that were already delivered.
async fn cancel_order(order: &Order, conn: &mut SqliteConnection) -> Result<(Order, Option<i64>), MarketplaceError> {
    if order.status != OrderStatusType::Delivered {
        for item in &order.items {
            products::release_stock(item.product_id, item.quantity, conn).await?;
        }
        trace!("🗃️ Released stock for {} lines of order {}", order.items.len(), order.order_id);
    }
    let mut released = None;
    if let (Some(courier_id), true) = (order.courier_id, order.status.is_in_delivery()) {
        if couriers::release_courier(courier_id, false, conn).await?.is_some() {
            debug!("🗃️ Courier #{courier_id} released from cancelled order {}", order.order_id);
            released = Some(courier_id);
        }
    }
    let cancelled = orders::force_status(&order.order_id, OrderStatusType::Cancelled, false, conn)
        .await?
        .ok_or_else(|| MarketplaceError::OrderNotFound(order.order_id.clone()))?;
    Ok((cancelled, released))
}

async fn order_or_not_found(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Order, MarketplaceError> {
    orders::fetch_order_by_order_id(order_id, conn).await?.ok_or_else(|| MarketplaceError::OrderNotFound(order_id.clone()))
}

impl MarketplaceDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn quote_cart(&self, owner: &OwnerKey) -> Result<CartQuote, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let lines = carts::fetch_cart(owner, &mut tx).await?;
        if lines.is_empty() {
            return Err(MarketplaceError::EmptyCart);
        }
        let mut items = Vec::with_capacity(lines.len());
        for line in lines {
            let product = products::fetch_product(line.product_id, &mut tx)
                .await?
                .ok_or(MarketplaceError::ProductNotFound(line.product_id))?;
            if product.quantity_available < line.quantity {
                return Err(MarketplaceError::InsufficientStock {
                    product_id: product.id,
                    requested: line.quantity,
                    available: product.quantity_available,
                });
            }
            items.push(OrderItem {
                product_id: product.id,
                vendor_id: product.vendor_id,
                name: product.name,
                quantity: line.quantity,
                unit_price: product.price,
            });
        }
        let mut vendor_ids = items.iter().map(|i| i.vendor_id).collect::<Vec<_>>();
        vendor_ids.sort_unstable();
        vendor_ids.dedup();
        let mut unavailable = Vec::new();
        for vendor_id in vendor_ids {
            match vendors::fetch_vendor(vendor_id, &mut tx).await? {
                Some(vendor) if vendor.can_receive_payouts() => {},
                _ => unavailable.push(vendor_id),
            }
        }
        tx.commit().await?;
        if !unavailable.is_empty() {
            return Err(MarketplaceError::VendorPayoutUnavailable(unavailable));
        }
        let total = order_total(&items)
            .ok_or_else(|| MarketplaceError::ValidationError("The order total is too large".to_string()))?;
        Ok(CartQuote { owner_key: owner.clone(), items, total })
    }

    async fn commit_checkout(&self, order: NewOrder) -> Result<Order, MarketplaceError> {
        let _gate = self.write_gate.lock().await;
        let mut tx = self.pool.begin().await?;
        for item in &order.items {
            let product = products::fetch_product(item.product_id, &mut tx)
                .await?
                .ok_or(MarketplaceError::ProductNotFound(item.product_id))?;
            if product.price != item.unit_price {
                return Err(MarketplaceError::ValidationError(format!(
                    "The price of product {} changed during checkout. Please try again.",
                    item.product_id
                )));
            }
            if !products::reserve_stock(item.product_id, item.quantity, &mut tx).await? {
                debug!(
                    "🗃️ Could not reserve {} units of product {} for order {}",
                    item.quantity, item.product_id, order.order_id
                );
                return Err(MarketplaceError::InsufficientStock {
                    product_id: item.product_id,
                    requested: item.quantity,
                    available: product.quantity_available,
                });
            }
        }
        let reference = order.payment_reference.clone();
        let order = orders::insert_order(order, &mut tx).await?;
        payments::insert_payment(&reference, &order.order_id, order.total, &order.currency, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Order {} saved with payment reference {reference}. Stock reserved.", order.order_id);
        Ok(order)
    }

    async fn apply_settlement(
        &self,
        reference: &str,
        outcome: SettlementOutcome,
        policy: &SettlementPolicy,
    ) -> Result<SettlementApplied, MarketplaceError> {
        let _gate = self.write_gate.lock().await;
        let mut tx = self.pool.begin().await?;
        let Some(payment) = payments::fetch_payment(reference, &mut tx).await? else {
            return Ok(SettlementApplied::UnknownReference);
        };
        let order = orders::fetch_order_by_order_id(&payment.order_id, &mut tx).await?.ok_or_else(|| {
            MarketplaceError::InvariantViolation(format!("Payment {reference} does not belong to any order"))
        })?;
        if payment.state != SettlementState::Initiated {
            if payment.state == SettlementState::Failed && outcome == SettlementOutcome::Settled {
                warn!(
                    "🗃️ Payment {reference} settled after order {} was cancelled. The funds need a manual refund.",
                    order.order_id
                );
            }
            trace!("🗃️ Payment {reference} is already {}. Ignoring {outcome} outcome.", payment.state);
            return Ok(SettlementApplied::AlreadyApplied { order, payment });
        }
        match outcome {
            SettlementOutcome::Pending => Ok(SettlementApplied::StillPending { order }),
            SettlementOutcome::Settled => {
                if order.status == OrderStatusType::Cancelled {
                    return Err(MarketplaceError::InvariantViolation(format!(
                        "Order {} is cancelled but its payment {reference} was still open",
                        order.order_id
                    )));
                }
                payments::update_state_if(reference, SettlementState::Initiated, SettlementState::Settled, &mut tx)
                    .await?;
                let (order, status_changed) = if order.status == OrderStatusType::Pending {
                    let completed = orders::update_status_if(
                        &order.order_id,
                        OrderStatusType::Pending,
                        OrderStatusType::Completed,
                        &mut tx,
                    )
                    .await?
                    .ok_or_else(|| MarketplaceError::OrderNotFound(order.order_id.clone()))?;
                    (completed, true)
                } else {
                    (order, false)
                };
                let splits = vendor_splits(&order.items, policy.commission_bps).ok_or_else(|| {
                    MarketplaceError::InvariantViolation(format!("Order {} has an oversized total", order.order_id))
                })?;
                let mut ledger = Vec::new();
                for split in splits {
                    let connected =
                        vendors::fetch_vendor(split.vendor_id, &mut tx).await?.is_some_and(|v| v.can_receive_payouts());
                    let entry = if connected {
                        NewVendorTransfer {
                            vendor_id: split.vendor_id,
                            amount: split.payout,
                            status: TransferStatus::Pending,
                            last_error: None,
                        }
                    } else {
                        NewVendorTransfer {
                            vendor_id: split.vendor_id,
                            amount: split.payout,
                            status: TransferStatus::Failed,
                            last_error: Some("Vendor payout account is not connected".to_string()),
                        }
                    };
                    let transfer =
                        transfers::insert_transfer(&order.order_id, reference, &order.currency, entry, &mut tx).await?;
                    ledger.push(transfer);
                }
                let cleared = carts::clear_cart(&order.owner_key, &mut tx).await?;
                tx.commit().await?;
                debug!(
                    "🗃️ Payment {reference} settled for order {}. {} payouts recorded. {cleared} cart lines cleared.",
                    order.order_id,
                    ledger.len()
                );
                Ok(SettlementApplied::Settled { order, transfers: ledger, status_changed })
            },
            SettlementOutcome::Failed => {
                payments::update_state_if(reference, SettlementState::Initiated, SettlementState::Failed, &mut tx)
                    .await?;
                if order.status == OrderStatusType::Cancelled {
                    let payment = payments::fetch_payment(reference, &mut tx).await?.unwrap_or(payment);
                    tx.commit().await?;
                    return Ok(SettlementApplied::AlreadyApplied { order, payment });
                }
                let (order, released_courier) = cancel_order(&order, &mut tx).await?;
                tx.commit().await?;
                debug!("🗃️ Payment {reference} failed. Order {} cancelled and stock released.", order.order_id);
                Ok(SettlementApplied::Cancelled { order, released_courier })
            },
        }
    }

    async fn record_transfer_result(
        &self,
        transfer_id: i64,
        result: TransferResult,
    ) -> Result<VendorTransfer, MarketplaceError> {
        let _gate = self.write_gate.lock().await;
        let mut conn = self.pool.acquire().await?;
        match transfers::record_result(transfer_id, result, &mut conn).await? {
            Some(transfer) => Ok(transfer),
            None => transfers::fetch_transfer(transfer_id, &mut conn)
                .await?
                .ok_or(MarketplaceError::TransferNotFound(transfer_id)),
        }
    }

    async fn advance_order_status(
        &self,
        order_id: &OrderId,
        from: OrderStatusType,
        to: OrderStatusType,
        event: NewDeliveryEvent,
    ) -> Result<Order, MarketplaceError> {
        if !matches!(to, OrderStatusType::PickedUp | OrderStatusType::InTransit | OrderStatusType::Delivered) {
            return Err(MarketplaceError::InvariantViolation(format!("{to} is not a delivery progress status")));
        }
        let _gate = self.write_gate.lock().await;
        let mut tx = self.pool.begin().await?;
        let Some(order) = orders::update_status_if(order_id, from, to, &mut tx).await? else {
            let current = order_or_not_found(order_id, &mut tx).await?;
            return Err(MarketplaceError::InvalidTransition { from: current.status, to });
        };
        deliveries::insert_event(order_id, event, &mut tx).await?;
        if to == OrderStatusType::Delivered {
            if let Some(courier_id) = order.courier_id {
                couriers::release_courier(courier_id, true, &mut tx).await?;
                debug!("🗃️ Courier #{courier_id} is free again after delivering {order_id}");
            }
        }
        tx.commit().await?;
        Ok(order)
    }

    async fn assign_courier(
        &self,
        order_id: &OrderId,
        estimated_delivery_at: DateTime<Utc>,
    ) -> Result<Option<CourierAssignment>, MarketplaceError> {
        let _gate = self.write_gate.lock().await;
        let mut tx = self.pool.begin().await?;
        let order = order_or_not_found(order_id, &mut tx).await?;
        let assignable = matches!(order.status, OrderStatusType::Pending | OrderStatusType::Completed);
        if !assignable || order.courier_id.is_some() {
            return Err(MarketplaceError::InvalidTransition { from: order.status, to: OrderStatusType::Assigned });
        }
        let candidates = rank_dispatch_candidates(couriers::fetch_available_couriers(&mut tx).await?);
        trace!("🗃️ {} couriers are eligible for order {order_id}", candidates.len());
        let Some(best) = candidates.into_iter().next() else {
            return Ok(None);
        };
        let courier =
            couriers::update_availability_if(best.id, CourierAvailability::Online, CourierAvailability::Busy, &mut tx)
                .await?
                .ok_or_else(|| {
                    MarketplaceError::InvariantViolation(format!("Courier #{} was taken during assignment", best.id))
                })?;
        let order = orders::assign(order_id, order.status, courier.id, estimated_delivery_at, &mut tx)
            .await?
            .ok_or(MarketplaceError::InvalidTransition { from: order.status, to: OrderStatusType::Assigned })?;
        let event = NewDeliveryEvent::new(OrderStatusType::Assigned, DeliveryActor::Dispatch, Some(courier.id));
        deliveries::insert_event(order_id, event, &mut tx).await?;
        tx.commit().await?;
        Ok(Some(CourierAssignment { order, courier }))
    }

    async fn force_order_status(
        &self,
        order_id: &OrderId,
        status: OrderStatusType,
        reason: &str,
    ) -> Result<OrderChanged, MarketplaceError> {
        use OrderStatusType::*;
        let _gate = self.write_gate.lock().await;
        let mut tx = self.pool.begin().await?;
        let old = order_or_not_found(order_id, &mut tx).await?;
        if old.status == status {
            return Err(MarketplaceError::ValidationError(format!("Order {order_id} is already {status}")));
        }
        if old.status == Cancelled {
            return Err(MarketplaceError::ValidationError(format!(
                "Order {order_id} is cancelled and cannot be reopened"
            )));
        }
        let payment = payments::fetch_payment(&old.payment_reference, &mut tx).await?.ok_or_else(|| {
            MarketplaceError::InvariantViolation(format!("Order {order_id} has no payment record"))
        })?;
        if status == Completed && payment.state != SettlementState::Settled {
            return Err(MarketplaceError::InvariantViolation(format!(
                "Order {order_id} cannot be completed without a settled payment"
            )));
        }
        if status.is_in_delivery() && old.courier_id.is_none() {
            return Err(MarketplaceError::ValidationError(format!(
                "Order {order_id} has no courier. Dispatch it instead."
            )));
        }
        let new = if status == Cancelled {
            if payment.state == SettlementState::Initiated {
                payments::update_state_if(&payment.reference, SettlementState::Initiated, SettlementState::Failed, &mut tx)
                    .await?;
            }
            cancel_order(&old, &mut tx).await?.0
        } else {
            if old.status.is_in_delivery() && !status.is_in_delivery() {
                if let Some(courier_id) = old.courier_id {
                    couriers::release_courier(courier_id, false, &mut tx).await?;
                }
            }
            let detach = matches!(status, Pending | Completed);
            orders::force_status(order_id, status, detach, &mut tx)
                .await?
                .ok_or_else(|| MarketplaceError::OrderNotFound(order_id.clone()))?
        };
        let event = NewDeliveryEvent::new(status, DeliveryActor::AdminOverride, new.courier_id).with_note(reason);
        deliveries::insert_event(order_id, event, &mut tx).await?;
        tx.commit().await?;
        Ok(OrderChanged::new(old, new))
    }

    async fn fetch_stale_unpaid_orders(&self, cutoff: DateTime<Utc>) -> Result<Vec<Order>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_unpaid_orders_created_before(cutoff, &mut conn).await
    }

    async fn close(&mut self) -> Result<(), MarketplaceError> {
        self.pool.close().await;
        Ok(())
    }
}

impl OrderManagement for SqliteDatabase {
    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order_by_order_id(order_id, &mut conn).await
    }

    async fn fetch_order_by_payment_reference(&self, reference: &str) -> Result<Option<Order>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order_by_payment_reference(reference, &mut conn).await
    }

    async fn fetch_payment_record(&self, reference: &str) -> Result<Option<PaymentRecord>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        payments::fetch_payment(reference, &mut conn).await
    }

    async fn fetch_delivery_events(&self, order_id: &OrderId) -> Result<Vec<DeliveryEvent>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        deliveries::fetch_events(order_id, &mut conn).await
    }

    async fn fetch_transfers_for_order(&self, order_id: &OrderId) -> Result<Vec<VendorTransfer>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        transfers::fetch_transfers_for_order(order_id, &mut conn).await
    }

    async fn fetch_transfer(&self, transfer_id: i64) -> Result<Option<VendorTransfer>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        transfers::fetch_transfer(transfer_id, &mut conn).await
    }

    async fn fetch_failed_transfers(&self) -> Result<Vec<VendorTransfer>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        transfers::fetch_transfers_with_status(TransferStatus::Failed, &mut conn).await
    }
}

impl CatalogManagement for SqliteDatabase {
    async fn create_vendor(&self, name: &str) -> Result<Vendor, MarketplaceError> {
        let _gate = self.write_gate.lock().await;
        let mut conn = self.pool.acquire().await?;
        vendors::insert_vendor(name, &mut conn).await
    }

    async fn fetch_vendor(&self, vendor_id: i64) -> Result<Option<Vendor>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        vendors::fetch_vendor(vendor_id, &mut conn).await
    }

    async fn update_vendor_payout(
        &self,
        vendor_id: i64,
        payout_account: Option<String>,
        status: PayoutStatus,
    ) -> Result<Vendor, MarketplaceError> {
        let _gate = self.write_gate.lock().await;
        let mut conn = self.pool.acquire().await?;
        vendors::update_payout(vendor_id, payout_account, status, &mut conn)
            .await?
            .ok_or(MarketplaceError::VendorNotFound(vendor_id))
    }

    async fn create_product(&self, product: NewProduct) -> Result<Product, MarketplaceError> {
        let _gate = self.write_gate.lock().await;
        let mut tx = self.pool.begin().await?;
        if vendors::fetch_vendor(product.vendor_id, &mut tx).await?.is_none() {
            return Err(MarketplaceError::VendorNotFound(product.vendor_id));
        }
        let product = products::insert_product(product, &mut tx).await?;
        tx.commit().await?;
        Ok(product)
    }

    async fn fetch_product(&self, product_id: i64) -> Result<Option<Product>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        products::fetch_product(product_id, &mut conn).await
    }

    async fn update_product(&self, product_id: i64, update: ProductUpdate) -> Result<Product, MarketplaceError> {
        let _gate = self.write_gate.lock().await;
        let mut conn = self.pool.acquire().await?;
        products::update_product(product_id, update, &mut conn)
            .await?
            .ok_or(MarketplaceError::ProductNotFound(product_id))
    }

    async fn set_cart_line(&self, owner: &OwnerKey, product_id: i64, quantity: i64) -> Result<(), MarketplaceError> {
        let _gate = self.write_gate.lock().await;
        let mut conn = self.pool.acquire().await?;
        carts::set_line(owner, product_id, quantity, &mut conn).await
    }

    async fn fetch_cart(&self, owner: &OwnerKey) -> Result<Vec<CartLine>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        carts::fetch_cart(owner, &mut conn).await
    }

    async fn clear_cart(&self, owner: &OwnerKey) -> Result<u64, MarketplaceError> {
        let _gate = self.write_gate.lock().await;
        let mut conn = self.pool.acquire().await?;
        carts::clear_cart(owner, &mut conn).await
    }
}

impl CourierManagement for SqliteDatabase {
    async fn create_courier(&self, courier: NewCourier) -> Result<Courier, MarketplaceError> {
        let _gate = self.write_gate.lock().await;
        let mut conn = self.pool.acquire().await?;
        couriers::insert_courier(courier, &mut conn).await
    }

    async fn fetch_courier(&self, courier_id: i64) -> Result<Option<Courier>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        couriers::fetch_courier(courier_id, &mut conn).await
    }

    async fn set_courier_availability(
        &self,
        courier_id: i64,
        availability: CourierAvailability,
    ) -> Result<Courier, MarketplaceError> {
        use CourierAvailability::*;
        if availability == Busy {
            return Err(MarketplaceError::ValidationError("Couriers become busy only through dispatch".into()));
        }
        let _gate = self.write_gate.lock().await;
        let mut conn = self.pool.acquire().await?;
        let courier =
            couriers::fetch_courier(courier_id, &mut conn).await?.ok_or(MarketplaceError::CourierNotFound(courier_id))?;
        match courier.availability {
            Busy => Err(MarketplaceError::ValidationError(format!("Courier #{courier_id} is on a delivery"))),
            current if current == availability => Ok(courier),
            current => couriers::update_availability_if(courier_id, current, availability, &mut conn)
                .await?
                .ok_or(MarketplaceError::CourierNotFound(courier_id)),
        }
    }
}
