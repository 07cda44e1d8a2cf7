use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{
    db_types::{
        NewDeliveryEvent,
        NewOrder,
        Order,
        OrderId,
        OrderStatusType,
        OwnerKey,
        VendorTransfer,
    },
    traits::{
        data_objects::{CartQuote, CourierAssignment, OrderChanged, SettlementApplied, SettlementPolicy, TransferResult},
        CatalogManagement,
        CourierManagement,
        OrderManagement,
        SettlementOutcome,
    },
};

/// This trait defines the highest level of behaviour for storage backends supporting the marketplace engine.
///
/// Every method that writes is expected to be atomic. Either all of its effects are persisted, or none are.
#[allow(async_fn_in_trait)]
pub trait MarketplaceDatabase: Clone + OrderManagement + CatalogManagement + CourierManagement {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Reads the owner's cart, the products it references and their vendors in a single consistent snapshot and prices
    /// the cart.
    ///
    /// Nothing is written. Fails with
    /// * [`MarketplaceError::EmptyCart`] if the cart has no lines,
    /// * [`MarketplaceError::ProductNotFound`] if a line points at a product that no longer exists,
    /// * [`MarketplaceError::InsufficientStock`] for the first line that asks for more than is available,
    /// * [`MarketplaceError::VendorPayoutUnavailable`] listing every vendor in the cart that cannot receive payouts.
    async fn quote_cart(&self, owner: &OwnerKey) -> Result<CartQuote, MarketplaceError>;

    /// Persists a new order together with its payment record, and reserves stock for every line.
    ///
    /// Each stock decrement is conditional on enough stock remaining at the moment of the write, so concurrent
    /// checkouts can never oversell. If any line cannot be reserved, or a product price changed since the quote, the
    /// whole operation is rolled back.
    async fn commit_checkout(&self, order: NewOrder) -> Result<Order, MarketplaceError>;

    /// Applies a definitive payment outcome to the payment identified by `reference`, atomically.
    ///
    /// This is the single entry point for both client confirmations and processor webhooks, and it is idempotent: once
    /// a payment has settled or failed, later calls are no-ops that report [`SettlementApplied::AlreadyApplied`].
    ///
    /// * `Settled`: the payment is marked settled, a pending `pending -> completed` order transition is made, the
    ///   vendor transfer ledger entries are written and the owner's cart is cleared.
    /// * `Failed`: the payment is marked failed, the order is cancelled and its reserved stock is released.
    /// * `Pending`: nothing changes.
    async fn apply_settlement(
        &self,
        reference: &str,
        outcome: SettlementOutcome,
        policy: &SettlementPolicy,
    ) -> Result<SettlementApplied, MarketplaceError>;

    /// Records the result of an attempt to pay a vendor transfer out.
    async fn record_transfer_result(
        &self,
        transfer_id: i64,
        result: TransferResult,
    ) -> Result<VendorTransfer, MarketplaceError>;

    /// Moves an order from `from` to `to`, provided its status is still `from`, and appends `event` to the delivery
    /// audit trail. Moving to `delivered` releases the courier and increments its delivery count.
    ///
    /// The transition itself is not validated here; callers check it against the order state machine first.
    async fn advance_order_status(
        &self,
        order_id: &OrderId,
        from: OrderStatusType,
        to: OrderStatusType,
        event: NewDeliveryEvent,
    ) -> Result<Order, MarketplaceError>;

    /// Selects the best available courier for the order and assigns it in a single transaction. The courier is marked
    /// busy and the order moves to `assigned` with the given delivery estimate.
    ///
    /// Returns `None` if no courier is eligible. The order must be `pending` or `completed` and have no courier.
    async fn assign_courier(
        &self,
        order_id: &OrderId,
        estimated_delivery_at: DateTime<Utc>,
    ) -> Result<Option<CourierAssignment>, MarketplaceError>;

    /// Forces the order into `status`, bypassing the transition table. Used only for administrative overrides.
    ///
    /// Cancelling releases reserved stock and the assigned courier, and fails an unsettled payment record. Forcing
    /// `completed` requires a settled payment. A cancelled order cannot be reopened.
    async fn force_order_status(
        &self,
        order_id: &OrderId,
        status: OrderStatusType,
        reason: &str,
    ) -> Result<OrderChanged, MarketplaceError>;

    /// Returns the orders created before `cutoff` whose payment is still open, oldest first. These are `pending`
    /// orders, plus any that were dispatched before payment and are still `assigned`.
    async fn fetch_stale_unpaid_orders(&self, cutoff: DateTime<Utc>) -> Result<Vec<Order>, MarketplaceError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), MarketplaceError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum MarketplaceError {
    #[error("We have an internal database engine (configuration/uptime etc.) : {0}")]
    DatabaseError(String),
    #[error("The cart is empty")]
    EmptyCart,
    #[error("Insufficient stock for product {product_id}. Requested {requested}, but only {available} available")]
    InsufficientStock { product_id: i64, requested: i64, available: i64 },
    #[error("These vendors cannot receive payouts yet: {0:?}")]
    VendorPayoutUnavailable(Vec<i64>),
    #[error("Illegal order status change from {from} to {to}")]
    InvalidTransition { from: OrderStatusType, to: OrderStatusType },
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("The requested payment does not exist for reference {0}")]
    PaymentNotFound(String),
    #[error("The requested product {0} does not exist")]
    ProductNotFound(i64),
    #[error("The requested courier {0} does not exist")]
    CourierNotFound(i64),
    #[error("The requested vendor {0} does not exist")]
    VendorNotFound(i64),
    #[error("The requested vendor transfer {0} does not exist")]
    TransferNotFound(i64),
    #[error("Payment processor error. {0}")]
    ProcessorError(String),
    #[error("Invalid request. {0}")]
    ValidationError(String),
    #[error("You are not allowed to do that. {0}")]
    Forbidden(String),
    #[error("Ledger invariant violated. {0}")]
    InvariantViolation(String),
}

impl From<sqlx::Error> for MarketplaceError {
    fn from(e: sqlx::Error) -> Self {
        MarketplaceError::DatabaseError(e.to_string())
    }
}
