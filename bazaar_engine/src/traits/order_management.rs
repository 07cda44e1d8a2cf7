use crate::{
    db_types::{DeliveryEvent, Order, OrderId, PaymentRecord, VendorTransfer},
    traits::MarketplaceError,
};

/// Read-only queries over orders and the records that hang off them.
#[allow(async_fn_in_trait)]
pub trait OrderManagement {
    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, MarketplaceError>;

    async fn fetch_order_by_payment_reference(&self, reference: &str) -> Result<Option<Order>, MarketplaceError>;

    async fn fetch_payment_record(&self, reference: &str) -> Result<Option<PaymentRecord>, MarketplaceError>;

    /// The delivery audit trail for the order, oldest first.
    async fn fetch_delivery_events(&self, order_id: &OrderId) -> Result<Vec<DeliveryEvent>, MarketplaceError>;

    async fn fetch_transfers_for_order(&self, order_id: &OrderId) -> Result<Vec<VendorTransfer>, MarketplaceError>;

    async fn fetch_transfer(&self, transfer_id: i64) -> Result<Option<VendorTransfer>, MarketplaceError>;

    /// All transfers that could not be paid out, oldest first.
    async fn fetch_failed_transfers(&self) -> Result<Vec<VendorTransfer>, MarketplaceError>;
}
