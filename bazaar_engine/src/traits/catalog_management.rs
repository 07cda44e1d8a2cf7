use crate::{
    db_types::{CartLine, NewProduct, OwnerKey, PayoutStatus, Product, ProductUpdate, Vendor},
    traits::MarketplaceError,
};

/// Minimal management of the records owned by the catalog and cart services.
#[allow(async_fn_in_trait)]
pub trait CatalogManagement {
    async fn create_vendor(&self, name: &str) -> Result<Vendor, MarketplaceError>;

    async fn fetch_vendor(&self, vendor_id: i64) -> Result<Option<Vendor>, MarketplaceError>;

    async fn update_vendor_payout(
        &self,
        vendor_id: i64,
        payout_account: Option<String>,
        status: PayoutStatus,
    ) -> Result<Vendor, MarketplaceError>;

    async fn create_product(&self, product: NewProduct) -> Result<Product, MarketplaceError>;

    async fn fetch_product(&self, product_id: i64) -> Result<Option<Product>, MarketplaceError>;

    async fn update_product(&self, product_id: i64, update: ProductUpdate) -> Result<Product, MarketplaceError>;

    /// Sets the quantity of `product_id` in the owner's cart. A quantity of zero removes the line.
    async fn set_cart_line(&self, owner: &OwnerKey, product_id: i64, quantity: i64) -> Result<(), MarketplaceError>;

    async fn fetch_cart(&self, owner: &OwnerKey) -> Result<Vec<CartLine>, MarketplaceError>;

    /// Removes every line from the owner's cart, returning the number of lines removed.
    async fn clear_cart(&self, owner: &OwnerKey) -> Result<u64, MarketplaceError>;
}
