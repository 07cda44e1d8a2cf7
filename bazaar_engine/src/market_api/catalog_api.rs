use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{
        CartLine,
        Courier,
        CourierAvailability,
        NewCourier,
        NewProduct,
        OwnerKey,
        PayoutStatus,
        Product,
        ProductUpdate,
        Vendor,
    },
    traits::{MarketplaceDatabase, MarketplaceError},
};

/// Thin, validating access to the collaborator records the settlement flow depends on: carts, vendors, products and
/// couriers.
pub struct CatalogApi<B> {
    db: B,
}

impl<B> Debug for CatalogApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CatalogApi")
    }
}

impl<B> CatalogApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> CatalogApi<B>
where B: MarketplaceDatabase
{
    /// Sets the quantity of a product in the owner's cart. Zero removes the line.
    pub async fn set_cart_line(&self, owner: &OwnerKey, product_id: i64, quantity: i64) -> Result<(), MarketplaceError> {
        if quantity < 0 {
            return Err(MarketplaceError::ValidationError("Quantity cannot be negative".to_string()));
        }
        if quantity > 0 {
            self.fetch_product(product_id).await?;
        }
        self.db.set_cart_line(owner, product_id, quantity).await
    }

    pub async fn fetch_cart(&self, owner: &OwnerKey) -> Result<Vec<CartLine>, MarketplaceError> {
        self.db.fetch_cart(owner).await
    }

    pub async fn create_vendor(&self, name: &str) -> Result<Vendor, MarketplaceError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(MarketplaceError::ValidationError("Vendor name cannot be empty".to_string()));
        }
        let vendor = self.db.create_vendor(name).await?;
        info!("🏪 Vendor #{} ({}) created", vendor.id, vendor.name);
        Ok(vendor)
    }

    pub async fn fetch_vendor(&self, vendor_id: i64) -> Result<Vendor, MarketplaceError> {
        self.db.fetch_vendor(vendor_id).await?.ok_or(MarketplaceError::VendorNotFound(vendor_id))
    }

    /// Records the state of a vendor's payout account. A connected vendor must have an account.
    pub async fn update_vendor_payout(
        &self,
        vendor_id: i64,
        payout_account: Option<String>,
        status: PayoutStatus,
    ) -> Result<Vendor, MarketplaceError> {
        let payout_account = payout_account.map(|a| a.trim().to_string()).filter(|a| !a.is_empty());
        if status == PayoutStatus::Connected && payout_account.is_none() {
            return Err(MarketplaceError::ValidationError(
                "A connected vendor needs a payout account".to_string(),
            ));
        }
        let vendor = self.db.update_vendor_payout(vendor_id, payout_account, status).await?;
        info!("🏪 Vendor #{vendor_id} payout status is now {:?}", vendor.payout_status);
        Ok(vendor)
    }

    pub async fn create_product(&self, product: NewProduct) -> Result<Product, MarketplaceError> {
        validate_product_fields(Some(&product.name), Some(product.price.value()), Some(product.quantity_available))?;
        self.db.create_product(product).await
    }

    pub async fn fetch_product(&self, product_id: i64) -> Result<Product, MarketplaceError> {
        self.db.fetch_product(product_id).await?.ok_or(MarketplaceError::ProductNotFound(product_id))
    }

    /// Updates a product. When `vendor_id` is given, the product must belong to that vendor.
    pub async fn update_product(
        &self,
        vendor_id: Option<i64>,
        product_id: i64,
        update: ProductUpdate,
    ) -> Result<Product, MarketplaceError> {
        let product = self.fetch_product(product_id).await?;
        if let Some(vendor_id) = vendor_id {
            if product.vendor_id != vendor_id {
                return Err(MarketplaceError::Forbidden(format!(
                    "Product {product_id} does not belong to vendor #{vendor_id}"
                )));
            }
        }
        if update.is_empty() {
            return Ok(product);
        }
        validate_product_fields(update.name.as_deref(), update.price.map(|p| p.value()), update.quantity_available)?;
        self.db.update_product(product_id, update).await
    }

    pub async fn create_courier(&self, courier: NewCourier) -> Result<Courier, MarketplaceError> {
        if courier.name.trim().is_empty() {
            return Err(MarketplaceError::ValidationError("Courier name cannot be empty".to_string()));
        }
        if !(0.0..=5.0).contains(&courier.rating) {
            return Err(MarketplaceError::ValidationError("Courier rating must be between 0 and 5".to_string()));
        }
        self.db.create_courier(courier).await
    }

    pub async fn fetch_courier(&self, courier_id: i64) -> Result<Courier, MarketplaceError> {
        self.db.fetch_courier(courier_id).await?.ok_or(MarketplaceError::CourierNotFound(courier_id))
    }

    pub async fn set_courier_availability(
        &self,
        courier_id: i64,
        availability: CourierAvailability,
    ) -> Result<Courier, MarketplaceError> {
        let courier = self.db.set_courier_availability(courier_id, availability).await?;
        debug!("🚚 Courier #{courier_id} is now {:?}", courier.availability);
        Ok(courier)
    }
}

fn validate_product_fields(name: Option<&str>, price: Option<i64>, quantity: Option<i64>) -> Result<(), MarketplaceError> {
    if matches!(name, Some(n) if n.trim().is_empty()) {
        return Err(MarketplaceError::ValidationError("Product name cannot be empty".to_string()));
    }
    if matches!(price, Some(p) if p < 0) {
        return Err(MarketplaceError::ValidationError("Price cannot be negative".to_string()));
    }
    if matches!(quantity, Some(q) if q < 0) {
        return Err(MarketplaceError::ValidationError("Stock cannot be negative".to_string()));
    }
    Ok(())
}
