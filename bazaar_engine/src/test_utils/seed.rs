use log::*;
use sqlx::{migrate::MigrateDatabase, Sqlite};

use crate::{
    db_types::{Courier, CourierAvailability, DeliveryRecord, Money, NewCourier, NewProduct, OwnerKey, PayoutStatus, Product, Vendor},
    events::EventProducers,
    market_api::order_objects::{CheckoutRequest, CheckoutResult, DispatchPolicy},
    test_utils::{prepare_test_env, random_db_path, FakeProcessor},
    traits::{CatalogManagement, CourierManagement, MarketplaceDatabase, SettlementPolicy},
    CatalogApi,
    CheckoutApi,
    DispatchApi,
    OrderFlowApi,
    SettlementApi,
    SqliteDatabase,
};

/// A complete marketplace on a throwaway database and a fake processor.
#[derive(Debug)]
pub struct TestMarket {
    pub db: SqliteDatabase,
    pub processor: FakeProcessor,
    pub catalog: CatalogApi<SqliteDatabase>,
    pub checkout: CheckoutApi<SqliteDatabase, FakeProcessor>,
    pub settlement: SettlementApi<SqliteDatabase, FakeProcessor>,
    pub dispatch: DispatchApi<SqliteDatabase>,
    pub orders: OrderFlowApi<SqliteDatabase, FakeProcessor>,
}

impl TestMarket {
    pub async fn new() -> Self {
        Self::with_producers(EventProducers::default()).await
    }

    pub async fn with_producers(producers: EventProducers) -> Self {
        let url = random_db_path();
        let db = prepare_test_env(&url).await;
        let processor = FakeProcessor::new();
        let policy = SettlementPolicy::default();
        let dispatch = DispatchApi::new(db.clone(), DispatchPolicy::default(), producers.clone());
        let settlement =
            SettlementApi::new(db.clone(), processor.clone(), policy.clone(), dispatch.clone(), producers.clone());
        let orders = OrderFlowApi::new(db.clone(), settlement.clone(), dispatch.clone(), producers);
        Self {
            catalog: CatalogApi::new(db.clone()),
            checkout: CheckoutApi::new(db.clone(), processor.clone(), policy),
            settlement,
            dispatch,
            orders,
            db,
            processor,
        }
    }

    /// Closes the database and deletes it.
    pub async fn tear_down(self) {
        let url = self.db.url().to_string();
        let mut db = self.db;
        if let Err(e) = db.close().await {
            error!("🚀️ Failed to close database: {e}");
        }
        if let Err(e) = Sqlite::drop_database(&url).await {
            warn!("🚀️ Could not remove test database {url}: {e}");
        }
    }

    /// Creates a vendor whose payout account is connected.
    pub async fn connected_vendor(&self, name: &str) -> Vendor {
        let vendor = self.db.create_vendor(name).await.expect("Error creating vendor");
        self.db
            .update_vendor_payout(vendor.id, Some(format!("acct_{}", vendor.id)), PayoutStatus::Connected)
            .await
            .expect("Error connecting vendor")
    }

    pub async fn product(&self, vendor: &Vendor, name: &str, price_cents: i64, stock: i64) -> Product {
        let product = NewProduct::new(vendor.id, name, Money::from(price_cents), stock);
        self.db.create_product(product).await.expect("Error creating product")
    }

    pub async fn online_courier(&self, name: &str, rating: f64) -> Courier {
        let courier = NewCourier::new(name).with_rating(rating).with_availability(CourierAvailability::Online);
        self.db.create_courier(courier).await.expect("Error creating courier")
    }

    pub async fn fill_cart(&self, owner: &OwnerKey, lines: &[(&Product, i64)]) {
        for (product, qty) in lines {
            self.db.set_cart_line(owner, product.id, *qty).await.expect("Error filling cart");
        }
    }

    /// Checks out with a complete delivery record.
    pub async fn checkout(&self, owner: &OwnerKey) -> CheckoutResult {
        let request = CheckoutRequest::new(owner.clone()).with_delivery(sample_delivery());
        self.checkout.checkout(request).await.expect("Checkout failed")
    }
}

pub fn sample_delivery() -> DeliveryRecord {
    DeliveryRecord {
        recipient_name: "Ada Obi".to_string(),
        phone: "+2348000000000".to_string(),
        address: "12 Marina Road, Lagos".to_string(),
        notes: None,
    }
}
