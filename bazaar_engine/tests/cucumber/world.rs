use std::collections::HashMap;

use bazaar_engine::{
    db_types::{Courier, OwnerKey, Product, Vendor},
    order_objects::CheckoutResult,
    test_utils::TestMarket,
    MarketplaceError,
};
use cucumber::World;

#[derive(Default, Debug, World)]
pub struct MarketWorld {
    pub system: Option<TestMarket>,
    pub vendors: HashMap<String, Vendor>,
    pub products: HashMap<String, Product>,
    pub couriers: HashMap<String, Courier>,
    /// The latest order placed by each customer.
    pub orders: HashMap<String, CheckoutResult>,
    pub last_error: Option<MarketplaceError>,
}

impl MarketWorld {
    pub fn market(&self) -> &TestMarket {
        self.system.as_ref().expect("Marketplace not initialised")
    }

    pub fn vendor(&self, name: &str) -> &Vendor {
        self.vendors.get(name).unwrap_or_else(|| panic!("Unknown vendor {name}"))
    }

    pub fn product(&self, name: &str) -> &Product {
        self.products.get(name).unwrap_or_else(|| panic!("Unknown product {name}"))
    }

    pub fn courier(&self, name: &str) -> &Courier {
        self.couriers.get(name).unwrap_or_else(|| panic!("Unknown courier {name}"))
    }

    pub fn order_of(&self, customer: &str) -> &CheckoutResult {
        self.orders.get(customer).unwrap_or_else(|| panic!("{customer} has not placed an order"))
    }

    pub fn owner(customer: &str) -> OwnerKey {
        OwnerKey::customer(customer)
    }
}
