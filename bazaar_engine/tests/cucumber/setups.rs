use bazaar_engine::{
    db_types::{CourierAvailability, NewCourier},
    traits::{CatalogManagement, CourierManagement},
};
use cucumber::given;

use crate::cucumber::MarketWorld;

#[given("a fresh marketplace")]
async fn fresh_marketplace(world: &mut MarketWorld) {
    let market = bazaar_engine::test_utils::TestMarket::new().await;
    world.system = Some(market);
}

#[given(expr = "vendor {string} with a connected payout account")]
async fn connected_vendor(world: &mut MarketWorld, name: String) {
    let vendor = world.market().connected_vendor(&name).await;
    world.vendors.insert(name, vendor);
}

#[given(expr = "vendor {string} without a payout account")]
async fn unconnected_vendor(world: &mut MarketWorld, name: String) {
    let vendor = world.market().db.create_vendor(&name).await.expect("Error creating vendor");
    world.vendors.insert(name, vendor);
}

#[given(expr = "vendor {string} sells {string} at {int} cents with {int} in stock")]
async fn vendor_product(world: &mut MarketWorld, vendor: String, product: String, price: i64, stock: i64) {
    let vendor = world.vendor(&vendor).clone();
    let p = world.market().product(&vendor, &product, price, stock).await;
    world.products.insert(product, p);
}

#[given(expr = "courier {string} is online with rating {float}")]
async fn online_courier(world: &mut MarketWorld, name: String, rating: f64) {
    let courier = world.market().online_courier(&name, rating).await;
    world.couriers.insert(name, courier);
}

#[given(expr = "courier {string} is offline")]
async fn offline_courier(world: &mut MarketWorld, name: String) {
    let courier = NewCourier::new(name.as_str()).with_availability(CourierAvailability::Offline);
    let courier = world.market().db.create_courier(courier).await.expect("Error creating courier");
    world.couriers.insert(name, courier);
}
