use std::time::Duration;

use bazaar_common::Money;
use bazaar_engine::{
    db_types::{CourierAvailability, OrderStatusType, TransferStatus},
    market_api::order_objects::CheckoutRequest,
    order_state::TransitionActor,
    test_utils::seed::sample_delivery,
    traits::{CatalogManagement, CourierManagement, OrderManagement, SettlementOutcome},
    MarketplaceError,
};
use cucumber::{then, when};

use crate::cucumber::MarketWorld;

#[when(expr = "customer {string} adds {int} {string} to their cart")]
async fn add_to_cart(world: &mut MarketWorld, customer: String, qty: i64, product: String) {
    let product = world.product(&product).clone();
    world.market().fill_cart(&MarketWorld::owner(&customer), &[(&product, qty)]).await;
}

#[when(expr = "customer {string} checks out")]
async fn check_out(world: &mut MarketWorld, customer: String) {
    let request = CheckoutRequest::new(MarketWorld::owner(&customer)).with_delivery(sample_delivery());
    match world.market().checkout.checkout(request).await {
        Ok(result) => {
            world.orders.insert(customer, result);
            world.last_error = None;
        },
        Err(e) => world.last_error = Some(e),
    }
}

#[when(expr = "the processor captures the payment for {string}")]
async fn processor_captures(world: &mut MarketWorld, customer: String) {
    let reference = world.order_of(&customer).payment_reference.clone();
    world.market().processor.settle(&reference);
}

#[when(expr = "the processor notifies that the payment for {string} {word}")]
async fn processor_notifies(world: &mut MarketWorld, customer: String, outcome: String) {
    let outcome = match outcome.as_str() {
        "settled" => SettlementOutcome::Settled,
        "failed" => SettlementOutcome::Failed,
        _ => SettlementOutcome::Pending,
    };
    let reference = world.order_of(&customer).payment_reference.clone();
    world.market().settlement.handle_processor_notification(&reference, outcome).await.expect("Notification failed");
}

#[when(expr = "customer {string} confirms their payment")]
async fn client_confirms(world: &mut MarketWorld, customer: String) {
    let reference = world.order_of(&customer).payment_reference.clone();
    world.market().settlement.confirm_payment(&reference).await.expect("Confirmation failed");
}

#[when(expr = "customer {string} cancels their order")]
async fn owner_cancels(world: &mut MarketWorld, customer: String) {
    let order_id = world.order_of(&customer).order_id.clone();
    let result = world.market().orders.cancel_order(&MarketWorld::owner(&customer), &order_id).await;
    world.last_error = result.err();
}

#[when(expr = "courier {string} marks the order of {string} as {word}")]
async fn courier_update(world: &mut MarketWorld, courier: String, customer: String, status: String) {
    let courier_id = world.courier(&courier).id;
    let order_id = world.order_of(&customer).order_id.clone();
    let status = status.parse::<OrderStatusType>().expect("Invalid status");
    let result = world.market().orders.update_status(&order_id, status, TransitionActor::Courier(courier_id)).await;
    world.last_error = result.err();
}

#[when(expr = "courier {string} comes online")]
async fn courier_online(world: &mut MarketWorld, courier: String) {
    let id = world.courier(&courier).id;
    world.market().db.set_courier_availability(id, CourierAvailability::Online).await.expect("Error updating courier");
}

#[when(expr = "the order of {string} is re-dispatched")]
async fn redispatch(world: &mut MarketWorld, customer: String) {
    let order_id = world.order_of(&customer).order_id.clone();
    world.market().orders.redispatch(&order_id).await.expect("Re-dispatch failed");
}

#[when(expr = "stale orders older than {int} seconds are expired")]
async fn expire(world: &mut MarketWorld, secs: i64) {
    // Make sure "now" has moved past the order timestamps
    tokio::time::sleep(Duration::from_millis(20)).await;
    world.market().settlement.expire_stale_orders(chrono::Duration::seconds(secs)).await.expect("Expiry failed");
}

#[then(expr = "the order of {string} is {word}")]
async fn check_order_status(world: &mut MarketWorld, customer: String, status: String) {
    let order_id = world.order_of(&customer).order_id.clone();
    let expected = status.parse::<OrderStatusType>().expect("Invalid status");
    let order = world.market().db.fetch_order(&order_id).await.expect("Error fetching order").expect("No such order");
    assert_eq!(order.status, expected);
}

#[then(expr = "the order of {string} totals {int} cents with {int} cents commission")]
async fn check_totals(world: &mut MarketWorld, customer: String, total: i64, commission: i64) {
    let result = world.order_of(&customer);
    assert_eq!(result.total, Money::from(total));
    assert_eq!(result.commission, Money::from(commission));
}

#[then(expr = "checkout fails because of {word} {word}")]
async fn checkout_fails(world: &mut MarketWorld, first: String, second: String) {
    let err = world.last_error.as_ref().expect("Checkout did not fail");
    let ok = match (first.as_str(), second.as_str()) {
        ("insufficient", "stock") => matches!(err, MarketplaceError::InsufficientStock { .. }),
        ("empty", "cart") => matches!(err, MarketplaceError::EmptyCart),
        ("vendor", "payouts") => matches!(err, MarketplaceError::VendorPayoutUnavailable(_)),
        _ => panic!("Unknown failure reason {first} {second}"),
    };
    assert!(ok, "Unexpected error: {err}");
}

#[then(expr = "the request is refused as {word}")]
async fn request_refused(world: &mut MarketWorld, kind: String) {
    let err = world.last_error.as_ref().expect("The request succeeded");
    let ok = match kind.as_str() {
        "forbidden" => matches!(err, MarketplaceError::Forbidden(_)),
        "invalid" => matches!(err, MarketplaceError::InvalidTransition { .. }),
        _ => panic!("Unknown refusal {kind}"),
    };
    assert!(ok, "Unexpected error: {err}");
}

#[then(expr = "{string} has {int} in stock")]
async fn check_stock(world: &mut MarketWorld, product: String, stock: i64) {
    let id = world.product(&product).id;
    let product = world.market().db.fetch_product(id).await.expect("Error fetching product").expect("No product");
    assert_eq!(product.quantity_available, stock);
}

#[then(expr = "vendor {string} is paid {int} cents for the order of {string}")]
async fn check_payout(world: &mut MarketWorld, vendor: String, amount: i64, customer: String) {
    let vendor_id = world.vendor(&vendor).id;
    let order_id = world.order_of(&customer).order_id.clone();
    let transfers = world.market().db.fetch_transfers_for_order(&order_id).await.expect("Error fetching transfers");
    let transfer = transfers.iter().find(|t| t.vendor_id == vendor_id).expect("No transfer for vendor");
    assert_eq!(transfer.amount, Money::from(amount));
    assert_eq!(transfer.status, TransferStatus::Sent);
}

#[then(expr = "the order of {string} has {int} payouts")]
async fn check_payout_count(world: &mut MarketWorld, customer: String, count: usize) {
    let order_id = world.order_of(&customer).order_id.clone();
    let transfers = world.market().db.fetch_transfers_for_order(&order_id).await.expect("Error fetching transfers");
    assert_eq!(transfers.len(), count);
}

#[then(expr = "the order of {string} is assigned to courier {string}")]
async fn check_courier(world: &mut MarketWorld, customer: String, courier: String) {
    let order_id = world.order_of(&customer).order_id.clone();
    let courier_id = world.courier(&courier).id;
    let order = world.market().db.fetch_order(&order_id).await.expect("Error fetching order").expect("No such order");
    assert_eq!(order.status, OrderStatusType::Assigned);
    assert_eq!(order.courier_id, Some(courier_id));
}

#[then(expr = "courier {string} has made {int} deliveries")]
async fn check_deliveries(world: &mut MarketWorld, courier: String, count: i64) {
    let id = world.courier(&courier).id;
    let courier = world.market().db.fetch_courier(id).await.expect("Error fetching courier").expect("No courier");
    assert_eq!(courier.total_deliveries, count);
    assert_eq!(courier.availability, CourierAvailability::Online);
}
