use actix_web::{http::StatusCode, test::TestRequest};
use bazaar_engine::{
    db_types::{Courier, CourierAvailability, OrderStatusType, OwnerKey},
    order_objects::CheckoutResult,
    test_utils::TestMarket,
    traits::{CatalogManagement, CourierManagement, OrderManagement, SettlementOutcome},
};
use serde_json::json;

use super::helpers::{fake_apis, market_service, send, send_json, webhook_config, IdentityHeaders};

/// Checks out one order for `owner` and settles it, which hands it to the only courier on shift.
async fn assigned_order(market: &TestMarket, owner: &OwnerKey) -> (CheckoutResult, Courier) {
    let vendor = market.connected_vendor("Mama Put").await;
    let rice = market.product(&vendor, "Jollof rice", 1500, 10).await;
    let courier = market.online_courier("Tunde", 4.5).await;
    market.fill_cart(owner, &[(&rice, 1)]).await;
    let checkout = market.checkout(owner).await;
    market
        .settlement
        .handle_processor_notification(&checkout.payment_reference, SettlementOutcome::Settled)
        .await
        .expect("Settlement failed");
    (checkout, courier)
}

fn status_update(order: &CheckoutResult, status: &str) -> TestRequest {
    TestRequest::patch().uri(&format!("/api/orders/{}/status", order.order_id)).set_json(json!({ "status": status }))
}

#[actix_web::test]
async fn orders_are_visible_to_their_owner_and_admins() {
    let _ = env_logger::try_init().ok();
    let market = TestMarket::new().await;
    let vendor = market.connected_vendor("Mama Put").await;
    let rice = market.product(&vendor, "Jollof rice", 1500, 10).await;
    let owner = OwnerKey::customer(1);
    market.fill_cart(&owner, &[(&rice, 2)]).await;
    let checkout = market.checkout(&owner).await;
    let service = market_service(fake_apis(&market), webhook_config()).await;
    let uri = format!("/api/orders/{}", checkout.order_id);

    let (status, order) = send_json(&service, TestRequest::get().uri(&uri).as_customer(&owner)).await;
    assert_eq!(status, StatusCode::OK, "{order}");
    assert_eq!(order["order_id"], checkout.order_id.as_str());
    assert_eq!(order["status"], "pending");
    assert_eq!(order["total"], 3000);
    assert_eq!(order["items"][0]["quantity"], 2);

    let (status, _) = send_json(&service, TestRequest::get().uri(&uri).as_customer(&OwnerKey::customer(2))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, order) = send_json(&service, TestRequest::get().uri(&uri).as_admin()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["owner_key"], owner.as_str());

    let (status, _) = send_json(&service, TestRequest::get().uri(&uri).as_courier(1)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send_json(&service, TestRequest::get().uri("/api/orders/ord_missing").as_admin()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    market.tear_down().await;
}

#[actix_web::test]
async fn owners_can_cancel_unpaid_orders() {
    let _ = env_logger::try_init().ok();
    let market = TestMarket::new().await;
    let vendor = market.connected_vendor("Mama Put").await;
    let rice = market.product(&vendor, "Jollof rice", 1500, 10).await;
    let owner = OwnerKey::customer(1);
    market.fill_cart(&owner, &[(&rice, 4)]).await;
    let checkout = market.checkout(&owner).await;
    let service = market_service(fake_apis(&market), webhook_config()).await;
    let uri = format!("/api/orders/{}/cancel", checkout.order_id);

    let (status, _) = send_json(&service, TestRequest::post().uri(&uri).as_customer(&OwnerKey::customer(2))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send_json(&service, TestRequest::post().uri(&uri).as_customer(&owner)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["settlementStatus"], "failed");
    assert_eq!(body["orderStatus"], "cancelled");
    assert_eq!(body["applied"], true);
    assert_eq!(market.processor.cancel_calls(), 1);
    assert_eq!(market.db.fetch_product(rice.id).await.unwrap().unwrap().quantity_available, 10);

    let (status, _) = send_json(&service, TestRequest::post().uri(&uri).as_customer(&owner)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    market.tear_down().await;
}

#[actix_web::test]
async fn paid_orders_cannot_be_cancelled_by_their_owner() {
    let _ = env_logger::try_init().ok();
    let market = TestMarket::new().await;
    let owner = OwnerKey::customer(1);
    let (checkout, _) = assigned_order(&market, &owner).await;
    let service = market_service(fake_apis(&market), webhook_config()).await;

    let uri = format!("/api/orders/{}/cancel", checkout.order_id);
    let (status, _) = send_json(&service, TestRequest::post().uri(&uri).as_customer(&owner)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let order = market.db.fetch_order(&checkout.order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::Assigned);
    market.tear_down().await;
}

#[actix_web::test]
async fn courier_walks_the_order_through_delivery() {
    let _ = env_logger::try_init().ok();
    let market = TestMarket::new().await;
    let owner = OwnerKey::customer(1);
    let (checkout, courier) = assigned_order(&market, &owner).await;
    let service = market_service(fake_apis(&market), webhook_config()).await;

    // Customers do not move orders
    let (status, _) = send_json(&service, status_update(&checkout, "picked_up").as_customer(&owner)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    // Nor do couriers the order was not given to
    let (status, _) = send_json(&service, status_update(&checkout, "picked_up").as_courier(courier.id + 1)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    // Steps cannot be skipped
    let (status, body) = send_json(&service, status_update(&checkout, "delivered").as_courier(courier.id)).await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");
    // Completion is the payment's business
    let (status, _) = send_json(&service, status_update(&checkout, "completed").as_courier(courier.id)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    for next in ["picked_up", "in_transit", "delivered"] {
        let (status, order) = send_json(&service, status_update(&checkout, next).as_courier(courier.id)).await;
        assert_eq!(status, StatusCode::OK, "{order}");
        assert_eq!(order["status"], next);
    }

    let courier = market.db.fetch_courier(courier.id).await.unwrap().unwrap();
    assert_eq!(courier.availability, CourierAvailability::Online);
    assert_eq!(courier.total_deliveries, 1);

    // Delivered is final
    let (status, _) = send_json(&service, status_update(&checkout, "in_transit").as_admin()).await;
    assert_eq!(status, StatusCode::CONFLICT);
    market.tear_down().await;
}

#[actix_web::test]
async fn admins_can_advance_deliveries() {
    let _ = env_logger::try_init().ok();
    let market = TestMarket::new().await;
    let owner = OwnerKey::customer(1);
    let (checkout, _) = assigned_order(&market, &owner).await;
    let service = market_service(fake_apis(&market), webhook_config()).await;

    let (status, order) = send_json(&service, status_update(&checkout, "picked_up").as_admin()).await;
    assert_eq!(status, StatusCode::OK, "{order}");
    assert_eq!(order["status"], "picked_up");

    let uri = format!("/api/admin/orders/{}/deliveries", checkout.order_id);
    let (status, events) = send_json(&service, TestRequest::get().uri(&uri).as_admin()).await;
    assert_eq!(status, StatusCode::OK);
    let events = events.as_array().unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["status"], "assigned");
    assert_eq!(events[0]["actor"], "dispatch");
    assert_eq!(events[1]["status"], "picked_up");
    assert_eq!(events[1]["actor"], "admin");
    market.tear_down().await;
}

#[actix_web::test]
async fn admins_see_the_payouts_of_an_order() {
    let _ = env_logger::try_init().ok();
    let market = TestMarket::new().await;
    let owner = OwnerKey::customer(1);
    let (checkout, _) = assigned_order(&market, &owner).await;
    let service = market_service(fake_apis(&market), webhook_config()).await;

    let uri = format!("/api/admin/orders/{}/transfers", checkout.order_id);
    let (status, transfers) = send_json(&service, TestRequest::get().uri(&uri).as_admin()).await;
    assert_eq!(status, StatusCode::OK, "{transfers}");
    let transfers = transfers.as_array().unwrap();
    assert_eq!(transfers.len(), 1);
    assert_eq!(transfers[0]["amount"], 1455);
    assert_eq!(transfers[0]["status"], "sent");
    assert_eq!(transfers[0]["payment_reference"], checkout.payment_reference.as_str());

    let (status, _) = send(&service, TestRequest::get().uri(&uri).as_customer(&owner)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let missing = TestRequest::get().uri("/api/admin/orders/ord_missing/transfers").as_admin();
    let (status, _) = send(&service, missing).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    market.tear_down().await;
}
