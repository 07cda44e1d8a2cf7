use actix_web::{http::StatusCode, test::TestRequest};
use bazaar_engine::{
    db_types::{Money, OwnerKey, Product},
    test_utils::{seed::sample_delivery, TestMarket},
    traits::{CatalogManagement, OrderManagement, PaymentHandle, ProcessorError},
};
use serde_json::json;

use super::{
    helpers::{market_service, send_json, webhook_config, IdentityHeaders},
    mocks::{mocked_apis, MockProcessor, ProcessorMocks},
};

fn checkout_request(owner: &OwnerKey) -> TestRequest {
    TestRequest::post().uri("/api/checkout").as_customer(owner)
}

async fn stock_of(market: &TestMarket, product: &Product) -> i64 {
    market.db.fetch_product(product.id).await.unwrap().unwrap().quantity_available
}

#[actix_web::test]
async fn checkout_reserves_stock_and_returns_the_client_secret() {
    let _ = env_logger::try_init().ok();
    let market = TestMarket::new().await;
    let vendor_a = market.connected_vendor("Mama Put").await;
    let vendor_b = market.connected_vendor("Suya Spot").await;
    let rice = market.product(&vendor_a, "Jollof rice", 1500, 10).await;
    let suya = market.product(&vendor_b, "Beef suya", 800, 5).await;
    let owner = OwnerKey::customer(1);
    market.fill_cart(&owner, &[(&rice, 2), (&suya, 1)]).await;

    let mut checkout = MockProcessor::new();
    checkout
        .expect_create_payment()
        .withf(|req| req.amount == Money::from(3800) && req.currency == "usd")
        .times(1)
        .returning(|_| Ok(PaymentHandle { reference: "pi_mock_1".into(), client_secret: "pi_mock_1_secret_x".into() }));
    let mocks = ProcessorMocks { checkout, ..Default::default() };
    let service = market_service(mocked_apis(market.db.clone(), mocks), webhook_config()).await;

    let (status, body) = send_json(&service, checkout_request(&owner)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["paymentClientSecret"], "pi_mock_1_secret_x");
    assert_eq!(body["paymentReference"], "pi_mock_1");
    assert_eq!(body["total"], 3800);
    assert_eq!(body["currency"], "usd");
    assert_eq!(stock_of(&market, &rice).await, 8);
    assert_eq!(stock_of(&market, &suya).await, 4);

    let order = market.db.fetch_order_by_payment_reference("pi_mock_1").await.unwrap().expect("Order was not stored");
    assert_eq!(body["orderId"], order.order_id.as_str());
    assert_eq!(order.owner_key, owner);
    assert_eq!(order.items.len(), 2);
    market.tear_down().await;
}

#[actix_web::test]
async fn processor_outage_leaves_nothing_reserved() {
    let _ = env_logger::try_init().ok();
    let market = TestMarket::new().await;
    let vendor = market.connected_vendor("Mama Put").await;
    let rice = market.product(&vendor, "Jollof rice", 1500, 10).await;
    let owner = OwnerKey::customer(1);
    market.fill_cart(&owner, &[(&rice, 3)]).await;

    let mut checkout = MockProcessor::new();
    checkout
        .expect_create_payment()
        .times(1)
        .returning(|_| Err(ProcessorError::Unavailable("connection reset".into())));
    let mocks = ProcessorMocks { checkout, ..Default::default() };
    let service = market_service(mocked_apis(market.db.clone(), mocks), webhook_config()).await;

    let (status, body) = send_json(&service, checkout_request(&owner)).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["success"], false);
    assert_eq!(stock_of(&market, &rice).await, 10);
    // The cart survives so the shopper can try again
    assert_eq!(market.db.fetch_cart(&owner).await.unwrap().len(), 1);
    market.tear_down().await;
}

#[actix_web::test]
async fn carts_that_cannot_be_sold_are_refused_before_payment() {
    let _ = env_logger::try_init().ok();
    let market = TestMarket::new().await;
    let unconnected = market.db.create_vendor("Pending Payouts Ltd").await.unwrap();
    let connected = market.connected_vendor("Mama Put").await;
    let stew = market.product(&unconnected, "Egusi", 2000, 4).await;
    let rice = market.product(&connected, "Jollof rice", 1500, 1).await;

    let mut checkout = MockProcessor::new();
    checkout.expect_create_payment().never();
    let mocks = ProcessorMocks { checkout, ..Default::default() };
    let service = market_service(mocked_apis(market.db.clone(), mocks), webhook_config()).await;

    // Empty cart
    let (status, body) = send_json(&service, checkout_request(&OwnerKey::customer(1))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "The cart is empty");

    // Vendor that cannot be paid out
    let owner = OwnerKey::customer(2);
    market.fill_cart(&owner, &[(&stew, 1)]).await;
    let (status, _) = send_json(&service, checkout_request(&owner)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Not enough stock
    let owner = OwnerKey::customer(3);
    market.fill_cart(&owner, &[(&rice, 2)]).await;
    let (status, body) = send_json(&service, checkout_request(&owner)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["message"].as_str().unwrap().contains("Insufficient stock"), "{body}");
    assert_eq!(stock_of(&market, &rice).await, 1);
    market.tear_down().await;
}

#[actix_web::test]
async fn session_owners_must_give_delivery_details() {
    let _ = env_logger::try_init().ok();
    let market = TestMarket::new().await;
    let vendor = market.connected_vendor("Mama Put").await;
    let rice = market.product(&vendor, "Jollof rice", 1500, 10).await;
    let owner: OwnerKey = "session:guest-77".parse().unwrap();
    market.fill_cart(&owner, &[(&rice, 1)]).await;

    let mut checkout = MockProcessor::new();
    checkout
        .expect_create_payment()
        .times(1)
        .returning(|_| Ok(PaymentHandle { reference: "pi_guest".into(), client_secret: "pi_guest_secret".into() }));
    let mocks = ProcessorMocks { checkout, ..Default::default() };
    let service = market_service(mocked_apis(market.db.clone(), mocks), webhook_config()).await;

    let (status, body) = send_json(&service, checkout_request(&owner)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("delivery record"), "{body}");

    let incomplete = json!({"delivery": {"recipient_name": "Ada", "phone": " ", "address": "12 Marina Road"}});
    let (status, body) = send_json(&service, checkout_request(&owner).set_json(incomplete)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("phone"), "{body}");

    let req = checkout_request(&owner).set_json(json!({ "delivery": sample_delivery() }));
    let (status, body) = send_json(&service, req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["paymentClientSecret"], "pi_guest_secret");
    let order = market.db.fetch_order_by_payment_reference("pi_guest").await.unwrap().unwrap();
    assert_eq!(order.delivery, Some(sample_delivery()));
    market.tear_down().await;
}
