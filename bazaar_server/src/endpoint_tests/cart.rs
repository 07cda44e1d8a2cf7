use actix_web::{http::StatusCode, test::TestRequest};
use bazaar_engine::{db_types::OwnerKey, test_utils::TestMarket};
use serde_json::json;

use super::helpers::{fake_apis, market_service, send, send_json, webhook_config, IdentityHeaders};

#[actix_web::test]
async fn cart_needs_an_identity() {
    let _ = env_logger::try_init().ok();
    let market = TestMarket::new().await;
    let service = market_service(fake_apis(&market), webhook_config()).await;
    let (status, body) = send(&service, TestRequest::get().uri("/api/cart")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.contains("X-Role"), "{body}");

    let req = TestRequest::get().uri("/api/cart").insert_header(("X-Role", "customer"));
    let (status, _) = send(&service, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&service, TestRequest::get().uri("/api/cart").as_courier(3)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    market.tear_down().await;
}

#[actix_web::test]
async fn add_update_and_remove_cart_lines() {
    let _ = env_logger::try_init().ok();
    let market = TestMarket::new().await;
    let vendor = market.connected_vendor("Mama Put").await;
    let rice = market.product(&vendor, "Jollof rice", 1500, 10).await;
    let plantain = market.product(&vendor, "Dodo", 500, 10).await;
    let owner = OwnerKey::customer(7);
    let service = market_service(fake_apis(&market), webhook_config()).await;

    let req = TestRequest::put()
        .uri("/api/cart/items")
        .as_customer(&owner)
        .set_json(json!({"product_id": rice.id, "quantity": 2}));
    let (status, lines) = send_json(&service, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(lines.as_array().unwrap().len(), 1);
    assert_eq!(lines[0]["product_id"], rice.id);
    assert_eq!(lines[0]["quantity"], 2);

    let req = TestRequest::put()
        .uri("/api/cart/items")
        .as_customer(&owner)
        .set_json(json!({"product_id": plantain.id, "quantity": 3}));
    let (status, lines) = send_json(&service, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(lines.as_array().unwrap().len(), 2);

    // Zero removes the line
    let req = TestRequest::put()
        .uri("/api/cart/items")
        .as_customer(&owner)
        .set_json(json!({"product_id": rice.id, "quantity": 0}));
    let (status, _) = send(&service, req).await;
    assert_eq!(status, StatusCode::OK);

    let (status, lines) = send_json(&service, TestRequest::get().uri("/api/cart").as_customer(&owner)).await;
    assert_eq!(status, StatusCode::OK);
    let lines = lines.as_array().unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["product_id"], plantain.id);
    assert_eq!(lines[0]["quantity"], 3);

    // Someone else's cart is untouched
    let other = OwnerKey::customer(8);
    let (_, lines) = send_json(&service, TestRequest::get().uri("/api/cart").as_customer(&other)).await;
    assert!(lines.as_array().unwrap().is_empty());
    market.tear_down().await;
}

#[actix_web::test]
async fn invalid_cart_lines_are_rejected() {
    let _ = env_logger::try_init().ok();
    let market = TestMarket::new().await;
    let vendor = market.connected_vendor("Mama Put").await;
    let rice = market.product(&vendor, "Jollof rice", 1500, 10).await;
    let owner: OwnerKey = "session:kiosk-12".parse().unwrap();
    let service = market_service(fake_apis(&market), webhook_config()).await;

    let req = TestRequest::put()
        .uri("/api/cart/items")
        .as_customer(&owner)
        .set_json(json!({"product_id": rice.id, "quantity": -1}));
    let (status, body) = send_json(&service, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Invalid request. Quantity cannot be negative");

    let req = TestRequest::put()
        .uri("/api/cart/items")
        .as_customer(&owner)
        .set_json(json!({"product_id": 9999, "quantity": 1}));
    let (status, _) = send(&service, req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    market.tear_down().await;
}
