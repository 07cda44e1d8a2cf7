use actix_web::{http::StatusCode, test::TestRequest};
use bazaar_engine::{
    db_types::{NewCourier, OrderStatusType, OwnerKey},
    test_utils::TestMarket,
    traits::{CatalogManagement, CourierManagement, OrderManagement, SettlementOutcome},
};
use serde_json::json;

use super::helpers::{fake_apis, market_service, send_json, webhook_config, IdentityHeaders};

#[actix_web::test]
async fn overrides_need_a_reason() {
    let _ = env_logger::try_init().ok();
    let market = TestMarket::new().await;
    let vendor = market.connected_vendor("Mama Put").await;
    let rice = market.product(&vendor, "Jollof rice", 1500, 10).await;
    let owner = OwnerKey::customer(1);
    market.fill_cart(&owner, &[(&rice, 2)]).await;
    let checkout = market.checkout(&owner).await;
    let service = market_service(fake_apis(&market), webhook_config()).await;
    let uri = format!("/api/admin/orders/{}/override", checkout.order_id);

    let req = TestRequest::post().uri(&uri).as_customer(&owner).set_json(json!({"status": "cancelled", "reason": "x"}));
    let (status, _) = send_json(&service, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let req = TestRequest::post().uri(&uri).as_admin().set_json(json!({"status": "cancelled", "reason": "  "}));
    let (status, body) = send_json(&service, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid request. An override needs a reason");

    let req = TestRequest::post()
        .uri(&uri)
        .as_admin()
        .set_json(json!({"status": "cancelled", "reason": "Customer phoned in a duplicate order"}));
    let (status, changed) = send_json(&service, req).await;
    assert_eq!(status, StatusCode::OK, "{changed}");
    assert_eq!(changed["old_order"]["status"], "pending");
    assert_eq!(changed["new_order"]["status"], "cancelled");
    assert_eq!(market.processor.cancel_calls(), 1);
    assert_eq!(market.db.fetch_product(rice.id).await.unwrap().unwrap().quantity_available, 10);

    let events = market.db.fetch_delivery_events(&checkout.order_id).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].note.as_deref(), Some("Customer phoned in a duplicate order"));

    // Cancelled orders stay cancelled
    let req = TestRequest::post().uri(&uri).as_admin().set_json(json!({"status": "pending", "reason": "Oops"}));
    let (status, _) = send_json(&service, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    market.tear_down().await;
}

#[actix_web::test]
async fn failed_payouts_can_be_retried() {
    let _ = env_logger::try_init().ok();
    let market = TestMarket::new().await;
    let healthy = market.connected_vendor("Mama Put").await;
    let troubled = market.connected_vendor("Suya Spot").await;
    let rice = market.product(&healthy, "Jollof rice", 1000, 10).await;
    let suya = market.product(&troubled, "Beef suya", 2000, 10).await;
    let owner = OwnerKey::customer(1);
    market.fill_cart(&owner, &[(&rice, 1), (&suya, 1)]).await;
    let checkout = market.checkout(&owner).await;
    let service = market_service(fake_apis(&market), webhook_config()).await;

    // The vendor's account is restricted between checkout and settlement
    let req = TestRequest::put()
        .uri(&format!("/api/admin/vendors/{}/payout", troubled.id))
        .as_admin()
        .set_json(json!({"payout_account": format!("acct_{}", troubled.id), "payout_status": "restricted"}));
    let (status, vendor) = send_json(&service, req).await;
    assert_eq!(status, StatusCode::OK, "{vendor}");
    assert_eq!(vendor["payout_status"], "restricted");

    let report = market
        .settlement
        .handle_processor_notification(&checkout.payment_reference, SettlementOutcome::Settled)
        .await
        .unwrap();
    assert_eq!(report.status(), Some(OrderStatusType::Completed));
    assert_eq!(market.processor.transfers().len(), 1);

    let (status, failed) = send_json(&service, TestRequest::get().uri("/api/admin/transfers/failed").as_admin()).await;
    assert_eq!(status, StatusCode::OK);
    let failed = failed.as_array().unwrap().clone();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0]["vendor_id"], troubled.id);
    assert_eq!(failed[0]["status"], "failed");
    assert_eq!(failed[0]["amount"], 1940);
    assert_eq!(failed[0]["last_error"], "Vendor payout account is not connected");
    let transfer_id = failed[0]["id"].as_i64().unwrap();

    let req = TestRequest::put()
        .uri(&format!("/api/admin/vendors/{}/payout", troubled.id))
        .as_admin()
        .set_json(json!({"payout_status": "connected"}));
    let (status, _) = send_json(&service, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let req = TestRequest::put()
        .uri(&format!("/api/admin/vendors/{}/payout", troubled.id))
        .as_admin()
        .set_json(json!({"payout_account": "acct_suya_new", "payout_status": "connected"}));
    let (status, _) = send_json(&service, req).await;
    assert_eq!(status, StatusCode::OK);

    let retry_uri = format!("/api/admin/transfers/{transfer_id}/retry");
    let (status, transfer) = send_json(&service, TestRequest::post().uri(&retry_uri).as_admin()).await;
    assert_eq!(status, StatusCode::OK, "{transfer}");
    assert_eq!(transfer["status"], "sent");
    assert!(transfer["processor_transfer_id"].is_string());
    let payouts = market.processor.transfers();
    assert_eq!(payouts.len(), 2);
    assert!(payouts.iter().any(|p| p.destination == "acct_suya_new"));

    // Retrying a sent transfer pays nobody twice
    let (status, transfer) = send_json(&service, TestRequest::post().uri(&retry_uri).as_admin()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(transfer["status"], "sent");
    assert_eq!(market.processor.transfers().len(), 2);

    let (_, failed) = send_json(&service, TestRequest::get().uri("/api/admin/transfers/failed").as_admin()).await;
    assert!(failed.as_array().unwrap().is_empty());
    let (status, _) = send_json(&service, TestRequest::post().uri("/api/admin/transfers/9999/retry").as_admin()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) =
        send_json(&service, TestRequest::get().uri("/api/admin/transfers/failed").as_customer(&owner)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    market.tear_down().await;
}

#[actix_web::test]
async fn orders_wait_for_a_courier_to_come_online() {
    let _ = env_logger::try_init().ok();
    let market = TestMarket::new().await;
    let vendor = market.connected_vendor("Mama Put").await;
    let rice = market.product(&vendor, "Jollof rice", 1500, 10).await;
    let courier = market.db.create_courier(NewCourier::new("Bola").with_rating(4.9)).await.unwrap();
    let owner = OwnerKey::customer(1);
    market.fill_cart(&owner, &[(&rice, 1)]).await;
    let checkout = market.checkout(&owner).await;
    market
        .settlement
        .handle_processor_notification(&checkout.payment_reference, SettlementOutcome::Settled)
        .await
        .unwrap();
    let service = market_service(fake_apis(&market), webhook_config()).await;
    let dispatch_uri = format!("/api/admin/orders/{}/dispatch", checkout.order_id);

    let (status, body) = send_json(&service, TestRequest::post().uri(&dispatch_uri).as_admin()).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["assigned"], false);
    assert_eq!(body["order_status"], "completed");
    assert!(body["courier_id"].is_null());

    let req = TestRequest::put()
        .uri("/api/courier/availability")
        .as_courier(courier.id)
        .set_json(json!({"availability": "online"}));
    let (status, body) = send_json(&service, req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["availability"], "online");

    let (status, body) = send_json(&service, TestRequest::post().uri(&dispatch_uri).as_admin()).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["assigned"], true);
    assert_eq!(body["courier_id"], courier.id);
    assert_eq!(body["order_status"], "assigned");

    // The order has its courier now
    let (status, _) = send_json(&service, TestRequest::post().uri(&dispatch_uri).as_admin()).await;
    assert_eq!(status, StatusCode::CONFLICT);

    // A courier on a delivery cannot clock off
    let req = TestRequest::put()
        .uri("/api/courier/availability")
        .as_courier(courier.id)
        .set_json(json!({"availability": "offline"}));
    let (status, _) = send_json(&service, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let courier = market.db.fetch_courier(courier.id).await.unwrap().unwrap();
    assert_eq!(courier.availability.to_string(), "busy");
    market.tear_down().await;
}

#[actix_web::test]
async fn couriers_go_on_and_off_shift() {
    let _ = env_logger::try_init().ok();
    let market = TestMarket::new().await;
    let courier = market.online_courier("Tunde", 4.2).await;
    let service = market_service(fake_apis(&market), webhook_config()).await;

    let req = TestRequest::put()
        .uri("/api/courier/availability")
        .as_courier(courier.id)
        .set_json(json!({"availability": "offline"}));
    let (status, body) = send_json(&service, req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["availability"], "offline");

    let req = TestRequest::put()
        .uri("/api/courier/availability")
        .as_courier(courier.id)
        .set_json(json!({"availability": "busy"}));
    let (status, _) = send_json(&service, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let req =
        TestRequest::put().uri("/api/courier/availability").as_courier(404).set_json(json!({"availability": "online"}));
    let (status, _) = send_json(&service, req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let req =
        TestRequest::put().uri("/api/courier/availability").as_admin().set_json(json!({"availability": "online"}));
    let (status, _) = send_json(&service, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    market.tear_down().await;
}

#[actix_web::test]
async fn vendors_manage_their_own_products() {
    let _ = env_logger::try_init().ok();
    let market = TestMarket::new().await;
    let vendor = market.connected_vendor("Mama Put").await;
    let rival = market.connected_vendor("Suya Spot").await;
    let rice = market.product(&vendor, "Jollof rice", 1500, 10).await;
    let service = market_service(fake_apis(&market), webhook_config()).await;
    let uri = format!("/api/vendor/products/{}", rice.id);

    let update = json!({"price": 1800, "quantity_available": 25});
    let req = TestRequest::put().uri(&uri).as_vendor(vendor.id).set_json(update);
    let (status, product) = send_json(&service, req).await;
    assert_eq!(status, StatusCode::OK, "{product}");
    assert_eq!(product["price"], 1800);
    assert_eq!(product["quantity_available"], 25);
    assert_eq!(product["name"], "Jollof rice");

    let req = TestRequest::put().uri(&uri).as_vendor(rival.id).set_json(json!({"price": 1}));
    let (status, _) = send_json(&service, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let req = TestRequest::put().uri(&uri).as_vendor(vendor.id).set_json(json!({"quantity_available": -3}));
    let (status, _) = send_json(&service, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let req = TestRequest::put().uri(&uri).as_admin().set_json(json!({"price": 1}));
    let (status, _) = send_json(&service, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let product = market.db.fetch_product(rice.id).await.unwrap().unwrap();
    assert_eq!(product.price.value(), 1800);
    market.tear_down().await;
}
