use actix_web::{http::StatusCode, test::TestRequest};
use bazaar_common::Secret;
use bazaar_engine::{
    db_types::{CourierAvailability, OrderStatusType, OwnerKey},
    test_utils::TestMarket,
    traits::{CatalogManagement, CourierManagement, OrderManagement},
};
use processor_tools::{PAYMENT_FAILED, PAYMENT_SUCCEEDED};

use super::helpers::{
    fake_apis,
    market_service,
    processor_event,
    send_json,
    signed_webhook,
    webhook_config,
    WEBHOOK_SECRET,
};
use crate::{config::WebhookConfig, middleware::WEBHOOK_SIGNATURE_HEADER};

#[actix_web::test]
async fn unsigned_webhooks_are_rejected() {
    let _ = env_logger::try_init().ok();
    let market = TestMarket::new().await;
    let vendor = market.connected_vendor("Mama Put").await;
    let rice = market.product(&vendor, "Jollof rice", 1500, 10).await;
    let owner = OwnerKey::customer(1);
    market.fill_cart(&owner, &[(&rice, 1)]).await;
    let checkout = market.checkout(&owner).await;
    let service = market_service(fake_apis(&market), webhook_config()).await;
    let body = processor_event(PAYMENT_SUCCEEDED, &checkout.payment_reference, "succeeded");

    let req = TestRequest::post().uri("/processor/webhook").set_payload(body.clone());
    let (status, response) = send_json(&service, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(response["success"], false);

    let req = TestRequest::post()
        .uri("/processor/webhook")
        .insert_header((WEBHOOK_SIGNATURE_HEADER, "bm90IHRoZSByaWdodCBzaWduYXR1cmU="))
        .set_payload(body.clone());
    let (status, _) = send_json(&service, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Signed for a different body
    let other = processor_event(PAYMENT_SUCCEEDED, "pi_other", "succeeded");
    let signature = crate::helpers::calculate_hmac(WEBHOOK_SECRET, other.as_bytes());
    let req = TestRequest::post()
        .uri("/processor/webhook")
        .insert_header((WEBHOOK_SIGNATURE_HEADER, signature))
        .set_payload(body);
    let (status, _) = send_json(&service, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let order = market.db.fetch_order(&checkout.order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::Pending);
    market.tear_down().await;
}

#[actix_web::test]
async fn payment_succeeded_completes_and_dispatches_the_order() {
    let _ = env_logger::try_init().ok();
    let market = TestMarket::new().await;
    let vendor_a = market.connected_vendor("Mama Put").await;
    let vendor_b = market.connected_vendor("Suya Spot").await;
    let rice = market.product(&vendor_a, "Jollof rice", 1500, 10).await;
    let suya = market.product(&vendor_b, "Beef suya", 800, 5).await;
    let courier = market.online_courier("Tunde", 4.8).await;
    let owner = OwnerKey::customer(1);
    market.fill_cart(&owner, &[(&rice, 1), (&suya, 2)]).await;
    let checkout = market.checkout(&owner).await;
    let service = market_service(fake_apis(&market), webhook_config()).await;

    let body = processor_event(PAYMENT_SUCCEEDED, &checkout.payment_reference, "succeeded");
    let (status, response) = send_json(&service, signed_webhook(&body)).await;
    assert_eq!(status, StatusCode::OK, "{response}");
    assert_eq!(response["success"], true);
    assert_eq!(response["message"], format!("Order {} is now completed", checkout.order_id));

    let order = market.db.fetch_order(&checkout.order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::Assigned);
    assert_eq!(order.courier_id, Some(courier.id));
    assert!(order.estimated_delivery_at.is_some());
    let courier = market.db.fetch_courier(courier.id).await.unwrap().unwrap();
    assert_eq!(courier.availability, CourierAvailability::Busy);

    let payouts = market.processor.transfers();
    assert_eq!(payouts.len(), 2);
    assert!(payouts.iter().all(|p| p.transfer_group == checkout.payment_reference));

    // Processors redeliver. The replay is acknowledged and nothing happens twice.
    let (status, response) = send_json(&service, signed_webhook(&body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["message"], format!("Order {} is unchanged (assigned)", checkout.order_id));
    assert_eq!(market.processor.transfers().len(), 2);
    let transfers = market.db.fetch_transfers_for_order(&checkout.order_id).await.unwrap();
    assert_eq!(transfers.len(), 2);
    market.tear_down().await;
}

#[actix_web::test]
async fn payment_failed_cancels_and_restocks() {
    let _ = env_logger::try_init().ok();
    let market = TestMarket::new().await;
    let vendor = market.connected_vendor("Mama Put").await;
    let rice = market.product(&vendor, "Jollof rice", 1500, 10).await;
    let owner = OwnerKey::customer(1);
    market.fill_cart(&owner, &[(&rice, 3)]).await;
    let checkout = market.checkout(&owner).await;
    assert_eq!(market.db.fetch_product(rice.id).await.unwrap().unwrap().quantity_available, 7);
    let service = market_service(fake_apis(&market), webhook_config()).await;

    let body = processor_event(PAYMENT_FAILED, &checkout.payment_reference, "requires_payment_method");
    let (status, response) = send_json(&service, signed_webhook(&body)).await;
    assert_eq!(status, StatusCode::OK, "{response}");
    assert_eq!(response["message"], format!("Order {} is now cancelled", checkout.order_id));
    let order = market.db.fetch_order(&checkout.order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::Cancelled);
    assert_eq!(market.db.fetch_product(rice.id).await.unwrap().unwrap().quantity_available, 10);
    assert!(market.processor.transfers().is_empty());

    // A late success for a cancelled order does not revive it
    let late = processor_event(PAYMENT_SUCCEEDED, &checkout.payment_reference, "succeeded");
    let (status, response) = send_json(&service, signed_webhook(&late)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["message"], format!("Order {} is unchanged (cancelled)", checkout.order_id));
    assert_eq!(market.db.fetch_product(rice.id).await.unwrap().unwrap().quantity_available, 10);
    market.tear_down().await;
}

#[actix_web::test]
async fn other_events_are_acknowledged() {
    let _ = env_logger::try_init().ok();
    let market = TestMarket::new().await;
    let service = market_service(fake_apis(&market), webhook_config()).await;

    let body = processor_event(PAYMENT_SUCCEEDED, "pi_from_another_platform", "succeeded");
    let (status, response) = send_json(&service, signed_webhook(&body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["message"], "Payment pi_from_another_platform is not known here. Event acknowledged.");

    let body = processor_event("payment_intent.created", "pi_fake_0001", "requires_payment_method");
    let (status, response) = send_json(&service, signed_webhook(&body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["message"], "Event payment_intent.created ignored");

    let (status, response) = send_json(&service, signed_webhook("{\"id\": \"evt_1\"")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["success"], false);
    market.tear_down().await;
}

#[actix_web::test]
async fn signature_checks_can_be_switched_off() {
    let _ = env_logger::try_init().ok();
    let market = TestMarket::new().await;
    let vendor = market.connected_vendor("Mama Put").await;
    let rice = market.product(&vendor, "Jollof rice", 1500, 10).await;
    let owner = OwnerKey::customer(1);
    market.fill_cart(&owner, &[(&rice, 1)]).await;
    let checkout = market.checkout(&owner).await;
    let config = WebhookConfig { hmac_secret: Secret::new(WEBHOOK_SECRET.to_string()), hmac_checks: false };
    let service = market_service(fake_apis(&market), config).await;

    let body = processor_event(PAYMENT_SUCCEEDED, &checkout.payment_reference, "succeeded");
    let req = TestRequest::post().uri("/processor/webhook").set_payload(body);
    let (status, response) = send_json(&service, req).await;
    assert_eq!(status, StatusCode::OK, "{response}");
    let order = market.db.fetch_order(&checkout.order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::Completed);
    market.tear_down().await;
}
