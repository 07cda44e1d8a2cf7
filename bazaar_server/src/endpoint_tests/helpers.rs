use actix_http::Request;
use actix_web::{
    body::MessageBody,
    dev::{Service, ServiceResponse},
    http::StatusCode,
    test,
    test::TestRequest,
    App,
};
use bazaar_common::Secret;
use bazaar_engine::{
    db_types::OwnerKey,
    events::EventProducers,
    order_objects::DispatchPolicy,
    test_utils::{FakeProcessor, TestMarket},
    traits::{MarketplaceDatabase, PaymentProcessor, SettlementPolicy},
    SqliteDatabase,
};
use log::debug;

use crate::{
    config::WebhookConfig,
    helpers::calculate_hmac,
    identity::{ACTOR_ID_HEADER, OWNER_KEY_HEADER, ROLE_HEADER},
    middleware::WEBHOOK_SIGNATURE_HEADER,
    server::{configure_routes, MarketApis},
};

// Test-only webhook secret. DO NOT re-use it anywhere.
pub const WEBHOOK_SECRET: &str = "whsec_test";

pub fn webhook_config() -> WebhookConfig {
    WebhookConfig { hmac_secret: Secret::new(WEBHOOK_SECRET.to_string()), hmac_checks: true }
}

/// The full set of APIs over the test market's database and fake processor.
pub fn fake_apis(market: &TestMarket) -> MarketApis<SqliteDatabase, FakeProcessor> {
    MarketApis::new(
        market.db.clone(),
        market.processor.clone(),
        SettlementPolicy::default(),
        DispatchPolicy::default(),
        EventProducers::default(),
    )
}

pub async fn market_service<B, P>(
    apis: MarketApis<B, P>,
    webhook: WebhookConfig,
) -> impl Service<Request, Response = ServiceResponse, Error = actix_web::Error>
where
    B: MarketplaceDatabase + 'static,
    P: PaymentProcessor + 'static,
{
    let app = App::new().configure(|cfg| apis.register(cfg)).configure(configure_routes::<B, P>(webhook));
    test::init_service(app).await
}

/// Sends the request and returns the status and body, whether the response came from a handler or a middleware
/// rejected the request.
pub async fn send<S>(service: &S, req: TestRequest) -> (StatusCode, String)
where S: Service<Request, Response = ServiceResponse, Error = actix_web::Error> {
    match test::try_call_service(service, req.to_request()).await {
        Ok(res) => {
            let status = res.status();
            let body = test::read_body(res).await;
            (status, String::from_utf8_lossy(&body).into_owned())
        },
        Err(e) => {
            debug!("Request was rejected before reaching a handler: {e}");
            let res = e.error_response();
            let status = res.status();
            let body = res.into_body().try_into_bytes().unwrap_or_default();
            (status, String::from_utf8_lossy(&body).into_owned())
        },
    }
}

/// Like [`send`], but parses the body as JSON.
pub async fn send_json<S>(service: &S, req: TestRequest) -> (StatusCode, serde_json::Value)
where S: Service<Request, Response = ServiceResponse, Error = actix_web::Error> {
    let (status, body) = send(service, req).await;
    let json = serde_json::from_str(&body).unwrap_or_else(|e| panic!("Body is not JSON ({e}): {body}"));
    (status, json)
}

pub trait IdentityHeaders {
    fn as_customer(self, owner: &OwnerKey) -> Self;
    fn as_admin(self) -> Self;
    fn as_courier(self, courier_id: i64) -> Self;
    fn as_vendor(self, vendor_id: i64) -> Self;
}

impl IdentityHeaders for TestRequest {
    fn as_customer(self, owner: &OwnerKey) -> Self {
        self.insert_header((ROLE_HEADER, "customer")).insert_header((OWNER_KEY_HEADER, owner.to_string()))
    }

    fn as_admin(self) -> Self {
        self.insert_header((ROLE_HEADER, "admin"))
    }

    fn as_courier(self, courier_id: i64) -> Self {
        self.insert_header((ROLE_HEADER, "courier")).insert_header((ACTOR_ID_HEADER, courier_id.to_string()))
    }

    fn as_vendor(self, vendor_id: i64) -> Self {
        self.insert_header((ROLE_HEADER, "vendor")).insert_header((ACTOR_ID_HEADER, vendor_id.to_string()))
    }
}

/// A processor event for the given payment, in the processor's wire format.
pub fn processor_event(event_type: &str, reference: &str, status: &str) -> String {
    serde_json::json!({
        "id": format!("evt_{reference}"),
        "type": event_type,
        "data": { "object": {
            "id": reference,
            "amount": 0,
            "currency": "usd",
            "status": status,
        }}
    })
    .to_string()
}

pub fn signed_webhook(body: &str) -> TestRequest {
    let signature = calculate_hmac(WEBHOOK_SECRET, body.as_bytes());
    TestRequest::post()
        .uri("/processor/webhook")
        .insert_header((WEBHOOK_SIGNATURE_HEADER, signature))
        .insert_header(("Content-Type", "application/json"))
        .set_payload(body.to_string())
}
