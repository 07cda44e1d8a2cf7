use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use bazaar_engine::{
    events::{EventHandlers, EventProducers},
    order_objects::DispatchPolicy,
    traits::{MarketplaceDatabase, PaymentProcessor, SettlementPolicy},
    CatalogApi,
    CheckoutApi,
    DispatchApi,
    OrderFlowApi,
    SettlementApi,
    SqliteDatabase,
};
use log::*;
use processor_tools::ProcessorApi;

use crate::{
    config::{Environment, ServerConfig, WebhookConfig},
    errors::{redact_internal_errors, ServerError},
    expiry_worker::start_expiry_worker,
    integrations::processor::ProcessorGateway,
    middleware::{HmacMiddlewareFactory, WEBHOOK_SIGNATURE_HEADER},
    notifications::notification_hooks,
    routes::{
        health,
        CancelOrderRoute,
        CheckoutRoute,
        ConfirmPaymentRoute,
        CourierAvailabilityRoute,
        DeliveryHistoryRoute,
        DispatchOrderRoute,
        FailedTransfersRoute,
        MyCartRoute,
        OrderByIdRoute,
        OrderTransfersRoute,
        OverrideOrderStatusRoute,
        ProcessorWebhookRoute,
        RetryTransferRoute,
        SetCartLineRoute,
        UpdateOrderStatusRoute,
        UpdateProductRoute,
        VendorPayoutRoute,
    },
};

const EVENT_BUFFER_SIZE: usize = 64;

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    redact_internal_errors(config.environment == Environment::Production);
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.migrate().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let api = ProcessorApi::new(config.processor.clone()).map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let processor = ProcessorGateway::new(api);
    let handlers = EventHandlers::new(EVENT_BUFFER_SIZE, notification_hooks());
    let producers = handlers.producers();
    handlers.start_handlers().await;
    if config.expiry_sweep_enabled() {
        let apis = MarketApis::new(
            db.clone(),
            processor.clone(),
            config.settlement.clone(),
            config.dispatch,
            producers.clone(),
        );
        // Runs for the lifetime of the server
        let _handle = start_expiry_worker(apis.settlement, config.unpaid_order_timeout);
    } else {
        info!("🕰️ Unpaid order expiry is disabled");
    }
    let srv = create_server_instance(config, db, processor, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    processor: ProcessorGateway,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    info!("💻️ Running in {} mode", config.environment);
    let srv = HttpServer::new(move || {
        let apis = MarketApis::new(
            db.clone(),
            processor.clone(),
            config.settlement.clone(),
            config.dispatch,
            producers.clone(),
        );
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("bzr::access_log"))
            .configure(|cfg| apis.register(cfg))
            .configure(configure_routes::<SqliteDatabase, ProcessorGateway>(config.webhook.clone()))
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}

/// The engine APIs shared by the request handlers, built over one database handle and one processor client.
pub struct MarketApis<B, P> {
    pub catalog: CatalogApi<B>,
    pub checkout: CheckoutApi<B, P>,
    pub settlement: SettlementApi<B, P>,
    pub orders: OrderFlowApi<B, P>,
}

impl<B, P> MarketApis<B, P>
where
    B: MarketplaceDatabase + 'static,
    P: PaymentProcessor + 'static,
{
    pub fn new(
        db: B,
        processor: P,
        settlement_policy: SettlementPolicy,
        dispatch_policy: DispatchPolicy,
        producers: EventProducers,
    ) -> Self {
        let dispatch = DispatchApi::new(db.clone(), dispatch_policy, producers.clone());
        let settlement = SettlementApi::new(
            db.clone(),
            processor.clone(),
            settlement_policy.clone(),
            dispatch.clone(),
            producers.clone(),
        );
        let orders = OrderFlowApi::new(db.clone(), settlement.clone(), dispatch, producers);
        Self {
            catalog: CatalogApi::new(db.clone()),
            checkout: CheckoutApi::new(db, processor, settlement_policy),
            settlement,
            orders,
        }
    }

    pub fn register(self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(web::Data::new(self.catalog))
            .app_data(web::Data::new(self.checkout))
            .app_data(web::Data::new(self.settlement))
            .app_data(web::Data::new(self.orders));
    }
}

/// Mounts every route. The handlers expect the [`MarketApis`] for `B` and `P` to be registered as app data.
pub fn configure_routes<B, P>(webhook: WebhookConfig) -> impl FnOnce(&mut web::ServiceConfig)
where
    B: MarketplaceDatabase + 'static,
    P: PaymentProcessor + 'static,
{
    move |cfg| {
        let api_scope = web::scope("/api")
            .service(SetCartLineRoute::<B>::new())
            .service(MyCartRoute::<B>::new())
            .service(CheckoutRoute::<B, P>::new())
            .service(ConfirmPaymentRoute::<B, P>::new())
            .service(OrderByIdRoute::<B, P>::new())
            .service(CancelOrderRoute::<B, P>::new())
            .service(UpdateOrderStatusRoute::<B, P>::new())
            .service(OverrideOrderStatusRoute::<B, P>::new())
            .service(DispatchOrderRoute::<B, P>::new())
            .service(DeliveryHistoryRoute::<B, P>::new())
            .service(OrderTransfersRoute::<B, P>::new())
            .service(FailedTransfersRoute::<B, P>::new())
            .service(RetryTransferRoute::<B, P>::new())
            .service(VendorPayoutRoute::<B>::new())
            .service(UpdateProductRoute::<B>::new())
            .service(CourierAvailabilityRoute::<B>::new());
        let hmac = HmacMiddlewareFactory::new(WEBHOOK_SIGNATURE_HEADER, webhook.hmac_secret, webhook.hmac_checks);
        let processor_scope = web::scope("/processor").wrap(hmac).service(ProcessorWebhookRoute::<B, P>::new());
        cfg.service(health).service(api_scope).service(processor_scope);
    }
}
