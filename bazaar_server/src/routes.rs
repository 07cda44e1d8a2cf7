//! Request handler definitions
//!
//! Define each route and its handler here. Handlers stay thin: they parse the request, resolve the caller and hand
//! over to the engine APIs, which own every business rule.
//!
//! Handlers are generic over the storage backend and the payment processor so that the endpoint tests can swap in a
//! test database and a mock processor. Actix cannot register generic handlers directly, so each route is declared with
//! the [`route!`] macro, which also attaches the role check.
//!
//! Nothing in here may block the worker thread. Database and processor calls are all `async`.
use actix_web::{get, web, HttpResponse, Responder};
use bazaar_engine::{
    db_types::{OrderId, Role},
    order_objects::CheckoutRequest,
    order_state::TransitionActor,
    traits::{MarketplaceDatabase, OrderManagement, PaymentProcessor},
    CatalogApi,
    CheckoutApi,
    OrderFlowApi,
    SettlementApi,
};
use log::*;
use processor_tools::ProcessorEvent;

use crate::{
    data_objects::{
        AvailabilityParams,
        CartLineParams,
        CheckoutParams,
        CheckoutResponse,
        ConfirmPaymentParams,
        DispatchResponse,
        JsonResponse,
        OverrideParams,
        ProductUpdateParams,
        SettlementResponse,
        StatusUpdateParams,
        VendorPayoutParams,
    },
    errors::ServerError,
    identity::Identity,
    integrations::processor::settlement_outcome,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ident),+ where requires [$($roles:expr),+]) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>)
                    .wrap($crate::middleware::AclMiddlewareFactory::new(&[$($roles),+]));
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };

    ($name:ident => $method:ident $path:literal impl $($bounds:ident),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

#[get("/health")]
pub async fn health() -> impl Responder {
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Cart  ----------------------------------------------------
route!(set_cart_line => Put "/cart/items" impl MarketplaceDatabase where requires [Role::Customer]);
pub async fn set_cart_line<B: MarketplaceDatabase>(
    identity: Identity,
    body: web::Json<CartLineParams>,
    api: web::Data<CatalogApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let owner = identity.owner()?;
    let CartLineParams { product_id, quantity } = body.into_inner();
    debug!("💻️ PUT cart line for {owner}: product {product_id} x {quantity}");
    api.set_cart_line(owner, product_id, quantity).await?;
    let lines = api.fetch_cart(owner).await?;
    Ok(HttpResponse::Ok().json(lines))
}

route!(my_cart => Get "/cart" impl MarketplaceDatabase where requires [Role::Customer]);
pub async fn my_cart<B: MarketplaceDatabase>(
    identity: Identity,
    api: web::Data<CatalogApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let owner = identity.owner()?;
    debug!("💻️ GET cart for {owner}");
    let lines = api.fetch_cart(owner).await?;
    Ok(HttpResponse::Ok().json(lines))
}

//----------------------------------------------   Checkout & payment  ----------------------------------------------
route!(checkout => Post "/checkout" impl MarketplaceDatabase, PaymentProcessor where requires [Role::Customer]);
pub async fn checkout<B: MarketplaceDatabase, P: PaymentProcessor>(
    identity: Identity,
    body: Option<web::Json<CheckoutParams>>,
    api: web::Data<CheckoutApi<B, P>>,
) -> Result<HttpResponse, ServerError> {
    let owner = identity.owner()?.clone();
    let params = body.map(|b| b.into_inner()).unwrap_or_default();
    debug!("💻️ POST checkout for {owner}");
    let mut request = CheckoutRequest::new(owner);
    if let Some(delivery) = params.delivery {
        request = request.with_delivery(delivery);
    }
    let result = api.checkout(request).await?;
    Ok(HttpResponse::Ok().json(CheckoutResponse::from(result)))
}

route!(confirm_payment => Post "/payments/confirm" impl MarketplaceDatabase, PaymentProcessor where requires [Role::Customer]);
pub async fn confirm_payment<B: MarketplaceDatabase, P: PaymentProcessor>(
    identity: Identity,
    body: web::Json<ConfirmPaymentParams>,
    orders_api: web::Data<OrderFlowApi<B, P>>,
    settlement_api: web::Data<SettlementApi<B, P>>,
) -> Result<HttpResponse, ServerError> {
    let owner = identity.owner()?;
    let ConfirmPaymentParams { order_id, payment_reference } = body.into_inner();
    let reference = match (order_id, payment_reference) {
        (Some(order_id), _) => orders_api.fetch_order_for_owner(owner, &order_id).await?.payment_reference,
        (None, Some(reference)) => {
            settlement_api
                .db()
                .fetch_order_by_payment_reference(&reference)
                .await?
                .filter(|o| &o.owner_key == owner)
                .ok_or_else(|| ServerError::NoRecordFound(format!("No order was paid with {reference}")))?
                .payment_reference
        },
        (None, None) => {
            return Err(ServerError::ValidationError("Provide either an orderId or a paymentReference".to_string()));
        },
    };
    debug!("💻️ POST payment confirmation from {owner} for {reference}");
    let report = settlement_api.confirm_payment(&reference).await?;
    Ok(HttpResponse::Ok().json(SettlementResponse::from(report)))
}

// Receives payment notifications from the processor. The HMAC middleware has already checked the signature.
// Every well-formed event gets a 2xx, including duplicates and events for payments this server does not know, so
// the processor stops redelivering them. Only internal failures return an error, which makes the processor retry.
route!(processor_webhook => Post "/webhook" impl MarketplaceDatabase, PaymentProcessor);
pub async fn processor_webhook<B: MarketplaceDatabase, P: PaymentProcessor>(
    body: web::Bytes,
    api: web::Data<SettlementApi<B, P>>,
) -> Result<HttpResponse, ServerError> {
    let event = serde_json::from_slice::<ProcessorEvent>(body.as_ref()).map_err(|e| {
        warn!("💻️ Could not parse processor webhook body. {e}");
        ServerError::InvalidRequestBody(e.to_string())
    })?;
    if !event.is_settlement_event() {
        debug!("💻️ Ignoring processor event {} ({})", event.id, event.event_type);
        return Ok(HttpResponse::Ok().json(JsonResponse::success(format!("Event {} ignored", event.event_type))));
    }
    let reference = event.data.object.id.as_str();
    let outcome = settlement_outcome(event.reported_status());
    info!("💻️ Processor event {} ({}) for payment {reference}", event.id, event.event_type);
    let report = api.handle_processor_notification(reference, outcome).await?;
    let message = match (&report.order, report.applied) {
        (None, _) => format!("Payment {reference} is not known here. Event acknowledged."),
        (Some(order), true) => format!("Order {} is now {}", order.order_id, order.status),
        (Some(order), false) => format!("Order {} is unchanged ({})", order.order_id, order.status),
    };
    Ok(HttpResponse::Ok().json(JsonResponse::success(message)))
}

//----------------------------------------------   Orders  ----------------------------------------------------
route!(order_by_id => Get "/orders/{order_id}" impl MarketplaceDatabase, PaymentProcessor where requires [Role::Customer, Role::Admin]);
pub async fn order_by_id<B: MarketplaceDatabase, P: PaymentProcessor>(
    identity: Identity,
    path: web::Path<OrderId>,
    api: web::Data<OrderFlowApi<B, P>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ GET order {order_id} for {}", identity.role);
    let order = if identity.is_admin() {
        api.fetch_order(&order_id).await?
    } else {
        api.fetch_order_for_owner(identity.owner()?, &order_id).await?
    };
    Ok(HttpResponse::Ok().json(order))
}

route!(cancel_order => Post "/orders/{order_id}/cancel" impl MarketplaceDatabase, PaymentProcessor where requires [Role::Customer]);
pub async fn cancel_order<B: MarketplaceDatabase, P: PaymentProcessor>(
    identity: Identity,
    path: web::Path<OrderId>,
    api: web::Data<OrderFlowApi<B, P>>,
) -> Result<HttpResponse, ServerError> {
    let owner = identity.owner()?;
    let order_id = path.into_inner();
    info!("💻️ {owner} asked to cancel order {order_id}");
    let report = api.cancel_order(owner, &order_id).await?;
    Ok(HttpResponse::Ok().json(SettlementResponse::from(report)))
}

route!(update_order_status => Patch "/orders/{order_id}/status" impl MarketplaceDatabase, PaymentProcessor where requires [Role::Courier, Role::Admin]);
pub async fn update_order_status<B: MarketplaceDatabase, P: PaymentProcessor>(
    identity: Identity,
    path: web::Path<OrderId>,
    body: web::Json<StatusUpdateParams>,
    api: web::Data<OrderFlowApi<B, P>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    let status = body.into_inner().status;
    let actor = match identity.role {
        Role::Admin => TransitionActor::Admin,
        _ => TransitionActor::Courier(identity.actor_id()?),
    };
    info!("💻️ {actor} asked to move order {order_id} to {status}");
    let order = api.update_status(&order_id, status, actor).await?;
    Ok(HttpResponse::Ok().json(order))
}

//----------------------------------------------   Admin  ----------------------------------------------------
route!(override_order_status => Post "/admin/orders/{order_id}/override" impl MarketplaceDatabase, PaymentProcessor where requires [Role::Admin]);
pub async fn override_order_status<B: MarketplaceDatabase, P: PaymentProcessor>(
    path: web::Path<OrderId>,
    body: web::Json<OverrideParams>,
    api: web::Data<OrderFlowApi<B, P>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    let OverrideParams { status, reason } = body.into_inner();
    warn!("💻️ Administrative override of order {order_id} to {status} requested. Reason: {reason}");
    let changed = api.override_status(&order_id, status, &reason).await?;
    Ok(HttpResponse::Ok().json(changed))
}

route!(dispatch_order => Post "/admin/orders/{order_id}/dispatch" impl MarketplaceDatabase, PaymentProcessor where requires [Role::Admin]);
pub async fn dispatch_order<B: MarketplaceDatabase, P: PaymentProcessor>(
    path: web::Path<OrderId>,
    api: web::Data<OrderFlowApi<B, P>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    info!("💻️ Re-dispatch of order {order_id} requested");
    let response = match api.redispatch(&order_id).await? {
        Some(assignment) => DispatchResponse {
            order_id,
            assigned: true,
            courier_id: Some(assignment.courier.id),
            order_status: assignment.order.status,
        },
        None => {
            let order = api.fetch_order(&order_id).await?;
            DispatchResponse { order_id, assigned: false, courier_id: None, order_status: order.status }
        },
    };
    Ok(HttpResponse::Ok().json(response))
}

route!(delivery_history => Get "/admin/orders/{order_id}/deliveries" impl MarketplaceDatabase, PaymentProcessor where requires [Role::Admin]);
pub async fn delivery_history<B: MarketplaceDatabase, P: PaymentProcessor>(
    path: web::Path<OrderId>,
    api: web::Data<OrderFlowApi<B, P>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ GET delivery history for {order_id}");
    api.fetch_order(&order_id).await?;
    let events = api.delivery_history(&order_id).await?;
    Ok(HttpResponse::Ok().json(events))
}

route!(order_transfers => Get "/admin/orders/{order_id}/transfers" impl MarketplaceDatabase, PaymentProcessor where requires [Role::Admin]);
pub async fn order_transfers<B: MarketplaceDatabase, P: PaymentProcessor>(
    path: web::Path<OrderId>,
    api: web::Data<OrderFlowApi<B, P>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ GET vendor transfers for {order_id}");
    api.fetch_order(&order_id).await?;
    let transfers = api.transfers_for_order(&order_id).await?;
    Ok(HttpResponse::Ok().json(transfers))
}

route!(failed_transfers => Get "/admin/transfers/failed" impl MarketplaceDatabase, PaymentProcessor where requires [Role::Admin]);
pub async fn failed_transfers<B: MarketplaceDatabase, P: PaymentProcessor>(
    api: web::Data<SettlementApi<B, P>>,
) -> Result<HttpResponse, ServerError> {
    let transfers = api.fetch_failed_transfers().await?;
    debug!("💻️ {} failed transfers awaiting attention", transfers.len());
    Ok(HttpResponse::Ok().json(transfers))
}

route!(retry_transfer => Post "/admin/transfers/{transfer_id}/retry" impl MarketplaceDatabase, PaymentProcessor where requires [Role::Admin]);
pub async fn retry_transfer<B: MarketplaceDatabase, P: PaymentProcessor>(
    path: web::Path<i64>,
    api: web::Data<SettlementApi<B, P>>,
) -> Result<HttpResponse, ServerError> {
    let transfer_id = path.into_inner();
    info!("💻️ Retry of transfer #{transfer_id} requested");
    let transfer = api.retry_transfer(transfer_id).await?;
    Ok(HttpResponse::Ok().json(transfer))
}

route!(vendor_payout => Put "/admin/vendors/{vendor_id}/payout" impl MarketplaceDatabase where requires [Role::Admin]);
pub async fn vendor_payout<B: MarketplaceDatabase>(
    path: web::Path<i64>,
    body: web::Json<VendorPayoutParams>,
    api: web::Data<CatalogApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let vendor_id = path.into_inner();
    let VendorPayoutParams { payout_account, payout_status } = body.into_inner();
    info!("💻️ Payout status of vendor #{vendor_id} set to {payout_status:?}");
    let vendor = api.update_vendor_payout(vendor_id, payout_account, payout_status).await?;
    Ok(HttpResponse::Ok().json(vendor))
}

//----------------------------------------------   Vendors & couriers  ----------------------------------------------
route!(update_product => Put "/vendor/products/{product_id}" impl MarketplaceDatabase where requires [Role::Vendor]);
pub async fn update_product<B: MarketplaceDatabase>(
    identity: Identity,
    path: web::Path<i64>,
    body: web::Json<ProductUpdateParams>,
    api: web::Data<CatalogApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let vendor_id = identity.actor_id()?;
    let product_id = path.into_inner();
    debug!("💻️ Vendor #{vendor_id} is updating product {product_id}");
    let product = api.update_product(Some(vendor_id), product_id, body.into_inner().into()).await?;
    Ok(HttpResponse::Ok().json(product))
}

route!(courier_availability => Put "/courier/availability" impl MarketplaceDatabase where requires [Role::Courier]);
pub async fn courier_availability<B: MarketplaceDatabase>(
    identity: Identity,
    body: web::Json<AvailabilityParams>,
    api: web::Data<CatalogApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let courier_id = identity.actor_id()?;
    let availability = body.into_inner().availability;
    debug!("💻️ Courier #{courier_id} wants to be {availability}");
    let courier = api.set_courier_availability(courier_id, availability).await?;
    Ok(HttpResponse::Ok().json(courier))
}
