use std::fmt::Display;

use bazaar_engine::{
    db_types::{CourierAvailability, DeliveryRecord, Money, OrderId, OrderStatusType, PayoutStatus, ProductUpdate},
    order_objects::{CheckoutResult, SettlementReport},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartLineParams {
    pub product_id: i64,
    pub quantity: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckoutParams {
    #[serde(default)]
    pub delivery: Option<DeliveryRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub order_id: OrderId,
    pub payment_client_secret: String,
    pub payment_reference: String,
    pub total: Money,
    pub currency: String,
}

impl From<CheckoutResult> for CheckoutResponse {
    fn from(value: CheckoutResult) -> Self {
        Self {
            order_id: value.order_id,
            payment_client_secret: value.client_secret,
            payment_reference: value.payment_reference,
            total: value.total,
            currency: value.currency,
        }
    }
}

/// A client's claim that it has paid. Either field identifies the payment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmPaymentParams {
    #[serde(default)]
    pub order_id: Option<OrderId>,
    #[serde(default)]
    pub payment_reference: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementResponse {
    pub order_id: Option<OrderId>,
    /// The processor's verdict: `settled`, `failed` or `pending`.
    pub settlement_status: String,
    pub order_status: Option<OrderStatusType>,
    /// False when the confirmation changed nothing, e.g. because it was a repeat.
    pub applied: bool,
}

impl From<SettlementReport> for SettlementResponse {
    fn from(report: SettlementReport) -> Self {
        Self {
            order_id: report.order_id().cloned(),
            settlement_status: report.outcome.to_string(),
            order_status: report.status(),
            applied: report.applied,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdateParams {
    pub status: OrderStatusType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverrideParams {
    pub status: OrderStatusType,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchResponse {
    pub order_id: OrderId,
    pub assigned: bool,
    pub courier_id: Option<i64>,
    pub order_status: OrderStatusType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendorPayoutParams {
    #[serde(default)]
    pub payout_account: Option<String>,
    pub payout_status: PayoutStatus,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductUpdateParams {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub price: Option<Money>,
    #[serde(default)]
    pub quantity_available: Option<i64>,
}

impl From<ProductUpdateParams> for ProductUpdate {
    fn from(value: ProductUpdateParams) -> Self {
        ProductUpdate { name: value.name, price: value.price, quantity_available: value.quantity_available }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityParams {
    pub availability: CourierAvailability,
}
