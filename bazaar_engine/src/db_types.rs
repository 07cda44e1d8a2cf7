//! Records stored by the marketplace ledger.
use std::{fmt::Display, str::FromStr};

pub use bazaar_common::Money;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Conversion error: {0}")]
pub struct ConversionError(String);

//--------------------------------------        OrderId        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderId(pub String);

impl OrderId {
    /// Generates a fresh, collision-resistant order id.
    pub fn random() -> Self {
        Self(format!("ord_{}", uuid::Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for OrderId {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err(ConversionError("Order id cannot be empty".into()));
        }
        Ok(Self(s.trim().to_string()))
    }
}

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

//--------------------------------------        OwnerKey       ---------------------------------------------------------
const CUSTOMER_PREFIX: &str = "customer:";
const SESSION_PREFIX: &str = "session:";

/// Identifies whoever owns a cart or an order: either an authenticated customer (`customer:<id>`) or an anonymous
/// browser session (`session:<token>`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(try_from = "String", into = "String")]
pub struct OwnerKey(String);

impl OwnerKey {
    pub fn customer<S: Display>(id: S) -> Self {
        Self(format!("{CUSTOMER_PREFIX}{id}"))
    }

    pub fn session<S: Display>(token: S) -> Self {
        Self(format!("{SESSION_PREFIX}{token}"))
    }

    pub fn is_anonymous(&self) -> bool {
        self.0.starts_with(SESSION_PREFIX)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for OwnerKey {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let rest = s.strip_prefix(CUSTOMER_PREFIX).or_else(|| s.strip_prefix(SESSION_PREFIX));
        match rest {
            Some(r) if !r.is_empty() => Ok(Self(s.to_string())),
            _ => Err(ConversionError(format!("Invalid owner key: '{s}'. Expected customer:<id> or session:<token>"))),
        }
    }
}

impl TryFrom<String> for OwnerKey {
    type Error = ConversionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<OwnerKey> for String {
    fn from(value: OwnerKey) -> Self {
        value.0
    }
}

impl Display for OwnerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

//--------------------------------------          Role         ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Customer,
    Vendor,
    Courier,
    Admin,
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Role::Customer => "customer",
            Role::Vendor => "vendor",
            Role::Courier => "courier",
            Role::Admin => "admin",
        };
        f.write_str(s)
    }
}

impl FromStr for Role {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "customer" => Ok(Self::Customer),
            "vendor" => Ok(Self::Vendor),
            "courier" => Ok(Self::Courier),
            "admin" => Ok(Self::Admin),
            s => Err(ConversionError(format!("Invalid role: {s}"))),
        }
    }
}

//--------------------------------------        Vendor         ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PayoutStatus {
    NotConnected,
    Pending,
    Connected,
    Restricted,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Vendor {
    pub id: i64,
    pub name: String,
    pub payout_account: Option<String>,
    pub payout_status: PayoutStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Vendor {
    /// A vendor can only receive funds once its payout account is fully connected.
    pub fn can_receive_payouts(&self) -> bool {
        self.payout_status == PayoutStatus::Connected && self.payout_account.as_ref().is_some_and(|a| !a.is_empty())
    }
}

//--------------------------------------        Product        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub vendor_id: i64,
    pub name: String,
    pub price: Money,
    pub quantity_available: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProduct {
    pub vendor_id: i64,
    pub name: String,
    pub price: Money,
    pub quantity_available: i64,
}

impl NewProduct {
    pub fn new<S: Into<String>>(vendor_id: i64, name: S, price: Money, quantity_available: i64) -> Self {
        Self { vendor_id, name: name.into(), price, quantity_available }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub price: Option<Money>,
    pub quantity_available: Option<i64>,
}

impl ProductUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.price.is_none() && self.quantity_available.is_none()
    }
}

//--------------------------------------       CartLine        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct CartLine {
    pub owner_key: OwnerKey,
    pub product_id: i64,
    pub quantity: i64,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------   OrderStatusType     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatusType {
    /// Stock is reserved and the payment has been requested, but funds have not been confirmed.
    Pending,
    /// The payment processor has confirmed the funds.
    Completed,
    /// A courier has been allocated to the order.
    Assigned,
    PickedUp,
    InTransit,
    Delivered,
    /// The order was cancelled, expired or its payment failed. Reserved stock has been released.
    Cancelled,
}

impl OrderStatusType {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }

    /// True while a courier is attached to the order.
    pub fn is_in_delivery(&self) -> bool {
        matches!(self, Self::Assigned | Self::PickedUp | Self::InTransit)
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatusType::Pending => write!(f, "pending"),
            OrderStatusType::Completed => write!(f, "completed"),
            OrderStatusType::Assigned => write!(f, "assigned"),
            OrderStatusType::PickedUp => write!(f, "picked_up"),
            OrderStatusType::InTransit => write!(f, "in_transit"),
            OrderStatusType::Delivered => write!(f, "delivered"),
            OrderStatusType::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "assigned" => Ok(Self::Assigned),
            "picked_up" => Ok(Self::PickedUp),
            "in_transit" => Ok(Self::InTransit),
            "delivered" => Ok(Self::Delivered),
            "cancelled" => Ok(Self::Cancelled),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

//--------------------------------------      OrderItem        ---------------------------------------------------------
/// A line of a placed order. The name and unit price are frozen when the order is created, so later catalog edits
/// never change what the customer was charged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: i64,
    pub vendor_id: i64,
    pub name: String,
    pub quantity: i64,
    pub unit_price: Money,
}

impl OrderItem {
    /// Unit price times quantity, or `None` if that overflows.
    pub fn subtotal(&self) -> Option<Money> {
        self.unit_price.checked_mul(self.quantity)
    }
}

//--------------------------------------    DeliveryRecord     ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryRecord {
    pub recipient_name: String,
    pub phone: String,
    pub address: String,
    #[serde(default)]
    pub notes: Option<String>,
}

impl DeliveryRecord {
    pub fn validate(&self) -> Result<(), String> {
        let missing = [("recipient_name", &self.recipient_name), ("phone", &self.phone), ("address", &self.address)]
            .into_iter()
            .filter(|(_, v)| v.trim().is_empty())
            .map(|(k, _)| k)
            .collect::<Vec<_>>();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(format!("Delivery record is missing {}", missing.join(", ")))
        }
    }
}

//--------------------------------------        Order          ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub order_id: OrderId,
    pub owner_key: OwnerKey,
    pub items: Vec<OrderItem>,
    pub total: Money,
    pub currency: String,
    pub status: OrderStatusType,
    pub payment_reference: String,
    pub delivery: Option<DeliveryRecord>,
    pub courier_id: Option<i64>,
    pub estimated_delivery_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn vendor_ids(&self) -> Vec<i64> {
        let mut ids = self.items.iter().map(|i| i.vendor_id).collect::<Vec<_>>();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub order_id: OrderId,
    pub owner_key: OwnerKey,
    pub items: Vec<OrderItem>,
    pub total: Money,
    pub currency: String,
    pub delivery: Option<DeliveryRecord>,
    pub payment_reference: String,
}

//--------------------------------------     PaymentRecord     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SettlementState {
    Initiated,
    Settled,
    Failed,
}

impl Display for SettlementState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettlementState::Initiated => write!(f, "initiated"),
            SettlementState::Settled => write!(f, "settled"),
            SettlementState::Failed => write!(f, "failed"),
        }
    }
}

/// The ledger's view of a payment request made to the processor. Keyed by the processor's payment reference.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub reference: String,
    pub order_id: OrderId,
    pub amount: Money,
    pub currency: String,
    pub state: SettlementState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------    VendorTransfer     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    /// Recorded at settlement, not yet sent to the processor.
    Pending,
    Sent,
    /// The payout could not be made. It stays in the ledger until an administrator retries it.
    Failed,
}

impl Display for TransferStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransferStatus::Pending => write!(f, "pending"),
            TransferStatus::Sent => write!(f, "sent"),
            TransferStatus::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct VendorTransfer {
    pub id: i64,
    pub order_id: OrderId,
    pub payment_reference: String,
    pub vendor_id: i64,
    pub amount: Money,
    pub currency: String,
    pub status: TransferStatus,
    pub processor_transfer_id: Option<String>,
    pub last_error: Option<String>,
    pub attempts: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewVendorTransfer {
    pub vendor_id: i64,
    pub amount: Money,
    pub status: TransferStatus,
    pub last_error: Option<String>,
}

//--------------------------------------        Courier        ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CourierAvailability {
    Offline,
    Online,
    Busy,
}

impl Display for CourierAvailability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CourierAvailability::Offline => write!(f, "offline"),
            CourierAvailability::Online => write!(f, "online"),
            CourierAvailability::Busy => write!(f, "busy"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Courier {
    pub id: i64,
    pub name: String,
    pub availability: CourierAvailability,
    pub verified: bool,
    pub total_deliveries: i64,
    pub rating: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Courier {
    /// Deliveries per rating point. Lower values are preferred when dispatching. Ratings below 1 count as 1.
    pub fn load_ratio(&self) -> f64 {
        #[allow(clippy::cast_precision_loss)]
        let deliveries = self.total_deliveries as f64;
        deliveries / self.rating.max(1.0)
    }

    pub fn is_dispatchable(&self) -> bool {
        self.verified && self.availability == CourierAvailability::Online
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCourier {
    pub name: String,
    pub verified: bool,
    pub rating: f64,
    pub availability: CourierAvailability,
}

impl NewCourier {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self { name: name.into(), verified: true, rating: 5.0, availability: CourierAvailability::Offline }
    }

    pub fn with_rating(mut self, rating: f64) -> Self {
        self.rating = rating;
        self
    }

    pub fn with_availability(mut self, availability: CourierAvailability) -> Self {
        self.availability = availability;
        self
    }

    pub fn unverified(mut self) -> Self {
        self.verified = false;
        self
    }
}

//--------------------------------------    DeliveryEvent      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DeliveryActor {
    Dispatch,
    Courier,
    Admin,
    AdminOverride,
}

impl Display for DeliveryActor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryActor::Dispatch => write!(f, "dispatch"),
            DeliveryActor::Courier => write!(f, "courier"),
            DeliveryActor::Admin => write!(f, "admin"),
            DeliveryActor::AdminOverride => write!(f, "admin_override"),
        }
    }
}

/// An entry in an order's delivery audit trail.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct DeliveryEvent {
    pub id: i64,
    pub order_id: OrderId,
    pub courier_id: Option<i64>,
    pub status: OrderStatusType,
    pub actor: DeliveryActor,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDeliveryEvent {
    pub courier_id: Option<i64>,
    pub status: OrderStatusType,
    pub actor: DeliveryActor,
    pub note: Option<String>,
}

impl NewDeliveryEvent {
    pub fn new(status: OrderStatusType, actor: DeliveryActor, courier_id: Option<i64>) -> Self {
        Self { courier_id, status, actor, note: None }
    }

    pub fn with_note<S: Into<String>>(mut self, note: S) -> Self {
        self.note = Some(note.into());
        self
    }
}
