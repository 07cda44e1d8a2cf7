//! # Backend contracts for the settlement engine.
//!
//! The engine never talks to storage or to the payment processor directly. Instead, the public APIs in this crate are
//! generic over the traits defined here.
//!
//! * [`MarketplaceDatabase`] is the highest level of behaviour a storage backend must provide. Every operation that
//!   must be atomic (reserving stock, applying a settlement, assigning a courier, forcing a status) lives here, so
//!   that the backend can wrap it in a single transaction.
//! * [`OrderManagement`] provides read-only queries over orders, payments and the delivery audit trail.
//! * [`CatalogManagement`] covers the collaborator records the checkout flow reads: vendors, products and carts.
//! * [`CourierManagement`] covers courier records and availability.
//! * [`PaymentProcessor`] is the engine's view of the external payment processor.
mod catalog_management;
mod courier_management;
mod data_objects;
mod marketplace_database;
mod order_management;
mod payment_processor;

pub use catalog_management::CatalogManagement;
pub use courier_management::CourierManagement;
pub use data_objects::{
    CartQuote,
    CourierAssignment,
    ExpiryResult,
    OrderChanged,
    SettlementApplied,
    SettlementPolicy,
    TransferResult,
};
pub use marketplace_database::{MarketplaceDatabase, MarketplaceError};
pub use order_management::OrderManagement;
pub use payment_processor::{
    PaymentHandle,
    PaymentProcessor,
    PaymentRequest,
    PayoutRequest,
    ProcessorError,
    SettlementOutcome,
};
