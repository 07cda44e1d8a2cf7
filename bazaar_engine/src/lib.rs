//! Bazaar settlement engine
//!
//! This library holds the order ledger of the Bazaar marketplace: it turns a customer's cart into an order, reconciles
//! payment outcomes reported by the payment processor, splits the proceeds between vendors and the platform, drives the
//! order state machine and hands paid orders to couriers.
//!
//! The library is divided into three main sections:
//! 1. The storage contracts ([`mod@traits`]) and their SQLite implementation ([`SqliteDatabase`]). You should never
//!    need to touch the database directly. Use the public API instead. The data types used in the database are public
//!    and live in [`mod@db_types`].
//! 2. The public API ([`mod@market_api`]): [`CheckoutApi`], [`SettlementApi`], [`DispatchApi`], [`OrderFlowApi`] and
//!    [`CatalogApi`]. These are generic over a storage backend and a [`PaymentProcessor`].
//! 3. Order events ([`mod@events`]). Subscribers are notified when an order completes, is cancelled, changes status or
//!    gets a courier.
mod db;

pub mod db_types;
pub mod events;
pub mod helpers;
pub mod market_api;
pub mod traits;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use db::sqlite::{db::SqliteDatabase, db_url};
pub use market_api::{
    catalog_api::CatalogApi,
    checkout_api::CheckoutApi,
    dispatch_api::DispatchApi,
    order_flow_api::OrderFlowApi,
    order_objects,
    order_state,
    settlement_api::SettlementApi,
};
pub use traits::{MarketplaceDatabase, MarketplaceError, PaymentProcessor};
