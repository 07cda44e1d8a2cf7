//! # Bazaar settlement server
//!
//! The HTTP face of the settlement engine. It is responsible for:
//! * Turning carts into orders with reserved stock and an open payment (checkout).
//! * Accepting payment confirmations from clients and signed notifications from the payment processor, and feeding
//!   both into the engine's single settlement routine.
//! * Letting couriers and administrators move orders through the delivery state machine.
//! * Expiring orders whose payment never arrives, in a background worker.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Identity
//! Authentication happens in front of this server. See [identity](identity/index.html) for the headers it expects.
//!
//! ## Routes
//! * `/health`: returns 200 OK.
//! * `/api/...`: cart, checkout, payment confirmation, orders, and the admin, vendor and courier endpoints. Every
//!   route declares the roles allowed to call it.
//! * `/processor/webhook`: payment processor notifications, guarded by an HMAC signature check.
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod expiry_worker;
pub mod helpers;
pub mod identity;
pub mod integrations;
pub mod middleware;
pub mod notifications;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
