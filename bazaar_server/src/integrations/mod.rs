//! Adapters that plug external services into the settlement engine.
pub mod processor;
