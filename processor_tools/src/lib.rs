//! Thin REST client for the external payment processor.
//!
//! The processor holds customer funds in payment intents and pays vendors out through transfers. Webhook payloads
//! are deserialized into [`ProcessorEvent`].
mod api;
mod config;
mod error;

mod data_objects;

pub use api::ProcessorApi;
pub use config::ProcessorConfig;
pub use data_objects::{
    EventData,
    NewPaymentIntent,
    NewTransfer,
    PaymentError,
    PaymentIntent,
    PaymentIntentStatus,
    ProcessorEvent,
    Transfer,
    PAYMENT_CANCELED,
    PAYMENT_FAILED,
    PAYMENT_SUCCEEDED,
};
pub use error::ProcessorApiError;
