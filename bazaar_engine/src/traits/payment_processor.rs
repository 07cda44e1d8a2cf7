use std::{collections::BTreeMap, fmt::Display};

use bazaar_common::Money;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db_types::OrderId;

/// The definitive state of a payment as far as the ledger is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementOutcome {
    /// Funds have been captured.
    Settled,
    /// The payment failed or was cancelled. No funds will arrive.
    Failed,
    /// The processor has not reached a verdict yet.
    Pending,
}

impl Display for SettlementOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettlementOutcome::Settled => write!(f, "settled"),
            SettlementOutcome::Failed => write!(f, "failed"),
            SettlementOutcome::Pending => write!(f, "pending"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRequest {
    pub order_id: OrderId,
    pub amount: Money,
    pub currency: String,
    /// Attached to the processor's payment record so the vendor splits can be reconstructed from the processor side.
    pub metadata: BTreeMap<String, String>,
}

/// What the processor hands back when a payment is requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentHandle {
    pub reference: String,
    /// Passed to the client so it can complete the payment with the processor directly.
    pub client_secret: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayoutRequest {
    pub destination: String,
    pub amount: Money,
    pub currency: String,
    /// Groups all payouts that stem from the same customer payment.
    pub transfer_group: String,
    /// Stable per (payment, vendor) pair so that retries never pay twice.
    pub idempotency_key: String,
}

#[derive(Debug, Clone, Error)]
pub enum ProcessorError {
    #[error("The payment processor could not be reached. {0}")]
    Unavailable(String),
    #[error("The payment processor rejected the request. {0}")]
    Rejected(String),
}

/// The engine's view of the external payment processor.
#[allow(async_fn_in_trait)]
pub trait PaymentProcessor: Clone {
    /// Requests a new payment for the given amount.
    async fn create_payment(&self, request: PaymentRequest) -> Result<PaymentHandle, ProcessorError>;

    /// Asks the processor for the authoritative state of a payment.
    async fn fetch_payment(&self, reference: &str) -> Result<SettlementOutcome, ProcessorError>;

    /// Cancels a payment that has not settled. Returns the state of the payment after the attempt, which is
    /// `Settled` if the funds were captured before the cancellation landed.
    async fn cancel_payment(&self, reference: &str) -> Result<SettlementOutcome, ProcessorError>;

    /// Pays funds out to a connected vendor account, returning the processor's transfer id.
    async fn create_transfer(&self, request: PayoutRequest) -> Result<String, ProcessorError>;
}
