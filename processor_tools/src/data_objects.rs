use std::{collections::HashMap, fmt::Display, str::FromStr};

use bazaar_common::Money;
use serde::{Deserialize, Serialize};

pub const PAYMENT_SUCCEEDED: &str = "payment_intent.succeeded";
pub const PAYMENT_FAILED: &str = "payment_intent.payment_failed";
pub const PAYMENT_CANCELED: &str = "payment_intent.canceled";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentIntentStatus {
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresAction,
    Processing,
    RequiresCapture,
    Canceled,
    Succeeded,
    /// Not a processor status. Used for payment-failed events, which leave the intent in
    /// `requires_payment_method` but carry a definitive failure.
    Failed,
    #[serde(other)]
    Unknown,
}

impl Display for PaymentIntentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::RequiresPaymentMethod => "requires_payment_method",
            Self::RequiresConfirmation => "requires_confirmation",
            Self::RequiresAction => "requires_action",
            Self::Processing => "processing",
            Self::RequiresCapture => "requires_capture",
            Self::Canceled => "canceled",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

impl FromStr for PaymentIntentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_value(serde_json::Value::String(s.to_string())).map_err(|e| e.to_string())
    }
}

/// A payment intent as returned by the processor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub amount: Money,
    pub currency: String,
    pub status: PaymentIntentStatus,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    /// Set when the last attempt to collect the payment was declined.
    #[serde(default)]
    pub last_payment_error: Option<PaymentError>,
}

impl PaymentIntent {
    /// The intent's status, with a declined attempt reported as [`PaymentIntentStatus::Failed`].
    ///
    /// After a decline the processor puts the intent back into `requires_payment_method`, which is also the status of
    /// an intent nobody has tried to pay yet. Only the attached error tells the two apart.
    pub fn effective_status(&self) -> PaymentIntentStatus {
        match (self.status, &self.last_payment_error) {
            (PaymentIntentStatus::RequiresPaymentMethod, Some(_)) => PaymentIntentStatus::Failed,
            (status, _) => status,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentError {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewPaymentIntent {
    pub amount: Money,
    pub currency: String,
    pub metadata: HashMap<String, String>,
}

impl NewPaymentIntent {
    /// Flattens the intent into the form-encoded layout the processor expects (`metadata[key]=value`).
    pub fn as_form(&self) -> Vec<(String, String)> {
        let mut form = vec![
            ("amount".to_string(), self.amount.value().to_string()),
            ("currency".to_string(), self.currency.clone()),
        ];
        let mut keys = self.metadata.keys().collect::<Vec<_>>();
        keys.sort();
        for key in keys {
            form.push((format!("metadata[{key}]"), self.metadata[key].clone()));
        }
        form
    }
}

/// A payout from the platform balance to a connected vendor account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transfer {
    pub id: String,
    pub amount: Money,
    pub currency: String,
    pub destination: String,
    #[serde(default)]
    pub transfer_group: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewTransfer {
    pub amount: Money,
    pub currency: String,
    pub destination: String,
    pub transfer_group: String,
}

impl NewTransfer {
    pub fn as_form(&self) -> Vec<(String, String)> {
        vec![
            ("amount".to_string(), self.amount.value().to_string()),
            ("currency".to_string(), self.currency.clone()),
            ("destination".to_string(), self.destination.clone()),
            ("transfer_group".to_string(), self.transfer_group.clone()),
        ]
    }
}

/// A webhook notification from the processor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventData {
    pub object: PaymentIntent,
}

impl ProcessorEvent {
    /// True for the event types that carry a definitive payment outcome.
    pub fn is_settlement_event(&self) -> bool {
        matches!(self.event_type.as_str(), PAYMENT_SUCCEEDED | PAYMENT_FAILED | PAYMENT_CANCELED)
    }

    /// The status the event reports for its payment intent. Failure events are reported as
    /// [`PaymentIntentStatus::Failed`] regardless of the intent's own status field.
    pub fn reported_status(&self) -> PaymentIntentStatus {
        match self.event_type.as_str() {
            PAYMENT_SUCCEEDED => PaymentIntentStatus::Succeeded,
            PAYMENT_FAILED => PaymentIntentStatus::Failed,
            PAYMENT_CANCELED => PaymentIntentStatus::Canceled,
            _ => self.data.object.effective_status(),
        }
    }
}
