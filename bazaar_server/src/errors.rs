use std::sync::OnceLock;

use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use bazaar_engine::traits::MarketplaceError;
use log::error;
use thiserror::Error;

use crate::data_objects::JsonResponse;

static REDACT_INTERNAL_ERRORS: OnceLock<bool> = OnceLock::new();

/// Hides the details of internal errors from clients. Set once at start-up when running in production.
pub fn redact_internal_errors(redact: bool) {
    if REDACT_INTERNAL_ERRORS.set(redact).is_err() {
        error!("💻️ Internal error redaction was already configured. Ignoring the new setting.");
    }
}

fn internal_errors_redacted() -> bool {
    REDACT_INTERNAL_ERRORS.get().copied().unwrap_or(false)
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Could not read request path: {0}")]
    InvalidRequestPath(String),
    #[error("{0}")]
    ValidationError(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("Authentication Error. {0}")]
    AuthenticationError(String),
    #[error("Insufficient Permissions. {0}")]
    InsufficientPermissions(String),
    #[error("Invalid webhook signature. {0}")]
    InvalidSignature(String),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("The payment processor could not complete the request. {0}")]
    ProcessorError(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::ValidationError(_) => StatusCode::BAD_REQUEST,
            Self::AuthenticationError(_) => StatusCode::UNAUTHORIZED,
            Self::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
            Self::InvalidSignature(_) => StatusCode::FORBIDDEN,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::ProcessorError(_) => StatusCode::BAD_GATEWAY,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("💻️ {self}");
            if internal_errors_redacted() {
                "An internal error occurred. It has been logged.".to_string()
            } else {
                self.to_string()
            }
        } else {
            self.to_string()
        };
        HttpResponse::build(status).insert_header(ContentType::json()).json(JsonResponse::failure(message))
    }
}

impl From<MarketplaceError> for ServerError {
    fn from(e: MarketplaceError) -> Self {
        match e {
            MarketplaceError::DatabaseError(_) | MarketplaceError::InvariantViolation(_) => {
                Self::BackendError(e.to_string())
            },
            MarketplaceError::EmptyCart | MarketplaceError::ValidationError(_) => Self::ValidationError(e.to_string()),
            MarketplaceError::InsufficientStock { .. } |
            MarketplaceError::VendorPayoutUnavailable(_) |
            MarketplaceError::InvalidTransition { .. } => Self::Conflict(e.to_string()),
            MarketplaceError::OrderNotFound(_) |
            MarketplaceError::PaymentNotFound(_) |
            MarketplaceError::ProductNotFound(_) |
            MarketplaceError::CourierNotFound(_) |
            MarketplaceError::VendorNotFound(_) |
            MarketplaceError::TransferNotFound(_) => Self::NoRecordFound(e.to_string()),
            MarketplaceError::ProcessorError(_) => Self::ProcessorError(e.to_string()),
            MarketplaceError::Forbidden(_) => Self::InsufficientPermissions(e.to_string()),
        }
    }
}
