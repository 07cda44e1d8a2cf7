//! Caller identity.
//!
//! Authentication happens upstream. The gateway in front of this server resolves the caller and forwards the result in
//! three headers:
//!
//! * `X-Role`: one of `customer`, `vendor`, `courier` or `admin`. Always required.
//! * `X-Owner-Key`: `customer:<id>` or `session:<token>`. Required for customers.
//! * `X-Actor-Id`: the vendor or courier id. Required for vendors and couriers.
//!
//! A request with missing or malformed identity headers is rejected with `401 Unauthorized`.
use std::future::{ready, Ready};

use actix_web::{dev::Payload, http::header::HeaderMap, FromRequest, HttpRequest};
use bazaar_engine::db_types::{OwnerKey, Role};
use log::debug;

use crate::errors::ServerError;

pub const OWNER_KEY_HEADER: &str = "X-Owner-Key";
pub const ROLE_HEADER: &str = "X-Role";
pub const ACTOR_ID_HEADER: &str = "X-Actor-Id";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub role: Role,
    pub owner_key: Option<OwnerKey>,
    pub actor_id: Option<i64>,
}

impl Identity {
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, ServerError> {
        let role = header_value(headers, ROLE_HEADER)?
            .ok_or_else(|| ServerError::AuthenticationError(format!("The {ROLE_HEADER} header is missing")))?
            .parse::<Role>()
            .map_err(|e| ServerError::AuthenticationError(e.to_string()))?;
        let owner_key = header_value(headers, OWNER_KEY_HEADER)?
            .map(|s| s.parse::<OwnerKey>())
            .transpose()
            .map_err(|e| ServerError::AuthenticationError(e.to_string()))?;
        let actor_id = header_value(headers, ACTOR_ID_HEADER)?
            .map(|s| s.trim().parse::<i64>())
            .transpose()
            .map_err(|e| ServerError::AuthenticationError(format!("Invalid {ACTOR_ID_HEADER} header. {e}")))?;
        let identity = Self { role, owner_key, actor_id };
        match role {
            Role::Customer if identity.owner_key.is_none() => {
                Err(ServerError::AuthenticationError(format!("Customers must supply {OWNER_KEY_HEADER}")))
            },
            Role::Vendor | Role::Courier if identity.actor_id.is_none() => {
                Err(ServerError::AuthenticationError(format!("A {role} must supply {ACTOR_ID_HEADER}")))
            },
            _ => Ok(identity),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// The owner key of the caller, for routes that act on a cart or on the caller's own orders.
    pub fn owner(&self) -> Result<&OwnerKey, ServerError> {
        self.owner_key
            .as_ref()
            .ok_or_else(|| ServerError::InsufficientPermissions("This call needs an owner identity".to_string()))
    }

    /// The vendor or courier id of the caller.
    pub fn actor_id(&self) -> Result<i64, ServerError> {
        self.actor_id.ok_or_else(|| ServerError::InsufficientPermissions(format!("A {} id is required", self.role)))
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Result<Option<String>, ServerError> {
    headers
        .get(name)
        .map(|v| {
            v.to_str()
                .map(|s| s.to_string())
                .map_err(|e| ServerError::AuthenticationError(format!("Invalid {name} header. {e}")))
        })
        .transpose()
}

impl FromRequest for Identity {
    type Error = ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let identity = Identity::from_headers(req.headers());
        if let Err(e) = &identity {
            debug!("🔐️ Rejecting request to {}. {e}", req.path());
        }
        ready(identity)
    }
}
