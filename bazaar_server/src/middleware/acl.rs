//! Access control list middleware.
//!
//! Reads the caller's [`Identity`] from the request headers and lets the request through if the caller holds any of
//! the roles the route requires. A missing or malformed identity gets `401 Unauthorized`, the wrong role gets
//! `403 Forbidden`.
use std::{pin::Pin, rc::Rc};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
    HttpMessage,
};
use bazaar_engine::db_types::Role;
use futures::{
    future::{ok, Ready},
    Future,
};
use log::*;

use crate::{errors::ServerError, identity::Identity};

pub struct AclMiddlewareFactory {
    allowed_roles: Vec<Role>,
}

impl AclMiddlewareFactory {
    pub fn new(allowed_roles: &[Role]) -> Self {
        AclMiddlewareFactory { allowed_roles: allowed_roles.to_vec() }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AclMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = AclMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AclMiddlewareService { allowed_roles: self.allowed_roles.clone(), service: Rc::new(service) })
    }
}

pub struct AclMiddlewareService<S> {
    allowed_roles: Vec<Role>,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for AclMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let allowed_roles = self.allowed_roles.clone();
        Box::pin(async move {
            let identity = Identity::from_headers(req.headers()).map_err(|e| {
                debug!("🔐️ No usable identity on request to {}. {e}", req.path());
                Error::from(e)
            })?;
            if !allowed_roles.contains(&identity.role) {
                warn!("🔐️ {} tried to access {} without permission", identity.role, req.path());
                return Err(ServerError::InsufficientPermissions(format!(
                    "The {} role may not call this endpoint",
                    identity.role
                ))
                .into());
            }
            trace!("🔐️ {} allowed to access {}", identity.role, req.path());
            req.extensions_mut().insert(identity);
            service.call(req).await
        })
    }
}
