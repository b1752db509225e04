//! Route-level authorization guards.
//!
//! Resource routes run the RBAC gate for the route's declared resource type
//! with the action derived from the HTTP method, before any handler or body
//! extractor runs. Admin routes require an active staff principal.

use axum::{
    extract::{Extension, State},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use warden_infra::{AccessError, AccessGate};

use crate::app::errors;
use crate::context::PrincipalContext;

/// Gate a resource router; install with `from_fn_with_state(gate, resource_gate)`.
pub async fn resource_gate(
    State(gate): State<AccessGate>,
    Extension(principal): Extension<PrincipalContext>,
    req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let method = req.method().as_str().to_string();
    match gate.check_method(principal.principal(), &method).await {
        Ok(()) => next.run(req).await,
        Err(AccessError::Misconfigured(e)) => {
            warn!(
                resource_type = gate.resource_type(),
                error = %e,
                "resource route is misconfigured; denying"
            );
            errors::forbidden()
        }
        Err(e) => errors::access_error_to_response(e),
    }
}

pub async fn require_admin(
    Extension(principal): Extension<PrincipalContext>,
    req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    if !principal.is_admin() {
        return errors::forbidden();
    }
    next.run(req).await
}

pub async fn require_active(
    Extension(principal): Extension<PrincipalContext>,
    req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    if !principal.is_active() {
        return errors::forbidden();
    }
    next.run(req).await
}
