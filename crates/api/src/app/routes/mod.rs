use axum::{Router, middleware::from_fn, middleware::from_fn_with_state};

use crate::app::services::AppServices;
use crate::authz;

pub mod admin;
pub mod auth;
pub mod orders;
pub mod profile;
pub mod reports;
pub mod system;

/// Endpoints reachable without a token.
pub fn public_router() -> Router {
    Router::new().nest("/auth", auth::router())
}

/// Router for all authenticated endpoints.
///
/// Each resource router carries its own gate, bound to the resource type it
/// declares; the gate runs before the handler and its body extractor.
pub fn router(services: &AppServices) -> Router {
    let resources = Router::new()
        .nest(
            "/orders",
            orders::router().layer(from_fn_with_state(
                services.orders.gate().clone(),
                authz::resource_gate,
            )),
        )
        .nest(
            "/reports",
            reports::router().layer(from_fn_with_state(
                services.reports.gate().clone(),
                authz::resource_gate,
            )),
        );

    Router::new()
        .route("/whoami", axum::routing::get(system::whoami))
        .nest("/profile", profile::router().layer(from_fn(authz::require_active)))
        .nest("/resources", resources)
        .nest("/admin", admin::router().layer(from_fn(authz::require_admin)))
}
