//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store selection and token wiring
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request/response DTOs and JSON mapping helpers
//! - `errors.rs`: consistent error responses
//! - `extract.rs`: body/query extractors with JSON rejections

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod extract;
pub mod routes;
pub mod services;

pub use services::AppServices;

/// Base path for every versioned endpoint.
pub const API_PREFIX: &str = "/api/v1";

/// Build the full HTTP router (public entrypoint used by `main.rs` and tests).
pub fn build_app(services: Arc<AppServices>) -> Router {
    let auth_state = middleware::AuthState {
        jwt: Arc::clone(&services.jwt),
        identity: Arc::clone(&services.identity),
    };

    // Protected routes: bearer token required, principal reloaded per request.
    let protected = routes::router(&services).layer(axum::middleware::from_fn_with_state(
        auth_state,
        middleware::auth_middleware,
    ));

    let api = routes::public_router().merge(protected);

    Router::new()
        .route("/health", get(routes::system::health))
        .nest(API_PREFIX, api)
        .layer(ServiceBuilder::new().layer(Extension(services)))
}
