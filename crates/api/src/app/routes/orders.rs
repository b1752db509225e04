//! Orders, scoped to the requesting owner.
//!
//! Mounted behind the `orders` resource gate; the access layer re-checks the
//! handler's own action and scopes every row to the requester.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use warden_core::OrderId;
use warden_orders::OrderPatch;

use crate::app::dto::{self, OrderRequest, PageQuery};
use crate::app::extract::{ApiJson, ApiQuery};
use crate::app::{errors, services::AppServices};
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_orders).post(create_order))
        .route(
            "/:id",
            get(get_order)
                .put(replace_order)
                .patch(patch_order)
                .delete(delete_order),
        )
}

/// GET /resources/orders - The caller's orders, paginated.
pub async fn list_orders(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> axum::response::Response {
    match services.orders.list_owned(principal.principal(), query.page()).await {
        Ok(page) => Json(page).into_response(),
        Err(e) => errors::access_error_to_response(e),
    }
}

/// POST /resources/orders - Create an order owned by the caller.
pub async fn create_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    ApiJson(body): ApiJson<OrderRequest>,
) -> axum::response::Response {
    let draft = match body.into_draft() {
        Ok(d) => d,
        Err(e) => return errors::domain_error_to_response(e),
    };
    match services.orders.create_owned(principal.principal(), draft).await {
        Ok(order) => (StatusCode::CREATED, Json(order)).into_response(),
        Err(e) => errors::access_error_to_response(e),
    }
}

pub async fn get_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: OrderId = match dto::parse_id(&id, "order") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.orders.get_owned(principal.principal(), id).await {
        Ok(order) => Json(order).into_response(),
        Err(e) => errors::access_error_to_response(e),
    }
}

/// PUT /resources/orders/:id - Replace every field.
pub async fn replace_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<OrderRequest>,
) -> axum::response::Response {
    let id: OrderId = match dto::parse_id(&id, "order") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let patch = match body.into_draft() {
        Ok(d) => OrderPatch::replace(d),
        Err(e) => return errors::domain_error_to_response(e),
    };
    update(&services, &principal, id, patch).await
}

/// PATCH /resources/orders/:id - Change only the fields present.
pub async fn patch_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    ApiJson(patch): ApiJson<OrderPatch>,
) -> axum::response::Response {
    let id: OrderId = match dto::parse_id(&id, "order") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    update(&services, &principal, id, patch).await
}

async fn update(
    services: &AppServices,
    principal: &PrincipalContext,
    id: OrderId,
    patch: OrderPatch,
) -> axum::response::Response {
    match services.orders.update_owned(principal.principal(), id, patch).await {
        Ok(order) => Json(order).into_response(),
        Err(e) => errors::access_error_to_response(e),
    }
}

pub async fn delete_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: OrderId = match dto::parse_id(&id, "order") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.orders.delete_owned(principal.principal(), id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::access_error_to_response(e),
    }
}
