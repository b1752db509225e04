//! Reports, scoped to the requesting owner.
//!
//! Mounted behind the `reports` resource gate; the access layer re-checks the
//! handler's own action and scopes every row to the requester.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use warden_core::ReportId;
use warden_reports::ReportPatch;

use crate::app::dto::{self, PageQuery, ReportRequest};
use crate::app::extract::{ApiJson, ApiQuery};
use crate::app::{errors, services::AppServices};
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_reports).post(create_report))
        .route(
            "/:id",
            get(get_report)
                .put(replace_report)
                .patch(patch_report)
                .delete(delete_report),
        )
}

/// GET /resources/reports - The caller's reports, paginated.
pub async fn list_reports(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> axum::response::Response {
    match services.reports.list_owned(principal.principal(), query.page()).await {
        Ok(page) => Json(page).into_response(),
        Err(e) => errors::access_error_to_response(e),
    }
}

/// POST /resources/reports - Create a report owned by the caller.
pub async fn create_report(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    ApiJson(body): ApiJson<ReportRequest>,
) -> axum::response::Response {
    let draft = match body.into_draft() {
        Ok(d) => d,
        Err(e) => return errors::domain_error_to_response(e),
    };
    match services.reports.create_owned(principal.principal(), draft).await {
        Ok(report) => (StatusCode::CREATED, Json(report)).into_response(),
        Err(e) => errors::access_error_to_response(e),
    }
}

pub async fn get_report(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: ReportId = match dto::parse_id(&id, "report") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.reports.get_owned(principal.principal(), id).await {
        Ok(report) => Json(report).into_response(),
        Err(e) => errors::access_error_to_response(e),
    }
}

/// PUT /resources/reports/:id - Replace every field.
pub async fn replace_report(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<ReportRequest>,
) -> axum::response::Response {
    let id: ReportId = match dto::parse_id(&id, "report") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let patch = match body.into_draft() {
        Ok(d) => ReportPatch::replace(d),
        Err(e) => return errors::domain_error_to_response(e),
    };
    update(&services, &principal, id, patch).await
}

/// PATCH /resources/reports/:id - Change only the fields present (title, content).
pub async fn patch_report(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    ApiJson(patch): ApiJson<ReportPatch>,
) -> axum::response::Response {
    let id: ReportId = match dto::parse_id(&id, "report") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    update(&services, &principal, id, patch).await
}

async fn update(
    services: &AppServices,
    principal: &PrincipalContext,
    id: ReportId,
    patch: ReportPatch,
) -> axum::response::Response {
    match services.reports.update_owned(principal.principal(), id, patch).await {
        Ok(report) => Json(report).into_response(),
        Err(e) => errors::access_error_to_response(e),
    }
}

pub async fn delete_report(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: ReportId = match dto::parse_id(&id, "report") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.reports.delete_owned(principal.principal(), id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::access_error_to_response(e),
    }
}
