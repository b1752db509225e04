//! The caller's own account.

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use tracing::info;

use warden_auth::{Principal, ProfilePatch};
use warden_infra::{PolicyStore, StoreResult};

use crate::app::dto::ProfileResponse;
use crate::app::extract::ApiJson;
use crate::app::{errors, services::AppServices};
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new().route("/", get(get_profile).put(update_profile).delete(delete_profile))
}

/// Names of the principal's roles, in role-id order.
pub(crate) async fn role_names(policy: &dyn PolicyStore, principal: &Principal) -> StoreResult<Vec<String>> {
    if principal.roles.is_empty() {
        return Ok(Vec::new());
    }
    let roles = policy.list_roles().await?;
    Ok(principal
        .roles
        .iter()
        .filter_map(|id| roles.iter().find(|r| r.id == *id))
        .map(|r| r.name.as_str().to_string())
        .collect())
}

async fn profile_response(services: &AppServices, principal: &Principal) -> axum::response::Response {
    match role_names(&*services.policy, principal).await {
        Ok(roles) => Json(ProfileResponse::new(principal, roles)).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

/// GET /profile
pub async fn get_profile(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    profile_response(&services, principal.principal()).await
}

/// PUT /profile - Partial update of names; email, roles and flags are ignored.
pub async fn update_profile(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    ApiJson(patch): ApiJson<ProfilePatch>,
) -> axum::response::Response {
    let profile = match patch.apply(&principal.principal().profile) {
        Ok(p) => p,
        Err(e) => return errors::domain_error_to_response(e),
    };
    match services.identity.update_profile(principal.principal_id(), profile).await {
        Ok(updated) => profile_response(&services, &updated).await,
        Err(e) => errors::store_error_to_response(e),
    }
}

/// DELETE /profile - Soft delete: the account is deactivated, never removed.
pub async fn delete_profile(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    match services.identity.set_active(principal.principal_id(), false).await {
        Ok(_) => {
            info!(principal_id = %principal.principal_id(), "account deactivated by owner");
            StatusCode::NO_CONTENT.into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}
