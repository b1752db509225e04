//! Admin routes: the role graph, the permission rule table and account
//! lifecycle.
//!
//! Mounted behind `require_admin`; only active staff principals get here.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use tracing::info;

use warden_auth::{
    Action, Grants, GrantsPatch, ResourceTypeName, RoleName, explain_authorization,
};
use warden_core::{PrincipalId, ResourceTypeId, RoleId, RuleId};

use crate::app::dto::{self, UserResponse};
use crate::app::routes::profile::role_names;
use crate::app::extract::{ApiJson, ApiQuery};
use crate::app::{errors, services::AppServices};
use crate::context::PrincipalContext;

// ─────────────────────────────────────────────────────────────────────────────
// Request DTOs
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct NameRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateRuleRequest {
    pub role_id: String,
    pub resource_type_id: String,
    /// Absent flags are `false`.
    #[serde(flatten)]
    pub grants: Grants,
}

#[derive(Debug, Deserialize)]
pub struct AssignRoleRequest {
    pub role_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ExplainQuery {
    pub resource: String,
    pub action: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Router
// ─────────────────────────────────────────────────────────────────────────────

pub fn router() -> Router {
    Router::new()
        .route("/roles", post(create_role).get(list_roles))
        .route(
            "/roles/:id",
            get(get_role).put(rename_role).patch(rename_role).delete(delete_role),
        )
        .route(
            "/resource-types",
            post(register_resource_type).get(list_resource_types),
        )
        .route(
            "/resource-types/:id",
            get(get_resource_type).delete(delete_resource_type),
        )
        .route("/rules", post(create_rule).get(list_rules))
        .route(
            "/rules/:id",
            get(get_rule).put(update_rule).patch(update_rule).delete(delete_rule),
        )
        .route("/users", get(list_users))
        .route("/users/:id", get(get_user))
        .route("/users/:id/roles", post(assign_role))
        .route("/users/:id/roles/:role_id", delete(revoke_role))
        .route("/users/:id/deactivate", post(deactivate_user))
        .route("/users/:id/activate", post(activate_user))
        .route("/explain/:user_id", get(explain))
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers: roles
// ─────────────────────────────────────────────────────────────────────────────

/// POST /admin/roles - Create a role (409 when the name is taken)
pub async fn create_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<PrincipalContext>,
    ApiJson(body): ApiJson<NameRequest>,
) -> axum::response::Response {
    let name = match RoleName::parse(&body.name) {
        Ok(n) => n,
        Err(e) => return errors::domain_error_to_response(e),
    };
    match services.policy.create_role(name).await {
        Ok(role) => {
            info!(actor = %actor.principal_id(), role_id = %role.id, name = role.name.as_str(), "role created");
            (StatusCode::CREATED, Json(role)).into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}

/// GET /admin/roles - List roles
pub async fn list_roles(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.policy.list_roles().await {
        Ok(roles) => Json(roles).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn get_role(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: RoleId = match dto::parse_id(&id, "role") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.policy.get_role(id).await {
        Ok(role) => Json(role).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

/// PUT|PATCH /admin/roles/:id - Rename a role
pub async fn rename_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<PrincipalContext>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<NameRequest>,
) -> axum::response::Response {
    let id: RoleId = match dto::parse_id(&id, "role") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let name = match RoleName::parse(&body.name) {
        Ok(n) => n,
        Err(e) => return errors::domain_error_to_response(e),
    };
    match services.policy.rename_role(id, name).await {
        Ok(role) => {
            info!(actor = %actor.principal_id(), role_id = %role.id, name = role.name.as_str(), "role renamed");
            Json(role).into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}

/// DELETE /admin/roles/:id - Remove a role, its rules and its assignments
pub async fn delete_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: RoleId = match dto::parse_id(&id, "role") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.policy.delete_role(id).await {
        Ok(()) => {
            info!(actor = %actor.principal_id(), role_id = %id, "role deleted");
            StatusCode::NO_CONTENT.into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers: resource types
// ─────────────────────────────────────────────────────────────────────────────

/// POST /admin/resource-types - Register a resource type by name
pub async fn register_resource_type(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<PrincipalContext>,
    ApiJson(body): ApiJson<NameRequest>,
) -> axum::response::Response {
    let name = match ResourceTypeName::parse(&body.name) {
        Ok(n) => n,
        Err(e) => return errors::domain_error_to_response(e),
    };
    match services.policy.register_resource_type(name).await {
        Ok(rt) => {
            info!(actor = %actor.principal_id(), resource_type = rt.name.as_str(), "resource type registered");
            (StatusCode::CREATED, Json(rt)).into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn list_resource_types(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.policy.list_resource_types().await {
        Ok(types) => Json(types).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn get_resource_type(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: ResourceTypeId = match dto::parse_id(&id, "resource type") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.policy.get_resource_type(id).await {
        Ok(rt) => Json(rt).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

/// DELETE /admin/resource-types/:id - Unregister; every rule on it goes too
pub async fn delete_resource_type(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: ResourceTypeId = match dto::parse_id(&id, "resource type") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.policy.delete_resource_type(id).await {
        Ok(()) => {
            info!(actor = %actor.principal_id(), resource_type_id = %id, "resource type deleted");
            StatusCode::NO_CONTENT.into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers: permission rules
// ─────────────────────────────────────────────────────────────────────────────

/// POST /admin/rules - Create the rule for a (role, resource type) pair
///
/// A second rule for the same pair is a 409; edit the existing one instead.
pub async fn create_rule(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<PrincipalContext>,
    ApiJson(body): ApiJson<CreateRuleRequest>,
) -> axum::response::Response {
    let role: RoleId = match dto::parse_id(&body.role_id, "role") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let resource_type: ResourceTypeId = match dto::parse_id(&body.resource_type_id, "resource type") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.policy.create_rule(role, resource_type, body.grants).await {
        Ok(rule) => {
            info!(
                actor = %actor.principal_id(),
                rule_id = %rule.id,
                role_id = %role,
                resource_type_id = %resource_type,
                "permission rule created"
            );
            (StatusCode::CREATED, Json(rule)).into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn list_rules(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.policy.list_rules().await {
        Ok(rules) => Json(rules).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn get_rule(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: RuleId = match dto::parse_id(&id, "rule") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.policy.get_rule(id).await {
        Ok(rule) => Json(rule).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

/// PUT|PATCH /admin/rules/:id - Change the flags present in the body
pub async fn update_rule(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<PrincipalContext>,
    Path(id): Path<String>,
    ApiJson(patch): ApiJson<GrantsPatch>,
) -> axum::response::Response {
    let id: RuleId = match dto::parse_id(&id, "rule") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.policy.update_rule(id, patch).await {
        Ok(rule) => {
            info!(actor = %actor.principal_id(), rule_id = %rule.id, "permission rule updated");
            Json(rule).into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn delete_rule(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: RuleId = match dto::parse_id(&id, "rule") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.policy.delete_rule(id).await {
        Ok(()) => {
            info!(actor = %actor.principal_id(), rule_id = %id, "permission rule deleted");
            StatusCode::NO_CONTENT.into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers: users
// ─────────────────────────────────────────────────────────────────────────────

async fn user_response(services: &AppServices, principal: &warden_auth::Principal) -> axum::response::Response {
    match role_names(&*services.policy, principal).await {
        Ok(roles) => Json(UserResponse::new(principal, roles)).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

/// GET /admin/users - List every principal, inactive ones included
pub async fn list_users(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    let (principals, roles) = match (services.identity.list_principals().await, services.policy.list_roles().await) {
        (Ok(p), Ok(r)) => (p, r),
        (Err(e), _) | (_, Err(e)) => return errors::store_error_to_response(e),
    };
    let names: HashMap<RoleId, String> = roles
        .into_iter()
        .map(|r| (r.id, r.name.as_str().to_string()))
        .collect();
    let users: Vec<UserResponse> = principals
        .iter()
        .map(|p| {
            let roles = p.roles.iter().filter_map(|id| names.get(id).cloned()).collect();
            UserResponse::new(p, roles)
        })
        .collect();
    Json(users).into_response()
}

pub async fn get_user(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: PrincipalId = match dto::parse_id(&id, "user") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.identity.get_principal(id).await {
        Ok(p) => user_response(&services, &p).await,
        Err(e) => errors::store_error_to_response(e),
    }
}

/// POST /admin/users/:id/roles - Assign a role (assigning it twice is a no-op)
pub async fn assign_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<PrincipalContext>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<AssignRoleRequest>,
) -> axum::response::Response {
    let id: PrincipalId = match dto::parse_id(&id, "user") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let role: RoleId = match dto::parse_id(&body.role_id, "role") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.identity.assign_role(id, role).await {
        Ok(p) => {
            info!(actor = %actor.principal_id(), principal_id = %id, role_id = %role, "role assigned");
            user_response(&services, &p).await
        }
        Err(e) => errors::store_error_to_response(e),
    }
}

/// DELETE /admin/users/:id/roles/:role_id - Revoke a role
pub async fn revoke_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<PrincipalContext>,
    Path((id, role_id)): Path<(String, String)>,
) -> axum::response::Response {
    let id: PrincipalId = match dto::parse_id(&id, "user") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let role: RoleId = match dto::parse_id(&role_id, "role") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.identity.revoke_role(id, role).await {
        Ok(p) => {
            info!(actor = %actor.principal_id(), principal_id = %id, role_id = %role, "role revoked");
            user_response(&services, &p).await
        }
        Err(e) => errors::store_error_to_response(e),
    }
}

/// POST /admin/users/:id/deactivate - Soft delete; takes effect on the next request
pub async fn deactivate_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    set_active(&services, &actor, &id, false).await
}

/// POST /admin/users/:id/activate - Restore a deactivated account
pub async fn activate_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    set_active(&services, &actor, &id, true).await
}

async fn set_active(
    services: &AppServices,
    actor: &PrincipalContext,
    raw_id: &str,
    active: bool,
) -> axum::response::Response {
    let id: PrincipalId = match dto::parse_id(raw_id, "user") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.identity.set_active(id, active).await {
        Ok(p) => {
            info!(actor = %actor.principal_id(), principal_id = %id, active, "account state changed");
            user_response(services, &p).await
        }
        Err(e) => errors::store_error_to_response(e),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers: explanation
// ─────────────────────────────────────────────────────────────────────────────

/// GET /admin/explain/:user_id?resource=&action= - Why a request would be
/// allowed or denied, evaluated against current state
pub async fn explain(
    Extension(services): Extension<Arc<AppServices>>,
    Path(user_id): Path<String>,
    ApiQuery(query): ApiQuery<ExplainQuery>,
) -> axum::response::Response {
    let id: PrincipalId = match dto::parse_id(&user_id, "user") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let resource = match ResourceTypeName::parse(&query.resource) {
        Ok(r) => r,
        Err(e) => return errors::domain_error_to_response(e),
    };
    let action: Action = match query.action.parse() {
        Ok(a) => a,
        Err(e) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "validation_error", format!("{e}"));
        }
    };

    let principal = match services.identity.get_principal(id).await {
        Ok(p) => p,
        Err(e) => return errors::store_error_to_response(e),
    };
    let snapshot = match services.policy.rule_snapshot(&principal.roles, &resource).await {
        Ok(s) => s,
        Err(e) => return errors::store_error_to_response(e),
    };
    let roles = match services.policy.list_roles().await {
        Ok(r) => r,
        Err(e) => return errors::store_error_to_response(e),
    };
    let names: HashMap<RoleId, String> = roles
        .into_iter()
        .map(|r| (r.id, r.name.as_str().to_string()))
        .collect();

    let explanation = explain_authorization(&principal, &resource, action, &snapshot, |role| {
        names.get(&role).cloned()
    });
    Json(explanation).into_response()
}
