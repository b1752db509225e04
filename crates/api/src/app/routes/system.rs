use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};

use crate::context::PrincipalContext;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

/// GET /whoami - The principal behind the presented token, as loaded now.
pub async fn whoami(Extension(principal): Extension<PrincipalContext>) -> impl IntoResponse {
    let p = principal.principal();
    Json(serde_json::json!({
        "principal_id": p.id.to_string(),
        "email": p.email.as_str(),
        "is_active": p.is_active,
        "is_staff": p.is_staff,
        "is_superuser": p.is_superuser,
        "role_ids": p.roles.iter().map(|r| r.to_string()).collect::<Vec<_>>(),
    }))
}
