//! Self-service registration and password login.

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use chrono::{SubsecRound, Utc};
use tracing::{debug, error, info};

use warden_auth::{
    Email, Principal, Profile, hash_password, validate_new_password, verify_password_or_dummy,
};

use crate::app::dto::{LoginRequest, ProfileResponse, RegisterRequest, TokenResponse};
use crate::app::extract::ApiJson;
use crate::app::{errors, services::AppServices};

pub fn router() -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

/// POST /auth/register - Create an active principal with no roles.
pub async fn register(
    Extension(services): Extension<Arc<AppServices>>,
    ApiJson(body): ApiJson<RegisterRequest>,
) -> axum::response::Response {
    let email = match Email::parse(&body.email) {
        Ok(e) => e,
        Err(e) => return errors::domain_error_to_response(e),
    };
    let profile = match Profile::new(&body.first_name, &body.last_name, body.middle_name.as_deref()) {
        Ok(p) => p,
        Err(e) => return errors::domain_error_to_response(e),
    };
    if let Err(e) = validate_new_password(&body.password, &body.password_confirm, email.local_part()) {
        return errors::credential_error_to_response(e);
    }
    let password = body.password;
    let hash = match tokio::task::spawn_blocking(move || hash_password(&password)).await {
        Ok(Ok(h)) => h,
        Ok(Err(e)) => return errors::credential_error_to_response(e),
        Err(e) => return hashing_failed(e),
    };

    let principal = Principal::new(email, profile, Utc::now());
    let created = match services.identity.create_principal(principal, hash).await {
        Ok(p) => p,
        Err(e) => return errors::store_error_to_response(e),
    };

    info!(principal_id = %created.id, "principal registered");
    (StatusCode::CREATED, Json(ProfileResponse::new(&created, Vec::new()))).into_response()
}

/// POST /auth/login - Exchange email and password for an access token.
///
/// Unknown email, wrong password and inactive account all answer the same 401.
pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    ApiJson(body): ApiJson<LoginRequest>,
) -> axum::response::Response {
    let rejected = || errors::json_error(StatusCode::UNAUTHORIZED, "unauthorized", "invalid credentials");

    let Ok(email) = Email::parse(&body.email) else {
        return rejected();
    };
    let creds = match services.identity.find_credentials(&email).await {
        Ok(c) => c,
        Err(e) => return errors::store_error_to_response(e),
    };

    // Unknown emails still pay for one verification.
    let password = body.password;
    let phc = creds.as_ref().map(|c| c.password_hash.clone());
    let verify = move || verify_password_or_dummy(&password, phc.as_deref());
    let verified = match tokio::task::spawn_blocking(verify).await {
        Ok(v) => v,
        Err(e) => return hashing_failed(e),
    };

    let Some(creds) = creds else {
        debug!("login for unknown email");
        return rejected();
    };
    if !verified {
        debug!(principal_id = %creds.principal.id, "login with wrong password");
        return rejected();
    }
    if !creds.principal.is_active {
        debug!(principal_id = %creds.principal.id, "login for inactive principal");
        return rejected();
    }

    let now = Utc::now().trunc_subsecs(0);
    match services.tokens.issue(creds.principal.id, now) {
        Ok(token) => (StatusCode::OK, Json(TokenResponse::bearer(token, now))).into_response(),
        Err(e) => {
            error!(error = %e, "token issue failed");
            errors::json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "internal error")
        }
    }
}

fn hashing_failed(e: tokio::task::JoinError) -> axum::response::Response {
    error!(error = %e, "password hashing task failed");
    errors::json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "internal error")
}
