use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;
use tracing::{error, warn};

use warden_auth::CredentialError;
use warden_core::DomainError;
use warden_infra::{AccessError, StoreError};

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// The one 403 body. Every denial looks like this, whatever the reason.
pub fn forbidden() -> axum::response::Response {
    json_error(StatusCode::FORBIDDEN, "forbidden", "forbidden")
}

pub fn unauthorized(status: StatusCode) -> axum::response::Response {
    json_error(status, "unauthorized", "authentication required")
}

pub fn invalid_id(what: &str) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "invalid_id", format!("invalid {what} id"))
}

pub fn access_error_to_response(err: AccessError) -> axum::response::Response {
    match err {
        AccessError::Denied => forbidden(),
        AccessError::Misconfigured(e) => {
            warn!(error = %e, "authorization misconfigured; denying");
            forbidden()
        }
        AccessError::Store(e) => store_error_to_response(e),
    }
}

pub fn store_error_to_response(err: StoreError) -> axum::response::Response {
    match err {
        StoreError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        StoreError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        StoreError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        StoreError::Unexpected(e) => {
            error!(error = ?e, "store failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", "internal store error")
        }
    }
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    match err {
        DomainError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        DomainError::InvalidId(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_id", msg),
        DomainError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        DomainError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
    }
}

pub fn credential_error_to_response(err: CredentialError) -> axum::response::Response {
    match err {
        CredentialError::Hash(msg) => {
            error!(error = %msg, "password hashing failed");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "internal error")
        }
        other => json_error(StatusCode::BAD_REQUEST, "validation_error", other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_denial_maps_to_forbidden() {
        assert_eq!(access_error_to_response(AccessError::Denied).status(), StatusCode::FORBIDDEN);
        let misconfigured = AccessError::Misconfigured(warden_auth::AuthzError::Malformed("Bad Name".into()));
        assert_eq!(access_error_to_response(misconfigured).status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn store_errors_map_to_statuses() {
        assert_eq!(
            store_error_to_response(StoreError::Conflict("email".into())).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            store_error_to_response(StoreError::Validation("bad".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            store_error_to_response(StoreError::Unexpected(anyhow::anyhow!("db down"))).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn password_policy_failures_are_validation_errors() {
        assert_eq!(
            credential_error_to_response(CredentialError::TooShort).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            credential_error_to_response(CredentialError::Hash("rng".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
