use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use tracing::{debug, error};

use warden_auth::JwtValidator;
use warden_infra::{IdentityStore, StoreError};

use crate::app::errors;
use crate::context::PrincipalContext;

#[derive(Clone)]
pub struct AuthState {
    pub jwt: Arc<dyn JwtValidator>,
    pub identity: Arc<dyn IdentityStore>,
}

/// Verify the bearer token and load the principal it names.
///
/// Inactive principals pass through; every authorization check downstream
/// denies them.
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let token = match extract_bearer(req.headers()) {
        Ok(t) => t,
        Err(status) => return errors::unauthorized(status),
    };

    let claims = match state.jwt.validate(token, Utc::now()) {
        Ok(c) => c,
        Err(e) => {
            debug!(error = %e, "token rejected");
            return errors::unauthorized(StatusCode::UNAUTHORIZED);
        }
    };

    let principal = match state.identity.get_principal(claims.sub).await {
        Ok(p) => p,
        Err(StoreError::NotFound) => {
            debug!(principal_id = %claims.sub, "token subject does not exist");
            return errors::unauthorized(StatusCode::UNAUTHORIZED);
        }
        Err(e) => {
            error!(error = %e, "failed to load principal");
            return errors::store_error_to_response(e);
        }
    };

    req.extensions_mut().insert(PrincipalContext::new(principal));

    next.run(req).await
}

fn extract_bearer(headers: &HeaderMap) -> Result<&str, StatusCode> {
    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let header = header.to_str().map_err(|_| StatusCode::UNAUTHORIZED)?;

    let header = header
        .strip_prefix("Bearer ")
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token = header.trim();
    if token.is_empty() {
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(token)
}

#[cfg(test)]
mod tests {
    use axum::http::{HeaderValue, header::AUTHORIZATION};

    use super::*;

    fn headers(value: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        h
    }

    #[test]
    fn bearer_token_is_extracted() {
        let h = headers("Bearer abc.def.ghi");
        assert_eq!(extract_bearer(&h), Ok("abc.def.ghi"));
    }

    #[test]
    fn missing_or_wrong_scheme_is_unauthorized() {
        assert_eq!(extract_bearer(&HeaderMap::new()), Err(StatusCode::UNAUTHORIZED));
        assert_eq!(extract_bearer(&headers("Basic dXNlcg==")), Err(StatusCode::UNAUTHORIZED));
        assert_eq!(extract_bearer(&headers("Bearer    ")), Err(StatusCode::UNAUTHORIZED));
    }
}
