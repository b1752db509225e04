use chrono::{DateTime, Duration, SubsecRound, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use warden_core::PrincipalId;

/// Access token claims.
///
/// Only the subject travels in the token. Flags and roles are loaded fresh from
/// the store on every request, so a deactivation or role change applies to
/// tokens that were issued before it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject / principal identifier.
    pub sub: PrincipalId,

    /// Issued-at timestamp.
    #[serde(rename = "iat", with = "chrono::serde::ts_seconds")]
    pub issued_at: DateTime<Utc>,

    /// Expiration timestamp.
    #[serde(rename = "exp", with = "chrono::serde::ts_seconds")]
    pub expires_at: DateTime<Utc>,
}

impl JwtClaims {
    /// Timestamps are truncated to whole seconds, the resolution of `iat`/`exp`.
    pub fn new(sub: PrincipalId, issued_at: DateTime<Utc>, ttl: Duration) -> Self {
        let issued_at = issued_at.trunc_subsecs(0);
        Self {
            sub,
            issued_at,
            expires_at: issued_at + ttl,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid token time window (expires_at <= issued_at)")]
    InvalidTimeWindow,

    #[error("malformed or unverifiable token: {0}")]
    Malformed(String),
}

/// Deterministically validate JWT claims against `now`.
pub fn validate_claims(claims: &JwtClaims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    if claims.expires_at <= claims.issued_at {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    if now < claims.issued_at {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= claims.expires_at {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}

/// Verifies bearer tokens. Object-safe so the HTTP layer can hold it as
/// `Arc<dyn JwtValidator>`.
pub trait JwtValidator: Send + Sync {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, TokenValidationError>;
}

/// Issues access tokens.
pub trait TokenIssuer: Send + Sync {
    fn issue(&self, sub: PrincipalId, now: DateTime<Utc>) -> Result<IssuedToken, TokenValidationError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssuedToken {
    pub access: String,
    pub expires_at: DateTime<Utc>,
}

/// HS256 shared-secret tokens.
#[derive(Clone)]
pub struct Hs256Jwt {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl Hs256Jwt {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn validation() -> Validation {
        let mut v = Validation::new(Algorithm::HS256);
        // Time checks happen in `validate_claims` against the caller's clock.
        v.validate_exp = false;
        v.required_spec_claims.clear();
        v
    }
}

impl core::fmt::Debug for Hs256Jwt {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Hs256Jwt").field("ttl", &self.ttl).finish_non_exhaustive()
    }
}

impl JwtValidator for Hs256Jwt {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, TokenValidationError> {
        let data = jsonwebtoken::decode::<JwtClaims>(token, &self.decoding, &Self::validation())
            .map_err(|e| TokenValidationError::Malformed(e.to_string()))?;
        validate_claims(&data.claims, now)?;
        Ok(data.claims)
    }
}

impl TokenIssuer for Hs256Jwt {
    fn issue(&self, sub: PrincipalId, now: DateTime<Utc>) -> Result<IssuedToken, TokenValidationError> {
        let claims = JwtClaims::new(sub, now, self.ttl);
        let access = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenValidationError::Malformed(e.to_string()))?;
        Ok(IssuedToken {
            access,
            expires_at: claims.expires_at,
        })
    }
}
