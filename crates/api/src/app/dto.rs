use std::str::FromStr;

use serde::{Deserialize, Serialize};

use warden_auth::{IssuedToken, Principal};
use warden_core::{DomainResult, PrincipalId};
use warden_orders::NewOrder;
use warden_reports::NewReport;

use crate::app::errors;

// ─────────────────────────────────────────────────────────────────────────────
// Request DTOs
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub middle_name: Option<String>,
    pub password: String,
    pub password_confirm: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct OrderRequest {
    pub item: String,
    pub price: u64,
}

impl OrderRequest {
    pub fn into_draft(self) -> DomainResult<NewOrder> {
        NewOrder::new(&self.item, self.price)
    }
}

#[derive(Debug, Deserialize)]
pub struct ReportRequest {
    pub title: String,
    #[serde(default)]
    pub content: String,
}

impl ReportRequest {
    pub fn into_draft(self) -> DomainResult<NewReport> {
        NewReport::new(&self.title, &self.content)
    }
}

/// `?page=&page_size=` on list endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl PageQuery {
    pub fn page(&self) -> warden_infra::Page {
        warden_infra::Page::new(self.page, self.page_size)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Response DTOs
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access: String,
    pub token_type: &'static str,
    /// Seconds until the access token expires.
    pub expires_in: i64,
}

impl TokenResponse {
    pub fn bearer(token: IssuedToken, now: chrono::DateTime<chrono::Utc>) -> Self {
        Self {
            access: token.access,
            token_type: "Bearer",
            expires_in: (token.expires_at - now).num_seconds().max(0),
        }
    }
}

/// Profile as shown to its owner and to administrators. Roles are names.
#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub id: PrincipalId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub middle_name: String,
    pub roles: Vec<String>,
    pub is_active: bool,
}

impl ProfileResponse {
    pub fn new(principal: &Principal, roles: Vec<String>) -> Self {
        Self {
            id: principal.id,
            email: principal.email.as_str().to_string(),
            first_name: principal.profile.first_name.clone(),
            last_name: principal.profile.last_name.clone(),
            middle_name: principal.profile.middle_name.clone(),
            roles,
            is_active: principal.is_active,
        }
    }
}

/// Administrative view of a principal: profile plus flags and role ids.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    #[serde(flatten)]
    pub profile: ProfileResponse,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub role_ids: Vec<warden_core::RoleId>,
    pub date_joined: chrono::DateTime<chrono::Utc>,
}

impl UserResponse {
    pub fn new(principal: &Principal, roles: Vec<String>) -> Self {
        Self {
            profile: ProfileResponse::new(principal, roles),
            is_staff: principal.is_staff,
            is_superuser: principal.is_superuser,
            role_ids: principal.roles.iter().copied().collect(),
            date_joined: principal.date_joined,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Parse a path id, answering 400 `invalid_id` on failure.
pub fn parse_id<T: FromStr>(raw: &str, what: &str) -> Result<T, axum::response::Response> {
    raw.trim().parse::<T>().map_err(|_| errors::invalid_id(what))
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use warden_core::OrderId;

    use super::*;

    #[test]
    fn token_response_counts_remaining_seconds() {
        let now = Utc::now();
        let token = IssuedToken {
            access: "abc".into(),
            expires_at: now + Duration::minutes(60),
        };
        let body = TokenResponse::bearer(token, now);
        assert_eq!(body.token_type, "Bearer");
        assert_eq!(body.expires_in, 3600);
    }

    #[test]
    fn path_ids_parse_or_answer_bad_request() {
        let id = OrderId::new();
        assert_eq!(parse_id::<OrderId>(&id.to_string(), "order").ok(), Some(id));
        let err = parse_id::<OrderId>("42", "order").unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[test]
    fn page_query_defaults_and_clamps() {
        let page = PageQuery::default().page();
        assert_eq!((page.number, page.size), (1, 10));
        let page = PageQuery {
            page: Some(3),
            page_size: Some(1000),
        }
        .page();
        assert_eq!((page.number, page.size), (3, 100));
    }
}
