//! Storage boundary for principals, the policy tables and owned resources.
//!
//! Every trait is object-safe (`async_trait`) so the API can hold
//! `Arc<dyn ...>` and swap the in-memory store for Postgres at startup.

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use warden_auth::{
    Email, Grants, GrantsPatch, PermissionRule, Principal, Profile, ResourceType,
    ResourceTypeName, Role, RoleName, RuleSnapshot,
};
use warden_core::{DomainError, OwnedResource, PrincipalId, ResourceTypeId, RoleId, RuleId};

pub mod memory;
pub mod postgres;

pub use memory::{InMemoryOwnedStore, InMemoryStore};
pub use postgres::PostgresStore;

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found")]
    NotFound,
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<DomainError> for StoreError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::NotFound => StoreError::NotFound,
            DomainError::Conflict(msg) => StoreError::Conflict(msg),
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => StoreError::Validation(msg),
        }
    }
}

/// A principal together with its stored password hash (PHC string).
#[derive(Debug, Clone)]
pub struct PrincipalCredentials {
    pub principal: Principal,
    pub password_hash: String,
}

/// 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub number: u32,
    pub size: u32,
}

impl Page {
    /// Clamp caller input: page numbers start at 1, sizes at 1..=MAX_PAGE_SIZE.
    pub fn new(number: Option<u32>, size: Option<u32>) -> Self {
        Self {
            number: number.unwrap_or(1).max(1),
            size: size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.number - 1) * u64::from(self.size)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(None, None)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Paged<T> {
    pub count: u64,
    pub page: u32,
    pub page_size: u32,
    pub results: Vec<T>,
}

#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Fails with `Conflict` when the email is taken.
    async fn create_principal(&self, principal: Principal, password_hash: String) -> StoreResult<Principal>;
    async fn get_principal(&self, id: PrincipalId) -> StoreResult<Principal>;
    async fn find_credentials(&self, email: &Email) -> StoreResult<Option<PrincipalCredentials>>;
    async fn list_principals(&self) -> StoreResult<Vec<Principal>>;
    async fn update_profile(&self, id: PrincipalId, profile: Profile) -> StoreResult<Principal>;
    /// Flip `is_active` in one atomic step; rows and assignments are kept.
    async fn set_active(&self, id: PrincipalId, active: bool) -> StoreResult<Principal>;
    /// Idempotent: assigning a held role changes nothing.
    async fn assign_role(&self, id: PrincipalId, role: RoleId) -> StoreResult<Principal>;
    async fn revoke_role(&self, id: PrincipalId, role: RoleId) -> StoreResult<Principal>;
}

#[async_trait]
pub trait PolicyStore: Send + Sync {
    async fn create_role(&self, name: RoleName) -> StoreResult<Role>;
    async fn list_roles(&self) -> StoreResult<Vec<Role>>;
    async fn get_role(&self, id: RoleId) -> StoreResult<Role>;
    async fn find_role(&self, name: &RoleName) -> StoreResult<Option<Role>>;
    async fn rename_role(&self, id: RoleId, name: RoleName) -> StoreResult<Role>;
    /// Also removes the role's rules and its assignments.
    async fn delete_role(&self, id: RoleId) -> StoreResult<()>;

    async fn register_resource_type(&self, name: ResourceTypeName) -> StoreResult<ResourceType>;
    async fn list_resource_types(&self) -> StoreResult<Vec<ResourceType>>;
    async fn get_resource_type(&self, id: ResourceTypeId) -> StoreResult<ResourceType>;
    async fn find_resource_type(&self, name: &ResourceTypeName) -> StoreResult<Option<ResourceType>>;
    /// Also removes every rule on the type.
    async fn delete_resource_type(&self, id: ResourceTypeId) -> StoreResult<()>;

    /// Strict: `Conflict` when the (role, resource type) pair already has a rule.
    async fn create_rule(
        &self,
        role: RoleId,
        resource_type: ResourceTypeId,
        grants: Grants,
    ) -> StoreResult<PermissionRule>;
    /// Get-or-create, then overwrite all four flags, in one atomic step.
    async fn upsert_rule(
        &self,
        role: RoleId,
        resource_type: ResourceTypeId,
        grants: Grants,
    ) -> StoreResult<PermissionRule>;
    async fn update_rule(&self, id: RuleId, patch: GrantsPatch) -> StoreResult<PermissionRule>;
    async fn get_rule(&self, id: RuleId) -> StoreResult<PermissionRule>;
    async fn list_rules(&self) -> StoreResult<Vec<PermissionRule>>;
    async fn delete_rule(&self, id: RuleId) -> StoreResult<()>;

    /// Everything one decision needs, read consistently.
    async fn rule_snapshot(
        &self,
        roles: &BTreeSet<RoleId>,
        resource_type: &ResourceTypeName,
    ) -> StoreResult<RuleSnapshot>;
}

/// Row storage for an owned resource. Every read and write is keyed by owner,
/// so rows of other principals are indistinguishable from missing rows.
#[async_trait]
pub trait OwnedStore<R: OwnedResource>: Send + Sync {
    async fn insert(&self, row: R) -> StoreResult<R>;
    async fn list_by_owner(&self, owner: PrincipalId, page: Page) -> StoreResult<Paged<R>>;
    async fn get_owned(&self, owner: PrincipalId, id: R::Id) -> StoreResult<Option<R>>;
    /// Read, patch and write back in one atomic step.
    async fn update_owned(&self, owner: PrincipalId, id: R::Id, patch: R::Patch) -> StoreResult<Option<R>>;
    /// `false` when no such row is owned by `owner`.
    async fn delete_owned(&self, owner: PrincipalId, id: R::Id) -> StoreResult<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_defaults_and_clamps() {
        assert_eq!(Page::default(), Page { number: 1, size: 10 });
        assert_eq!(Page::new(Some(0), Some(1_000)), Page { number: 1, size: MAX_PAGE_SIZE });
        assert_eq!(Page::new(Some(3), Some(0)).size, 1);
        assert_eq!(Page::new(Some(3), Some(20)).offset(), 40);
    }

    #[test]
    fn domain_errors_map_to_store_errors() {
        assert!(matches!(StoreError::from(DomainError::NotFound), StoreError::NotFound));
        assert!(matches!(
            StoreError::from(DomainError::conflict("dup")),
            StoreError::Conflict(_)
        ));
        assert!(matches!(
            StoreError::from(DomainError::validation("bad")),
            StoreError::Validation(_)
        ));
    }
}
