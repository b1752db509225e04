//! Idempotent bootstrap data: default resource types, the Manager role and
//! two accounts to log in with.

use thiserror::Error;
use tracing::info;

use warden_auth::{
    Action, CredentialError, Email, Grants, Principal, Profile, ResourceType, ResourceTypeName,
    Role, RoleName, hash_password,
};
use warden_core::DomainError;

use crate::store::{IdentityStore, PolicyStore, StoreError};

pub const DEFAULT_RESOURCE_TYPES: [&str; 2] = ["orders", "reports"];
pub const MANAGER_ROLE: &str = "Manager";
pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const MANAGER_EMAIL: &str = "manager@example.com";

#[derive(Debug, Error)]
pub enum SeedError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Credential(#[from] CredentialError),
}

#[derive(Debug, Clone)]
pub struct SeedConfig {
    pub admin_password: String,
    pub manager_password: String,
}

/// What a seeding run actually created (empty on a re-run).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub resource_types: Vec<String>,
    pub roles: Vec<String>,
    pub principals: Vec<String>,
}

pub async fn seed_defaults(
    identity: &dyn IdentityStore,
    policy: &dyn PolicyStore,
    config: &SeedConfig,
) -> Result<SeedReport, SeedError> {
    let mut report = SeedReport::default();

    let mut orders = None;
    for name in DEFAULT_RESOURCE_TYPES {
        let rt = ensure_resource_type(policy, name, &mut report).await?;
        if name == "orders" {
            orders = Some(rt);
        }
    }
    let orders = orders.ok_or(DomainError::NotFound)?;

    let manager = ensure_role(policy, MANAGER_ROLE, &mut report).await?;
    // Overwrite every flag so a re-run restores the documented grants.
    policy
        .upsert_rule(manager.id, orders.id, Grants::only(&[Action::Read, Action::Create]))
        .await?;
    info!(role = MANAGER_ROLE, resource_type = "orders", "rule seeded: read, create");

    let admin_email = Email::parse(ADMIN_EMAIL)?;
    if identity.find_credentials(&admin_email).await?.is_none() {
        let admin = Principal::superuser(
            admin_email,
            Profile::new("Admin", "Super", Some("Rootovich"))?,
            chrono::Utc::now(),
        );
        identity
            .create_principal(admin, hash_password(&config.admin_password)?)
            .await?;
        info!(email = ADMIN_EMAIL, "superuser created");
        report.principals.push(ADMIN_EMAIL.to_string());
    }

    let manager_email = Email::parse(MANAGER_EMAIL)?;
    if identity.find_credentials(&manager_email).await?.is_none() {
        let mut user = Principal::new(
            manager_email,
            Profile::new("Ivan", "Managerov", Some("Ivanovich"))?,
            chrono::Utc::now(),
        );
        user.assign_role(manager.id);
        identity
            .create_principal(user, hash_password(&config.manager_password)?)
            .await?;
        info!(email = MANAGER_EMAIL, role = MANAGER_ROLE, "user created");
        report.principals.push(MANAGER_EMAIL.to_string());
    }

    Ok(report)
}

async fn ensure_resource_type(
    policy: &dyn PolicyStore,
    name: &str,
    report: &mut SeedReport,
) -> Result<ResourceType, SeedError> {
    let name = ResourceTypeName::parse(name)?;
    if let Some(existing) = policy.find_resource_type(&name).await? {
        return Ok(existing);
    }
    let rt = policy.register_resource_type(name).await?;
    info!(resource_type = %rt.name, "resource type registered");
    report.resource_types.push(rt.name.to_string());
    Ok(rt)
}

async fn ensure_role(policy: &dyn PolicyStore, name: &str, report: &mut SeedReport) -> Result<Role, SeedError> {
    let name = RoleName::parse(name)?;
    if let Some(existing) = policy.find_role(&name).await? {
        return Ok(existing);
    }
    let role = policy.create_role(name).await?;
    info!(role = %role.name, "role created");
    report.roles.push(role.name.to_string());
    Ok(role)
}
