//! Idempotent bootstrap: default resource types, the Manager role and its
//! orders rule, the admin superuser and the manager account.

use anyhow::Context;

use warden_api::ApiConfig;
use warden_api::app::services::build_services;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    warden_observability::init();

    let config = ApiConfig::from_env()?;
    if config.database_url.is_none() {
        tracing::warn!("DATABASE_URL not set; seeding an in-memory store that exits with this process");
    }
    let services = build_services(&config).await.context("failed to prepare store")?;

    let report = services.seed(&config).await.context("seeding failed")?;
    tracing::info!(
        resource_types = ?report.resource_types,
        roles = ?report.roles,
        principals = ?report.principals,
        "seed complete"
    );
    Ok(())
}
