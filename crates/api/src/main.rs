use std::sync::Arc;

use anyhow::Context;

use warden_api::{ApiConfig, build_app};
use warden_api::app::services::build_services;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    warden_observability::init();

    let config = ApiConfig::from_env()?;
    let services = build_services(&config).await.context("failed to prepare store")?;

    if config.seed_on_start {
        let report = services.seed(&config).await.context("seeding failed")?;
        tracing::info!(
            resource_types = ?report.resource_types,
            roles = ?report.roles,
            principals = ?report.principals,
            "seed complete"
        );
    }

    let app = build_app(Arc::new(services));

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
