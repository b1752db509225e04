//! Store and token wiring shared by every handler.

use std::sync::Arc;

use tracing::info;

use warden_auth::{Hs256Jwt, JwtValidator, TokenIssuer};
use warden_infra::{
    AccessGate, IdentityStore, InMemoryOwnedStore, InMemoryStore, OwnedStore, PolicyStore,
    PostgresStore, ResourceAccess, SeedReport, StoreError, seed_defaults,
};
use warden_orders::Order;
use warden_reports::Report;

use crate::config::ApiConfig;

pub const ORDERS: &str = "orders";
pub const REPORTS: &str = "reports";

pub struct AppServices {
    pub identity: Arc<dyn IdentityStore>,
    pub policy: Arc<dyn PolicyStore>,
    pub jwt: Arc<dyn JwtValidator>,
    pub tokens: Arc<dyn TokenIssuer>,
    pub orders: ResourceAccess<Order>,
    pub reports: ResourceAccess<Report>,
}

impl AppServices {
    pub fn new(
        identity: Arc<dyn IdentityStore>,
        policy: Arc<dyn PolicyStore>,
        orders: Arc<dyn OwnedStore<Order>>,
        reports: Arc<dyn OwnedStore<Report>>,
        jwt: Hs256Jwt,
    ) -> Self {
        let jwt = Arc::new(jwt);
        Self {
            orders: ResourceAccess::new(AccessGate::new(ORDERS, Arc::clone(&policy)), orders),
            reports: ResourceAccess::new(AccessGate::new(REPORTS, Arc::clone(&policy)), reports),
            identity,
            policy,
            jwt: jwt.clone(),
            tokens: jwt,
        }
    }

    /// Everything in process memory; nothing survives a restart.
    pub fn in_memory(jwt: Hs256Jwt) -> Self {
        let store = Arc::new(InMemoryStore::new());
        Self::new(
            store.clone(),
            store,
            Arc::new(InMemoryOwnedStore::<Order>::new()),
            Arc::new(InMemoryOwnedStore::<Report>::new()),
            jwt,
        )
    }

    pub fn postgres(store: PostgresStore, jwt: Hs256Jwt) -> Self {
        let store = Arc::new(store);
        Self::new(store.clone(), store.clone(), store.clone(), store, jwt)
    }

    pub async fn seed(&self, config: &ApiConfig) -> Result<SeedReport, warden_infra::SeedError> {
        seed_defaults(&*self.identity, &*self.policy, &config.seed_config()).await
    }
}

/// Select and prepare the store named by the configuration.
pub async fn build_services(config: &ApiConfig) -> Result<AppServices, StoreError> {
    let jwt = Hs256Jwt::new(config.jwt_secret.as_bytes(), config.token_ttl);

    let services = match &config.database_url {
        Some(url) => {
            let store = PostgresStore::connect(url).await?;
            store.ensure_schema().await?;
            info!("using postgres store");
            AppServices::postgres(store, jwt)
        }
        None => {
            info!("DATABASE_URL not set; using in-memory store");
            AppServices::in_memory(jwt)
        }
    };

    Ok(services)
}
