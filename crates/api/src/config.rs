//! Process configuration read from the environment.

use std::net::SocketAddr;

use thiserror::Error;
use tracing::warn;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_TOKEN_TTL_MINUTES: i64 = 60;

const DEV_JWT_SECRET: &str = "dev-secret";
const DEV_SEED_PASSWORD: &str = "ChangeMe!2024";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} is not valid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            name,
            reason: reason.into(),
        }
    }
}

#[derive(Clone)]
pub struct ApiConfig {
    pub jwt_secret: String,
    pub bind_addr: SocketAddr,
    pub token_ttl: chrono::Duration,
    /// `None` selects the in-memory store.
    pub database_url: Option<String>,
    pub seed_on_start: bool,
    pub seed_admin_password: String,
    pub seed_manager_password: String,
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("bind_addr", &self.bind_addr)
            .field("token_ttl", &self.token_ttl)
            .field("database_url", &self.database_url.as_ref().map(|_| "<set>"))
            .field("seed_on_start", &self.seed_on_start)
            .finish_non_exhaustive()
    }
}

impl ApiConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let jwt_secret = var("JWT_SECRET").unwrap_or_else(|| {
            warn!("JWT_SECRET not set; using insecure dev default");
            DEV_JWT_SECRET.to_string()
        });

        let bind_raw = var("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_raw
            .trim()
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::invalid("BIND_ADDR", e.to_string()))?;

        let ttl_minutes = match var("ACCESS_TOKEN_TTL_MINUTES") {
            None => DEFAULT_TOKEN_TTL_MINUTES,
            Some(raw) => {
                let minutes = raw
                    .trim()
                    .parse::<i64>()
                    .map_err(|e| ConfigError::invalid("ACCESS_TOKEN_TTL_MINUTES", e.to_string()))?;
                if minutes <= 0 {
                    return Err(ConfigError::invalid("ACCESS_TOKEN_TTL_MINUTES", "must be positive"));
                }
                minutes
            }
        };

        let seed_on_start = match var("SEED_ON_START") {
            None => false,
            Some(raw) => parse_bool(&raw).ok_or_else(|| ConfigError::invalid("SEED_ON_START", raw))?,
        };

        let seed_password = |name: &'static str| {
            var(name).unwrap_or_else(|| {
                if seed_on_start {
                    warn!(variable = name, "seed password not set; using dev default");
                }
                DEV_SEED_PASSWORD.to_string()
            })
        };
        let seed_admin_password = seed_password("SEED_ADMIN_PASSWORD");
        let seed_manager_password = seed_password("SEED_MANAGER_PASSWORD");

        Ok(Self {
            jwt_secret,
            bind_addr,
            token_ttl: chrono::Duration::minutes(ttl_minutes),
            database_url: var("DATABASE_URL"),
            seed_on_start,
            seed_admin_password,
            seed_manager_password,
        })
    }

    pub fn seed_config(&self) -> warden_infra::SeedConfig {
        warden_infra::SeedConfig {
            admin_password: self.seed_admin_password.clone(),
            manager_password: self.seed_manager_password.clone(),
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
