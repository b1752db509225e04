//! HTTP API: configuration, routing, middleware and request/response mapping.

pub mod app;
pub mod authz;
pub mod config;
pub mod context;
pub mod middleware;

pub use app::{API_PREFIX, AppServices, build_app};
pub use config::{ApiConfig, ConfigError};
