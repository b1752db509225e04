//! Tracing/logging initialization.
//!
//! JSON lines on stdout, filtered through `RUST_LOG`.

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is not set.
pub const DEFAULT_DIRECTIVE: &str = "info,sqlx=warn";

pub fn init() {
    init_with_default(DEFAULT_DIRECTIVE);
}

pub fn init_with_default(directive: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .try_init();
}
