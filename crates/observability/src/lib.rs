//! Process-wide tracing setup shared by the server and the seed binary.

/// Initialize process-wide observability (tracing/logging).
///
/// Safe to call more than once; later calls are no-ops.
pub fn init() {
    tracing::init();
}

/// Same as [`init`] but with a fallback filter used when `RUST_LOG` is unset.
pub fn init_with_default(directive: &str) {
    tracing::init_with_default(directive);
}

/// Subscriber configuration (filters, formatting).
pub mod tracing;
