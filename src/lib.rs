//! Year-by-year net worth projection with a progressive US tax model, and
//! the CLI/HTTP surface that drives it.

pub mod api;
pub mod core;

use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Installs the global fmt subscriber, filtered by `RUST_LOG`.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{EnvFilter, fmt};

        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("fire_projection=info"));

        fmt().with_env_filter(filter).init();
    });
}
