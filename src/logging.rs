//! Logging setup

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing. RUST_LOG overrides the defaults.
pub fn init(verbose: bool) {
    let filter = if verbose {
        "faro=debug,info"
    } else {
        "faro=info,warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}
