//! Tracing subscriber initialization.

use cellar_core::Config;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber: env-filtered fmt output, JSON in
/// production.
pub fn init(config: &Config) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if config.environment == "production" {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
