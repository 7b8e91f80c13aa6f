//! Configuration module
//!
//! Environment-driven configuration for the gateway process. Values come from
//! the environment (with `.env` support via dotenvy in the binary) and fall
//! back to development defaults.

use std::env;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_MAX_UPLOAD_MB: usize = 10;

/// Gateway process configuration.
#[derive(Clone, Debug)]
pub struct Config {
    /// Port the HTTP server listens on.
    pub server_port: u16,
    /// sqlite connection string, e.g. `sqlite://cellar.db`.
    pub database_url: String,
    /// Root directory adopted by the local driver for the default bin.
    pub storage_root: String,
    /// Name of the bin registered at first startup.
    pub default_bin_name: String,
    /// External prefix of the default bin.
    pub default_bin_prefix: String,
    /// Upper bound for multipart upload bodies, in bytes.
    pub max_upload_bytes: usize,
    pub environment: String,
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        let server_port = env::var("PORT")
            .unwrap_or_else(|_| DEFAULT_PORT.to_string())
            .parse()?;
        let max_upload_mb: usize = env::var("MAX_UPLOAD_SIZE_MB")
            .unwrap_or_else(|_| DEFAULT_MAX_UPLOAD_MB.to_string())
            .parse()?;

        Ok(Config {
            server_port,
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://cellar.db?mode=rwc".to_string()),
            storage_root: env::var("STORAGE_ROOT").unwrap_or_else(|_| "./data/files".to_string()),
            default_bin_name: env::var("DEFAULT_BIN_NAME")
                .unwrap_or_else(|_| "local".to_string()),
            default_bin_prefix: env::var("DEFAULT_BIN_PREFIX")
                .unwrap_or_else(|_| "files".to_string()),
            max_upload_bytes: max_upload_mb * 1024 * 1024,
            environment: env::var("ENVIRONMENT")
                .or_else(|_| env::var("APP_ENV"))
                .unwrap_or_else(|_| "development".to_string()),
        })
    }
}
