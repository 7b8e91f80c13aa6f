//! Application wiring: database, manager, bootstrap, router.

use crate::routes::build_router;
use crate::state::AppState;
use anyhow::{Context, Result};
use axum::Router;
use cellar_core::{CellarError, Config};
use cellar_db::{connect, init_schema, Manager};
use cellar_storage::{Bin, Driver, DriverRegistry, LocalDriver, LOCAL_DRIVER_NAME};
use std::sync::Arc;

/// Connect to the metadata store, run the schema, bootstrap the default
/// driver and bin, and assemble the shared state and router.
pub async fn initialize_app(config: Config) -> Result<(AppState, Router)> {
    let pool = connect(&config.database_url)
        .await
        .context("failed to open metadata store")?;
    init_schema(&pool).await.context("failed to run schema")?;

    let manager = Arc::new(Manager::new(pool, DriverRegistry::default()));
    bootstrap(&manager, &config).await?;

    let state = AppState::new(config, manager);
    let router = build_router(state.clone());
    Ok((state, router))
}

/// Ensure the local driver and the default serving bin exist, registering
/// them on first run. On later runs the bin's root is re-adopted so the
/// directory survives being removed out-of-band.
async fn bootstrap(manager: &Manager, config: &Config) -> Result<()> {
    let driver: Arc<dyn Driver> = match manager.get_driver(LOCAL_DRIVER_NAME).await {
        Ok(driver) => driver,
        Err(CellarError::NotFound(_)) => {
            let driver: Arc<dyn Driver> = Arc::new(LocalDriver::new());
            manager.register_driver(driver.clone()).await?;
            driver
        }
        Err(err) => return Err(err).context("failed to load local driver"),
    };

    match manager.find_bin_id(&config.default_bin_name).await? {
        Some(id) => {
            let bin = manager.get_bin(id).await?;
            if !bin.redirect {
                driver
                    .adopt_root(&bin.internal_root)
                    .await
                    .map_err(CellarError::from)
                    .context("failed to adopt storage root")?;
            }
            tracing::info!(bin = %bin.name, id, "default bin loaded");
        }
        None => {
            let bin = Bin::new(
                &config.default_bin_name,
                &config.default_bin_prefix,
                &config.storage_root,
                false,
                driver.clone(),
            );
            let bin = manager.register_bin(bin, driver.identity().id()).await?;
            tracing::info!(bin = %bin.name, id = bin.id(), "default bin created");
        }
    }

    Ok(())
}
