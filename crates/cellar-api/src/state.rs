//! Application state shared across handlers.

use cellar_core::Config;
use cellar_db::Manager;
use cellar_services::TransferService;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub manager: Arc<Manager>,
    pub transfer: TransferService,
}

impl AppState {
    pub fn new(config: Config, manager: Arc<Manager>) -> Self {
        AppState {
            config: Arc::new(config),
            transfer: TransferService::new(manager.clone()),
            manager,
        }
    }
}
