//! Cellar core library
//!
//! Shared foundation for the cellar workspace: the unified error taxonomy
//! (`CellarError`) and process configuration loaded from the environment.

pub mod config;
pub mod error;

pub use config::Config;
pub use error::CellarError;
