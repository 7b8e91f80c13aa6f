//! Cellar metadata store
//!
//! sqlite-backed metadata persistence for drivers, bins, and files, plus the
//! `Manager`: the in-memory resolution cache that maps an external file
//! identifier to its owning bin and driver.

pub mod manager;
pub mod schema;

pub use manager::Manager;
pub use schema::{connect, init_schema};
