//! HTTP handlers: thin request parsing and response shaping over the core.

mod admin;
mod download;
mod upload;

pub use admin::{ping, stats};
pub use download::{delete, download};
pub use upload::{file_type, upload};
