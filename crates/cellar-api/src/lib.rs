//! Cellar HTTP gateway
//!
//! Thin axum surface over the resolution cache and the transfer service:
//! request parsing, multipart decoding, error-to-status mapping, and server
//! lifecycle. Business logic lives in the lower crates.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod server;
pub mod setup;
pub mod state;
pub mod telemetry;
