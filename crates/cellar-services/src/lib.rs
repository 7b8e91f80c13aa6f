//! Cellar services layer
//!
//! Business orchestration over the resolution cache and the storage drivers.
//! The transfer service owns the one multi-step, partial-failure-sensitive
//! sequence in the gateway: the metadata-write/physical-write pair for uploads
//! and its compensating rollback.

pub mod transfer;

pub use transfer::{resolve_content_type, TransferService};
