//! Cellar storage library
//!
//! Storage abstraction for the gateway: the `Driver` trait all physical
//! backends implement, the local-disk driver, bins (named storage locations
//! bound to one driver and one physical root), per-layer usage counters, and
//! the content-derived relative-path scheme.
//!
//! # Relative paths
//!
//! A file's relative path is its sole external identifier: a URL-safe,
//! unpadded base64 encoding of a SHA-256 digest over
//! `(name, content hash, upload time)`. Derivation is centralized in the
//! `path` module so every caller produces identical identifiers.

pub mod bin;
pub mod factory;
pub mod file;
pub mod local;
pub mod path;
pub mod stats;
pub mod traits;

pub use bin::{Bin, GetOutcome};
pub use factory::DriverRegistry;
pub use file::{FileInfo, FileRecord, UploadFile};
pub use local::{LocalDriver, LOCAL_DRIVER_NAME};
pub use path::derive_rel_path;
pub use stats::{Stats, StatsFloats, StatsSnapshot, StatsSummary};
pub use traits::{
    ByteStream, Driver, DriverIdentity, FileStatus, SeekableRead, StorageError, StorageResult,
    UNREGISTERED_ID,
};
