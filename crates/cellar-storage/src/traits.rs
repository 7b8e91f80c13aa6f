//! Storage abstraction trait
//!
//! This module defines the `Driver` trait that all storage backends must
//! implement, the storage-layer error type, and the shared identity struct
//! attached to every driver variant.

use crate::file::UploadFile;
use crate::stats::StatsSnapshot;
use async_trait::async_trait;
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncSeek};

/// Driver and bin ids before the metadata store has assigned one.
pub const UNREGISTERED_ID: i64 = -1;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("object unreadable: {0}")]
    Unreadable(String),

    /// The number of bytes persisted did not match the declared size. The
    /// partially written object has already been removed.
    #[error("incomplete write for `{rel_path}`: wrote {written} of {expected} bytes")]
    IncompleteWrite {
        rel_path: String,
        expected: i64,
        written: i64,
    },

    /// A destructive operation was attempted against a root this driver was
    /// never told about.
    #[error("unknown storage root: {0}")]
    UnknownRoot(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A redirect bin could not compose a target URL from its root.
    #[error("malformed redirect target for `{0}`")]
    InvalidRedirect(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for cellar_core::CellarError {
    fn from(err: StorageError) -> Self {
        use cellar_core::CellarError;
        match err {
            StorageError::NotFound(id) => CellarError::NotFound(id),
            StorageError::InvalidInput(msg) => CellarError::InvalidInput(msg),
            other => CellarError::Storage(other.to_string()),
        }
    }
}

/// Seekable async reader, the shape of data handed across the driver boundary.
///
/// Uploads hash the stream and rewind it before the physical write, so plain
/// `AsyncRead` is not enough.
pub trait SeekableRead: AsyncRead + AsyncSeek + Send + Unpin {}

impl<T: AsyncRead + AsyncSeek + Send + Unpin> SeekableRead for T {}

/// Boxed seekable byte stream returned by `fetch` and consumed by `store`.
pub type ByteStream = Box<dyn SeekableRead>;

/// Outcome of a non-throwing status probe against a stored object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    Ok,
    Missing,
    Unreadable,
    Unknown,
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FileStatus::Ok => "file ok",
            FileStatus::Missing => "file missing",
            FileStatus::Unreadable => "file unreadable",
            FileStatus::Unknown => "file unknown error",
        };
        f.write_str(s)
    }
}

/// Store-assigned identity held by composition inside each driver variant.
///
/// The id is `UNREGISTERED_ID` until the resolution layer registers the driver
/// with the metadata store; once assigned it never changes.
#[derive(Debug)]
pub struct DriverIdentity {
    name: String,
    id: AtomicI64,
}

impl DriverIdentity {
    pub fn new(name: impl Into<String>) -> Self {
        DriverIdentity {
            name: name.into(),
            id: AtomicI64::new(UNREGISTERED_ID),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> i64 {
        self.id.load(Ordering::Acquire)
    }

    /// Attach the store-assigned id after registration.
    pub fn set_id(&self, id: i64) {
        self.id.store(id, Ordering::Release);
    }

    pub fn is_registered(&self) -> bool {
        self.id() != UNREGISTERED_ID
    }
}

impl fmt::Display for DriverIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.name, self.id())
    }
}

/// Capability set every storage backend must provide.
///
/// Drivers may be shared across many bins; every method takes the physical
/// base location explicitly rather than carrying per-bin state. Counters are
/// tracked by the driver itself, independently of the bins delegating to it.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Open a seekable byte stream over `base/id`, positioned at the start.
    ///
    /// Fails with `NotFound` if no object exists there and `Unreadable` on
    /// permission errors.
    async fn fetch(&self, base: &str, id: &str) -> StorageResult<ByteStream>;

    /// Persist exactly `file.info.size` bytes from `file.data` to
    /// `base/{rel_path}`. A byte-count mismatch removes the partial object and
    /// fails with `IncompleteWrite`; a truncated object is never left behind.
    async fn store(&self, base: &str, file: &mut UploadFile) -> StorageResult<()>;

    /// Remove the object at `base/id`. Fails with `NotFound` if absent; the
    /// caller decides whether that is acceptable.
    async fn delete(&self, base: &str, id: &str) -> StorageResult<()>;

    /// Probe `base/id` without failing for the expected missing case; only
    /// infrastructure failures surface as an error.
    async fn status(&self, base: &str, id: &str) -> StorageResult<FileStatus>;

    /// Tell the driver about a physical root so destructive operations accept
    /// it. Guards delete/status against roots supplied through stale or
    /// attacker-influenced bin metadata.
    async fn adopt_root(&self, base: &str) -> StorageResult<()>;

    /// Usage counters accumulated by this driver.
    fn stats(&self) -> StatsSnapshot;

    fn identity(&self) -> &DriverIdentity;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_starts_unregistered() {
        let identity = DriverIdentity::new("local");
        assert_eq!(identity.id(), UNREGISTERED_ID);
        assert!(!identity.is_registered());

        identity.set_id(7);
        assert_eq!(identity.id(), 7);
        assert!(identity.is_registered());
        assert_eq!(identity.to_string(), "local#7");
    }

    #[test]
    fn file_status_display() {
        assert_eq!(FileStatus::Missing.to_string(), "file missing");
        assert_eq!(FileStatus::Ok.to_string(), "file ok");
    }
}
