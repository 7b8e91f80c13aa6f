//! File metadata and upload handle types.

use crate::bin::Bin;
use crate::traits::ByteStream;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;

/// Metadata describing a stored file, as persisted in the metadata store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// Display name of the source.
    pub name: String,
    /// Hash of the file content.
    pub hash: String,
    /// Mime type of the file content.
    pub content_type: String,
    /// Size of the file in bytes.
    pub size: i64,
    /// Path of the file relative to its bin's base location; the sole
    /// external identifier used to resolve the file.
    pub rel_path: String,
    /// Date-time of file upload.
    pub uploaded_at: DateTime<Utc>,
    /// Id of the bin storing this file.
    pub bin_id: i64,
}

impl fmt::Display for FileInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} uploaded at {} size of {} in bin {} with hash of {}",
            self.name, self.rel_path, self.uploaded_at, self.size, self.bin_id, self.hash
        )
    }
}

/// A file being uploaded: a seekable reader over the content plus its
/// metadata. The reader must be positioned at the start when handed to a
/// driver's `store`.
pub struct UploadFile {
    pub data: ByteStream,
    pub info: FileInfo,
}

impl fmt::Debug for UploadFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadFile")
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

/// A metadata row materialized in memory together with its owning bin.
///
/// Records are owned by the metadata store; this is a transient view and is
/// read-only apart from deletion through the orchestrator.
#[derive(Debug, Clone)]
pub struct FileRecord {
    pub info: FileInfo,
    pub bin: Arc<Bin>,
}
