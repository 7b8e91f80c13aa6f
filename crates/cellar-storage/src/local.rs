//! Local filesystem driver.

use crate::file::UploadFile;
use crate::stats::{Stats, StatsSnapshot};
use crate::traits::{
    ByteStream, Driver, DriverIdentity, FileStatus, StorageError, StorageResult,
};
use async_trait::async_trait;
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tokio::fs;

/// Persisted discriminant for the local-disk driver.
pub const LOCAL_DRIVER_NAME: &str = "local";

/// Driver over a local directory tree.
///
/// The driver only performs destructive operations (delete, status) against
/// roots it has been explicitly told about via `adopt_root`; anything else is
/// refused with `UnknownRoot`.
pub struct LocalDriver {
    identity: DriverIdentity,
    known_roots: RwLock<HashSet<PathBuf>>,
    stats: Stats,
}

impl LocalDriver {
    pub fn new() -> Self {
        LocalDriver::named(LOCAL_DRIVER_NAME)
    }

    /// Local driver under a custom persisted name, for deployments where
    /// several driver rows are backed by the local implementation.
    pub fn named(name: impl Into<String>) -> Self {
        LocalDriver {
            identity: DriverIdentity::new(name),
            known_roots: RwLock::new(HashSet::new()),
            stats: Stats::new(),
        }
    }

    fn require_known_root(&self, base: &str) -> StorageResult<PathBuf> {
        let path = PathBuf::from(base);
        let known = self
            .known_roots
            .read()
            .expect("known-roots lock poisoned")
            .contains(&path);
        if known {
            Ok(path)
        } else {
            Err(StorageError::UnknownRoot(base.to_string()))
        }
    }
}

impl Default for LocalDriver {
    fn default() -> Self {
        LocalDriver::new()
    }
}

fn map_open_error(err: std::io::Error, id: &str) -> StorageError {
    match err.kind() {
        ErrorKind::NotFound => StorageError::NotFound(id.to_string()),
        ErrorKind::PermissionDenied => StorageError::Unreadable(id.to_string()),
        _ => StorageError::Io(err),
    }
}

#[async_trait]
impl Driver for LocalDriver {
    async fn fetch(&self, base: &str, id: &str) -> StorageResult<ByteStream> {
        let path = Path::new(base).join(id);
        match fs::File::open(&path).await {
            Ok(file) => {
                self.stats.record_downloaded();
                Ok(Box::new(file))
            }
            Err(err) => {
                self.stats.record_failed();
                tracing::warn!(id = %id, error = %err, "local driver failed to open object");
                Err(map_open_error(err, id))
            }
        }
    }

    async fn store(&self, base: &str, file: &mut UploadFile) -> StorageResult<()> {
        let path = Path::new(base).join(&file.info.rel_path);

        let mut dest = match fs::File::create(&path).await {
            Ok(f) => f,
            Err(err) => {
                self.stats.record_failed();
                tracing::warn!(rel_path = %file.info.rel_path, error = %err, "local driver failed to create object");
                return Err(StorageError::Io(err));
            }
        };

        let written = match tokio::io::copy(&mut file.data, &mut dest).await {
            Ok(n) => n as i64,
            Err(err) => {
                self.stats.record_failed();
                tracing::warn!(rel_path = %file.info.rel_path, error = %err, "local driver failed to write object");
                return Err(StorageError::Io(err));
            }
        };

        if written != file.info.size {
            self.stats.record_failed();
            tracing::warn!(
                rel_path = %file.info.rel_path,
                expected = file.info.size,
                written,
                "incorrect number of bytes written, removing partial object"
            );
            drop(dest);
            fs::remove_file(&path).await.map_err(|err| {
                tracing::error!(rel_path = %file.info.rel_path, error = %err, "failed cleanup after incomplete write");
                StorageError::Io(err)
            })?;
            return Err(StorageError::IncompleteWrite {
                rel_path: file.info.rel_path.clone(),
                expected: file.info.size,
                written,
            });
        }

        dest.sync_all().await.map_err(|err| {
            self.stats.record_failed();
            StorageError::Io(err)
        })?;

        self.stats.record_uploaded();
        tracing::debug!(
            rel_path = %file.info.rel_path,
            size_bytes = file.info.size,
            path = %path.display(),
            "local driver stored object"
        );
        Ok(())
    }

    async fn delete(&self, base: &str, id: &str) -> StorageResult<()> {
        let root = match self.require_known_root(base) {
            Ok(root) => root,
            Err(err) => {
                self.stats.record_failed();
                return Err(err);
            }
        };

        let path = root.join(id);
        match fs::remove_file(&path).await {
            Ok(()) => {
                self.stats.record_deleted();
                Ok(())
            }
            Err(err) => {
                self.stats.record_failed();
                Err(map_open_error(err, id))
            }
        }
    }

    async fn status(&self, base: &str, id: &str) -> StorageResult<FileStatus> {
        let root = self.require_known_root(base)?;

        let meta = match fs::metadata(root.join(id)).await {
            Ok(meta) => meta,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(FileStatus::Missing),
            Err(err) if err.kind() == ErrorKind::PermissionDenied => {
                return Ok(FileStatus::Unreadable)
            }
            Err(err) => return Err(StorageError::Io(err)),
        };

        if !meta.is_file() {
            return Ok(FileStatus::Unreadable);
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if meta.permissions().mode() & 0o444 == 0 {
                return Ok(FileStatus::Unreadable);
            }
        }

        Ok(FileStatus::Ok)
    }

    async fn adopt_root(&self, base: &str) -> StorageResult<()> {
        fs::create_dir_all(base).await?;
        self.known_roots
            .write()
            .expect("known-roots lock poisoned")
            .insert(PathBuf::from(base));
        tracing::debug!(root = %base, "local driver adopted root");
        Ok(())
    }

    fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    fn identity(&self) -> &DriverIdentity {
        &self.identity
    }
}
