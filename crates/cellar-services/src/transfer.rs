//! Upload/delete orchestration.
//!
//! Uploads are a compensating-transaction pair: the metadata row is written
//! first (reserving the unique relative path), then the driver persists the
//! bytes. If the physical write fails, the row is deleted again so metadata
//! and bytes never diverge; if that compensating delete itself fails, the
//! request ends in `ConsistencyFault` and must be escalated, never swallowed.
//!
//! Deletes run in the reverse order: physical bytes first, then the metadata
//! row, mirroring the upload symmetry.

use cellar_core::CellarError;
use cellar_db::Manager;
use cellar_storage::{derive_rel_path, ByteStream, FileInfo, StorageError, UploadFile};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

const HASH_BUF_SIZE: usize = 64 * 1024;
const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Orchestrates the metadata-store write and the physical-driver write.
#[derive(Clone)]
pub struct TransferService {
    manager: Arc<Manager>,
}

impl TransferService {
    pub fn new(manager: Arc<Manager>) -> Self {
        TransferService { manager }
    }

    /// Upload a file into a bin and return its relative path, the durable
    /// handle for subsequent resolution.
    ///
    /// The stream must be seekable: it is hashed in full and rewound before
    /// the physical write. No side effect happens before the target bin
    /// resolves and the relative path derives.
    #[tracing::instrument(skip(self, data, declared_type), fields(bin_id, name))]
    pub async fn upload(
        &self,
        bin_id: i64,
        name: &str,
        declared_type: Option<&str>,
        size: i64,
        data: ByteStream,
    ) -> Result<String, CellarError> {
        self.upload_at(bin_id, name, declared_type, size, data, Utc::now())
            .await
    }

    async fn upload_at(
        &self,
        bin_id: i64,
        name: &str,
        declared_type: Option<&str>,
        size: i64,
        mut data: ByteStream,
        uploaded_at: DateTime<Utc>,
    ) -> Result<String, CellarError> {
        let bin = self.manager.get_bin(bin_id).await?;

        let hash = hash_stream(&mut data).await?;
        let content_type = resolve_content_type(declared_type, name);
        let rel_path = derive_rel_path(name, &hash, uploaded_at).map_err(CellarError::from)?;

        let info = FileInfo {
            name: name.to_string(),
            hash,
            content_type,
            size,
            rel_path: rel_path.clone(),
            uploaded_at,
            bin_id: bin.id(),
        };

        // The insert/store/compensate sequence runs on a detached task: if the
        // caller's future is dropped mid-flight (client disconnect), the
        // sequence still runs to completion, so no orphan row or partial
        // object survives a cancellation.
        let manager = self.manager.clone();
        let commit = tokio::spawn(async move {
            // Metadata first: the row reserves the unique path and makes the
            // file exist from a metadata standpoint.
            manager.insert_file(&info).await?;

            let mut file = UploadFile { data, info };
            match bin.upload(&mut file).await {
                Ok(()) => {
                    tracing::info!(rel_path = %rel_path, bin = %bin.name, "file uploaded");
                    Ok(rel_path)
                }
                Err(store_err) => {
                    tracing::warn!(
                        rel_path = %rel_path,
                        error = %store_err,
                        "physical store failed, compensating metadata write"
                    );
                    match manager.remove_file(&rel_path).await {
                        Ok(_) => Err(CellarError::from(store_err)),
                        Err(db_err) => {
                            tracing::error!(
                                rel_path = %rel_path,
                                store_error = %store_err,
                                db_error = %db_err,
                                "compensating delete failed; metadata and bytes have diverged"
                            );
                            Err(CellarError::ConsistencyFault {
                                rel_path,
                                source: anyhow::Error::new(db_err)
                                    .context(format!("physical store failed with: {store_err}")),
                            })
                        }
                    }
                }
            }
        });

        commit
            .await
            .map_err(|err| CellarError::Internal(format!("upload task failed: {err}")))?
    }

    /// Delete a file: physical bytes first, then the metadata row.
    ///
    /// Bytes already gone is acceptable: a dangling row (out-of-band removal,
    /// or a crashed earlier delete) must stay deletable, so `NotFound` from
    /// the driver still proceeds to the metadata removal. A missing metadata
    /// row afterwards means a concurrent delete won the race; logged only.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, rel_path: &str) -> Result<(), CellarError> {
        let record = self.manager.get_file(rel_path).await?;

        match record.bin.delete(&record.info.rel_path).await {
            Ok(()) => {}
            Err(StorageError::NotFound(_)) => {
                tracing::warn!(rel_path = %rel_path, "object already absent, removing metadata row");
            }
            Err(err) => return Err(err.into()),
        }

        let removed = self.manager.remove_file(rel_path).await?;
        if !removed {
            tracing::warn!(rel_path = %rel_path, "metadata row already gone during delete");
        }

        tracing::info!(rel_path = %rel_path, bin = %record.bin.name, "file deleted");
        Ok(())
    }
}

/// SHA-256 over the whole stream, hex-encoded, with the stream rewound to the
/// start afterwards.
async fn hash_stream(data: &mut ByteStream) -> Result<String, CellarError> {
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; HASH_BUF_SIZE];
    loop {
        let n = data
            .read(&mut buf)
            .await
            .map_err(|err| CellarError::Storage(format!("failed to hash upload: {err}")))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    data.rewind()
        .await
        .map_err(|err| CellarError::Storage(format!("failed to rewind upload: {err}")))?;

    Ok(hex::encode(hasher.finalize()))
}

/// Client-declared content type when present, otherwise a guess from the file
/// name, otherwise the octet-stream fallback. A declared octet-stream carries
/// no information (many clients send it as a part default), so the name guess
/// still applies there.
pub fn resolve_content_type(declared: Option<&str>, name: &str) -> String {
    if let Some(declared) = declared {
        if !declared.is_empty() && declared != FALLBACK_CONTENT_TYPE {
            return declared.to_string();
        }
    }
    mime_guess::from_path(name)
        .first_raw()
        .unwrap_or(FALLBACK_CONTENT_TYPE)
        .to_string()
}
