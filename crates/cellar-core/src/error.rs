//! Error types module
//!
//! All gateway-level errors are unified under the `CellarError` enum. Layers
//! below (the storage drivers) have their own error type which is converted at
//! the crate boundary; infrastructure errors from sqlx pass through unchanged
//! inside the `Database` variant.

use sqlx::Error as SqlxError;

#[derive(Debug, thiserror::Error)]
pub enum CellarError {
    #[error("database error: {0}")]
    Database(#[source] SqlxError),

    /// No metadata row matches the given identifier.
    #[error("not found: {0}")]
    NotFound(String),

    /// A persisted driver name has no registered constructor.
    #[error("unknown driver: {0}")]
    UnknownDriver(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Unique-path collision at the metadata store.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Storage-layer failure that does not change metadata consistency.
    #[error("storage error: {0}")]
    Storage(String),

    /// Compensation failed after a partial upload: the metadata row and the
    /// physical bytes have diverged. Fatal to the request; must be surfaced
    /// loudly, never swallowed.
    #[error("consistency fault for `{rel_path}`: metadata and bytes have diverged")]
    ConsistencyFault {
        rel_path: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<SqlxError> for CellarError {
    fn from(err: SqlxError) -> Self {
        match &err {
            SqlxError::RowNotFound => CellarError::NotFound("no matching row".to_string()),
            SqlxError::Database(db) if db.is_unique_violation() => {
                CellarError::Conflict(db.to_string())
            }
            _ => CellarError::Database(err),
        }
    }
}

impl CellarError {
    /// Whether this error indicates the (metadata, bytes) invariant has been
    /// violated and the request must be treated as fatal.
    pub fn is_consistency_fault(&self) -> bool {
        matches!(self, CellarError::ConsistencyFault { .. })
    }
}
