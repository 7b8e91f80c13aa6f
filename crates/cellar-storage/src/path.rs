//! Content-derived relative-path derivation.
//!
//! The relative path is the sole external identifier for a file. It must be
//! deterministic (identical inputs always produce the identical path, which is
//! what makes retries idempotent at the metadata layer) and collision-resistant
//! (a collision surfaces as a uniqueness violation in the store, not here).

use crate::traits::{StorageError, StorageResult};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

/// Derive the relative path for a file from its display name, content hash,
/// and upload time.
///
/// SHA-256 over the concatenation of the three fields (upload time as unix
/// seconds), encoded with the URL-safe base64 alphabet without padding.
/// Fails with `InvalidInput` if `name` or `content_hash` is empty.
pub fn derive_rel_path(
    name: &str,
    content_hash: &str,
    uploaded_at: DateTime<Utc>,
) -> StorageResult<String> {
    if name.is_empty() || content_hash.is_empty() {
        return Err(StorageError::InvalidInput(
            "missing file name or content hash".to_string(),
        ));
    }

    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    hasher.update(content_hash.as_bytes());
    hasher.update(uploaded_at.timestamp().to_string().as_bytes());

    Ok(URL_SAFE_NO_PAD.encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn derivation_is_deterministic() {
        let a = derive_rel_path("oldvid.mp4", "af8182a2", at(1000209017)).unwrap();
        let b = derive_rel_path("oldvid.mp4", "af8182a2", at(1000209017)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn any_field_changes_the_path() {
        let base = derive_rel_path("a.txt", "deadbeef", at(100)).unwrap();
        assert_ne!(base, derive_rel_path("b.txt", "deadbeef", at(100)).unwrap());
        assert_ne!(base, derive_rel_path("a.txt", "deadbeet", at(100)).unwrap());
        assert_ne!(base, derive_rel_path("a.txt", "deadbeef", at(101)).unwrap());
    }

    #[test]
    fn empty_inputs_are_rejected() {
        assert!(matches!(
            derive_rel_path("", "deadbeef", at(100)),
            Err(StorageError::InvalidInput(_))
        ));
        assert!(matches!(
            derive_rel_path("a.txt", "", at(100)),
            Err(StorageError::InvalidInput(_))
        ));
    }

    #[test]
    fn output_is_url_safe_and_unpadded() {
        let path = derive_rel_path("a.txt", "deadbeef", at(100)).unwrap();
        // 256-bit digest, base64 without padding.
        assert_eq!(path.len(), 43);
        assert!(!path.contains('='));
        assert!(!path.contains('+'));
        assert!(!path.contains('/'));
    }
}
