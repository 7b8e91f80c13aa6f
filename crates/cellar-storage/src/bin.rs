//! Bins: named storage locations.
//!
//! A bin binds an external-facing prefix and an internal physical root to
//! exactly one driver, plus a redirect-vs-serve policy and its own usage
//! counters. Redirect bins never perform physical I/O; they only compose a
//! redirection target from the internal root and the file identifier.

use crate::stats::{Stats, StatsSnapshot};
use crate::traits::{ByteStream, Driver, StorageError, StorageResult, UNREGISTERED_ID};
use crate::UploadFile;
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// What a bin answers a get request with.
pub enum GetOutcome {
    /// A byte stream served through the bin's driver.
    Stream(ByteStream),
    /// A URL the client should be redirected to.
    Redirect(String),
}

impl fmt::Debug for GetOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GetOutcome::Stream(_) => f.write_str("GetOutcome::Stream(..)"),
            GetOutcome::Redirect(url) => write!(f, "GetOutcome::Redirect({url})"),
        }
    }
}

/// A named storage endpoint bound to one driver and one physical root.
pub struct Bin {
    id: AtomicI64,
    pub name: String,
    /// External-facing prefix the gateway advertises for this bin.
    pub external_prefix: String,
    /// Physical root (directory or URL base) the driver operates under.
    pub internal_root: String,
    /// Redirect bins answer gets with a URL instead of streaming bytes.
    pub redirect: bool,
    driver: Arc<dyn Driver>,
    stats: Stats,
}

impl Bin {
    pub fn new(
        name: impl Into<String>,
        external_prefix: impl Into<String>,
        internal_root: impl Into<String>,
        redirect: bool,
        driver: Arc<dyn Driver>,
    ) -> Self {
        Bin {
            id: AtomicI64::new(UNREGISTERED_ID),
            name: name.into(),
            external_prefix: external_prefix.into(),
            internal_root: internal_root.into(),
            redirect,
            driver,
            stats: Stats::new(),
        }
    }

    pub fn id(&self) -> i64 {
        self.id.load(Ordering::Acquire)
    }

    /// Attach the store-assigned id after registration.
    pub fn set_id(&self, id: i64) {
        self.id.store(id, Ordering::Release);
    }

    pub fn driver(&self) -> &Arc<dyn Driver> {
        &self.driver
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    fn redirect_target(&self, id: &str) -> StorageResult<String> {
        let root = self.internal_root.trim_end_matches('/');
        if root.is_empty() {
            return Err(StorageError::InvalidRedirect(self.name.clone()));
        }
        Ok(format!("{root}/{id}"))
    }

    /// Answer a get request: a redirect URL for redirect bins, a byte stream
    /// through the driver otherwise. Updates this bin's own counters; the
    /// driver tracks its own independently.
    pub async fn resolve_get(&self, id: &str) -> StorageResult<GetOutcome> {
        if self.redirect {
            return match self.redirect_target(id) {
                Ok(url) => {
                    self.stats.record_redirected();
                    Ok(GetOutcome::Redirect(url))
                }
                Err(err) => {
                    self.stats.record_failed();
                    Err(err)
                }
            };
        }

        match self.driver.fetch(&self.internal_root, id).await {
            Ok(stream) => {
                self.stats.record_downloaded();
                Ok(GetOutcome::Stream(stream))
            }
            Err(err) => {
                self.stats.record_failed();
                Err(err)
            }
        }
    }

    /// Persist an upload through the bin's driver.
    pub async fn upload(&self, file: &mut UploadFile) -> StorageResult<()> {
        match self.driver.store(&self.internal_root, file).await {
            Ok(()) => {
                self.stats.record_uploaded();
                Ok(())
            }
            Err(err) => {
                self.stats.record_failed();
                Err(err)
            }
        }
    }

    /// Remove an object through the bin's driver.
    pub async fn delete(&self, id: &str) -> StorageResult<()> {
        match self.driver.delete(&self.internal_root, id).await {
            Ok(()) => {
                self.stats.record_deleted();
                Ok(())
            }
            Err(err) => {
                self.stats.record_failed();
                Err(err)
            }
        }
    }

    /// Probe an object's status through the bin's driver.
    pub async fn file_status(&self, id: &str) -> StorageResult<crate::FileStatus> {
        self.driver.status(&self.internal_root, id).await
    }
}

impl fmt::Debug for Bin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bin")
            .field("id", &self.id())
            .field("name", &self.name)
            .field("external_prefix", &self.external_prefix)
            .field("internal_root", &self.internal_root)
            .field("redirect", &self.redirect)
            .field("driver", &self.driver.identity().to_string())
            .finish()
    }
}

impl fmt::Display for Bin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "bin {} [{}]:{}",
            self.name,
            self.driver.identity(),
            self.internal_root
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::LocalDriver;

    fn nas_bin() -> Bin {
        let driver: Arc<dyn Driver> = Arc::new(LocalDriver::new());
        let bin = Bin::new(
            "home NAS",
            "homelab/nas",
            "https://myhomenas.local",
            true,
            driver,
        );
        bin.set_id(3);
        bin
    }

    #[tokio::test]
    async fn redirect_bin_composes_url_without_touching_driver() {
        let bin = nas_bin();

        let outcome = bin.resolve_get("I_Saw_The_TV_Glow_2024.mp4").await.unwrap();
        match outcome {
            GetOutcome::Redirect(url) => {
                assert_eq!(url, "https://myhomenas.local/I_Saw_The_TV_Glow_2024.mp4");
            }
            GetOutcome::Stream(_) => panic!("redirect bin must not open a stream"),
        }

        assert_eq!(bin.stats().redirected, 1);
        assert_eq!(bin.stats().downloaded, 0);
        // The driver never saw the request.
        assert_eq!(bin.driver().stats(), crate::StatsSnapshot::default());
    }

    #[tokio::test]
    async fn redirect_bin_normalizes_trailing_slash() {
        let driver: Arc<dyn Driver> = Arc::new(LocalDriver::new());
        let bin = Bin::new("nas", "nas", "https://myhomenas.local/", true, driver);

        match bin.resolve_get("a.mp4").await.unwrap() {
            GetOutcome::Redirect(url) => assert_eq!(url, "https://myhomenas.local/a.mp4"),
            GetOutcome::Stream(_) => panic!("expected redirect"),
        }
    }

    #[tokio::test]
    async fn malformed_redirect_root_is_an_error_not_an_empty_url() {
        let driver: Arc<dyn Driver> = Arc::new(LocalDriver::new());
        let bin = Bin::new("broken", "broken", "", true, driver);

        let err = bin.resolve_get("a.mp4").await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidRedirect(_)));
        assert_eq!(bin.stats().failed, 1);
    }
}
