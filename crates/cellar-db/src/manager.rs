//! Resolution cache.
//!
//! The `Manager` owns the process-lifetime cache of bins (by store-assigned
//! id) and drivers (by persisted name), backed by the metadata store. Both
//! maps are populated lazily on miss and never proactively invalidated;
//! `refresh_bins` rebuilds the bin cache after out-of-band metadata changes.
//!
//! Cache maps are mutated by whichever request task hits a miss, so they sit
//! behind `RwLock`s. Guards are never held across an await.

use cellar_core::CellarError;
use cellar_storage::{Bin, Driver, DriverRegistry, FileInfo, FileRecord};
use chrono::DateTime;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

#[derive(Debug, sqlx::FromRow)]
struct FileRow {
    #[sqlx(rename = "binID")]
    bin_id: i64,
    name: String,
    hash: String,
    #[sqlx(rename = "contentType")]
    content_type: String,
    size: i64,
    #[sqlx(rename = "uploadTimestamp")]
    upload_timestamp: i64,
}

impl FileRow {
    fn into_info(self, rel_path: &str) -> Result<FileInfo, CellarError> {
        let uploaded_at = DateTime::from_timestamp(self.upload_timestamp, 0).ok_or_else(|| {
            CellarError::Internal(format!(
                "invalid upload timestamp {} for `{rel_path}`",
                self.upload_timestamp
            ))
        })?;
        Ok(FileInfo {
            name: self.name,
            hash: self.hash,
            content_type: self.content_type,
            size: self.size,
            rel_path: rel_path.to_string(),
            uploaded_at,
            bin_id: self.bin_id,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct BinRow {
    id: i64,
    name: String,
    #[sqlx(rename = "externalURL")]
    external_url: String,
    #[sqlx(rename = "internalURL")]
    internal_url: String,
    redirect: bool,
    #[sqlx(rename = "driverName")]
    driver_name: String,
}

/// Resolution cache over the metadata store.
pub struct Manager {
    pool: SqlitePool,
    registry: DriverRegistry,
    bins: RwLock<HashMap<i64, Arc<Bin>>>,
    drivers: RwLock<HashMap<String, Arc<dyn Driver>>>,
}

impl Manager {
    pub fn new(pool: SqlitePool, registry: DriverRegistry) -> Self {
        Manager {
            pool,
            registry,
            bins: RwLock::new(HashMap::new()),
            drivers: RwLock::new(HashMap::new()),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Resolve a relative path straight to its absolute location,
    /// `internalURL + "/" + relPath`, in a single join query. Performs no
    /// cache mutation.
    #[tracing::instrument(skip(self))]
    pub async fn resolve_url(&self, rel_path: &str) -> Result<String, CellarError> {
        let row: Option<(String,)> = sqlx::query_as(
            r#"
            SELECT bins.internalURL || '/' || files.relPath
            FROM files
            INNER JOIN bins ON files.binID = bins.id
            WHERE files.relPath = ?
            "#,
        )
        .bind(rel_path)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|(url,)| url)
            .ok_or_else(|| CellarError::NotFound(rel_path.to_string()))
    }

    /// Look up a file record by relative path, materializing its owning bin
    /// (and that bin's driver) into the cache if not already present.
    #[tracing::instrument(skip(self))]
    pub async fn get_file(&self, rel_path: &str) -> Result<FileRecord, CellarError> {
        let row: Option<FileRow> = sqlx::query_as(
            r#"
            SELECT binID, name, hash, contentType, size, uploadTimestamp
            FROM files
            WHERE relPath = ?
            "#,
        )
        .bind(rel_path)
        .fetch_optional(&self.pool)
        .await?;

        let row = row.ok_or_else(|| CellarError::NotFound(rel_path.to_string()))?;
        let bin = self.get_bin(row.bin_id).await?;
        let info = row.into_info(rel_path)?;

        Ok(FileRecord { info, bin })
    }

    /// Cache-or-load a bin by its store-assigned id. Cached bins are
    /// reference-stable: resolving the same id twice yields the same `Arc`.
    #[tracing::instrument(skip(self))]
    pub async fn get_bin(&self, id: i64) -> Result<Arc<Bin>, CellarError> {
        if let Some(bin) = self.bins.read().expect("bin cache poisoned").get(&id) {
            return Ok(bin.clone());
        }

        let row: Option<BinRow> = sqlx::query_as(
            r#"
            SELECT bins.id, bins.name, bins.externalURL, bins.internalURL, bins.redirect,
                   drivers.name AS driverName
            FROM bins
            INNER JOIN drivers ON bins.driverID = drivers.id
            WHERE bins.id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let row = row.ok_or_else(|| CellarError::NotFound(format!("bin {id}")))?;
        let driver = self.get_driver(&row.driver_name).await?;

        let bin = Arc::new(Bin::new(
            row.name,
            row.external_url,
            row.internal_url,
            row.redirect,
            driver,
        ));
        bin.set_id(id);

        let mut bins = self.bins.write().expect("bin cache poisoned");
        Ok(bins.entry(id).or_insert(bin).clone())
    }

    /// Cache-or-load a driver by its persisted name. The concrete variant
    /// comes from the registry; an unrecognized name is `UnknownDriver`.
    #[tracing::instrument(skip(self))]
    pub async fn get_driver(&self, name: &str) -> Result<Arc<dyn Driver>, CellarError> {
        if let Some(driver) = self
            .drivers
            .read()
            .expect("driver cache poisoned")
            .get(name)
        {
            return Ok(driver.clone());
        }

        let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM drivers WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        let (id,) = row.ok_or_else(|| CellarError::NotFound(format!("driver `{name}`")))?;

        let driver = self
            .registry
            .build(name)
            .ok_or_else(|| CellarError::UnknownDriver(name.to_string()))?;
        driver.identity().set_id(id);

        let mut drivers = self.drivers.write().expect("driver cache poisoned");
        Ok(drivers.entry(name.to_string()).or_insert(driver).clone())
    }

    /// Insert a driver into the metadata store, attach the assigned id, and
    /// cache it.
    #[tracing::instrument(skip(self, driver), fields(driver = %driver.identity()))]
    pub async fn register_driver(&self, driver: Arc<dyn Driver>) -> Result<i64, CellarError> {
        let name = driver.identity().name().to_string();
        let result = sqlx::query("INSERT INTO drivers (name) VALUES (?)")
            .bind(&name)
            .execute(&self.pool)
            .await?;

        let id = result.last_insert_rowid();
        driver.identity().set_id(id);
        self.drivers
            .write()
            .expect("driver cache poisoned")
            .insert(name.clone(), driver);

        tracing::info!(driver = %name, id, "registered driver");
        Ok(id)
    }

    /// Insert a bin into the metadata store, attach the assigned id, adopt its
    /// root on the driver (serving bins only), and cache it.
    #[tracing::instrument(skip(self, bin), fields(bin = %bin.name))]
    pub async fn register_bin(&self, bin: Bin, driver_id: i64) -> Result<Arc<Bin>, CellarError> {
        let result = sqlx::query(
            r#"
            INSERT INTO bins (driverID, name, externalURL, internalURL, redirect)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(driver_id)
        .bind(&bin.name)
        .bind(&bin.external_prefix)
        .bind(&bin.internal_root)
        .bind(bin.redirect)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        bin.set_id(id);

        if !bin.redirect {
            bin.driver()
                .adopt_root(&bin.internal_root)
                .await
                .map_err(CellarError::from)?;
        }

        let bin = Arc::new(bin);
        self.bins
            .write()
            .expect("bin cache poisoned")
            .insert(id, bin.clone());

        tracing::info!(bin = %bin.name, id, "registered bin");
        Ok(bin)
    }

    /// Look up a bin's store-assigned id by its unique name, without touching
    /// the cache. Used at bootstrap to decide between load and register.
    pub async fn find_bin_id(&self, name: &str) -> Result<Option<i64>, CellarError> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM bins WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(id,)| id))
    }

    /// Rebuild the bin cache entirely from the metadata store. For explicit
    /// use after out-of-band metadata changes; drops the previous bin
    /// instances (and their in-memory counters).
    #[tracing::instrument(skip(self))]
    pub async fn refresh_bins(&self) -> Result<(), CellarError> {
        let rows: Vec<BinRow> = sqlx::query_as(
            r#"
            SELECT bins.id, bins.name, bins.externalURL, bins.internalURL, bins.redirect,
                   drivers.name AS driverName
            FROM bins
            INNER JOIN drivers ON bins.driverID = drivers.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut fresh = HashMap::with_capacity(rows.len());
        for row in rows {
            let driver = self.get_driver(&row.driver_name).await?;
            let bin = Arc::new(Bin::new(
                row.name,
                row.external_url,
                row.internal_url,
                row.redirect,
                driver,
            ));
            bin.set_id(row.id);
            fresh.insert(row.id, bin);
        }

        let count = fresh.len();
        *self.bins.write().expect("bin cache poisoned") = fresh;
        tracing::info!(bins = count, "rebuilt bin cache");
        Ok(())
    }

    /// Write a file's metadata row, reserving its unique relative path. A
    /// duplicate path surfaces as `Conflict`.
    #[tracing::instrument(skip(self, info), fields(rel_path = %info.rel_path))]
    pub async fn insert_file(&self, info: &FileInfo) -> Result<(), CellarError> {
        sqlx::query(
            r#"
            INSERT INTO files (binID, name, hash, contentType, size, relPath, uploadTimestamp)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(info.bin_id)
        .bind(&info.name)
        .bind(&info.hash)
        .bind(&info.content_type)
        .bind(info.size)
        .bind(&info.rel_path)
        .bind(info.uploaded_at.timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Remove a file's metadata row. Returns whether a row was removed.
    #[tracing::instrument(skip(self))]
    pub async fn remove_file(&self, rel_path: &str) -> Result<bool, CellarError> {
        let result = sqlx::query("DELETE FROM files WHERE relPath = ?")
            .bind(rel_path)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Bins currently materialized in the cache.
    pub fn cached_bins(&self) -> Vec<Arc<Bin>> {
        self.bins
            .read()
            .expect("bin cache poisoned")
            .values()
            .cloned()
            .collect()
    }

    /// Drivers currently materialized in the cache.
    pub fn cached_drivers(&self) -> Vec<Arc<dyn Driver>> {
        self.drivers
            .read()
            .expect("driver cache poisoned")
            .values()
            .cloned()
            .collect()
    }

    #[cfg(test)]
    fn cached_bin_count(&self) -> usize {
        self.bins.read().expect("bin cache poisoned").len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::init_schema;
    use cellar_storage::LocalDriver;
    use chrono::Utc;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_pool() -> SqlitePool {
        // A single connection keeps every query on the same in-memory db.
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    fn test_registry() -> DriverRegistry {
        let mut registry = DriverRegistry::default();
        // The sample metadata references a second driver row; back it with the
        // local implementation under its persisted name.
        registry.register("network", || Arc::new(LocalDriver::named("network")));
        registry
    }

    async fn sample_manager() -> Manager {
        let pool = memory_pool().await;
        init_schema(&pool).await.unwrap();

        sqlx::query("INSERT INTO drivers (name) VALUES ('local'), ('network')")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query(
            r#"
            INSERT INTO bins (driverID, name, externalURL, internalURL, redirect)
            VALUES
            (1, 'slow hard drive', 'media', '/mount/slow', 0),
            (1, 'fast ssd', 'games', '/mount/zyoom', 0),
            (2, 'home NAS', 'homelab/nas', 'https://myhomenas.local', 1)
            "#,
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query(
            r#"
            INSERT INTO files (binID, name, hash, contentType, size, relPath, uploadTimestamp)
            VALUES
            (1, 'sentimental video', 'af8182a217f6c4ae4abb6d52951f6e7a2cac3a4d59889e4a7a3cce87ac0ae508',
             'video/mp4', 600000000, 'oldvid.mp4', 1000209017),
            (3, 'I saw the tv glow', '7b1a56dfcba8ce808cb6392e2403f895afb1f210b85b7d3ad324d365432f01fa',
             'video/mp4', 1900000000, 'I_Saw_The_TV_Glow_2024.mp4', 1718538617)
            "#,
        )
        .execute(&pool)
        .await
        .unwrap();

        Manager::new(pool, test_registry())
    }

    #[tokio::test]
    async fn resolve_url_joins_root_and_rel_path() {
        let manager = sample_manager().await;

        let url = manager.resolve_url("oldvid.mp4").await.unwrap();
        assert_eq!(url, "/mount/slow/oldvid.mp4");

        let url = manager.resolve_url("I_Saw_The_TV_Glow_2024.mp4").await.unwrap();
        assert_eq!(url, "https://myhomenas.local/I_Saw_The_TV_Glow_2024.mp4");
    }

    #[tokio::test]
    async fn resolve_unknown_path_is_not_found_and_mutates_nothing() {
        let manager = sample_manager().await;

        let err = manager.resolve_url("bingbong").await.unwrap_err();
        assert!(matches!(err, CellarError::NotFound(_)));
        assert_eq!(manager.cached_bin_count(), 0);

        let err = manager.get_file("bingbong").await.unwrap_err();
        assert!(matches!(err, CellarError::NotFound(_)));
        assert_eq!(manager.cached_bin_count(), 0);
    }

    #[tokio::test]
    async fn get_file_materializes_owning_bin_and_driver() {
        let manager = sample_manager().await;

        let record = manager.get_file("oldvid.mp4").await.unwrap();
        assert_eq!(record.info.name, "sentimental video");
        assert_eq!(
            record.info.hash,
            "af8182a217f6c4ae4abb6d52951f6e7a2cac3a4d59889e4a7a3cce87ac0ae508"
        );
        assert_eq!(record.info.size, 600000000);
        assert_eq!(record.info.uploaded_at.timestamp(), 1000209017);
        assert_eq!(record.bin.id(), 1);
        assert_eq!(record.bin.name, "slow hard drive");
        assert_eq!(record.bin.driver().identity().name(), "local");
        assert_eq!(record.bin.driver().identity().id(), 1);
    }

    #[tokio::test]
    async fn cached_bins_are_reference_stable() {
        let manager = sample_manager().await;

        let first = manager.get_bin(1).await.unwrap();
        let second = manager.get_bin(1).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        // The record path goes through the same cache.
        let record = manager.get_file("oldvid.mp4").await.unwrap();
        assert!(Arc::ptr_eq(&first, &record.bin));
    }

    #[tokio::test]
    async fn drivers_are_shared_across_bins() {
        let manager = sample_manager().await;

        let slow = manager.get_bin(1).await.unwrap();
        let fast = manager.get_bin(2).await.unwrap();
        assert!(Arc::ptr_eq(slow.driver(), fast.driver()));
    }

    #[tokio::test]
    async fn unrecognized_persisted_driver_name_is_unknown_driver() {
        let pool = memory_pool().await;
        init_schema(&pool).await.unwrap();
        sqlx::query("INSERT INTO drivers (name) VALUES ('teleporter')")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query(
            "INSERT INTO bins (driverID, name, externalURL, internalURL, redirect)
             VALUES (1, 'weird bin', 'weird', '/mount/weird', 0)",
        )
        .execute(&pool)
        .await
        .unwrap();

        let manager = Manager::new(pool, DriverRegistry::default());
        let err = manager.get_bin(1).await.unwrap_err();
        assert!(matches!(err, CellarError::UnknownDriver(name) if name == "teleporter"));
    }

    #[tokio::test]
    async fn duplicate_rel_path_is_a_conflict() {
        let manager = sample_manager().await;

        let info = FileInfo {
            name: "dup".to_string(),
            hash: "feed".to_string(),
            content_type: "text/plain".to_string(),
            size: 3,
            rel_path: "dup-path".to_string(),
            uploaded_at: Utc::now(),
            bin_id: 1,
        };

        manager.insert_file(&info).await.unwrap();
        let err = manager.insert_file(&info).await.unwrap_err();
        assert!(matches!(err, CellarError::Conflict(_)));

        // The winner's row is intact.
        assert!(manager.get_file("dup-path").await.is_ok());
    }

    #[tokio::test]
    async fn register_driver_and_bin_assign_ids_and_cache() {
        let pool = memory_pool().await;
        init_schema(&pool).await.unwrap();
        let manager = Manager::new(pool, DriverRegistry::default());

        let driver: Arc<dyn Driver> = Arc::new(LocalDriver::new());
        let driver_id = manager.register_driver(driver.clone()).await.unwrap();
        assert!(driver_id > 0);
        assert_eq!(driver.identity().id(), driver_id);

        let dir = tempfile::tempdir().unwrap();
        let bin = Bin::new(
            "testing bin",
            "foobar",
            dir.path().to_str().unwrap(),
            false,
            driver.clone(),
        );
        let bin = manager.register_bin(bin, driver_id).await.unwrap();
        assert!(bin.id() > 0);
        assert!(Arc::ptr_eq(&bin, &manager.get_bin(bin.id()).await.unwrap()));

        // Registration adopted the root, so destructive probes are allowed.
        let status = bin.file_status("nope").await.unwrap();
        assert_eq!(status, cellar_storage::FileStatus::Missing);
    }

    #[tokio::test]
    async fn refresh_bins_rebuilds_from_store() {
        let manager = sample_manager().await;
        manager.get_bin(1).await.unwrap();
        assert_eq!(manager.cached_bin_count(), 1);

        manager.refresh_bins().await.unwrap();
        assert_eq!(manager.cached_bin_count(), 3);
    }
}
