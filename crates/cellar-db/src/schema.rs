//! Connection setup and idempotent schema bootstrap.
//!
//! The gateway never migrates beyond "create if not exists"; the schema is the
//! relational contract the resolution layer queries against.

use cellar_core::CellarError;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use std::str::FromStr;

const MAX_CONNECTIONS: u32 = 5;

/// Open a sqlite pool with the gateway's pragmas: WAL journaling, normal
/// synchronous mode, foreign keys enforced.
pub async fn connect(database_url: &str) -> Result<SqlitePool, CellarError> {
    let options = SqliteConnectOptions::from_str(database_url)
        .map_err(CellarError::from)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal);

    let pool = SqlitePoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .connect_with(options)
        .await?;

    tracing::info!(database_url = %database_url, "opened sqlite connection pool");
    Ok(pool)
}

/// Create the metadata tables and indexes if they do not exist.
pub async fn init_schema(pool: &SqlitePool) -> Result<(), CellarError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS drivers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT UNIQUE NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS bins (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            driverID INTEGER,
            name TEXT UNIQUE NOT NULL,
            externalURL TEXT UNIQUE NOT NULL,
            internalURL TEXT NOT NULL,
            redirect INTEGER NOT NULL CHECK(redirect IN (0, 1)),
            FOREIGN KEY(driverID) REFERENCES drivers(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS files (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            binID INTEGER,
            name TEXT NOT NULL,
            hash TEXT NOT NULL,
            contentType TEXT NOT NULL DEFAULT 'application/octet-stream',
            size INTEGER NOT NULL,
            relPath TEXT UNIQUE NOT NULL,
            uploadTimestamp INTEGER,
            FOREIGN KEY(binID) REFERENCES bins(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_files_date ON files(uploadTimestamp)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_files_name ON files(name)")
        .execute(pool)
        .await?;

    tracing::info!("initialized metadata tables");
    Ok(())
}
