//! Database lifecycle and schema migrations.

use crate::error::DatabaseError;
use crate::{Error, Result};
use sqlx::SqliteConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool};
use std::path::Path;
use std::time::Duration;

use super::Database;

/// Newest schema version this build knows how to create
const SCHEMA_VERSION: i64 = 1;

fn connect_error(what: &'static str) -> impl FnOnce(sqlx::Error) -> Error {
    move |e| Error::Database(DatabaseError::ConnectionFailed(format!("{what}: {e}")))
}

fn migration_error(what: &'static str) -> impl FnOnce(sqlx::Error) -> Error {
    move |e| Error::Database(DatabaseError::MigrationFailed(format!("{what}: {e}")))
}

impl Database {
    /// Open the catalog database at `path`, creating it and its parent
    /// directories when missing, and bring the schema up to date.
    pub async fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                Error::Database(DatabaseError::ConnectionFailed(format!(
                    "Failed to create database directory {}: {}",
                    parent.display(),
                    e
                )))
            })?;
        }

        // WAL lets a listing read while another process imports
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePool::connect_with(options)
            .await
            .map_err(connect_error("Failed to open database"))?;

        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    async fn run_migrations(&self) -> Result<()> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(connect_error("Failed to acquire connection"))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at INTEGER NOT NULL
            )",
        )
        .execute(&mut *conn)
        .await
        .map_err(migration_error("Failed to create schema_version table"))?;

        let applied: i64 =
            sqlx::query_scalar("SELECT COALESCE(MAX(version), 0) FROM schema_version")
                .fetch_one(&mut *conn)
                .await
                .map_err(|e| {
                    Error::Database(DatabaseError::QueryFailed(format!(
                        "Failed to read schema version: {}",
                        e
                    )))
                })?;

        if applied >= SCHEMA_VERSION {
            tracing::debug!(version = applied, "schema up to date");
            return Ok(());
        }

        drop(conn);
        tracing::info!(from = applied, to = SCHEMA_VERSION, "Migrating catalog database");

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(migration_error("Failed to begin migration"))?;
        if applied < 1 {
            Self::migrate_v1(&mut *tx).await?;
        }
        tx.commit()
            .await
            .map_err(migration_error("Failed to commit migration"))?;

        Ok(())
    }

    /// v1: HTTP validators plus an empty catalog, so queries before the first
    /// import see no rows instead of missing tables
    async fn migrate_v1(conn: &mut SqliteConnection) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS mdl_http_downloads (
                url TEXT NOT NULL UNIQUE,
                etag TEXT,
                last_modified TEXT
            )",
        )
        .execute(&mut *conn)
        .await
        .map_err(migration_error("Failed to create mdl_http_downloads table"))?;

        Self::create_catalog_tables(conn).await?;

        sqlx::query(
            "INSERT INTO schema_version (version, applied_at) \
             VALUES (1, CAST(strftime('%s', 'now') AS INTEGER))",
        )
        .execute(&mut *conn)
        .await
        .map_err(migration_error("Failed to record migration v1"))?;

        Ok(())
    }

    /// Close the database connection
    pub async fn close(self) {
        self.pool.close().await;
    }

    /// Get the underlying connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
