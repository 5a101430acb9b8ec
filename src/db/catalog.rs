//! Release catalog: manifest import, filtered queries, and summaries.

use crate::error::DatabaseError;
use crate::manifest::Manifest;
use crate::types::{AvailableComponent, CatalogSummary};
use crate::version::{VersionFilter, VersionKey};
use crate::{Error, Result};
use futures::TryStreamExt;
use sqlx::SqliteConnection;

use super::{ComponentQuery, Database};

/// Row counts written by a manifest import
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImportStats {
    /// Version rows
    pub versions: usize,
    /// Download rows
    pub downloads: usize,
    /// Component rows
    pub components: usize,
    /// Targets missing from the distro tables, sorted
    pub missing_targets: Vec<String>,
}

impl Database {
    /// Create the catalog tables if they don't exist
    pub(super) async fn create_catalog_tables(conn: &mut SqliteConnection) -> Result<()> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS mdl_versions (
                version_id INTEGER PRIMARY KEY,
                date TEXT NOT NULL,
                version TEXT NOT NULL,
                githash TEXT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS mdl_downloads (
                download_id INTEGER PRIMARY KEY,
                version_id INTEGER NOT NULL REFERENCES mdl_versions,
                target TEXT NOT NULL,
                arch TEXT NOT NULL,
                edition TEXT NOT NULL,
                ar_url TEXT NOT NULL,
                ar_debug_url TEXT,
                data TEXT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS mdl_components (
                component_id INTEGER PRIMARY KEY,
                key TEXT NOT NULL,
                download_id INTEGER NOT NULL REFERENCES mdl_downloads,
                data TEXT NOT NULL,
                UNIQUE(key, download_id)
            )
            "#,
        ];

        for sql in statements {
            sqlx::query(sql).execute(&mut *conn).await.map_err(|e| {
                Error::Database(DatabaseError::MigrationFailed(format!(
                    "Failed to create catalog table: {}",
                    e
                )))
            })?;
        }

        Ok(())
    }

    /// Replace the catalog with the contents of `manifest`
    ///
    /// Runs in one transaction: the old tables are dropped and rebuilt, so
    /// readers see either the previous catalog or the new one. Targets missing
    /// from the distro tables are always logged; with `validate_distros` they
    /// abort the import with [`Error::MissingTargets`].
    pub async fn import_manifest(
        &self,
        manifest: &Manifest,
        validate_distros: bool,
    ) -> Result<ImportStats> {
        let mut tx = self.pool.begin().await.map_err(Error::Sqlx)?;

        // Rebuilding from scratch also sidesteps schema changes
        for table in ["mdl_components", "mdl_downloads", "mdl_versions"] {
            sqlx::query(&format!("DROP TABLE IF EXISTS {table}"))
                .execute(&mut *tx)
                .await
                .map_err(Error::Sqlx)?;
        }
        Self::create_catalog_tables(&mut *tx).await?;

        let mut stats = ImportStats::default();

        for ver in &manifest.versions {
            let version_id = sqlx::query(
                "INSERT INTO mdl_versions (date, version, githash) VALUES (?, ?, ?)",
            )
            .bind(&ver.date)
            .bind(&ver.version)
            .bind(&ver.githash)
            .execute(&mut *tx)
            .await
            .map_err(Error::Sqlx)?
            .last_insert_rowid();
            stats.versions += 1;

            for dl in &ver.downloads {
                let download_id = sqlx::query(
                    r#"
                    INSERT INTO mdl_downloads (
                        version_id, target, arch, edition, ar_url, ar_debug_url, data
                    )
                    VALUES (?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(version_id)
                .bind(&dl.target)
                .bind(&dl.arch)
                .bind(&dl.edition)
                .bind(&dl.archive_url)
                .bind(&dl.archive_debug_url)
                .bind(dl.raw.to_string())
                .execute(&mut *tx)
                .await
                .map_err(Error::Sqlx)?
                .last_insert_rowid();
                stats.downloads += 1;

                for (key, data) in &dl.components {
                    sqlx::query(
                        "INSERT INTO mdl_components (key, download_id, data) VALUES (?, ?, ?)",
                    )
                    .bind(key)
                    .bind(download_id)
                    .bind(data.to_string())
                    .execute(&mut *tx)
                    .await
                    .map_err(Error::Sqlx)?;
                    stats.components += 1;
                }
            }
        }

        stats.missing_targets = manifest.missing_targets().into_iter().collect();
        if !stats.missing_targets.is_empty() {
            tracing::error!(
                count = stats.missing_targets.len(),
                "Missing targets in DISTRO_ID_TO_TARGET:"
            );
            for target in &stats.missing_targets {
                tracing::error!(" - {}", target);
            }
            if validate_distros {
                tx.rollback().await.map_err(Error::Sqlx)?;
                return Err(Error::MissingTargets(stats.missing_targets));
            }
        }

        tx.commit().await.map_err(Error::Sqlx)?;

        tracing::info!(
            versions = stats.versions,
            downloads = stats.downloads,
            components = stats.components,
            "Imported release manifest"
        );

        Ok(stats)
    }

    /// Components matching every filter, newest version first
    ///
    /// Rows with equal versions keep catalog insertion order. A catalogued
    /// version that cannot be parsed fails the whole query.
    pub async fn query_components(
        &self,
        query: &ComponentQuery,
    ) -> Result<Vec<AvailableComponent>> {
        let mut keyed = Vec::new();
        self.scan_components(query, |key, row| keyed.push((key, row)))
            .await?;

        // Stable sort keeps insertion order among equal versions
        keyed.sort_by(|(a, _), (b, _)| b.cmp(a));

        Ok(keyed.into_iter().map(|(_, row)| row).collect())
    }

    /// First component [`query_components`](Self::query_components) would
    /// return, found in one pass without holding the other matches
    pub async fn find_component(
        &self,
        query: &ComponentQuery,
    ) -> Result<Option<AvailableComponent>> {
        let mut best: Option<(VersionKey, AvailableComponent)> = None;
        self.scan_components(query, |key, row| {
            // Strictly newer only, so the earliest of equal versions wins
            if best.as_ref().is_none_or(|(top, _)| key > *top) {
                best = Some((key, row));
            }
        })
        .await?;
        Ok(best.map(|(_, row)| row))
    }

    /// Stream every row passing all filters to `visit`, in insertion order
    async fn scan_components(
        &self,
        query: &ComponentQuery,
        mut visit: impl FnMut(VersionKey, AvailableComponent),
    ) -> Result<()> {
        // Exact versions narrow the scan in SQL; aliases are applied below
        let (exact, prefix) = match &query.version {
            Some(VersionFilter::Exact(v)) => {
                (Some(v.clone()), Some(format!("{}.%", escape_like(v))))
            }
            _ => (None, None),
        };

        let query_failed = |e: sqlx::Error| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to query catalog: {}",
                e
            )))
        };

        let mut rows = sqlx::query_as::<_, AvailableComponent>(
            r#"
            SELECT v.version, d.target, d.arch, d.edition, c.key, c.data
              FROM mdl_components c
              JOIN mdl_downloads d ON d.download_id = c.download_id
              JOIN mdl_versions v ON v.version_id = d.version_id
             WHERE (?1 IS NULL OR c.key = ?1)
               AND (?2 IS NULL OR d.target = ?2)
               AND (?3 IS NULL OR d.arch = ?3)
               AND (?4 IS NULL OR d.edition = ?4)
               AND (?5 IS NULL OR v.version = ?5 OR v.version LIKE ?6 ESCAPE '\')
             ORDER BY c.component_id
            "#,
        )
        .bind(&query.component)
        .bind(&query.target)
        .bind(&query.arch)
        .bind(&query.edition)
        .bind(exact)
        .bind(prefix)
        .fetch(&self.pool);

        while let Some(row) = rows.try_next().await.map_err(query_failed)? {
            if let Some(filter) = &query.version
                && !filter.matches(&row.version)?
            {
                continue;
            }
            visit(VersionKey::parse(&row.version)?, row);
        }

        Ok(())
    }

    /// Distinct values present in the catalog
    pub async fn catalog_summary(&self) -> Result<CatalogSummary> {
        let arches = self
            .distinct_column("SELECT DISTINCT arch FROM mdl_downloads ORDER BY arch")
            .await?;
        let targets = self
            .distinct_column("SELECT DISTINCT target FROM mdl_downloads ORDER BY target")
            .await?;
        let editions = self
            .distinct_column("SELECT DISTINCT edition FROM mdl_downloads ORDER BY edition")
            .await?;
        let components = self
            .distinct_column("SELECT DISTINCT key FROM mdl_components ORDER BY key")
            .await?;

        let mut versions = Vec::new();
        for version in self
            .distinct_column("SELECT DISTINCT version FROM mdl_versions")
            .await?
        {
            versions.push((VersionKey::parse(&version)?, version));
        }
        versions.sort();

        Ok(CatalogSummary {
            arches,
            targets,
            editions,
            versions: versions.into_iter().map(|(_, v)| v).collect(),
            components,
        })
    }

    async fn distinct_column(&self, sql: &str) -> Result<Vec<String>> {
        sqlx::query_scalar::<_, String>(sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to summarize catalog: {}",
                    e
                )))
            })
    }
}

/// Escape LIKE wildcards so version text matches literally
fn escape_like(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}
