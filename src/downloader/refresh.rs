//! Manifest revalidation and catalog import

use super::Downloader;
use crate::db::ImportStats;
use crate::error::Result;
use crate::manifest::Manifest;
use crate::retry::with_retry;
use std::path::Path;
use tracing::{debug, info, warn};

impl Downloader {
    /// Bring the catalog up to date with the configured manifest
    ///
    /// The manifest is revalidated through the download cache. When the server
    /// reports it unchanged the catalog is left alone and `None` is returned.
    /// Otherwise the manifest is parsed and imported, replacing the catalog in
    /// one transaction.
    ///
    /// If the import fails, the manifest's stored validators are dropped so the
    /// next refresh downloads and imports it again instead of trusting a
    /// catalog that never got built.
    pub async fn refresh_manifest(&self) -> Result<Option<ImportStats>> {
        self.scoped(async {
            let url = self.config.manifest_url.as_str();
            let mut policy = self.retry_policy();
            let fetched = with_retry(&mut policy, || self.cache.fetch(url)).await?;

            if !fetched.changed {
                debug!(url = %url, "manifest unchanged, keeping catalog");
                return Ok(None);
            }

            info!(url = %url, "importing release manifest");
            match self.import_manifest_file(&fetched.path).await {
                Ok(stats) => Ok(Some(stats)),
                Err(e) => {
                    warn!(url = %url, error = %e, "manifest import failed, forgetting validators");
                    self.db.forget_http_validators(url).await?;
                    Err(e)
                }
            }
        })
        .await
    }

    async fn import_manifest_file(&self, path: &Path) -> Result<ImportStats> {
        let bytes = tokio::fs::read(path).await?;
        let manifest = Manifest::from_slice(&bytes)?;
        self.db
            .import_manifest(&manifest, self.config.validate_distros)
            .await
    }
}
