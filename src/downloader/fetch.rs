//! Print → fetch → verify → extract

use super::Downloader;
use crate::error::{Error, Result};
use crate::extraction::{ExtractOptions, extract_archive};
use crate::retry::with_retry;
use crate::types::{ComponentRequest, DownloadOptions, DownloadOutcome};
use crate::utils::verify_sha256;
use std::path::{Path, PathBuf};
use tracing::info;

impl Downloader {
    /// Resolve `request`, print its URL, then fetch and extract it according to `options`
    ///
    /// The URL is written to the primary output before any network activity so
    /// calling scripts can capture it even when the fetch later fails. The
    /// fetch/verify/extract attempt is retried as a whole under the configured
    /// [`RetryConfig`](crate::config::RetryConfig).
    ///
    /// `target` / `arch` of `"auto"` and benchmark version aliases are expanded
    /// first (see [`normalize_request`](super::normalize_request)).
    pub async fn download(
        &self,
        request: &ComponentRequest,
        options: &DownloadOptions,
    ) -> Result<DownloadOutcome> {
        self.scoped(async {
            let request = super::normalize_request(request)?;
            info!(
                "Download {} {}-{} for {}-{}",
                request.component, request.version, request.edition, request.target, request.arch
            );

            let resolved = self
                .resolve_request(&request, options.latest_build_branch.as_deref())
                .await?;

            self.deliver(resolved.url, resolved.sha256, options).await
        })
        .await
    }

    /// Shared tail of every download: print the URL and, unless told not to,
    /// fetch, verify and extract it
    pub(crate) async fn deliver(
        &self,
        url: String,
        sha256: Option<String>,
        options: &DownloadOptions,
    ) -> Result<DownloadOutcome> {
        // Must reach the primary output first; callers consume it
        self.emit(&url)?;
        info!(url = %url, "Download url: {}", url);

        if !options.mode.fetches() {
            return Ok(DownloadOutcome::UrlOnly { url });
        }

        let extract = ExtractOptions {
            pattern: options.pattern.clone(),
            strip_components: options.strip_components,
            dry_run: options.mode.is_dry_run(),
        };
        let out_dir = absolute_out_dir(&options.out_dir)?;

        let mut policy = self.retry_policy();
        let (archive, count) = with_retry(&mut policy, || {
            self.fetch_verify_extract(&url, sha256.as_deref(), &out_dir, &extract)
        })
        .await?;

        if count == 0 && self.config.empty_is_error {
            return Err(Error::ExtractionEmpty { archive });
        }

        Ok(DownloadOutcome::Extracted {
            url,
            count,
            dry_run: extract.dry_run,
        })
    }

    /// One attempt: cached fetch, optional checksum, extraction
    async fn fetch_verify_extract(
        &self,
        url: &str,
        sha256: Option<&str>,
        out_dir: &Path,
        extract: &ExtractOptions,
    ) -> Result<(PathBuf, usize)> {
        let fetched = self.cache.fetch(url).await?;
        if let Some(expected) = sha256 {
            verify_sha256(&fetched.path, expected).await?;
        }
        let count = extract_archive(&fetched.path, out_dir, extract).await?;
        Ok((fetched.path, count))
    }
}

fn absolute_out_dir(out_dir: &Path) -> Result<PathBuf> {
    Ok(std::path::absolute(out_dir)?)
}
