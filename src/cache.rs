//! Conditional HTTP download cache
//!
//! Every fetched URL is stored at `files/<shard>/<basename>` under the cache
//! directory, where `<shard>` is the first four hex characters of the URL's
//! SHA-256. The server's `ETag` / `Last-Modified` validators are remembered in
//! the database and replayed on the next fetch, so unchanged files cost one
//! round trip and no transfer.
//!
//! This layer never retries; callers wrap it in [`RetryPolicy`](crate::retry::RetryPolicy).

use crate::config::Config;
use crate::db::{Database, HttpValidators};
use crate::error::{Error, Result};
use crate::types::FetchResult;
use crate::utils::cache_path_for;
use reqwest::StatusCode;
use reqwest::header::{
    ETAG, HeaderMap, HeaderName, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Downloads files into the content cache, revalidating with HTTP validators
pub struct DownloadCache {
    db: Arc<Database>,
    files_dir: PathBuf,
    http_client: reqwest::Client,
}

impl DownloadCache {
    /// Create a cache rooted at `config.files_dir()`
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created
    pub fn new(db: Arc<Database>, config: &Config) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .user_agent(concat!("mongodl/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            db,
            files_dir: config.files_dir(),
            http_client,
        })
    }

    /// Root directory of cached files
    pub fn files_dir(&self) -> &Path {
        &self.files_dir
    }

    /// Where `url` is (or would be) cached
    pub fn path_for(&self, url: &str) -> Result<PathBuf> {
        cache_path_for(&self.files_dir, url)
    }

    /// Obtain a local copy of the file at `url`
    ///
    /// Validators are only sent when the cached file exists. A `304` without a
    /// cached file is [`Error::CacheInconsistent`]; any other non-success
    /// status is [`Error::Http`]. A body shorter or longer than the declared
    /// `Content-Length` is [`Error::SizeMismatch`] and leaves the previous
    /// cached copy in place.
    pub async fn fetch(&self, url: &str) -> Result<FetchResult> {
        let dest = self.path_for(url)?;
        let cached = is_file(&dest).await;

        let mut request = self.http_client.get(url);
        if cached && let Some(validators) = self.db.http_validators(url).await? {
            if let Some(etag) = &validators.etag {
                request = request.header(IF_NONE_MATCH, etag);
            }
            if let Some(modified) = &validators.last_modified {
                request = request.header(IF_MODIFIED_SINCE, modified);
            }
        }

        debug!(url = %url, conditional = cached, "requesting");
        let mut response = request.send().await?;
        let status = response.status();

        if status == StatusCode::NOT_MODIFIED {
            if !is_file(&dest).await {
                return Err(Error::CacheInconsistent { path: dest });
            }
            info!(path = %dest.display(), "Using cached file");
            return Ok(FetchResult {
                changed: false,
                path: dest,
            });
        }

        if !status.is_success() {
            return Err(Error::Http {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let validators = validators_from(response.headers());
        let expected = response.content_length();

        let parent = dest
            .parent()
            .ok_or_else(|| Error::Other(format!("cache path has no parent: {}", dest.display())))?;
        tokio::fs::create_dir_all(parent).await?;

        // Stream into a sibling file so a failed transfer never clobbers a good copy
        let partial = partial_path(&dest);
        let mut file = tokio::fs::File::create(&partial).await?;
        let mut written: u64 = 0;
        let streamed = async {
            while let Some(chunk) = response.chunk().await? {
                file.write_all(&chunk).await?;
                written += chunk.len() as u64;
            }
            file.flush().await?;
            Ok::<(), Error>(())
        }
        .await;
        drop(file);

        if let Err(e) = streamed {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e);
        }

        if let Some(expected) = expected
            && written != expected
        {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(Error::SizeMismatch {
                path: dest,
                expected,
                actual: written,
            });
        }

        tokio::fs::rename(&partial, &dest).await?;
        self.db.store_http_validators(url, &validators).await?;

        info!(url = %url, path = %dest.display(), bytes = written, "Downloaded file");

        Ok(FetchResult {
            changed: true,
            path: dest,
        })
    }

    /// Forget the validators for `url` so the next fetch transfers the body again
    pub async fn invalidate(&self, url: &str) -> Result<()> {
        self.db.forget_http_validators(url).await?;
        Ok(())
    }
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".part");
    dest.with_file_name(name)
}

fn validators_from(headers: &HeaderMap) -> HttpValidators {
    let header = |name: HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    HttpValidators {
        etag: header(ETAG),
        last_modified: header(LAST_MODIFIED),
    }
}
