//! Release orchestration split into focused submodules.
//!
//! The [`Downloader`] struct and its methods are organized by domain:
//! - [`refresh`] - Manifest revalidation and catalog import
//! - [`resolve`] - Request → URL resolution (catalog lookup or naming convention)
//! - [`fetch`] - Print/fetch/verify/extract under the retry policy
//! - [`listing`] - Catalog listing reports
//! - [`mongosh`] - The mongosh shell, which lives outside the server catalog

mod fetch;
mod listing;
mod mongosh;
mod refresh;
mod resolve;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use listing::{Listing, render_matches, render_summary};
pub use mongosh::{MongoshRequest, host_platform, mongosh_url, openssl_suffix};
pub use resolve::{LatestBuild, latest_build_url, normalize_request};

use crate::cache::DownloadCache;
use crate::config::Config;
use crate::db::Database;
use crate::error::{Error, Result};
use crate::retry::{RetryPolicy, Sleeper, TokioSleeper};
use std::future::Future;
use std::io::Write;
use std::sync::{Arc, Mutex};
use tracing::instrument::WithSubscriber;

/// Main entry point: resolves, fetches and extracts release artifacts
///
/// Operations run strictly in sequence; nothing is spawned in the background.
pub struct Downloader {
    /// Catalog and HTTP validator store
    /// Public for integration tests to inspect the catalog directly
    pub db: Arc<Database>,
    /// Configuration (wrapped in Arc for cheap sharing with the cache)
    pub(crate) config: Arc<Config>,
    /// Conditional HTTP cache for manifests and archives
    pub(crate) cache: DownloadCache,
    /// Primary output: resolved URLs and listing reports go here, one write per line
    output: Mutex<Box<dyn Write + Send>>,
    /// Backoff sleeper handed to every retry policy
    sleeper: Arc<dyn Sleeper>,
    /// Subscriber receiving this instance's log events, if not the ambient one
    dispatch: Option<tracing::Dispatch>,
}

impl Downloader {
    /// Open (or create) the cache directory described by `config`
    ///
    /// # Errors
    /// Returns error if the configuration is invalid, the cache directory
    /// cannot be created, or the catalog database cannot be opened.
    pub async fn new(config: Config) -> Result<Self> {
        config.validate()?;
        tokio::fs::create_dir_all(&config.cache_dir).await?;

        let db = Arc::new(Database::new(&config.database_path()).await?);
        let cache = DownloadCache::new(db.clone(), &config)?;

        tracing::debug!(cache_dir = %config.cache_dir.display(), "opened download cache");

        Ok(Self {
            db,
            config: Arc::new(config),
            cache,
            output: Mutex::new(Box::new(std::io::stdout())),
            sleeper: Arc::new(TokioSleeper),
            dispatch: None,
        })
    }

    /// Send the primary output somewhere other than stdout
    pub fn with_output(mut self, output: impl Write + Send + 'static) -> Self {
        self.output = Mutex::new(Box::new(output));
        self
    }

    /// Replace the sleeper used between retries
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Route this instance's log events to `dispatch` instead of the ambient subscriber
    pub fn with_dispatch(mut self, dispatch: tracing::Dispatch) -> Self {
        self.dispatch = Some(dispatch);
        self
    }

    /// Active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The underlying download cache
    pub fn cache(&self) -> &DownloadCache {
        &self.cache
    }

    /// Close the database pool
    pub async fn close(self) {
        let Self { db, cache, .. } = self;
        drop(cache);
        match Arc::try_unwrap(db) {
            Ok(db) => db.close().await,
            Err(_) => tracing::debug!("database still shared, leaving pool open"),
        }
    }

    /// Fresh retry policy built from the configuration
    pub(crate) fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::from_config(&self.config.retry, self.sleeper.clone())
    }

    /// Write one line to the primary output
    pub(crate) fn emit(&self, text: &str) -> Result<()> {
        let mut out = self
            .output
            .lock()
            .map_err(|_| Error::Other("output writer lock poisoned".to_string()))?;
        writeln!(out, "{}", text)?;
        out.flush()?;
        Ok(())
    }

    /// Run `fut` with this instance's subscriber installed
    pub(crate) async fn scoped<F: Future>(&self, fut: F) -> F::Output {
        match &self.dispatch {
            Some(dispatch) => fut.with_subscriber(dispatch.clone()).await,
            None => fut.await,
        }
    }
}
