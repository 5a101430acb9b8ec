//! Configuration types for mongodl

use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

use crate::error::{Error, Result};

/// Environment variable that overrides the manifest location
pub const DOWNLOAD_SOURCE_ENV: &str = "MONGODB_DOWNLOAD_SOURCE";

/// Environment variable that makes unknown manifest targets fatal when set to "1"
pub const VALIDATE_DISTROS_ENV: &str = "VALIDATE_DISTROS";

/// Manifest location used when neither config nor environment override it
pub const DEFAULT_MANIFEST_URL: &str = "https://downloads.mongodb.org/full.json";

/// Host serving unpublished "latest" server builds
pub const DEFAULT_LATEST_BUILD_BASE_URL: &str = "https://downloads.10gen.com";

/// Directory serving mongosh releases and their `mongosh.json` index
pub const DEFAULT_MONGOSH_BASE_URL: &str = "https://downloads.mongodb.com/compass";

/// Main configuration for [`Downloader`](crate::Downloader)
///
/// Every field has a default, so `Config::default()` is a working setup that
/// caches under the user's cache directory and never retries.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Directory where the catalog database and cached files live
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// URL of the JSON manifest listing every published version
    #[serde(default = "default_manifest_url")]
    pub manifest_url: String,

    /// Base URL for `latest` / `latest-build` archives
    #[serde(default = "default_latest_build_base_url")]
    pub latest_build_base_url: String,

    /// Base URL for mongosh downloads
    #[serde(default = "default_mongosh_base_url")]
    pub mongosh_base_url: String,

    /// Timeout applied to each individual HTTP request (default: 30 seconds)
    #[serde(default = "default_http_timeout", with = "duration_serde")]
    pub http_timeout: Duration,

    /// Retry behavior for the fetch/verify/extract attempt
    #[serde(default)]
    pub retry: RetryConfig,

    /// Abort a manifest import when it names targets missing from the distro tables
    #[serde(default = "default_validate_distros")]
    pub validate_distros: bool,

    /// Treat "no archive members extracted" as an error instead of a warning
    #[serde(default)]
    pub empty_is_error: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            manifest_url: default_manifest_url(),
            latest_build_base_url: default_latest_build_base_url(),
            mongosh_base_url: default_mongosh_base_url(),
            http_timeout: default_http_timeout(),
            retry: RetryConfig::default(),
            validate_distros: default_validate_distros(),
            empty_is_error: false,
        }
    }
}

impl Config {
    /// Config rooted at the given cache directory, everything else default
    pub fn with_cache_dir(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            ..Default::default()
        }
    }

    /// Path of the catalog database inside the cache directory
    pub fn database_path(&self) -> PathBuf {
        self.cache_dir.join("data.db")
    }

    /// Root of the sharded content cache
    pub fn files_dir(&self) -> PathBuf {
        self.cache_dir.join("files")
    }

    /// Check settings that cannot be expressed through types alone
    pub fn validate(&self) -> Result<()> {
        for (key, value) in [
            ("manifest_url", &self.manifest_url),
            ("latest_build_base_url", &self.latest_build_base_url),
            ("mongosh_base_url", &self.mongosh_base_url),
        ] {
            if url::Url::parse(value).is_err() {
                return Err(Error::Config {
                    message: format!("{key} is not a valid URL: {value}"),
                    key: Some(key.to_string()),
                });
            }
        }
        if self.http_timeout.is_zero() {
            return Err(Error::Config {
                message: "HTTP timeout must be greater than zero".to_string(),
                key: Some("http_timeout".to_string()),
            });
        }
        Ok(())
    }
}

/// Retry configuration for transient failures
///
/// Delays follow `min(2^(attempt-1), max_delay_units)` units: 1, 2, 4, 8, ...
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Number of retries after the first failed attempt (default: 0)
    #[serde(default)]
    pub max_retries: u32,

    /// Length of one backoff unit (default: 1 second)
    #[serde(default = "default_backoff_unit", with = "duration_serde")]
    pub unit: Duration,

    /// Upper bound on a single delay, in units (default: 600, ten minutes)
    #[serde(default = "default_max_delay_units")]
    pub max_delay_units: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            unit: default_backoff_unit(),
            max_delay_units: default_max_delay_units(),
        }
    }
}

// Default value functions
fn default_cache_dir() -> PathBuf {
    cache_dir_or_fallback(crate::targets::default_cache_dir())
}

fn cache_dir_or_fallback(found: crate::error::Result<PathBuf>) -> PathBuf {
    found.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "no per-user cache directory, using ./.mongodl");
        PathBuf::from(".mongodl")
    })
}

fn default_manifest_url() -> String {
    std::env::var(DOWNLOAD_SOURCE_ENV).unwrap_or_else(|_| DEFAULT_MANIFEST_URL.to_string())
}

fn default_latest_build_base_url() -> String {
    DEFAULT_LATEST_BUILD_BASE_URL.to_string()
}

fn default_mongosh_base_url() -> String {
    DEFAULT_MONGOSH_BASE_URL.to_string()
}

fn default_http_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_validate_distros() -> bool {
    std::env::var(VALIDATE_DISTROS_ENV).is_ok_and(|v| v == "1")
}

fn default_backoff_unit() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay_units() -> u64 {
    600
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
