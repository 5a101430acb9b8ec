//! The mongosh shell
//!
//! mongosh is published outside the server manifest: its newest version comes
//! from a small JSON index and its archive names follow their own convention.
//! Only URL resolution differs; printing, fetching, extraction and retries are
//! shared with server downloads.

use super::Downloader;
use crate::error::{Error, Result};
use crate::retry::with_retry;
use crate::targets::infer_arch;
use crate::types::{DownloadOptions, DownloadOutcome};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Identifies one mongosh build
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MongoshRequest {
    /// Concrete version, or `latest` for the newest published release
    #[serde(default = "default_version")]
    pub version: String,
    /// `linux`, `darwin`, `win32`, or `auto` for the host
    #[serde(default = "default_auto")]
    pub target: String,
    /// Architecture, or `auto` for the host
    #[serde(default = "default_auto")]
    pub arch: String,
}

impl Default for MongoshRequest {
    fn default() -> Self {
        Self {
            version: default_version(),
            target: default_auto(),
            arch: default_auto(),
        }
    }
}

fn default_version() -> String {
    "latest".to_string()
}

fn default_auto() -> String {
    "auto".to_string()
}

#[derive(Deserialize)]
struct MongoshIndex {
    versions: Vec<MongoshIndexEntry>,
}

#[derive(Deserialize)]
struct MongoshIndexEntry {
    version: String,
}

/// Platform name of the host as mongosh archives spell it
pub fn host_platform() -> &'static str {
    match std::env::consts::OS {
        "windows" => "win32",
        "macos" => "darwin",
        other => other,
    }
}

/// Archive suffix implied by `openssl version` output on Linux
pub fn openssl_suffix(version_output: &str) -> Result<Option<&'static str>> {
    if version_output.contains("3.") {
        return Ok(Some("-openssl3.tgz"));
    }
    let legacy = Regex::new(r"1\.1\.1[e-w] ")
        .map_err(|e| Error::Other(format!("regex error: {}", e)))?;
    Ok(legacy.is_match(version_output).then_some("-openssl11.tgz"))
}

/// Download URL of a mongosh archive
pub fn mongosh_url(
    base_url: &str,
    version: &str,
    target: &str,
    arch: &str,
    suffix: &str,
) -> String {
    format!(
        "{}/mongosh-{}-{}-{}{}",
        base_url.trim_end_matches('/'),
        version,
        target,
        arch,
        suffix
    )
}

fn mongosh_arch(arch: &str) -> &str {
    match arch {
        "x86_64" => "x64",
        "aarch64" => "arm64",
        other => other,
    }
}

/// `openssl version` of the host, if an openssl binary can be found and run
async fn host_openssl_version() -> Option<String> {
    let openssl = match which::which("openssl") {
        Ok(path) => path,
        Err(e) => {
            debug!(error = %e, "openssl not found, using the generic build");
            return None;
        }
    };

    match tokio::process::Command::new(&openssl)
        .arg("version")
        .output()
        .await
    {
        Ok(output) if output.status.success() => {
            Some(String::from_utf8_lossy(&output.stdout).into_owned())
        }
        Ok(output) => {
            debug!(status = ?output.status, "openssl version failed");
            None
        }
        Err(e) => {
            debug!(error = %e, "failed to run openssl");
            None
        }
    }
}

impl Downloader {
    /// Resolve, print, fetch and extract a mongosh archive
    ///
    /// mongosh archives carry no published checksum.
    pub async fn download_mongosh(
        &self,
        request: &MongoshRequest,
        options: &DownloadOptions,
    ) -> Result<DownloadOutcome> {
        self.scoped(async {
            let url = self.resolve_mongosh_request(request).await?;
            self.deliver(url, None, options).await
        })
        .await
    }

    /// Resolve a mongosh request to its download URL
    pub async fn resolve_mongosh(&self, request: &MongoshRequest) -> Result<String> {
        self.scoped(self.resolve_mongosh_request(request)).await
    }

    async fn resolve_mongosh_request(&self, request: &MongoshRequest) -> Result<String> {
        let target = if request.target == "auto" {
            host_platform().to_string()
        } else {
            request.target.clone()
        };
        let arch = if request.arch == "auto" {
            infer_arch()
        } else {
            request.arch.clone()
        };
        info!("Download {} mongosh for {}-{}", request.version, target, arch);

        let version = if request.version == "latest" {
            self.latest_mongosh_version().await?
        } else {
            request.version.clone()
        };

        let arch = mongosh_arch(&arch);
        let suffix = if target == "linux" {
            let mut suffix = ".tgz";
            if cfg!(target_os = "linux")
                && matches!(arch, "x64" | "arm64")
                && let Some(output) = host_openssl_version().await
                && let Some(variant) = openssl_suffix(&output)?
            {
                suffix = variant;
            }
            suffix
        } else {
            ".zip"
        };

        Ok(mongosh_url(
            &self.config.mongosh_base_url,
            &version,
            &target,
            arch,
            suffix,
        ))
    }

    /// Newest version listed in `mongosh.json`
    async fn latest_mongosh_version(&self) -> Result<String> {
        let index_url = format!(
            "{}/mongosh.json",
            self.config.mongosh_base_url.trim_end_matches('/')
        );

        let index_url = &index_url;
        let cache = &self.cache;
        let mut policy = self.retry_policy();
        with_retry(&mut policy, || async move {
            let fetched = cache.fetch(index_url).await?;
            let bytes = tokio::fs::read(&fetched.path).await?;
            let index: MongoshIndex = serde_json::from_slice(&bytes)?;
            index
                .versions
                .into_iter()
                .next()
                .map(|entry| entry.version)
                .ok_or_else(|| Error::Other(format!("{index_url} lists no versions")))
        })
        .await
    }
}
