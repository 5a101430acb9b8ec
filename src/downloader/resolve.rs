//! Request → URL resolution
//!
//! Published versions are looked up in the catalog. `latest` / `latest-build`
//! artifacts are never published in the manifest, so their URL is assembled
//! from the naming convention of the build servers.

use super::Downloader;
use crate::db::ComponentQuery;
use crate::error::{Error, Result};
use crate::targets::{infer_arch, infer_target, resolve_perf_version};
use crate::types::{AvailableComponent, ComponentKind, ComponentRequest, Resolved};
use crate::version::VersionFilter;
use regex::Regex;
use tracing::{debug, info, warn};

/// Placeholder meaning "detect from the host"
const AUTO: &str = "auto";

/// Fill in host-dependent fields and expand benchmark aliases
///
/// `target` and `arch` set to `"auto"` are inferred from the running system;
/// the version is mapped through the benchmark alias table first because
/// macOS target inference depends on it.
pub fn normalize_request(request: &ComponentRequest) -> Result<ComponentRequest> {
    let version = resolve_perf_version(&request.version).to_string();
    let target = if request.target == AUTO {
        infer_target(Some(&version))?
    } else {
        request.target.clone()
    };
    let arch = if request.arch == AUTO {
        infer_arch()
    } else {
        request.arch.clone()
    };

    Ok(ComponentRequest {
        version,
        target,
        arch,
        edition: request.edition.clone(),
        component: request.component,
    })
}

/// Inputs of an unpublished build URL
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LatestBuild<'a> {
    /// Target platform
    pub target: &'a str,
    /// Architecture
    pub arch: &'a str,
    /// Edition
    pub edition: &'a str,
    /// Which artifact
    pub component: ComponentKind,
    /// Branch infix, `None` or `master` for none
    pub branch: Option<&'a str>,
}

/// URL of an unpublished `latest` build
///
/// `<base>/<platform>/<name>-<typ>-<arch>-<ent><tgt><br>latest.<ext>`
pub fn latest_build_url(base_url: &str, build: &LatestBuild<'_>) -> String {
    let target = build.target;
    let platform = match target {
        "windows" => "windows",
        "win32" => "win32",
        "macos" => "osx",
        _ => "linux",
    };
    let typ = match target {
        "windows" | "win32" | "macos" => target,
        _ => "linux",
    };
    let ext = if target == "windows" { "zip" } else { "tgz" };
    let ent_infix = if build.edition == "enterprise" {
        "enterprise-"
    } else {
        ""
    };
    let tgt_infix = match target {
        "windows" | "win32" | "macos" => String::new(),
        _ => format!("{target}-"),
    };
    let br_infix = match build.branch {
        Some(branch) if branch != "master" => format!("{branch}-"),
        _ => String::new(),
    };

    format!(
        "{}/{}/{}-{}-{}-{}{}{}latest.{}",
        base_url.trim_end_matches('/'),
        platform,
        build.component.latest_build_name(),
        typ,
        build.arch,
        ent_infix,
        tgt_infix,
        br_infix,
        ext
    )
}

impl Downloader {
    /// Resolve a request to a download URL and, when catalogued, its checksum
    ///
    /// `branch` only applies to `latest` / `latest-build` requests.
    pub async fn resolve(
        &self,
        request: &ComponentRequest,
        branch: Option<&str>,
    ) -> Result<Resolved> {
        self.scoped(self.resolve_request(request, branch)).await
    }

    pub(crate) async fn resolve_request(
        &self,
        request: &ComponentRequest,
        branch: Option<&str>,
    ) -> Result<Resolved> {
        if request.is_latest_build() {
            return self.resolve_latest_build(request, branch).await;
        }

        match self.resolve_published(request).await {
            Err(Error::LookupMiss { .. })
                if request.component == ComponentKind::CryptShared
                    && request.version != "latest-release" =>
            {
                warn!("No matching version of crypt_shared found, using 'latest-release'");
                // Newer releases publish macOS builds as "macos"
                let target = if request.target == "osx" {
                    "macos".to_string()
                } else {
                    request.target.clone()
                };
                let fallback = ComponentRequest {
                    version: "latest-release".to_string(),
                    target,
                    ..request.clone()
                };
                self.resolve_published(&fallback).await
            }
            other => other,
        }
    }

    /// Catalog lookup for a concrete version, prefix or alias
    async fn resolve_published(&self, request: &ComponentRequest) -> Result<Resolved> {
        let kind = request.component;
        let query = ComponentQuery {
            version: Some(VersionFilter::parse(&request.version)),
            target: Some(request.target.clone()),
            arch: Some(request.arch.clone()),
            edition: Some(request.edition.clone()),
            component: Some(kind.catalog_key().to_string()),
        };

        let row = self
            .db
            .find_component(&query)
            .await?
            .ok_or_else(|| Error::LookupMiss {
                version: request.version.clone(),
                target: request.target.clone(),
                arch: request.arch.clone(),
                edition: request.edition.clone(),
                component: kind.catalog_key().to_string(),
            })?;

        let resolved = resolved_from_row(&row, kind)?;
        debug!(
            version = %row.version,
            component = kind.key(),
            url = %resolved.url,
            "resolved published build"
        );
        Ok(resolved)
    }

    async fn resolve_latest_build(
        &self,
        request: &ComponentRequest,
        branch: Option<&str>,
    ) -> Result<Resolved> {
        // Some RHEL builds carry a minor version ("rhel93"); borrow the spelling
        // from the newest published release of the same build
        let mut target = request.target.clone();
        if target.contains("rhel") {
            let published = self
                .resolve_published(&ComponentRequest {
                    version: "latest-release".to_string(),
                    ..request.clone()
                })
                .await?;
            let re = Regex::new(r"rhel[0-9][0-9]")
                .map_err(|e| Error::Other(format!("regex error: {}", e)))?;
            if let Some(found) = re.find(&published.url) {
                target = found.as_str().to_string();
            }
        }

        let url = latest_build_url(
            &self.config.latest_build_base_url,
            &LatestBuild {
                target: &target,
                arch: &request.arch,
                edition: &request.edition,
                component: request.component,
                branch,
            },
        );
        info!(url = %url, "using unpublished latest build");
        Ok(Resolved { url, sha256: None })
    }
}

fn resolved_from_row(row: &AvailableComponent, kind: ComponentKind) -> Result<Resolved> {
    let data: serde_json::Value = serde_json::from_str(&row.data)?;
    let field = kind.url_field();

    let url = data
        .get(field)
        .and_then(|v| v.as_str())
        .ok_or_else(|| {
            Error::ManifestParse(format!(
                "component \"{}\" of {} has no \"{}\" field",
                row.key, row.version, field
            ))
        })?
        .to_string();

    let sha256 = if kind.has_checksum() {
        data.get("sha256")
            .and_then(|v| v.as_str())
            .map(str::to_string)
    } else {
        None
    };

    Ok(Resolved { url, sha256 })
}
