//! Core types for mongodl

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::Error;

/// What [`Downloader::download`](crate::Downloader::download) should do after resolving a URL
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadMode {
    /// Print the resolved URL and stop
    PrintOnly,
    /// Fetch the archive and count matching members without writing anything
    DryRun,
    /// Fetch the archive and extract matching members
    #[default]
    Extract,
}

impl DownloadMode {
    /// Whether this mode touches the network after resolving
    pub fn fetches(&self) -> bool {
        !matches!(self, Self::PrintOnly)
    }

    /// Whether extraction only counts members
    pub fn is_dry_run(&self) -> bool {
        matches!(self, Self::DryRun)
    }
}

/// Downloadable artifact kinds
///
/// Each kind knows which catalog component it lives in, which field of that
/// component holds its URL, and how unpublished "latest" builds name it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComponentKind {
    /// The main server archive
    #[serde(rename = "archive")]
    Archive,
    /// Debug symbols for the main server archive
    #[serde(rename = "archive-debug")]
    ArchiveDebug,
    /// Shared library for queryable/automatic encryption
    #[serde(rename = "crypt_shared")]
    CryptShared,
    /// The mongocryptd daemon
    #[serde(rename = "cryptd")]
    Cryptd,
    /// The legacy shell
    #[serde(rename = "shell")]
    Shell,
}

impl ComponentKind {
    /// Every supported kind
    pub const ALL: [ComponentKind; 5] = [
        Self::Archive,
        Self::ArchiveDebug,
        Self::CryptShared,
        Self::Cryptd,
        Self::Shell,
    ];

    /// Key as accepted from users and printed in listings
    pub fn key(&self) -> &'static str {
        match self {
            Self::Archive => "archive",
            Self::ArchiveDebug => "archive-debug",
            Self::CryptShared => "crypt_shared",
            Self::Cryptd => "cryptd",
            Self::Shell => "shell",
        }
    }

    /// Component key stored in the catalog
    pub fn catalog_key(&self) -> &'static str {
        match self {
            Self::ArchiveDebug => "archive",
            other => other.key(),
        }
    }

    /// Field of the catalog component that holds the download URL
    pub fn url_field(&self) -> &'static str {
        match self {
            Self::ArchiveDebug => "debug_symbols",
            _ => "url",
        }
    }

    /// Whether the catalog records a checksum for the URL this kind reads
    pub fn has_checksum(&self) -> bool {
        !matches!(self, Self::ArchiveDebug)
    }

    /// File name stem used by unpublished "latest" builds
    pub fn latest_build_name(&self) -> &'static str {
        match self {
            Self::Archive => "mongodb",
            Self::CryptShared => "mongo_crypt_shared_v1",
            other => other.key(),
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for ComponentKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.key() == s)
            .ok_or_else(|| Error::UnknownComponent(s.to_string()))
    }
}

/// Identifies one artifact to resolve
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentRequest {
    /// Concrete version, `MAJOR.MINOR` prefix, alias, or `latest`/`latest-build`
    pub version: String,
    /// Target platform (e.g. "rhel8", "windows", "macos")
    pub target: String,
    /// Architecture (e.g. "x86_64", "aarch64")
    pub arch: String,
    /// Edition (e.g. "enterprise", "targeted", "base")
    pub edition: String,
    /// Which artifact
    pub component: ComponentKind,
}

impl ComponentRequest {
    /// Build a request
    pub fn new(
        version: impl Into<String>,
        target: impl Into<String>,
        arch: impl Into<String>,
        edition: impl Into<String>,
        component: ComponentKind,
    ) -> Self {
        Self {
            version: version.into(),
            target: target.into(),
            arch: arch.into(),
            edition: edition.into(),
            component,
        }
    }

    /// True for unpublished builds addressed by naming convention
    pub fn is_latest_build(&self) -> bool {
        matches!(self.version.as_str(), "latest" | "latest-build")
    }
}

/// How a resolved artifact should be fetched and unpacked
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadOptions {
    /// Destination directory for extracted members
    #[serde(default = "default_out_dir")]
    pub out_dir: PathBuf,

    /// Only extract members whose full path matches this glob (`**` crosses directories)
    #[serde(default)]
    pub pattern: Option<String>,

    /// Number of leading path segments removed from each member
    #[serde(default)]
    pub strip_components: usize,

    /// Print, dry-run, or extract
    #[serde(default)]
    pub mode: DownloadMode,

    /// Branch used for `latest-build` URLs (`master` means none)
    #[serde(default)]
    pub latest_build_branch: Option<String>,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            out_dir: default_out_dir(),
            pattern: None,
            strip_components: 0,
            mode: DownloadMode::default(),
            latest_build_branch: None,
        }
    }
}

fn default_out_dir() -> PathBuf {
    PathBuf::from(".")
}

/// One row of a catalog query
#[derive(Clone, Debug, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct AvailableComponent {
    /// Version string as published
    pub version: String,
    /// Normalized target
    pub target: String,
    /// Architecture
    pub arch: String,
    /// Edition
    pub edition: String,
    /// Catalog component key
    pub key: String,
    /// Raw component JSON
    pub data: String,
}

/// Distinct values present in the catalog
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogSummary {
    /// Architectures, sorted
    pub arches: Vec<String>,
    /// Targets, sorted
    pub targets: Vec<String>,
    /// Editions, sorted
    pub editions: Vec<String>,
    /// Versions in ascending release order
    pub versions: Vec<String>,
    /// Catalog component keys, sorted
    pub components: Vec<String>,
}

/// A URL to fetch and the checksum it must have, when known
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resolved {
    /// Download URL
    pub url: String,
    /// Expected lowercase hex SHA-256 of the file
    pub sha256: Option<String>,
}

/// Result of a cache fetch
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchResult {
    /// False when the server confirmed the cached copy is current
    pub changed: bool,
    /// Location of the cached file
    pub path: PathBuf,
}

/// Result of [`Downloader::download`](crate::Downloader::download)
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// Only the URL was printed
    UrlOnly {
        /// Resolved URL
        url: String,
    },
    /// The archive was fetched and members were (or would be) extracted
    Extracted {
        /// Resolved URL
        url: String,
        /// Members that passed the filters
        count: usize,
        /// Whether nothing was written
        dry_run: bool,
    },
}

impl DownloadOutcome {
    /// The resolved URL
    pub fn url(&self) -> &str {
        match self {
            Self::UrlOnly { url } | Self::Extracted { url, .. } => url,
        }
    }

    /// Extracted member count, if extraction ran
    pub fn count(&self) -> Option<usize> {
        match self {
            Self::UrlOnly { .. } => None,
            Self::Extracted { count, .. } => Some(*count),
        }
    }
}
