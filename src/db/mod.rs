//! Database layer for mongodl
//!
//! Handles SQLite persistence for the release catalog and HTTP cache validators.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`] - Database lifecycle, schema migrations
//! - [`catalog`] - Manifest import, filtered component queries, summaries
//! - [`http_cache`] - ETag / Last-Modified validators per fetched URL

use crate::version::VersionFilter;
use sqlx::sqlite::SqlitePool;

mod catalog;
mod http_cache;
mod migrations;

pub use catalog::ImportStats;

/// Filters for a catalog query; `None` means "no constraint"
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ComponentQuery {
    /// Version, prefix or alias
    pub version: Option<VersionFilter>,
    /// Target platform (exact)
    pub target: Option<String>,
    /// Architecture (exact)
    pub arch: Option<String>,
    /// Edition (exact)
    pub edition: Option<String>,
    /// Catalog component key (exact)
    pub component: Option<String>,
}

impl ComponentQuery {
    /// True when no filter is set
    pub fn is_unfiltered(&self) -> bool {
        self.version.is_none()
            && self.target.is_none()
            && self.arch.is_none()
            && self.edition.is_none()
            && self.component.is_none()
    }
}

/// Last-seen HTTP validators for a URL
#[derive(Clone, Debug, Default, PartialEq, Eq, sqlx::FromRow)]
pub struct HttpValidators {
    /// `ETag` response header
    pub etag: Option<String>,
    /// `Last-Modified` response header
    pub last_modified: Option<String>,
}

/// Database handle for mongodl
pub struct Database {
    pool: SqlitePool,
}
