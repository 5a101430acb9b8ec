//! # mongodl
//!
//! Cached resolver, downloader and extractor for MongoDB release artifacts.
//!
//! ## Design Philosophy
//!
//! mongodl is designed to be:
//! - **Cache-first** - The release manifest and every archive are fetched
//!   conditionally and kept on disk, so repeated runs cost one round trip each
//! - **Scriptable** - The resolved URL is printed on its own line before any
//!   download starts; logs go to the tracing subscriber, never to that output
//! - **Library-first** - Embedding binaries decide on argument parsing and
//!   exit codes (see [`ToExitCode`])
//! - **Sequential** - One operation at a time, nothing runs in the background
//!
//! ## Quick Start
//!
//! ```no_run
//! use mongodl::{ComponentKind, ComponentRequest, Config, DownloadOptions, Downloader};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let downloader = Downloader::new(Config::default()).await?;
//!
//!     // Bring the catalog up to date (a 304 leaves it untouched)
//!     downloader.refresh_manifest().await?;
//!
//!     let request = ComponentRequest::new(
//!         "latest-release",
//!         "auto",
//!         "auto",
//!         "enterprise",
//!         ComponentKind::Archive,
//!     );
//!     let options = DownloadOptions {
//!         out_dir: "mongodb".into(),
//!         pattern: Some("*/bin/**".to_string()),
//!         strip_components: 2,
//!         ..Default::default()
//!     };
//!
//!     let outcome = downloader.download(&request, &options).await?;
//!     println!("{:?} members extracted", outcome.count());
//!
//!     downloader.close().await;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Conditional HTTP cache
pub mod cache;
/// Configuration types
pub mod config;
/// Database persistence layer
pub mod db;
/// Core downloader implementation (decomposed into focused submodules)
pub mod downloader;
/// Error types
pub mod error;
/// Archive extraction
pub mod extraction;
/// Release manifest parsing
pub mod manifest;
/// Retry logic with exponential backoff
pub mod retry;
/// Host platform detection and distro tables
pub mod targets;
/// Core types
pub mod types;
/// Utility functions
pub mod utils;
/// Version parsing, ordering and filters
pub mod version;

// Re-export commonly used types
pub use cache::DownloadCache;
pub use config::{Config, RetryConfig};
pub use db::{ComponentQuery, Database, ImportStats};
pub use downloader::{Downloader, Listing, MongoshRequest};
pub use error::{DatabaseError, Error, Result, ToExitCode};
pub use extraction::{ExtractOptions, extract_archive};
pub use types::{
    AvailableComponent, CatalogSummary, ComponentKind, ComponentRequest, DownloadMode,
    DownloadOptions, DownloadOutcome, FetchResult, Resolved,
};
pub use version::VersionFilter;
