//! Error types for mongodl
//!
//! This module provides the error taxonomy for the library:
//! - Catalog errors (manifest parsing, unknown targets, version parsing, lookup misses)
//! - Transfer errors (HTTP status, size mismatch, checksum mismatch, transport)
//! - Extraction errors (unknown format, bad pattern, empty result)
//! - Process exit-code mapping for embedding binaries

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for mongodl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for mongodl
///
/// Each variant carries enough context to diagnose the failure without
/// consulting the log.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "cache_dir")
        key: Option<String>,
    },

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLx database error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Transport-level network error (connect, timeout, body read)
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The manifest is missing a required field or has the wrong shape
    #[error("invalid manifest: {0}")]
    ManifestParse(String),

    /// The manifest names targets that the distro tables do not know about
    #[error("manifest contains {} unknown target(s): {}", .0.len(), .0.join(", "))]
    MissingTargets(Vec<String>),

    /// A version string does not follow MAJOR.MINOR[.PATCH[-STAGEN]]
    #[error("failed to parse \"{0}\" as a version number")]
    InvalidVersion(String),

    /// No catalog entry satisfies a published-version request
    #[error(
        "no download was found for version=\"{version}\" target=\"{target}\" arch=\"{arch}\" edition=\"{edition}\" component=\"{component}\""
    )]
    LookupMiss {
        /// Requested version or alias
        version: String,
        /// Requested target platform
        target: String,
        /// Requested architecture
        arch: String,
        /// Requested edition
        edition: String,
        /// Requested component key
        component: String,
    },

    /// The component key is not one this crate knows how to resolve
    #[error("unknown component \"{0}\"")]
    UnknownComponent(String),

    /// The server answered with a status other than success or "not modified"
    #[error("failed to download [{url}]: HTTP {status}")]
    Http {
        /// URL that was requested
        url: String,
        /// HTTP status code returned
        status: u16,
    },

    /// Bytes written to disk differ from the declared Content-Length
    #[error("file size: {actual} does not match download size: {expected} ({path})")]
    SizeMismatch {
        /// Cached file that was written
        path: PathBuf,
        /// Declared Content-Length
        expected: u64,
        /// Bytes actually written
        actual: u64,
    },

    /// The SHA-256 of a downloaded file differs from the catalogued checksum
    #[error("incorrect sha256 for {path}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Cached file that was verified
        path: PathBuf,
        /// Checksum recorded in the catalog
        expected: String,
        /// Checksum computed from the file
        actual: String,
    },

    /// The server reported "not modified" but the cached file is gone
    #[error("the download cache is missing an expected file: {path}")]
    CacheInconsistent {
        /// Path the cached file should be at
        path: PathBuf,
    },

    /// The archive extension is not one of the supported formats
    #[error("unknown archive file extension: {0}")]
    UnknownArchiveFormat(PathBuf),

    /// The member filter pattern could not be compiled
    #[error("invalid pattern \"{pattern}\": {reason}")]
    InvalidPattern {
        /// Pattern as given by the caller
        pattern: String,
        /// Why the pattern was rejected
        reason: String,
    },

    /// Reading or writing an archive member failed
    #[error("extraction failed for {archive}: {reason}")]
    Extraction {
        /// Archive being extracted
        archive: PathBuf,
        /// The reason extraction failed
        reason: String,
    },

    /// All members were excluded by filters and the caller asked for that to fail
    #[error("no files were extracted from {archive}")]
    ExtractionEmpty {
        /// Archive that yielded nothing
        archive: PathBuf,
    },

    /// Host platform detection failed
    #[error("{0}")]
    Platform(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to create or rebuild the schema
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),
}

/// Map errors to process exit codes for embedding binaries
///
/// Every fatal condition exits non-zero; the code distinguishes broad classes
/// so calling scripts can tell "nothing matched" apart from "network down".
pub trait ToExitCode {
    /// Process exit code for this error
    fn exit_code(&self) -> i32;

    /// Machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToExitCode for Error {
    fn exit_code(&self) -> i32 {
        match self {
            // Bad input or configuration
            Error::Config { .. } => 2,
            Error::InvalidPattern { .. } => 2,
            Error::UnknownComponent(_) => 2,
            Error::Platform(_) => 2,

            // Catalog problems
            Error::ManifestParse(_) => 3,
            Error::MissingTargets(_) => 3,
            Error::InvalidVersion(_) => 3,
            Error::LookupMiss { .. } => 4,

            // Transfer problems
            Error::Network(_) => 5,
            Error::Http { .. } => 5,
            Error::SizeMismatch { .. } => 5,
            Error::ChecksumMismatch { .. } => 5,
            Error::CacheInconsistent { .. } => 5,

            // Extraction problems
            Error::UnknownArchiveFormat(_) => 6,
            Error::Extraction { .. } => 6,
            Error::ExtractionEmpty { .. } => 1,

            // Everything else
            Error::Database(_) => 1,
            Error::Sqlx(_) => 1,
            Error::Io(_) => 1,
            Error::Serialization(_) => 1,
            Error::Other(_) => 1,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Database(_) => "database_error",
            Error::Sqlx(_) => "database_error",
            Error::Io(_) => "io_error",
            Error::Network(_) => "network_error",
            Error::Serialization(_) => "serialization_error",
            Error::ManifestParse(_) => "manifest_parse_error",
            Error::MissingTargets(_) => "missing_targets",
            Error::InvalidVersion(_) => "invalid_version",
            Error::LookupMiss { .. } => "lookup_miss",
            Error::UnknownComponent(_) => "unknown_component",
            Error::Http { .. } => "http_error",
            Error::SizeMismatch { .. } => "size_mismatch",
            Error::ChecksumMismatch { .. } => "checksum_mismatch",
            Error::CacheInconsistent { .. } => "cache_inconsistent",
            Error::UnknownArchiveFormat(_) => "unknown_archive_format",
            Error::InvalidPattern { .. } => "invalid_pattern",
            Error::Extraction { .. } => "extraction_failed",
            Error::ExtractionEmpty { .. } => "extraction_empty",
            Error::Platform(_) => "platform_error",
            Error::Other(_) => "internal_error",
        }
    }
}
