//! Utility functions for cache paths and checksum verification

use crate::error::{Error, Result};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;

/// Number of hex characters of the URL digest used as the shard directory
const SHARD_LEN: usize = 4;

/// Read buffer size for hashing files
const HASH_CHUNK: usize = 64 * 1024;

/// Short shard name derived from the SHA-256 of the URL text
pub fn url_fingerprint(url: &str) -> String {
    let mut hex = format!("{:x}", Sha256::digest(url.as_bytes()));
    hex.truncate(SHARD_LEN);
    hex
}

/// Final path segment of a URL, used as the cached file name
pub fn url_basename(url: &str) -> Result<String> {
    let parsed = url::Url::parse(url)
        .map_err(|e| Error::Other(format!("invalid URL {url}: {e}")))?;
    parsed
        .path_segments()
        .and_then(|mut segments| segments.rfind(|s| !s.is_empty()))
        .map(str::to_string)
        .ok_or_else(|| Error::Other(format!("cannot derive a file name from URL {url}")))
}

/// Location of the cached copy of `url` under `files_dir`
pub fn cache_path_for(files_dir: &Path, url: &str) -> Result<PathBuf> {
    Ok(files_dir.join(url_fingerprint(url)).join(url_basename(url)?))
}

/// Compute the lowercase hex SHA-256 of a file
pub async fn sha256_file(path: &Path) -> Result<String> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; HASH_CHUNK];
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Fail with [`Error::ChecksumMismatch`] unless the file hashes to `expected`
pub async fn verify_sha256(path: &Path, expected: &str) -> Result<()> {
    let actual = sha256_file(path).await?;
    if actual.eq_ignore_ascii_case(expected) {
        tracing::debug!(path = %path.display(), "checksum verified");
        Ok(())
    } else {
        Err(Error::ChecksumMismatch {
            path: path.to_path_buf(),
            expected: expected.to_string(),
            actual,
        })
    }
}
