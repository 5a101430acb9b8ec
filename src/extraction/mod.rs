//! Archive extraction with member filtering
//!
//! This module expands `.zip` and `.tgz` / `.tar.gz` archives into a destination
//! directory. Members can be filtered with a `/`-separated glob pattern (see
//! [`MemberPattern`]) and have leading path components stripped.
//!
//! Extraction is idempotent: files are overwritten in place, so expanding the
//! same archive twice leaves the same tree.

mod filter;
mod tarball;
mod zip;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

// Re-exports
pub use self::zip::ZipSource;
pub use filter::{MemberPattern, path_segments};
pub use tarball::TarGzSource;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tokio::task::spawn_blocking;
use tracing::{debug, info, warn};

/// Supported archive containers
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArchiveFormat {
    /// `.zip`
    Zip,
    /// `.tgz` or `.tar.gz`
    TarGz,
}

impl ArchiveFormat {
    /// Detect the archive format from the file name
    ///
    /// # Errors
    /// [`Error::UnknownArchiveFormat`] for any other extension.
    pub fn detect(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();

        if name.ends_with(".zip") {
            Ok(Self::Zip)
        } else if name.ends_with(".tgz") || name.ends_with(".tar.gz") {
            Ok(Self::TarGz)
        } else {
            Err(Error::UnknownArchiveFormat(path.to_path_buf()))
        }
    }

    /// Open `path` as a member source of this format
    pub fn open(self, path: &Path) -> Result<Box<dyn MemberSource>> {
        Ok(match self {
            Self::Zip => Box::new(ZipSource::open(path)?),
            Self::TarGz => Box::new(TarGzSource::open(path)?),
        })
    }
}

/// One entry of an archive, handed to the extraction visitor
pub struct ArchiveMember<'a> {
    /// Member name as recorded in the archive
    pub path: &'a str,
    /// Whether the member is a directory
    pub is_dir: bool,
    /// Unix permission bits
    pub mode: u32,
    /// Member content, read lazily
    pub reader: &'a mut dyn Read,
}

/// Something that can enumerate archive members in order
///
/// Sources are single-pass: visiting consumes the source.
pub trait MemberSource: Send {
    /// Call `visitor` once per member, stopping at the first error
    fn visit_members(
        self: Box<Self>,
        visitor: &mut dyn FnMut(ArchiveMember<'_>) -> Result<()>,
    ) -> Result<()>;
}

/// Filtering and destination options for one extraction
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ExtractOptions {
    /// Only extract members whose path matches this pattern
    #[serde(default)]
    pub pattern: Option<String>,

    /// Number of leading path components to drop from each member
    #[serde(default)]
    pub strip_components: usize,

    /// Count matching members without touching the filesystem
    #[serde(default)]
    pub dry_run: bool,
}

impl ExtractOptions {
    fn pattern(&self) -> Option<&str> {
        self.pattern.as_deref().filter(|p| !p.is_empty())
    }
}

/// Extract an archive on the blocking thread pool
///
/// Returns the number of members that passed the filters (directories
/// included). A zero count is logged as a warning, not returned as an error.
///
/// # Example
/// ```no_run
/// use mongodl::extraction::{extract_archive, ExtractOptions};
/// use std::path::Path;
///
/// # async fn example() -> mongodl::Result<()> {
/// let options = ExtractOptions {
///     pattern: Some("*/bin/**".to_string()),
///     strip_components: 1,
///     dry_run: false,
/// };
/// let count = extract_archive(
///     Path::new("mongodb-linux-x86_64-rhel80-6.0.6.tgz"),
///     Path::new("/opt/mongodb"),
///     &options,
/// )
/// .await?;
/// println!("{count} members extracted");
/// # Ok(())
/// # }
/// ```
pub async fn extract_archive(
    archive_path: &Path,
    dest_path: &Path,
    options: &ExtractOptions,
) -> Result<usize> {
    let archive_owned = archive_path.to_path_buf();
    let dest_owned = dest_path.to_path_buf();
    let options_owned = options.clone();

    // Keep logging on whichever subscriber the caller is running under
    let dispatch = tracing::dispatcher::get_default(|d| d.clone());

    spawn_blocking(move || {
        tracing::dispatcher::with_default(&dispatch, || {
            extract_blocking(&archive_owned, &dest_owned, &options_owned)
        })
    })
    .await
    .map_err(|e| Error::Extraction {
        archive: archive_path.to_path_buf(),
        reason: format!("extraction task panicked: {}", e),
    })?
}

/// Synchronous form of [`extract_archive`]
pub fn extract_blocking(
    archive_path: &Path,
    dest_path: &Path,
    options: &ExtractOptions,
) -> Result<usize> {
    let pattern = options.pattern().map(MemberPattern::new).transpose()?;
    let format = ArchiveFormat::detect(archive_path)?;

    debug!(archive = ?archive_path, dest = ?dest_path, ?format, "extracting archive");

    let source = format.open(archive_path)?;
    let count = extract_members(
        source,
        archive_path,
        dest_path,
        pattern.as_ref(),
        options.strip_components,
        options.dry_run,
    )?;

    report_count(count, options);
    Ok(count)
}

/// Apply the filters to every member of `source`, writing survivors under `dest_path`
pub fn extract_members(
    source: Box<dyn MemberSource>,
    archive_path: &Path,
    dest_path: &Path,
    pattern: Option<&MemberPattern>,
    strip_components: usize,
    dry_run: bool,
) -> Result<usize> {
    let mut count = 0usize;

    source.visit_members(&mut |member: ArchiveMember<'_>| -> Result<()> {
        let segments = path_segments(member.path);

        if segments.contains(&"..") {
            warn!(member = member.path, "skipping member that escapes the destination");
            return Ok(());
        }
        if segments.len() <= strip_components {
            debug!(member = member.path, "excluded by strip count");
            return Ok(());
        }
        if let Some(pattern) = pattern
            && !pattern.matches_segments(&segments)
        {
            debug!(member = member.path, "excluded by pattern");
            return Ok(());
        }

        count += 1;
        let target = stripped_destination(dest_path, &segments[strip_components..]);
        debug!(member = member.path, dest = ?target, "extracting member");

        if dry_run {
            return Ok(());
        }
        if member.is_dir {
            fs::create_dir_all(&target)?;
            return Ok(());
        }
        write_member(&target, member.reader, member.mode).map_err(|e| Error::Extraction {
            archive: archive_path.to_path_buf(),
            reason: format!("failed to extract {}: {}", member.path, e),
        })
    })?;

    Ok(count)
}

fn stripped_destination(dest_path: &Path, segments: &[&str]) -> PathBuf {
    segments
        .iter()
        .fold(dest_path.to_path_buf(), |acc, segment| acc.join(segment))
}

fn write_member(target: &Path, reader: &mut dyn Read, mode: u32) -> io::Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut out = fs::File::create(target)?;
    io::copy(reader, &mut out)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(target, fs::Permissions::from_mode(mode | 0o200))?;
    }
    #[cfg(not(unix))]
    let _ = mode;

    Ok(())
}

/// Warning text for an extraction that produced nothing
pub fn empty_extraction_note(
    pattern: Option<&str>,
    strip_components: usize,
    dry_run: bool,
) -> String {
    let verb = if dry_run { "would be" } else { "were" };
    let pattern = pattern.filter(|p| !p.is_empty());
    match (pattern, strip_components) {
        (Some(pattern), n) if n > 0 => format!(
            "NOTE: No files {verb} extracted. Likely all files {verb} excluded by \
             pattern \"{pattern}\" and/or stripping {n} path component(s)"
        ),
        (Some(pattern), _) => format!(
            "NOTE: No files {verb} extracted. Likely all files {verb} excluded by \
             the \"{pattern}\" pattern"
        ),
        (None, n) if n > 0 => format!(
            "NOTE: No files {verb} extracted. Likely all files {verb} excluded by \
             stripping {n} path component(s)"
        ),
        (None, _) => format!("NOTE: No files {verb} extracted. Empty archive?"),
    }
}

fn report_count(count: usize, options: &ExtractOptions) {
    let verb = if options.dry_run { "would be" } else { "were" };
    match count {
        0 => warn!(
            "{}",
            empty_extraction_note(options.pattern(), options.strip_components, options.dry_run)
        ),
        1 => info!("One file {} extracted", verb),
        n => info!("{} files {} extracted", n, verb),
    }
}
