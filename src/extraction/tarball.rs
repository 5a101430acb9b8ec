use crate::error::{Error, Result};
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::warn;

use super::{ArchiveMember, MemberSource};

/// Members of a gzip-compressed tar archive (`.tgz` / `.tar.gz`)
pub struct TarGzSource {
    archive: tar::Archive<GzDecoder<BufReader<File>>>,
    path: PathBuf,
}

impl TarGzSource {
    /// Open a compressed tarball for reading
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            archive: tar::Archive::new(GzDecoder::new(BufReader::new(file))),
            path: path.to_path_buf(),
        })
    }
}

impl MemberSource for TarGzSource {
    fn visit_members(
        self: Box<Self>,
        visitor: &mut dyn FnMut(ArchiveMember<'_>) -> Result<()>,
    ) -> Result<()> {
        let Self { mut archive, path } = *self;
        let entries = archive.entries().map_err(|e| Error::Extraction {
            archive: path.clone(),
            reason: format!("failed to read tar entries: {}", e),
        })?;

        for entry in entries {
            let mut entry = entry.map_err(|e| Error::Extraction {
                archive: path.clone(),
                reason: format!("failed to read tar entry: {}", e),
            })?;

            // Raw bytes keep the '/' separators of long (GNU/PAX) names intact
            let name = String::from_utf8_lossy(&entry.path_bytes()).into_owned();
            let header = entry.header();
            let kind = header.entry_type();
            let mode = header.mode().unwrap_or(0o644) & 0o7777;

            if !kind.is_file() && !kind.is_dir() {
                warn!(member = %name, "skipping non-regular tar member");
                continue;
            }

            visitor(ArchiveMember {
                path: &name,
                is_dir: kind.is_dir(),
                mode,
                reader: &mut entry,
            })?;
        }
        Ok(())
    }
}
