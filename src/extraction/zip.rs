use crate::error::{Error, Result};
use std::fs::File;
use std::path::{Path, PathBuf};

use super::{ArchiveMember, MemberSource};

/// Members of a `.zip` archive
pub struct ZipSource {
    archive: zip::ZipArchive<File>,
    path: PathBuf,
}

impl ZipSource {
    /// Open a zip archive for reading
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let archive = zip::ZipArchive::new(file).map_err(|e| Error::Extraction {
            archive: path.to_path_buf(),
            reason: format!("failed to open ZIP archive: {}", e),
        })?;
        Ok(Self {
            archive,
            path: path.to_path_buf(),
        })
    }
}

impl MemberSource for ZipSource {
    fn visit_members(
        self: Box<Self>,
        visitor: &mut dyn FnMut(ArchiveMember<'_>) -> Result<()>,
    ) -> Result<()> {
        let Self { mut archive, path } = *self;
        for index in 0..archive.len() {
            let mut file = archive.by_index(index).map_err(|e| Error::Extraction {
                archive: path.clone(),
                reason: format!("failed to read ZIP entry {}: {}", index, e),
            })?;

            let name = file.name().to_string();
            let is_dir = name.ends_with('/');
            // Archives built off unix carry no permission bits
            let mode = file.unix_mode().map(|m| m & 0o7777).unwrap_or(0o777);

            visitor(ArchiveMember {
                path: &name,
                is_dir,
                mode,
                reader: &mut file,
            })?;
        }
        Ok(())
    }
}
