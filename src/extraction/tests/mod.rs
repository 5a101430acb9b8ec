use crate::error::{Error, Result};
use crate::extraction::*;
use flate2::Compression;
use flate2::write::GzEncoder;
use std::io::Write;
use std::path::Path;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Entries written into test archives; names ending in '/' are directories
const WINDOWS_LAYOUT: &[(&str, &[u8])] = &[
    ("bin/", b""),
    ("bin/mongod.exe", b"mongod"),
    ("bin/mongo.exe", b"mongo"),
    ("LICENSE-Community.txt", b"license"),
];

const LINUX_LAYOUT: &[(&str, &[u8])] = &[
    ("mongodb-linux-x86_64-rhel80-6.0.6/", b""),
    ("mongodb-linux-x86_64-rhel80-6.0.6/bin/", b""),
    ("mongodb-linux-x86_64-rhel80-6.0.6/bin/mongod", b"#!mongod"),
    ("mongodb-linux-x86_64-rhel80-6.0.6/bin/mongos", b"#!mongos"),
    ("mongodb-linux-x86_64-rhel80-6.0.6/README", b"readme"),
];

fn create_zip(path: &Path, entries: &[(&str, &[u8])]) {
    let file = std::fs::File::create(path).unwrap();
    let mut writer = ::zip::ZipWriter::new(file);
    let options = ::zip::write::FileOptions::default()
        .compression_method(::zip::CompressionMethod::Stored)
        .unix_permissions(0o755);
    for (name, content) in entries {
        if let Some(dir) = name.strip_suffix('/') {
            writer.add_directory(dir, options).unwrap();
        } else {
            writer.start_file(*name, options).unwrap();
            writer.write_all(content).unwrap();
        }
    }
    writer.finish().unwrap();
}

fn create_tgz(path: &Path, entries: &[(&str, &[u8])], file_mode: u32) {
    let file = std::fs::File::create(path).unwrap();
    let mut builder = ::tar::Builder::new(GzEncoder::new(file, Compression::default()));
    for (name, content) in entries {
        let mut header = ::tar::Header::new_gnu();
        if name.ends_with('/') {
            header.set_entry_type(::tar::EntryType::Directory);
            header.set_mode(0o755);
            header.set_size(0);
        } else {
            header.set_entry_type(::tar::EntryType::Regular);
            header.set_mode(file_mode);
            header.set_size(content.len() as u64);
        }
        header.set_path(name).unwrap();
        header.set_cksum();
        builder.append(&header, *content).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap();
}

fn options(pattern: Option<&str>, strip_components: usize, dry_run: bool) -> ExtractOptions {
    ExtractOptions {
        pattern: pattern.map(str::to_string),
        strip_components,
        dry_run,
    }
}

/// Recursively list regular files under `root` as sorted '/'-joined relative paths
fn list_files(root: &Path) -> Vec<String> {
    fn walk(root: &Path, dir: &Path, out: &mut Vec<String>) {
        for entry in std::fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                walk(root, &path, out);
            } else {
                let rel = path.strip_prefix(root).unwrap();
                let parts: Vec<String> = rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                out.push(parts.join("/"));
            }
        }
    }
    let mut out = Vec::new();
    if root.exists() {
        walk(root, root, &mut out);
    }
    out.sort();
    out
}

/// In-memory member source for exercising the filter engine directly
struct FakeSource(Vec<(String, bool, Vec<u8>)>);

impl MemberSource for FakeSource {
    fn visit_members(
        self: Box<Self>,
        visitor: &mut dyn FnMut(ArchiveMember<'_>) -> Result<()>,
    ) -> Result<()> {
        for (path, is_dir, content) in self.0 {
            let mut reader = content.as_slice();
            visitor(ArchiveMember {
                path: &path,
                is_dir,
                mode: 0o644,
                reader: &mut reader,
            })?;
        }
        Ok(())
    }
}

fn fake(entries: &[&str]) -> Box<dyn MemberSource> {
    Box::new(FakeSource(
        entries
            .iter()
            .map(|p| (p.to_string(), p.ends_with('/'), p.as_bytes().to_vec()))
            .collect(),
    ))
}

// ---------------------------------------------------------------------------
// Format detection
// ---------------------------------------------------------------------------

#[test]
fn test_detect_archive_format() {
    assert_eq!(
        ArchiveFormat::detect(Path::new("/cache/ab12/mongodb-windows.zip")).unwrap(),
        ArchiveFormat::Zip
    );
    assert_eq!(
        ArchiveFormat::detect(Path::new("mongodb-linux-x86_64-rhel80-6.0.6.tgz")).unwrap(),
        ArchiveFormat::TarGz
    );
    assert_eq!(
        ArchiveFormat::detect(Path::new("mongosh-2.0.0-linux-x64.tar.gz")).unwrap(),
        ArchiveFormat::TarGz
    );
    assert!(matches!(
        ArchiveFormat::detect(Path::new("mongodb-macos.dmg")),
        Err(Error::UnknownArchiveFormat(_))
    ));
    assert!(matches!(
        ArchiveFormat::detect(Path::new("archive.gz")),
        Err(Error::UnknownArchiveFormat(_))
    ));
}

#[tokio::test]
async fn test_unknown_extension_is_rejected_before_reading() {
    let dir = TempDir::new().unwrap();
    let archive = dir.path().join("mongodb.msi");
    std::fs::write(&archive, b"not an archive").unwrap();

    let result = extract_archive(&archive, &dir.path().join("out"), &options(None, 0, false)).await;
    assert!(matches!(result, Err(Error::UnknownArchiveFormat(_))));
}

// ---------------------------------------------------------------------------
// Zip
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_zip_strip_one_component() {
    let dir = TempDir::new().unwrap();
    let archive = dir.path().join("mongodb-windows.zip");
    create_zip(&archive, WINDOWS_LAYOUT);
    let dest = dir.path().join("out");

    let count = extract_archive(&archive, &dest, &options(Some("bin/**"), 1, false))
        .await
        .unwrap();

    assert_eq!(count, 2);
    assert_eq!(list_files(&dest), vec!["mongo.exe", "mongod.exe"]);
    assert_eq!(std::fs::read(dest.join("mongod.exe")).unwrap(), b"mongod");
}

#[tokio::test]
async fn test_zip_strip_beyond_depth_excludes_everything() {
    let dir = TempDir::new().unwrap();
    let archive = dir.path().join("mongodb-windows.zip");
    create_zip(&archive, WINDOWS_LAYOUT);
    let dest = dir.path().join("out");

    let count = extract_archive(&archive, &dest, &options(None, 2, false))
        .await
        .unwrap();

    assert_eq!(count, 0);
    assert!(list_files(&dest).is_empty());
}

#[tokio::test]
async fn test_zip_without_filters_counts_directories() {
    let dir = TempDir::new().unwrap();
    let archive = dir.path().join("mongodb-windows.zip");
    create_zip(&archive, WINDOWS_LAYOUT);
    let dest = dir.path().join("out");

    let count = extract_archive(&archive, &dest, &options(None, 0, false))
        .await
        .unwrap();

    assert_eq!(count, 4);
    assert_eq!(
        list_files(&dest),
        vec!["LICENSE-Community.txt", "bin/mongo.exe", "bin/mongod.exe"]
    );
}

#[tokio::test]
async fn test_zip_top_level_glob() {
    let dir = TempDir::new().unwrap();
    let archive = dir.path().join("mongodb-windows.zip");
    create_zip(&archive, WINDOWS_LAYOUT);
    let dest = dir.path().join("out");

    // "*.txt" does not descend into bin/
    let count = extract_archive(&archive, &dest, &options(Some("*.txt"), 0, false))
        .await
        .unwrap();
    assert_eq!(count, 1);
    assert_eq!(list_files(&dest), vec!["LICENSE-Community.txt"]);
}

// ---------------------------------------------------------------------------
// Tarball
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_tgz_pattern_and_strip() {
    let dir = TempDir::new().unwrap();
    let archive = dir.path().join("mongodb-linux-x86_64-rhel80-6.0.6.tgz");
    create_tgz(&archive, LINUX_LAYOUT, 0o555);
    let dest = dir.path().join("out");

    let count = extract_archive(&archive, &dest, &options(Some("*/bin/**"), 2, false))
        .await
        .unwrap();

    assert_eq!(count, 2);
    assert_eq!(list_files(&dest), vec!["mongod", "mongos"]);
    assert_eq!(std::fs::read(dest.join("mongos")).unwrap(), b"#!mongos");
}

#[cfg(unix)]
#[tokio::test]
async fn test_tgz_modes_are_kept_and_owner_writable() {
    use std::os::unix::fs::PermissionsExt;

    let dir = TempDir::new().unwrap();
    let archive = dir.path().join("mongodb.tar.gz");
    create_tgz(&archive, LINUX_LAYOUT, 0o555);
    let dest = dir.path().join("out");

    extract_archive(&archive, &dest, &options(None, 1, false))
        .await
        .unwrap();

    let mode = std::fs::metadata(dest.join("bin/mongod"))
        .unwrap()
        .permissions()
        .mode();
    assert_eq!(mode & 0o777, 0o755);
}

#[tokio::test]
async fn test_extraction_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let archive = dir.path().join("mongodb.tgz");
    create_tgz(&archive, LINUX_LAYOUT, 0o444);
    let dest = dir.path().join("out");
    let opts = options(None, 1, false);

    let first = extract_archive(&archive, &dest, &opts).await.unwrap();
    let files_after_first = list_files(&dest);
    // Files from the first run are read-only in the archive but writable on disk
    let second = extract_archive(&archive, &dest, &opts).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(list_files(&dest), files_after_first);
    assert_eq!(std::fs::read(dest.join("README")).unwrap(), b"readme");
}

#[tokio::test]
async fn test_dry_run_counts_without_writing() {
    let dir = TempDir::new().unwrap();
    let archive = dir.path().join("mongodb.tgz");
    create_tgz(&archive, LINUX_LAYOUT, 0o755);
    let dest = dir.path().join("out");

    let dry = extract_archive(&archive, &dest, &options(Some("*/bin/**"), 1, true))
        .await
        .unwrap();
    assert_eq!(dry, 2);
    assert!(!dest.exists());

    let real = extract_archive(&archive, &dest, &options(Some("*/bin/**"), 1, false))
        .await
        .unwrap();
    assert_eq!(real, dry);
}

#[tokio::test]
async fn test_corrupt_tarball_is_an_extraction_error() {
    let dir = TempDir::new().unwrap();
    let archive = dir.path().join("broken.tgz");
    std::fs::write(&archive, b"definitely not gzip").unwrap();

    let result = extract_archive(&archive, &dir.path().join("out"), &options(None, 0, false)).await;
    assert!(matches!(result, Err(Error::Extraction { .. })));
}

#[tokio::test]
async fn test_invalid_pattern_fails_fast() {
    let dir = TempDir::new().unwrap();
    let archive = dir.path().join("mongodb.tgz");
    create_tgz(&archive, LINUX_LAYOUT, 0o755);

    let result = extract_archive(
        &archive,
        &dir.path().join("out"),
        &options(Some("bin/[mongod"), 0, false),
    )
    .await;
    assert!(matches!(result, Err(Error::InvalidPattern { .. })));
}

// ---------------------------------------------------------------------------
// Filter engine
// ---------------------------------------------------------------------------

#[test]
fn test_parent_segments_are_skipped() {
    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("out");

    let count = extract_members(
        fake(&["../escape.txt", "ok/../../escape.txt", "ok/file.txt"]),
        Path::new("fake.zip"),
        &dest,
        None,
        0,
        false,
    )
    .unwrap();

    assert_eq!(count, 1);
    assert_eq!(list_files(&dest), vec!["ok/file.txt"]);
    assert!(!dir.path().join("escape.txt").exists());
}

#[test]
fn test_dot_and_empty_segments_do_not_count_toward_strip() {
    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("out");

    let count = extract_members(
        fake(&["./pkg//bin/tool", "./"]),
        Path::new("fake.tgz"),
        &dest,
        None,
        2,
        false,
    )
    .unwrap();

    assert_eq!(count, 1);
    assert_eq!(list_files(&dest), vec!["tool"]);
}

#[test]
fn test_pattern_sees_unstripped_path() {
    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("out");
    let pattern = MemberPattern::new("pkg/bin/*").unwrap();

    let count = extract_members(
        fake(&["pkg/bin/a", "pkg/lib/b", "other/bin/c"]),
        Path::new("fake.zip"),
        &dest,
        Some(&pattern),
        1,
        false,
    )
    .unwrap();

    assert_eq!(count, 1);
    assert_eq!(list_files(&dest), vec!["bin/a"]);
}

// ---------------------------------------------------------------------------
// Reporting
// ---------------------------------------------------------------------------

#[test]
fn test_empty_extraction_note_wording() {
    assert_eq!(
        empty_extraction_note(None, 0, false),
        "NOTE: No files were extracted. Empty archive?"
    );
    assert_eq!(
        empty_extraction_note(Some(""), 0, true),
        "NOTE: No files would be extracted. Empty archive?"
    );

    let both = empty_extraction_note(Some("bin/*"), 2, false);
    assert!(both.contains("\"bin/*\""));
    assert!(both.contains("and/or stripping 2"));

    let pattern_only = empty_extraction_note(Some("bin/*"), 0, true);
    assert!(pattern_only.starts_with("NOTE: No files would be extracted."));
    assert!(pattern_only.ends_with("the \"bin/*\" pattern"));

    let strip_only = empty_extraction_note(None, 3, false);
    assert!(strip_only.ends_with("stripping 3 path component(s)"));
}
