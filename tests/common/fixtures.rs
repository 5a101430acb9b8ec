//! Release fixtures served by the mock download server

use flate2::Compression;
use flate2::write::GzEncoder;
use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use std::io::Write;

pub const ARCHIVE_ROOT: &str = "mongodb-linux-x86_64-enterprise-rhel80-6.0.6";
pub const ARCHIVE_PATH: &str = "/linux/mongodb-linux-x86_64-enterprise-rhel80-6.0.6.tgz";
pub const WINDOWS_ARCHIVE_PATH: &str = "/windows/mongodb-windows-x86_64-enterprise-6.0.6.zip";

/// The rhel80 server tarball, with a directory entry for `bin/`
pub fn server_tarball() -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));

    let mut dir = tar::Header::new_gnu();
    dir.set_entry_type(tar::EntryType::Directory);
    dir.set_mode(0o755);
    dir.set_size(0);
    dir.set_path(format!("{ARCHIVE_ROOT}/bin/")).unwrap();
    dir.set_cksum();
    builder.append(&dir, std::io::empty()).unwrap();

    for (name, content, mode) in [
        ("bin/mongod", &b"#!/bin/sh\necho mongod\n"[..], 0o555),
        ("bin/mongos", &b"#!/bin/sh\necho mongos\n"[..], 0o555),
        ("README", &b"readme"[..], 0o444),
    ] {
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Regular);
        header.set_mode(mode);
        header.set_size(content.len() as u64);
        header.set_path(format!("{ARCHIVE_ROOT}/{name}")).unwrap();
        header.set_cksum();
        builder.append(&header, content).unwrap();
    }

    builder.into_inner().unwrap().finish().unwrap()
}

/// The Windows server zip
pub fn windows_zip() -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = zip::write::FileOptions::default();
    for (name, content) in [
        ("mongodb-win32-x86_64-windows-6.0.6/bin/mongod.exe", &b"MZ mongod"[..]),
        ("mongodb-win32-x86_64-windows-6.0.6/bin/mongod.pdb", &b"pdb"[..]),
        ("mongodb-win32-x86_64-windows-6.0.6/LICENSE-Enterprise.txt", &b"license"[..]),
    ] {
        writer.start_file(name, options).unwrap();
        writer.write_all(content).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// A two-release manifest whose URLs point at `base`
pub fn manifest(base: &str) -> Value {
    json!({
        "versions": [
            {
                "version": "7.0.0-rc1",
                "date": "2023-06-01",
                "githash": "c3",
                "downloads": [
                    {
                        "target": "rhel80",
                        "arch": "x86_64",
                        "edition": "enterprise",
                        "archive": {
                            "url": format!("{base}/linux/mongodb-linux-x86_64-enterprise-rhel80-7.0.0-rc1.tgz"),
                            "sha256": "11"
                        }
                    }
                ]
            },
            {
                "version": "6.0.6",
                "date": "2023-05-10",
                "githash": "26b4851a412cc8b9b4a18cdb6cd0f9f642e06aa7",
                "downloads": [
                    {
                        "target": "rhel80",
                        "arch": "x86_64",
                        "edition": "enterprise",
                        "archive": {
                            "url": format!("{base}{ARCHIVE_PATH}"),
                            "sha256": sha256_hex(&server_tarball())
                        }
                    },
                    {
                        "target": "windows",
                        "arch": "x86_64",
                        "edition": "enterprise",
                        "archive": {
                            "url": format!("{base}{WINDOWS_ARCHIVE_PATH}"),
                            "sha256": sha256_hex(&windows_zip())
                        }
                    }
                ]
            },
            {
                "version": "6.0.5",
                "date": "2023-03-08",
                "githash": "c9a99c120371d4d4c52cbb15dac34a36ce8d3b1d",
                "downloads": [
                    {
                        "target": "rhel80",
                        "arch": "x86_64",
                        "edition": "enterprise",
                        "archive": {
                            "url": format!("{base}/linux/mongodb-linux-x86_64-enterprise-rhel80-6.0.5.tgz"),
                            "sha256": "22"
                        }
                    }
                ]
            }
        ]
    })
}
