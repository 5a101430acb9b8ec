//! Shared test helpers for creating Downloader instances in tests.

use crate::config::Config;
use crate::downloader::Downloader;
use crate::retry::Sleeper;
use async_trait::async_trait;
use flate2::Compression;
use flate2::write::GzEncoder;
use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::{TempDir, tempdir};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Primary-output sink that tests can read back
#[derive(Clone, Default)]
pub(crate) struct SharedOutput(Arc<Mutex<Vec<u8>>>);

impl SharedOutput {
    pub(crate) fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }

    pub(crate) fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }
}

impl Write for SharedOutput {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Sleeper that records requested delays and returns immediately
#[derive(Default)]
pub(crate) struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub(crate) fn delays(&self) -> Vec<Duration> {
        self.delays.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, delay: Duration) {
        self.delays.lock().unwrap().push(delay);
    }
}

/// Everything a downloader test needs; keep it alive for the test's duration
pub(crate) struct TestContext {
    pub(crate) downloader: Downloader,
    pub(crate) output: SharedOutput,
    pub(crate) sleeper: Arc<RecordingSleeper>,
    pub(crate) server: MockServer,
    pub(crate) temp_dir: TempDir,
}

impl TestContext {
    pub(crate) fn uri(&self) -> String {
        self.server.uri()
    }

    pub(crate) fn out_dir(&self) -> std::path::PathBuf {
        self.temp_dir.path().join("out")
    }
}

/// Helper to create a test Downloader whose every remote endpoint is a mock server.
pub(crate) async fn create_test_downloader() -> TestContext {
    create_test_downloader_with(|_| {}).await
}

/// Same as [`create_test_downloader`], with a hook to adjust the config first
pub(crate) async fn create_test_downloader_with(adjust: impl FnOnce(&mut Config)) -> TestContext {
    let temp_dir = tempdir().unwrap();
    let server = MockServer::start().await;

    let mut config = Config::with_cache_dir(temp_dir.path().join("cache"));
    config.manifest_url = format!("{}/full.json", server.uri());
    config.latest_build_base_url = server.uri();
    config.mongosh_base_url = format!("{}/compass", server.uri());
    config.validate_distros = false;
    adjust(&mut config);

    let output = SharedOutput::default();
    let sleeper = Arc::new(RecordingSleeper::default());
    let downloader = Downloader::new(config)
        .await
        .unwrap()
        .with_output(output.clone())
        .with_sleeper(sleeper.clone());

    TestContext {
        downloader,
        output,
        sleeper,
        server,
        temp_dir,
    }
}

/// Gzip-compressed tarball with the given regular files (directories implied)
pub(crate) fn tgz_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut builder = ::tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    for (name, content) in entries {
        let mut header = ::tar::Header::new_gnu();
        header.set_entry_type(::tar::EntryType::Regular);
        header.set_mode(0o755);
        header.set_size(content.len() as u64);
        header.set_path(name).unwrap();
        header.set_cksum();
        builder.append(&header, *content).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

/// Zip archive with the given files
pub(crate) fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ::zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = ::zip::write::FileOptions::default()
        .compression_method(::zip::CompressionMethod::Stored);
    for (name, content) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(content).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

pub(crate) fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Server archive for rhel80 6.0.6, laid out like a real release
pub(crate) fn server_archive() -> Vec<u8> {
    tgz_bytes(&[
        ("mongodb-linux-x86_64-enterprise-rhel80-6.0.6/bin/mongod", b"mongod 6.0.6"),
        ("mongodb-linux-x86_64-enterprise-rhel80-6.0.6/bin/mongos", b"mongos 6.0.6"),
        ("mongodb-linux-x86_64-enterprise-rhel80-6.0.6/LICENSE-Enterprise.txt", b"license"),
    ])
}

pub(crate) const SERVER_ARCHIVE_PATH: &str =
    "/linux/mongodb-linux-x86_64-enterprise-rhel80-6.0.6.tgz";

/// A manifest whose URLs all point at `base`
///
/// - 6.0.6: rhel80 (archive with debug symbols, crypt_shared)
/// - 7.0.2: rhel93 (archive, crypt_shared), macos (archive, crypt_shared)
/// - 5.0.3: osx (archive only)
pub(crate) fn manifest_json(base: &str, server_sha: &str) -> Value {
    json!({
        "versions": [
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
                            "url": format!("{base}{SERVER_ARCHIVE_PATH}"),
                            "sha256": server_sha,
                            "debug_symbols": format!("{base}/linux/mongodb-linux-x86_64-enterprise-rhel80-debugsymbols-6.0.6.tgz")
                        },
                        "crypt_shared": {
                            "url": format!("{base}/linux/mongo_crypt_shared_v1-linux-x86_64-enterprise-rhel80-6.0.6.tgz"),
                            "sha256": "00"
                        }
                    }
                ]
            },
            {
                "version": "7.0.2",
                "date": "2023-10-02",
                "githash": "02b3c655e1302209ef046da6ba3ef6749dd0b62a",
                "downloads": [
                    {
                        "target": "rhel93",
                        "arch": "x86_64",
                        "edition": "enterprise",
                        "archive": {
                            "url": format!("{base}/linux/mongodb-linux-x86_64-enterprise-rhel93-7.0.2.tgz"),
                            "sha256": "aa"
                        },
                        "crypt_shared": {
                            "url": format!("{base}/linux/mongo_crypt_shared_v1-linux-x86_64-enterprise-rhel93-7.0.2.tgz"),
                            "sha256": "bb"
                        }
                    },
                    {
                        "target": "macos",
                        "arch": "x86_64",
                        "edition": "enterprise",
                        "archive": {
                            "url": format!("{base}/osx/mongodb-macos-x86_64-enterprise-7.0.2.tgz"),
                            "sha256": "cc"
                        },
                        "crypt_shared": {
                            "url": format!("{base}/osx/mongo_crypt_shared_v1-macos-x86_64-enterprise-7.0.2.tgz"),
                            "sha256": "dd"
                        }
                    }
                ]
            },
            {
                "version": "5.0.3",
                "date": "2021-09-21",
                "githash": "657fea5a61a74d7a79df7aff8e4bcf0bc742b748",
                "downloads": [
                    {
                        "target": "osx",
                        "arch": "x86_64",
                        "edition": "enterprise",
                        "archive": {
                            "url": format!("{base}/osx/mongodb-macos-x86_64-enterprise-5.0.3.tgz"),
                            "sha256": "ee"
                        }
                    }
                ]
            }
        ]
    })
}

/// Serve the fixture manifest and import it
pub(crate) async fn seed_catalog(ctx: &TestContext) {
    let manifest = manifest_json(&ctx.uri(), &sha256_hex(&server_archive()));
    Mock::given(method("GET"))
        .and(path("/full.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(manifest))
        .mount(&ctx.server)
        .await;

    ctx.downloader.refresh_manifest().await.unwrap().unwrap();
}
