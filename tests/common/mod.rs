//! Common test utilities for mongodl integration tests

#[allow(dead_code)]
pub mod fixtures;

pub use fixtures::*;

use mongodl::{Config, Downloader};
use std::io::Write;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use wiremock::MockServer;

/// Primary-output sink shared with the downloader under test
#[derive(Clone, Default)]
pub struct CapturedOutput(Arc<Mutex<Vec<u8>>>);

#[allow(dead_code)]
impl CapturedOutput {
    pub fn lines(&self) -> Vec<String> {
        String::from_utf8(self.0.lock().unwrap().clone())
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

impl Write for CapturedOutput {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Config whose every remote endpoint points at `server`
pub fn test_config(temp_dir: &TempDir, server: &MockServer) -> Config {
    let mut config = Config::with_cache_dir(temp_dir.path().join("cache"));
    config.manifest_url = format!("{}/full.json", server.uri());
    config.latest_build_base_url = server.uri();
    config.mongosh_base_url = format!("{}/compass", server.uri());
    config.validate_distros = true;
    config
}

/// A downloader writing its primary output to a [`CapturedOutput`]
pub async fn test_downloader(
    temp_dir: &TempDir,
    server: &MockServer,
) -> (Downloader, CapturedOutput) {
    let output = CapturedOutput::default();
    let downloader = Downloader::new(test_config(temp_dir, server))
        .await
        .unwrap()
        .with_output(output.clone());
    (downloader, output)
}
