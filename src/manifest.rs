//! Release manifest parsing
//!
//! The manifest (`full.json`) lists every published version with its
//! downloads. Each download names a target, arch and edition plus any number
//! of component objects (`archive`, `crypt_shared`, ...) carrying a `url`.
//! Parsing normalizes targets and separates components so the catalog import
//! is a straight insert.

use crate::error::{Error, Result};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Placeholder stored when a download omits its arch or target
pub const NULL_FIELD: &str = "null";

/// A parsed manifest
#[derive(Clone, Debug, PartialEq)]
pub struct Manifest {
    /// Versions in manifest order
    pub versions: Vec<ManifestVersion>,
}

/// One published version
#[derive(Clone, Debug, PartialEq)]
pub struct ManifestVersion {
    /// Version string, e.g. "6.0.6" or "7.0.0-rc1"
    pub version: String,
    /// Release date as published
    pub date: String,
    /// Source-control hash of the release
    pub githash: String,
    /// Downloads in manifest order
    pub downloads: Vec<ManifestDownload>,
}

/// One platform build of a version
#[derive(Clone, Debug, PartialEq)]
pub struct ManifestDownload {
    /// Normalized target (`rhel80` becomes `rhel8`)
    pub target: String,
    /// Architecture
    pub arch: String,
    /// Edition
    pub edition: String,
    /// URL of the main archive
    pub archive_url: String,
    /// URL of the debug-symbols archive, when published
    pub archive_debug_url: Option<String>,
    /// Every field that is an object with a `url`, keyed by field name
    pub components: Vec<(String, Value)>,
    /// The download entry exactly as published
    pub raw: Value,
}

impl Manifest {
    /// Parse manifest JSON bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(bytes)
            .map_err(|e| Error::ManifestParse(format!("manifest is not valid JSON: {e}")))?;
        Self::from_value(&value)
    }

    /// Parse an already-decoded manifest document
    pub fn from_value(value: &Value) -> Result<Self> {
        let versions = required_array(value, "versions", "manifest")?
            .iter()
            .map(ManifestVersion::from_value)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { versions })
    }

    /// Targets not covered by the distro tables, across all versions
    pub fn missing_targets(&self) -> BTreeSet<String> {
        self.versions
            .iter()
            .flat_map(|v| v.downloads.iter())
            .filter(|dl| !crate::targets::is_known_target(&dl.target))
            .map(|dl| dl.target.clone())
            .collect()
    }
}

impl ManifestVersion {
    fn from_value(value: &Value) -> Result<Self> {
        let version = required_str(value, "version", "version entry")?;
        let context = format!("version {version}");
        let date = required_str(value, "date", &context)?;
        let githash = required_str(value, "githash", &context)?;
        let downloads = required_array(value, "downloads", &context)?
            .iter()
            .map(|dl| ManifestDownload::from_value(dl, &version))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            version,
            date,
            githash,
            downloads,
        })
    }
}

impl ManifestDownload {
    fn from_value(value: &Value, version: &str) -> Result<Self> {
        let context = format!("download of version {version}");
        let obj = value
            .as_object()
            .ok_or_else(|| Error::ManifestParse(format!("{context} is not an object")))?;

        let target = normalize_target(&optional_str(obj, "target", &context)?);
        let arch = optional_str(obj, "arch", &context)?;
        let edition = required_str(value, "edition", &context)?;

        let archive = obj
            .get("archive")
            .ok_or_else(|| Error::ManifestParse(format!("{context} has no \"archive\"")))?;
        let archive_url = required_str(archive, "url", &format!("archive of {context}"))?;
        let archive_debug_url = archive
            .get("debug_symbols")
            .and_then(Value::as_str)
            .map(str::to_string);

        let components = obj
            .iter()
            .filter(|(_, v)| v.as_object().is_some_and(|o| o.contains_key("url")))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        Ok(Self {
            target,
            arch,
            edition,
            archive_url,
            archive_debug_url,
            components,
            raw: value.clone(),
        })
    }
}

/// Collapse six-character RHEL targets (`rhel80`) to their major version (`rhel8`)
pub fn normalize_target(target: &str) -> String {
    match target.get(..5) {
        Some(short) if target.starts_with("rhel") && target.len() == 6 => short.to_string(),
        _ => target.to_string(),
    }
}

fn required_str(value: &Value, field: &str, context: &str) -> Result<String> {
    match value.get(field) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(Error::ManifestParse(format!(
            "{context}: \"{field}\" is not a string"
        ))),
        None => Err(Error::ManifestParse(format!(
            "{context}: missing \"{field}\""
        ))),
    }
}

fn optional_str(obj: &Map<String, Value>, field: &str, context: &str) -> Result<String> {
    match obj.get(field) {
        None => Ok(NULL_FIELD.to_string()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(Error::ManifestParse(format!(
            "{context}: \"{field}\" is not a string"
        ))),
    }
}

fn required_array<'a>(value: &'a Value, field: &str, context: &str) -> Result<&'a Vec<Value>> {
    value
        .get(field)
        .and_then(Value::as_array)
        .ok_or_else(|| Error::ManifestParse(format!("{context}: missing \"{field}\" list")))
}
