//! Host platform detection and the static download-target tables
//!
//! The tables map Linux distribution ids and versions (as found in
//! `/etc/os-release`) to the target names used by the release manifest.
//! Version columns are filename-style globs matched with [`glob::Pattern`].

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

/// Versions pinned for performance benchmarking; never move these forward
pub const PERF_VERSIONS: &[(&str, &str)] = &[("v6.0-perf", "6.0.6"), ("v8.0-perf", "8.0.1")];

/// Derived distribution ids and the upstream distribution they follow
pub const DISTRO_ID_MAP: &[(&str, &str)] = &[
    ("elementary", "ubuntu"),
    ("fedora", "rhel"),
    ("centos", "rhel"),
    ("mint", "ubuntu"),
    ("linuxmint", "ubuntu"),
    ("opensuse-leap", "sles"),
    ("opensuse", "sles"),
    ("pop", "ubuntu"),
    ("redhat", "rhel"),
    ("rocky", "rhel"),
];

/// Derived distribution versions mapped to their upstream version
pub const DISTRO_VERSION_MAP: &[(&str, &[(&str, &str)])] = &[
    ("elementary", &[("6", "20.04"), ("6.*", "20.04")]),
    (
        "fedora",
        &[("32", "8"), ("33", "8"), ("34", "8"), ("35", "8"), ("36", "8")],
    ),
    (
        "linuxmint",
        &[
            ("19", "18.04"),
            ("19.*", "18.04"),
            ("20", "20.04"),
            ("20.*", "20.04"),
            ("21", "22.04"),
            ("21.*", "22.04"),
        ],
    ),
    ("pop", &[("20.04", "20.04"), ("22.04", "22.04")]),
];

/// Distribution ids with version globs mapped to download targets
pub const DISTRO_ID_TO_TARGET: &[(&str, &[(&str, &str)])] = &[
    (
        "ubuntu",
        &[
            ("24.*", "ubuntu2404"),
            ("22.*", "ubuntu2204"),
            ("20.*", "ubuntu2004"),
            ("18.*", "ubuntu1804"),
            ("16.*", "ubuntu1604"),
            ("14.*", "ubuntu1404"),
        ],
    ),
    (
        "debian",
        &[
            ("9", "debian92"),
            ("10", "debian10"),
            ("11", "debian11"),
            ("12", "debian12"),
        ],
    ),
    (
        "rhel",
        &[
            ("6", "rhel6"),
            ("6.*", "rhel6"),
            ("7", "rhel7"),
            ("7.*", "rhel7"),
            ("8", "rhel8"),
            ("8.*", "rhel8"),
            ("9", "rhel9"),
            ("9.*", "rhel9"),
        ],
    ),
    (
        "sles",
        &[
            ("10.*", "suse10"),
            ("11.*", "suse11"),
            ("12.*", "suse12"),
            ("13.*", "suse13"),
            ("15.*", "suse15"),
        ],
    ),
    (
        "amzn",
        &[
            ("2023", "amazon2023"),
            ("2018.*", "amzn64"),
            ("2", "amazon2"),
        ],
    ),
];

/// Valid targets that are not tied to a Linux distribution
pub const TARGETS_THAT_ARE_NOT_DISTROS: &[&str] =
    &["linux_i686", "linux_x86_64", "osx", "macos", "windows"];

const OS_RELEASE_PATHS: &[&str] = &["/etc/os-release", "/usr/lib/os-release"];

/// Replace a benchmarking alias with its pinned version
pub fn resolve_perf_version(version: &str) -> &str {
    PERF_VERSIONS
        .iter()
        .find(|(alias, _)| *alias == version)
        .map_or(version, |(_, pinned)| pinned)
}

/// Whether the manifest target is covered by the tables above
pub fn is_known_target(target: &str) -> bool {
    TARGETS_THAT_ARE_NOT_DISTROS.contains(&target)
        || DISTRO_ID_TO_TARGET
            .iter()
            .flat_map(|(_, table)| table.iter())
            .any(|(_, t)| *t == target)
}

/// Infer the download target of the host
///
/// `version` only matters on macOS, where old servers were published as `osx`.
pub fn infer_target(version: Option<&str>) -> Result<String> {
    if cfg!(windows) {
        return Ok("windows".to_string());
    }
    if cfg!(target_os = "macos") {
        let old = version.is_some_and(|v| v.starts_with("4.0") || v.starts_with('3'));
        return Ok(if old { "osx" } else { "macos" }.to_string());
    }

    let found = OS_RELEASE_PATHS.iter().map(Path::new).find(|p| p.is_file());
    match found {
        Some(path) => {
            let text = std::fs::read_to_string(path)?;
            infer_target_from_os_release(&text)
        }
        None => Err(Error::Platform(
            "We don't know how to find the default target for this system".to_string(),
        )),
    }
}

/// Infer the download target from the text of an `os-release` file
pub fn infer_target_from_os_release(os_release: &str) -> Result<String> {
    let os_id = os_release_field(os_release, "ID").ok_or_else(|| {
        Error::Platform(format!("Unable to detect ID from os-release content:\n{os_release}"))
    })?;

    // No Arch builds exist; the RHEL 8 build runs fine there
    if os_id == "arch" {
        return Ok("rhel80".to_string());
    }

    let mut ver_id = os_release_field(os_release, "VERSION_ID").ok_or_else(|| {
        Error::Platform(format!(
            "Unable to detect VERSION_ID from os-release content:\n{os_release}"
        ))
    })?;
    let mut os_id = os_id;

    if let Some(mapped_id) = lookup(DISTRO_ID_MAP, &os_id) {
        let ver_table = lookup(DISTRO_VERSION_MAP, &os_id).unwrap_or(&[]);
        let mapped_version = match_glob_table(ver_table, &ver_id).ok_or_else(|| {
            Error::Platform(format!(
                "We don't know how to map {os_id} version '{ver_id}' to an upstream {mapped_id} version"
            ))
        })?;
        ver_id = mapped_version.to_string();
        os_id = mapped_id.to_string();
    }

    let os_id = os_id.to_lowercase();
    let ver_table = lookup(DISTRO_ID_TO_TARGET, &os_id).ok_or_else(|| {
        Error::Platform(format!(
            "We don't know how to map '{os_id}' to a distribution download target"
        ))
    })?;

    match_glob_table(ver_table, &ver_id)
        .map(str::to_string)
        .ok_or_else(|| {
            Error::Platform(format!(
                "We don't know how to map '{os_id}' version '{ver_id}' to a distribution download target"
            ))
        })
}

/// Value of `KEY=value` or `KEY="value"`, whole-line keys only
fn os_release_field(text: &str, key: &str) -> Option<String> {
    text.lines().find_map(|line| {
        let value = line.trim_start().strip_prefix(key)?.strip_prefix('=')?;
        let value = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .unwrap_or(value);
        Some(value.to_string())
    })
}

fn lookup<'a, T: ?Sized>(table: &'a [(&str, &'a T)], key: &str) -> Option<&'a T> {
    table.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
}

/// First entry whose glob matches `value`, in table order
fn match_glob_table<'a>(table: &[(&str, &'a str)], value: &str) -> Option<&'a str> {
    table
        .iter()
        .find(|(pattern, _)| glob::Pattern::new(pattern).is_ok_and(|p| p.matches(value)))
        .map(|(_, mapped)| *mapped)
}

/// Infer the host architecture using manifest spelling
pub fn infer_arch() -> String {
    // uname -m spelling: Apple Silicon reports arm64
    let machine = if cfg!(target_os = "macos") && std::env::consts::ARCH == "aarch64" {
        "arm64"
    } else {
        std::env::consts::ARCH
    };
    normalize_arch(machine).to_string()
}

/// Remap platform architecture names to the names used for downloads
pub fn normalize_arch(arch: &str) -> &str {
    match arch {
        "AMD64" => "x86_64",
        other => other,
    }
}

/// Directory for user-local caches
///
/// `%LocalAppData%` on Windows, `~/Library/Caches` on macOS, and
/// `$XDG_CACHE_HOME` or `~/.cache` elsewhere.
pub fn user_caches_root() -> Result<PathBuf> {
    directories::BaseDirs::new()
        .map(|dirs| dirs.cache_dir().to_path_buf())
        .ok_or_else(|| Error::Platform("no home directory found for the current user".to_string()))
}

/// Default directory for mongodl cache data
pub fn default_cache_dir() -> Result<PathBuf> {
    let dir = user_caches_root()?.join("mongodl");
    Ok(std::path::absolute(&dir)?)
}
