//! Version ordering and version filters
//!
//! Release versions look like `MAJOR.MINOR.PATCH` with an optional
//! `-<stage><seq>` suffix (`alpha`, `beta` or `rc`). A bare `MAJOR.MINOR` is
//! accepted as shorthand for `MAJOR.MINOR.0`.
//!
//! Ordering is by the tuple `(major, minor, patch, stage rank, seq)` where a
//! missing stage ranks above every pre-release stage, so
//! `5.0.3-rc2 < 5.0.3 < 5.0.4-alpha0`.

use crate::error::{Error, Result};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Stage rank given to versions without a pre-release tag
pub const STABLE_STAGE_RANK: u32 = 9999;

/// Parsed, totally ordered version key
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VersionKey {
    major: u64,
    minor: u64,
    patch: u64,
    stage: u32,
    seq: u64,
}

impl VersionKey {
    /// Parse a version string
    ///
    /// Anything after a well-formed `MAJOR.MINOR.PATCH[-STAGEN]` prefix is
    /// ignored. Unknown stage tags and strings without that prefix are
    /// [`Error::InvalidVersion`].
    pub fn parse(version: &str) -> Result<Self> {
        let invalid = || Error::InvalidVersion(version.to_string());

        // MAJOR.MINOR, nothing else
        if let Some((major, minor)) = version.split_once('.')
            && is_digits(major)
            && is_digits(minor)
        {
            return Ok(Self {
                major: major.parse().map_err(|_| invalid())?,
                minor: minor.parse().map_err(|_| invalid())?,
                patch: 0,
                stage: STABLE_STAGE_RANK,
                seq: 0,
            });
        }

        let mut rest = version;
        let major = take_number(&mut rest).ok_or_else(invalid)?;
        rest = rest.strip_prefix('.').ok_or_else(invalid)?;
        let minor = take_number(&mut rest).ok_or_else(invalid)?;
        rest = rest.strip_prefix('.').ok_or_else(invalid)?;
        let patch = take_number(&mut rest).ok_or_else(invalid)?;

        let (stage, seq) = match parse_stage_suffix(rest) {
            Some((tag, seq)) => (stage_rank(tag).ok_or_else(invalid)?, seq),
            None => (STABLE_STAGE_RANK, 0),
        };

        Ok(Self {
            major,
            minor,
            patch,
            stage,
            seq,
        })
    }

    /// Major component
    pub fn major(&self) -> u64 {
        self.major
    }

    /// Minor component
    pub fn minor(&self) -> u64 {
        self.minor
    }

    /// Patch component
    pub fn patch(&self) -> u64 {
        self.patch
    }

    /// True when the version carries no pre-release stage tag
    pub fn is_stable(&self) -> bool {
        self.stage == STABLE_STAGE_RANK
    }

    /// True for rapid releases (nonzero minor component)
    pub fn is_rapid(&self) -> bool {
        self.minor > 0
    }
}

impl FromStr for VersionKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Compare two version strings under the release ordering
pub fn compare_versions(left: &str, right: &str) -> Result<Ordering> {
    Ok(VersionKey::parse(left)?.cmp(&VersionKey::parse(right)?))
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Consume a leading run of ASCII digits
fn take_number(rest: &mut &str) -> Option<u64> {
    let end = rest
        .bytes()
        .position(|b| !b.is_ascii_digit())
        .unwrap_or(rest.len());
    if end == 0 {
        return None;
    }
    let (digits, tail) = rest.split_at(end);
    *rest = tail;
    digits.parse().ok()
}

/// `-<lowercase letters><digits>`; `None` when the suffix is absent or incomplete
fn parse_stage_suffix(rest: &str) -> Option<(&str, u64)> {
    let rest = rest.strip_prefix('-')?;
    let tag_end = rest
        .bytes()
        .position(|b| !b.is_ascii_lowercase())
        .unwrap_or(rest.len());
    if tag_end == 0 {
        return None;
    }
    let (tag, mut tail) = rest.split_at(tag_end);
    let seq = take_number(&mut tail)?;
    Some((tag, seq))
}

fn stage_rank(tag: &str) -> Option<u32> {
    match tag {
        "alpha" => Some(1),
        "beta" => Some(2),
        "rc" => Some(3),
        _ => None,
    }
}

/// Version constraint accepted by catalog queries
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VersionFilter {
    /// A specific version, or a `MAJOR.MINOR` prefix of one
    Exact(String),
    /// Newest version of any kind, release candidates included
    LatestRelease,
    /// Versions without a pre-release stage tag
    LatestStable,
    /// Rapid releases only (nonzero minor)
    Rapid,
}

impl VersionFilter {
    /// Interpret a user-supplied version string, recognizing the aliases
    pub fn parse(version: &str) -> Self {
        match version {
            "latest-release" => Self::LatestRelease,
            "latest-stable" => Self::LatestStable,
            "rapid" => Self::Rapid,
            other => Self::Exact(other.to_string()),
        }
    }

    /// Test a catalogued version against this filter
    ///
    /// Alias filters need the parsed key, so a malformed catalogued version is
    /// an error for them.
    pub fn matches(&self, version: &str) -> Result<bool> {
        match self {
            Self::Exact(wanted) => Ok(version == wanted
                || version
                    .strip_prefix(wanted.as_str())
                    .is_some_and(|rest| rest.starts_with('.'))),
            Self::LatestRelease => Ok(true),
            Self::LatestStable => Ok(VersionKey::parse(version)?.is_stable()),
            Self::Rapid => Ok(VersionKey::parse(version)?.is_rapid()),
        }
    }
}

impl fmt::Display for VersionFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(v) => f.write_str(v),
            Self::LatestRelease => f.write_str("latest-release"),
            Self::LatestStable => f.write_str("latest-stable"),
            Self::Rapid => f.write_str("rapid"),
        }
    }
}
