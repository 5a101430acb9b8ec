//! Member path filtering
//!
//! Patterns are matched segment by segment against the full member path.
//! A `**` segment matches any number of leading path segments (but never the
//! whole remaining path); every other segment is a filename glob (`*`, `?`,
//! `[...]`, `[!...]`) that must match exactly one path segment.

use crate::error::{Error, Result};
use glob::{MatchOptions, Pattern};

const SEGMENT_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// Split a member or pattern path into its meaningful segments
///
/// Empty segments (from `//` or a trailing `/`) and `.` segments are dropped.
pub fn path_segments(path: &str) -> Vec<&str> {
    path.split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .collect()
}

#[derive(Clone, Debug)]
enum Segment {
    /// `**`
    AnyDepth,
    Glob(Pattern),
}

/// Compiled member filter
#[derive(Clone, Debug)]
pub struct MemberPattern {
    source: String,
    segments: Vec<Segment>,
}

impl MemberPattern {
    /// Compile a `/`-separated pattern
    ///
    /// # Errors
    /// [`Error::InvalidPattern`] if a segment is not a valid glob.
    pub fn new(pattern: &str) -> Result<Self> {
        let segments = path_segments(pattern)
            .into_iter()
            .map(|seg| {
                if seg == "**" {
                    return Ok(Segment::AnyDepth);
                }
                // Inside a segment, runs of '*' mean the same as one
                Pattern::new(&collapse_stars(seg))
                    .map(Segment::Glob)
                    .map_err(|e| Error::InvalidPattern {
                        pattern: pattern.to_string(),
                        reason: format!("segment \"{seg}\": {}", e.msg),
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            source: pattern.to_string(),
            segments,
        })
    }

    /// The pattern as given
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Test a member path
    pub fn matches(&self, path: &str) -> bool {
        self.matches_segments(&path_segments(path))
    }

    /// Test a member path that is already split into segments
    pub fn matches_segments(&self, path: &[&str]) -> bool {
        match_from(&self.segments, path)
    }
}

fn match_from(pattern: &[Segment], path: &[&str]) -> bool {
    let Some((head, rest)) = pattern.split_first() else {
        // An empty pattern always matches
        return true;
    };
    if path.is_empty() {
        // Non-empty pattern requires more path segments
        return false;
    }
    match head {
        Segment::AnyDepth => (0..path.len()).any(|skip| match_from(rest, &path[skip..])),
        Segment::Glob(glob) => {
            glob.matches_with(path[0], SEGMENT_OPTIONS) && match_from(rest, &path[1..])
        }
    }
}

fn collapse_stars(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for ch in segment.chars() {
        if ch == '*' && out.ends_with('*') {
            continue;
        }
        out.push(ch);
    }
    out
}
