//! Dotted configuration paths.
//!
//! A `ConfigPath` is a non-empty, ordered list of segments such as
//! `app.ui.theme`. Lookup is segment-exact: no wildcards, no relative
//! segments. Segments may hold any text except `.` and control characters;
//! the query language is stricter and only produces identifier segments.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Deepest path accepted. Bounds every walk, projection, and serialization
/// of the tree regardless of caller input.
pub const MAX_DEPTH: usize = 128;

/// A validated, non-empty path from the root to a node.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct ConfigPath {
    segments: Vec<String>,
}

impl ConfigPath {
    /// Parse a dotted string like `app.ui.theme`.
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ConfigError::InvalidPath("empty path".into()));
        }
        Self::from_segments(input.split('.'))
    }

    /// Build a path from already-split segments.
    pub fn from_segments<I, S>(segments: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() {
            return Err(ConfigError::InvalidPath("empty path".into()));
        }
        if segments.len() > MAX_DEPTH {
            return Err(ConfigError::InvalidPath(format!(
                "path has {} segments; at most {} are allowed",
                segments.len(),
                MAX_DEPTH
            )));
        }
        for seg in &segments {
            validate_segment(seg, &segments)?;
        }
        Ok(ConfigPath { segments })
    }

    /// Wrap segments read back from the tree itself, which were validated
    /// when first inserted.
    pub(crate) fn from_trusted(segments: Vec<String>) -> Self {
        debug_assert!(!segments.is_empty());
        ConfigPath { segments }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Number of segments (always at least one).
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// The terminal segment.
    pub fn last(&self) -> &str {
        // Non-empty by construction.
        &self.segments[self.segments.len() - 1]
    }

    /// The path one level up, or `None` for a top-level path.
    pub fn parent(&self) -> Option<ConfigPath> {
        if self.segments.len() < 2 {
            return None;
        }
        Some(ConfigPath {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// A new path with `segment` appended.
    pub fn child(&self, segment: &str) -> Result<ConfigPath> {
        let mut segments = self.segments.clone();
        segments.push(segment.to_string());
        Self::from_segments(segments)
    }

    /// True if `self` equals `prefix` or lies underneath it.
    pub fn starts_with(&self, prefix: &ConfigPath) -> bool {
        self.segments.len() >= prefix.segments.len()
            && self.segments[..prefix.segments.len()] == prefix.segments[..]
    }

    /// Format back to a dotted string.
    pub fn to_dotted(&self) -> String {
        self.segments.join(".")
    }
}

impl fmt::Display for ConfigPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_dotted())
    }
}

impl TryFrom<Vec<String>> for ConfigPath {
    type Error = ConfigError;

    fn try_from(segments: Vec<String>) -> Result<Self> {
        Self::from_segments(segments)
    }
}

impl From<ConfigPath> for Vec<String> {
    fn from(path: ConfigPath) -> Self {
        path.segments
    }
}

impl std::str::FromStr for ConfigPath {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn validate_segment(seg: &str, all: &[String]) -> Result<()> {
    if seg.is_empty() {
        return Err(ConfigError::InvalidPath(format!(
            "empty segment in path '{}'",
            all.join(".")
        )));
    }
    if seg.contains('.') {
        return Err(ConfigError::InvalidPath(format!(
            "segment '{}' contains '.'",
            seg
        )));
    }
    if seg.chars().any(char::is_control) {
        return Err(ConfigError::InvalidPath(format!(
            "segment {:?} contains control characters",
            seg
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple() {
        let p = ConfigPath::parse("app.ui.theme").unwrap();
        assert_eq!(p.segments(), &["app", "ui", "theme"]);
        assert_eq!(p.depth(), 3);
        assert_eq!(p.last(), "theme");
    }

    #[test]
    fn parse_single_segment() {
        let p = ConfigPath::parse("debug").unwrap();
        assert_eq!(p.depth(), 1);
        assert!(p.parent().is_none());
    }

    #[test]
    fn parse_trims_whitespace() {
        let p = ConfigPath::parse("  a.b  ").unwrap();
        assert_eq!(p.to_dotted(), "a.b");
    }

    #[test]
    fn empty_path_rejected() {
        assert!(matches!(
            ConfigPath::parse(""),
            Err(ConfigError::InvalidPath(_))
        ));
        assert!(ConfigPath::from_segments(Vec::<String>::new()).is_err());
    }

    #[test]
    fn empty_segment_rejected() {
        assert!(ConfigPath::parse("a..b").is_err());
        assert!(ConfigPath::parse(".a").is_err());
        assert!(ConfigPath::parse("a.").is_err());
    }

    #[test]
    fn overly_deep_path_rejected() {
        let ok = vec!["n"; MAX_DEPTH];
        assert!(ConfigPath::from_segments(ok).is_ok());
        let too_deep = vec!["n"; MAX_DEPTH + 1];
        assert!(matches!(
            ConfigPath::from_segments(too_deep),
            Err(ConfigError::InvalidPath(_))
        ));
    }

    #[test]
    fn dotted_segment_rejected() {
        assert!(ConfigPath::from_segments(["a", "b.c"]).is_err());
    }

    #[test]
    fn non_identifier_segments_allowed() {
        let p = ConfigPath::from_segments(["servers", "eu-west 1"]).unwrap();
        assert_eq!(p.last(), "eu-west 1");
    }

    #[test]
    fn parent_and_child() {
        let p = ConfigPath::parse("a.b.c").unwrap();
        let parent = p.parent().unwrap();
        assert_eq!(parent.to_dotted(), "a.b");
        assert_eq!(parent.child("c").unwrap(), p);
    }

    #[test]
    fn starts_with_prefix() {
        let p = ConfigPath::parse("a.b.c").unwrap();
        assert!(p.starts_with(&ConfigPath::parse("a.b").unwrap()));
        assert!(p.starts_with(&p));
        assert!(!p.starts_with(&ConfigPath::parse("a.c").unwrap()));
        assert!(!ConfigPath::parse("a").unwrap().starts_with(&p));
    }

    #[test]
    fn serde_as_segment_list() {
        let p = ConfigPath::parse("a.b").unwrap();
        let json = serde_json::to_string(&p).unwrap();
        assert_eq!(json, r#"["a","b"]"#);
        let back: ConfigPath = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
    }

    #[test]
    fn serde_rejects_empty_list() {
        assert!(serde_json::from_str::<ConfigPath>("[]").is_err());
    }

    #[test]
    fn display_matches_dotted() {
        let p = ConfigPath::parse("x.y").unwrap();
        assert_eq!(format!("{}", p), "x.y");
    }
}
