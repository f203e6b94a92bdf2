//! Rules and their dotted-segment glob patterns.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, VigilError};

/// Separator between name and pattern segments.
pub const SEPARATOR: char = '.';

/// The single-segment wildcard token.
pub const WILDCARD: &str = "*";

/// One position of a [`Pattern`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Matches only the identical name segment.
    Literal(String),
    /// Matches any single name segment.
    Wildcard,
}

impl Segment {
    pub fn matches(&self, segment: &str) -> bool {
        match self {
            Segment::Literal(lit) => lit == segment,
            Segment::Wildcard => true,
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Literal(lit) => f.write_str(lit),
            Segment::Wildcard => f.write_str(WILDCARD),
        }
    }
}

/// A parsed rule pattern such as `timer.*.api.login`.
///
/// The segment count is fixed; a pattern only ever matches names with the
/// same number of segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Pattern {
    segments: Vec<Segment>,
}

impl Pattern {
    /// Parse a dotted pattern. Empty patterns and empty segments are rejected.
    pub fn parse(pattern: &str) -> Result<Self> {
        if pattern.is_empty() {
            return Err(VigilError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: "pattern must not be empty".to_string(),
            });
        }

        let mut segments = Vec::new();
        for (pos, raw) in pattern.split(SEPARATOR).enumerate() {
            if raw.is_empty() {
                return Err(VigilError::InvalidPattern {
                    pattern: pattern.to_string(),
                    reason: format!("segment {} is empty", pos),
                });
            }
            if raw == WILDCARD {
                segments.push(Segment::Wildcard);
            } else {
                segments.push(Segment::Literal(raw.to_string()));
            }
        }

        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Always false for a parsed pattern; provided for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Reference matcher: compares the name segment by segment.
    ///
    /// The filter uses an index instead; this is the linear definition it
    /// must agree with.
    pub fn matches(&self, name: &str) -> bool {
        if name.is_empty() {
            return false;
        }
        let mut parts = name.split(SEPARATOR);
        for segment in &self.segments {
            match parts.next() {
                Some(part) if !part.is_empty() && segment.matches(part) => {}
                _ => return false,
            }
        }
        parts.next().is_none()
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                write!(f, "{}", SEPARATOR)?;
            }
            write!(f, "{}", segment)?;
        }
        Ok(())
    }
}

impl FromStr for Pattern {
    type Err = VigilError;

    fn from_str(s: &str) -> Result<Self> {
        Pattern::parse(s)
    }
}

impl TryFrom<String> for Pattern {
    type Error = VigilError;

    fn try_from(value: String) -> Result<Self> {
        Pattern::parse(&value)
    }
}

impl From<Pattern> for String {
    fn from(pattern: Pattern) -> Self {
        pattern.to_string()
    }
}

/// A monitoring rule: an identity plus the pattern selecting its metrics.
///
/// Two rules may share a pattern; they stay distinct through `id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub pattern: Pattern,
}

impl Rule {
    /// Create a rule with a freshly generated id.
    pub fn new(pattern: &str) -> Result<Self> {
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            pattern: Pattern::parse(pattern)?,
        })
    }

    /// Create a rule with a caller-supplied id (e.g. from a rule file).
    pub fn with_id(id: impl Into<String>, pattern: &str) -> Result<Self> {
        Ok(Self {
            id: id.into(),
            pattern: Pattern::parse(pattern)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_mixed_segments() {
        let p = Pattern::parse("a.*.c.d").unwrap();
        assert_eq!(p.len(), 4);
        assert_eq!(p.segments()[0], Segment::Literal("a".into()));
        assert_eq!(p.segments()[1], Segment::Wildcard);
        assert_eq!(p.to_string(), "a.*.c.d");
    }

    #[test]
    fn partial_star_is_literal() {
        let p = Pattern::parse("api.lat*").unwrap();
        assert_eq!(p.segments()[1], Segment::Literal("lat*".into()));
        assert!(p.matches("api.lat*"));
        assert!(!p.matches("api.latency"));
    }

    #[test]
    fn parse_rejects_empty_segments() {
        for bad in ["", ".", "a..b", ".a", "a."] {
            assert!(
                matches!(Pattern::parse(bad), Err(VigilError::InvalidPattern { .. })),
                "expected '{}' to be rejected",
                bad
            );
        }
    }

    #[test]
    fn reference_matcher_requires_equal_length() {
        let p = Pattern::parse("a.*.c").unwrap();
        assert!(p.matches("a.b.c"));
        assert!(p.matches("a.zzz.c"));
        assert!(!p.matches("a.c"));
        assert!(!p.matches("a.b.c.d"));
        assert!(!p.matches("x.b.c"));
        assert!(!p.matches(""));
        assert!(!p.matches("a..c"));
    }

    #[test]
    fn rules_with_same_pattern_are_distinct() {
        let r1 = Rule::new("a.b").unwrap();
        let r2 = Rule::new("a.b").unwrap();
        assert_eq!(r1.pattern, r2.pattern);
        assert_ne!(r1.id, r2.id);
    }

    #[test]
    fn pattern_serializes_as_string() {
        let rule = Rule::with_id("r1", "timer.*.api").unwrap();
        let json = serde_json::to_value(&rule).unwrap();
        assert_eq!(json["pattern"], "timer.*.api");

        let back: Rule = serde_json::from_value(json).unwrap();
        assert_eq!(back, rule);

        let bad = serde_json::json!({ "id": "r2", "pattern": "a..b" });
        assert!(serde_json::from_value::<Rule>(bad).is_err());
    }
}
