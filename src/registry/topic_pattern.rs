//! # Topic Pattern Compiler
//!
//! Compiles human-authored wildcard topic expressions into matchers that follow
//! AMQP topic-exchange semantics.
//!
//! ## Syntax
//!
//! A pattern is a dot-separated list of segments. Each segment is either a
//! literal (`[A-Za-z0-9]+`), `*` (exactly one segment) or `#` (one or more
//! segments). Wildcards must occupy a whole segment, and a pattern must contain
//! at least one wildcard; an expression without any is an exact topic and
//! belongs in the exact-topic map instead.
//!
//! ```rust
//! use topicbus::registry::TopicPattern;
//!
//! let pattern = TopicPattern::compile("orders.*").unwrap();
//! assert!(pattern.matches("orders.created"));
//! assert!(!pattern.matches("orders.created.extra"));
//! assert!(!pattern.matches("orders"));
//!
//! let pattern = TopicPattern::compile("orders.#").unwrap();
//! assert!(pattern.matches("orders.created.eu"));
//! ```

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use super::errors::{RegistryError, RegistryResult};
use crate::constants::topic::{
    MULTI_SEGMENT_WILDCARD, SEGMENT_SEPARATOR, SINGLE_SEGMENT_WILDCARD,
};

static PATTERN_CHARSET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9.*#]+$").expect("pattern charset regex is valid"));

static LITERAL_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9]+$").expect("literal segment regex is valid"));

static LITERAL_TOPIC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9]+(\.[A-Za-z0-9]+)*$").expect("literal topic regex is valid")
});

/// One compiled segment of a pattern
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    /// `*`
    One,
    /// `#`
    OneOrMore,
}

/// A validated, compiled wildcard topic pattern
///
/// Holds the raw expression (used verbatim for broker bindings) together with
/// the compiled segments used for in-process matching. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl TopicPattern {
    /// Compile a raw wildcard expression
    ///
    /// Fails with [`RegistryError::InvalidPatternFormat`] when the expression is
    /// blank, has no wildcard, uses characters outside `[A-Za-z0-9.*#]`, has an
    /// empty segment, or mixes a wildcard with other characters in one segment.
    pub fn compile(raw: &str) -> RegistryResult<Self> {
        if raw.trim().is_empty() {
            return Err(RegistryError::invalid_pattern(raw, "pattern is empty"));
        }

        if !PATTERN_CHARSET.is_match(raw) {
            return Err(RegistryError::invalid_pattern(
                raw,
                "only letters, digits, '.', '*' and '#' are allowed",
            ));
        }

        if !is_wildcard_expression(raw) {
            return Err(RegistryError::invalid_pattern(
                raw,
                "pattern must contain at least one '*' or '#'",
            ));
        }

        let segments = raw
            .split(SEGMENT_SEPARATOR)
            .map(|segment| Self::compile_segment(raw, segment))
            .collect::<RegistryResult<Vec<_>>>()?;

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    fn compile_segment(raw: &str, segment: &str) -> RegistryResult<Segment> {
        match segment {
            "" => Err(RegistryError::invalid_pattern(
                raw,
                "segments must not be empty",
            )),
            SINGLE_SEGMENT_WILDCARD => Ok(Segment::One),
            MULTI_SEGMENT_WILDCARD => Ok(Segment::OneOrMore),
            literal if LITERAL_SEGMENT.is_match(literal) => Ok(Segment::Literal(literal.to_string())),
            _ => Err(RegistryError::invalid_pattern(
                raw,
                format!("wildcard must occupy an entire segment, found '{segment}'"),
            )),
        }
    }

    /// Whether `topic` matches this pattern
    pub fn matches(&self, topic: &str) -> bool {
        let topic_segments: Vec<&str> = topic.split(SEGMENT_SEPARATOR).collect();
        match_segments(&self.segments, &topic_segments)
    }

    /// The raw expression as authored
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for TopicPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Segment matcher over topic prefixes
///
/// `reachable[j]` records whether the pattern segments seen so far match the
/// first `j` topic segments. Each pattern segment is one pass over the topic,
/// so matching is `O(pattern × topic)` however many `#` segments there are.
fn match_segments(pattern: &[Segment], topic: &[&str]) -> bool {
    let mut reachable = vec![false; topic.len() + 1];
    reachable[0] = true;

    for segment in pattern {
        let mut next = vec![false; topic.len() + 1];
        for (j, word) in topic.iter().enumerate() {
            next[j + 1] = match segment {
                Segment::Literal(literal) => reachable[j] && word == literal,
                Segment::One => reachable[j] && !word.is_empty(),
                // Start consuming here or keep consuming a run already started
                Segment::OneOrMore => !word.is_empty() && (reachable[j] || next[j]),
            };
        }
        if !next.contains(&true) {
            return false;
        }
        reachable = next;
    }

    reachable[topic.len()]
}

/// Validate a literal (non-wildcard) topic
///
/// Literal topics are dot-separated segments of `[A-Za-z0-9]+`.
pub fn validate_topic(topic: &str) -> RegistryResult<()> {
    if topic.trim().is_empty() {
        return Err(RegistryError::invalid_topic(topic, "topic is empty"));
    }
    if is_wildcard_expression(topic) {
        return Err(RegistryError::invalid_topic(
            topic,
            "wildcards are only allowed in patterns",
        ));
    }
    if !LITERAL_TOPIC.is_match(topic) {
        return Err(RegistryError::invalid_topic(
            topic,
            "topics are dot-separated segments of letters and digits",
        ));
    }
    Ok(())
}

/// Whether an expression uses wildcard tokens
pub fn is_wildcard_expression(expression: &str) -> bool {
    expression.contains(['*', '#'])
}
