use proptest::prelude::*;

/// One literal topic segment
pub fn segment_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9]{1,8}"
}

/// A literal dot-separated topic of 1 to 5 segments
pub fn topic_segments_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(segment_strategy(), 1..=5)
}

/// A string that contains no wildcard token
pub fn non_wildcard_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9. _-]{0,24}"
}

/// Whitespace-only strings, including the empty string
pub fn blank_strategy() -> impl Strategy<Value = String> {
    "[ \t\n]{0,6}"
}
