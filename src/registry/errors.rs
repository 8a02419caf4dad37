//! # Registry Error Types
//!
//! Registration-time failures. These are configuration bugs surfaced to the
//! code building the registry, never runtime per-message conditions.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Invalid wildcard pattern '{pattern}': {reason}")]
    InvalidPatternFormat { pattern: String, reason: String },

    #[error("Invalid topic '{topic}': {reason}")]
    InvalidTopic { topic: String, reason: String },

    #[error("Topic '{topic}' is already bound to a handler")]
    DuplicateTopicBinding { topic: String },

    #[error("Fanout key '{key}' is already bound to a handler")]
    DuplicateFanoutBinding { key: String },
}

impl RegistryError {
    /// Create an invalid pattern error
    pub fn invalid_pattern(pattern: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPatternFormat {
            pattern: pattern.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid topic error
    pub fn invalid_topic(topic: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidTopic {
            topic: topic.into(),
            reason: reason.into(),
        }
    }

    /// Create a duplicate exact-topic binding error
    pub fn duplicate_topic(topic: impl Into<String>) -> Self {
        Self::DuplicateTopicBinding {
            topic: topic.into(),
        }
    }

    /// Create a duplicate fanout binding error
    pub fn duplicate_fanout(key: impl Into<String>) -> Self {
        Self::DuplicateFanoutBinding { key: key.into() }
    }
}

/// Result type alias for registration operations
pub type RegistryResult<T> = Result<T, RegistryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_error_display() {
        let err = RegistryError::invalid_pattern("orders.", "empty segment");
        let display = format!("{err}");
        assert!(display.contains("orders."));
        assert!(display.contains("empty segment"));

        let err = RegistryError::duplicate_topic("orders.created");
        assert_eq!(
            err.to_string(),
            "Topic 'orders.created' is already bound to a handler"
        );
    }
}
