//! # Handler Registry
//!
//! Maps topics to dispatch targets. Built once before listening starts and
//! read-only afterwards, so lookups need no synchronization.
//!
//! Three kinds of binding are held:
//!
//! - exact topics, unique per topic
//! - wildcard patterns, kept in registration order (duplicates allowed)
//! - fanout bindings keyed by payload type, selected for messages published
//!   with an empty routing key
//!
//! Resolution order for a routing key:
//!
//! 1. the exact binding for the key, if any (wildcards are never consulted)
//! 2. the first wildcard pattern, in registration order, that matches
//! 3. for an empty routing key only, the fanout binding named by the
//!    `x-fanout-key` header

use std::collections::HashMap;

use tracing::debug;

use super::errors::{RegistryError, RegistryResult};
use super::topic_pattern::{validate_topic, TopicPattern};
use crate::constants::headers::FANOUT_KEY;
use crate::constants::topic::FANOUT_ROUTING_KEY;
use crate::dispatch::DispatchTarget;
use crate::messaging::{HeaderValue, Headers};

/// A compiled pattern and the target bound to it
#[derive(Debug, Clone)]
pub struct WildcardBinding {
    pattern: TopicPattern,
    target: DispatchTarget,
}

impl WildcardBinding {
    pub fn pattern(&self) -> &TopicPattern {
        &self.pattern
    }

    pub fn target(&self) -> &DispatchTarget {
        &self.target
    }
}

/// Registry of topic bindings
#[derive(Debug, Default)]
pub struct HandlerRegistry {
    exact: HashMap<String, DispatchTarget>,
    // Registration order of exact topics, for deterministic broker bindings
    exact_order: Vec<String>,
    wildcards: Vec<WildcardBinding>,
    fanout: HashMap<String, DispatchTarget>,
    fanout_order: Vec<String>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `target` to a literal topic
    ///
    /// Fails with [`RegistryError::DuplicateTopicBinding`] when the topic is
    /// already bound, and with [`RegistryError::InvalidTopic`] when it is not a
    /// literal topic.
    pub fn register_exact(&mut self, topic: &str, target: DispatchTarget) -> RegistryResult<()> {
        validate_topic(topic)?;
        if self.exact.contains_key(topic) {
            return Err(RegistryError::duplicate_topic(topic));
        }

        debug!(
            topic = %topic,
            payload_type = target.payload_type(),
            "Registered exact topic binding"
        );
        self.exact.insert(topic.to_string(), target);
        self.exact_order.push(topic.to_string());
        Ok(())
    }

    /// Compile `pattern` and append a binding for it
    ///
    /// The same pattern may be registered more than once; the earliest
    /// registration wins at resolution time.
    pub fn register_wildcard(
        &mut self,
        pattern: &str,
        target: DispatchTarget,
    ) -> RegistryResult<()> {
        let pattern = TopicPattern::compile(pattern)?;

        debug!(
            pattern = %pattern,
            position = self.wildcards.len(),
            payload_type = target.payload_type(),
            "Registered wildcard binding"
        );
        self.wildcards.push(WildcardBinding { pattern, target });
        Ok(())
    }

    /// Bind `target` as the fanout handler for `key`
    pub fn register_fanout(&mut self, key: &str, target: DispatchTarget) -> RegistryResult<()> {
        if self.fanout.contains_key(key) {
            return Err(RegistryError::duplicate_fanout(key));
        }

        debug!(fanout_key = %key, "Registered fanout binding");
        self.fanout.insert(key.to_string(), target);
        self.fanout_order.push(key.to_string());
        Ok(())
    }

    /// Exact topics in registration order
    pub fn topics(&self) -> Vec<&str> {
        self.exact_order.iter().map(String::as_str).collect()
    }

    /// Raw wildcard expressions in registration order
    pub fn wildcard_patterns(&self) -> Vec<&str> {
        self.wildcards
            .iter()
            .map(|binding| binding.pattern.as_str())
            .collect()
    }

    pub fn wildcard_bindings(&self) -> &[WildcardBinding] {
        &self.wildcards
    }

    /// Fanout keys in registration order
    pub fn fanout_keys(&self) -> Vec<&str> {
        self.fanout_order.iter().map(String::as_str).collect()
    }

    pub fn has_fanout(&self) -> bool {
        !self.fanout.is_empty()
    }

    /// Select the target for a delivery
    pub fn resolve(&self, routing_key: &str, headers: &Headers) -> Option<&DispatchTarget> {
        if let Some(target) = self.exact.get(routing_key) {
            return Some(target);
        }

        if let Some(binding) = self
            .wildcards
            .iter()
            .find(|binding| binding.pattern.matches(routing_key))
        {
            return Some(&binding.target);
        }

        if routing_key == FANOUT_ROUTING_KEY {
            return headers
                .get(FANOUT_KEY)
                .and_then(HeaderValue::as_str)
                .and_then(|key| self.fanout.get(key));
        }

        None
    }

    /// Total number of bindings of every kind
    pub fn len(&self) -> usize {
        self.exact.len() + self.wildcards.len() + self.fanout.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
