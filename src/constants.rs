//! # System Constants
//!
//! Wire names, topic syntax tokens and defaults shared by the registry, the
//! routing engine and the transport providers.
//!
//! The header names in [`headers`] are part of the cross-process contract: any
//! consumer inspecting a republished message relies on them verbatim.

/// Header names stamped onto republished messages and fanout deliveries
pub mod headers {
    /// Fully-qualified kind of the error that failed the handler
    pub const RETRY_EXCEPTION_TYPE: &str = "x-retry-exception-type";
    /// Display text of the error that failed the handler
    pub const RETRY_EXCEPTION_MESSAGE: &str = "x-retry-exception-message";
    /// Rendered error source chain, empty when unavailable
    pub const RETRY_EXCEPTION_STACKTRACE: &str = "x-retry-exception-stacktrace";
    /// Number of times the message has been republished after a failure
    pub const RETRY_REQUEUE_COUNT: &str = "x-retry-requeue-count";

    /// Payload type key carried by fanout publications
    pub const FANOUT_KEY: &str = "x-fanout-key";
    /// Codec content type of the body
    pub const CONTENT_TYPE: &str = "content-type";

    /// All headers owned by the retry protocol
    pub const RETRY_HEADERS: [&str; 4] = [
        RETRY_EXCEPTION_TYPE,
        RETRY_EXCEPTION_MESSAGE,
        RETRY_EXCEPTION_STACKTRACE,
        RETRY_REQUEUE_COUNT,
    ];
}

/// Topic and pattern syntax tokens
pub mod topic {
    /// Separator between topic segments
    pub const SEGMENT_SEPARATOR: char = '.';
    /// Matches exactly one segment
    pub const SINGLE_SEGMENT_WILDCARD: &str = "*";
    /// Matches one or more segments
    pub const MULTI_SEGMENT_WILDCARD: &str = "#";
    /// Routing key used by fanout publications and bindings
    pub const FANOUT_ROUTING_KEY: &str = "";
}

/// Defaults applied when configuration leaves a value unset
pub mod defaults {
    pub const HOST: &str = "localhost";
    pub const PORT: u16 = 5672;
    pub const USERNAME: &str = "guest";
    pub const PASSWORD: &str = "guest";
    pub const VHOST: &str = "%2f";
    pub const EXCHANGE_NAME: &str = "topicbus";
    pub const QUEUE_NAME: &str = "topicbus.default";
    pub const PREFETCH_COUNT: u16 = 32;
    pub const CONNECTION_NAME: &str = "topicbus-listener";
    pub const SHUTDOWN_DRAIN_TIMEOUT_MS: u64 = 30_000;
    pub const CONTENT_TYPE_JSON: &str = "application/json";
}

/// Environment variable names read by [`crate::config::BusConfig::from_env`]
pub mod env {
    pub const URL: &str = "TOPICBUS_URL";
    pub const HOST: &str = "TOPICBUS_HOST";
    pub const PORT: &str = "TOPICBUS_PORT";
    pub const USERNAME: &str = "TOPICBUS_USERNAME";
    pub const PASSWORD: &str = "TOPICBUS_PASSWORD";
    pub const EXCHANGE: &str = "TOPICBUS_EXCHANGE";
    pub const QUEUE: &str = "TOPICBUS_QUEUE";
    pub const PREFETCH_COUNT: &str = "TOPICBUS_PREFETCH_COUNT";
    pub const ENVIRONMENT: &str = "TOPICBUS_ENV";
    pub const LOG_FORMAT: &str = "TOPICBUS_LOG_FORMAT";
    /// Prefix for layered overrides in [`crate::config::BusConfig::load`]
    pub const OVERRIDE_PREFIX: &str = "TOPICBUS";
}
