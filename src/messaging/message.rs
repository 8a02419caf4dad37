//! # Message Structures
//!
//! Broker-neutral views of inbound deliveries and their headers. Providers
//! convert their native delivery types into [`InboundMessage`] before handing
//! them to the routing engine.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single header value
///
/// Covers the value shapes that survive a round trip through an AMQP header
/// table. Integer widths are normalized to `i64`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HeaderValue {
    String(String),
    Integer(i64),
    Boolean(bool),
    Float(f64),
    Bytes(Vec<u8>),
}

impl HeaderValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            _ => None,
        }
    }
}

impl From<&str> for HeaderValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for HeaderValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for HeaderValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<u32> for HeaderValue {
    fn from(value: u32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<bool> for HeaderValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl fmt::Display for HeaderValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(value) => f.write_str(value),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Boolean(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::Bytes(value) => write!(f, "<{} bytes>", value.len()),
        }
    }
}

/// Message headers, ordered by name
pub type Headers = BTreeMap<String, HeaderValue>;

/// Broker-assigned delivery identifier used for acknowledgement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeliveryTag(pub u64);

impl DeliveryTag {
    pub fn value(self) -> u64 {
        self.0
    }
}

impl From<u64> for DeliveryTag {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for DeliveryTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Immutable view of one broker delivery
///
/// Owned by the task handling it; handlers only ever see the decoded payload.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    routing_key: String,
    body: Vec<u8>,
    headers: Headers,
    delivery_tag: DeliveryTag,
    exchange: String,
    consumer_tag: String,
    redelivered: bool,
    received_at: DateTime<Utc>,
}

impl InboundMessage {
    /// Start building a message for the given routing key
    pub fn builder(routing_key: impl Into<String>) -> InboundMessageBuilder {
        InboundMessageBuilder::new(routing_key)
    }

    pub fn routing_key(&self) -> &str {
        &self.routing_key
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&HeaderValue> {
        self.headers.get(name)
    }

    pub fn delivery_tag(&self) -> DeliveryTag {
        self.delivery_tag
    }

    pub fn exchange(&self) -> &str {
        &self.exchange
    }

    pub fn consumer_tag(&self) -> &str {
        &self.consumer_tag
    }

    pub fn redelivered(&self) -> bool {
        self.redelivered
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }
}

/// Builder for [`InboundMessage`]
#[derive(Debug, Clone)]
pub struct InboundMessageBuilder {
    routing_key: String,
    body: Vec<u8>,
    headers: Headers,
    delivery_tag: DeliveryTag,
    exchange: String,
    consumer_tag: String,
    redelivered: bool,
}

impl InboundMessageBuilder {
    fn new(routing_key: impl Into<String>) -> Self {
        Self {
            routing_key: routing_key.into(),
            body: Vec::new(),
            headers: Headers::new(),
            delivery_tag: DeliveryTag(0),
            exchange: String::new(),
            consumer_tag: String::new(),
            redelivered: false,
        }
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<HeaderValue>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn delivery_tag(mut self, delivery_tag: impl Into<DeliveryTag>) -> Self {
        self.delivery_tag = delivery_tag.into();
        self
    }

    pub fn exchange(mut self, exchange: impl Into<String>) -> Self {
        self.exchange = exchange.into();
        self
    }

    pub fn consumer_tag(mut self, consumer_tag: impl Into<String>) -> Self {
        self.consumer_tag = consumer_tag.into();
        self
    }

    pub fn redelivered(mut self, redelivered: bool) -> Self {
        self.redelivered = redelivered;
        self
    }

    pub fn build(self) -> InboundMessage {
        InboundMessage {
            routing_key: self.routing_key,
            body: self.body,
            headers: self.headers,
            delivery_tag: self.delivery_tag,
            exchange: self.exchange,
            consumer_tag: self.consumer_tag,
            redelivered: self.redelivered,
            received_at: Utc::now(),
        }
    }
}
