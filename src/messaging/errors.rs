//! # Messaging Error Types
//!
//! Structured errors for the transport collaborator and the payload codec,
//! using thiserror instead of `Box<dyn Error>` patterns.

use thiserror::Error;

/// Errors raised by a [`MessageTransport`](super::MessageTransport) provider
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Broker connection error: {message}")]
    Connection { message: String },

    #[error("Declare failed for {kind} '{name}': {message}")]
    Declare {
        kind: &'static str,
        name: String,
        message: String,
    },

    #[error("Binding queue '{queue}' to exchange '{exchange}' with key '{routing_key}' failed: {message}")]
    Bind {
        queue: String,
        exchange: String,
        routing_key: String,
        message: String,
    },

    #[error("Subscribing to queue '{queue}' failed: {message}")]
    Subscribe { queue: String, message: String },

    #[error("Publish to exchange '{exchange}' with key '{routing_key}' failed: {message}")]
    Publish {
        exchange: String,
        routing_key: String,
        message: String,
    },

    #[error("Acknowledging delivery {delivery_tag} failed: {message}")]
    Acknowledge { delivery_tag: u64, message: String },

    #[error("Closing transport failed: {message}")]
    Close { message: String },

    #[error("Transport is closed")]
    Closed,
}

impl TransportError {
    /// Create a connection error
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Create an exchange or queue declare error
    pub fn declare(kind: &'static str, name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Declare {
            kind,
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create a queue binding error
    pub fn bind(
        queue: impl Into<String>,
        exchange: impl Into<String>,
        routing_key: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Bind {
            queue: queue.into(),
            exchange: exchange.into(),
            routing_key: routing_key.into(),
            message: message.into(),
        }
    }

    /// Create a subscribe error
    pub fn subscribe(queue: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Subscribe {
            queue: queue.into(),
            message: message.into(),
        }
    }

    /// Create a publish error
    pub fn publish(
        exchange: impl Into<String>,
        routing_key: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Publish {
            exchange: exchange.into(),
            routing_key: routing_key.into(),
            message: message.into(),
        }
    }

    /// Create an acknowledge error
    pub fn acknowledge(delivery_tag: u64, message: impl Into<String>) -> Self {
        Self::Acknowledge {
            delivery_tag,
            message: message.into(),
        }
    }

    /// Create a close error
    pub fn close(message: impl Into<String>) -> Self {
        Self::Close {
            message: message.into(),
        }
    }
}

/// Result type alias for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

/// Errors raised while encoding or decoding message bodies
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Message body is empty")]
    EmptyPayload,

    #[error("Message body decoded to null where a value was required")]
    NullPayload,

    #[error("Message body does not match the expected payload shape: {message}")]
    Malformed { message: String },

    #[error("Payload serialization error: {message}")]
    Encode { message: String },
}

impl CodecError {
    /// Create a malformed payload error
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }

    /// Create an encode error
    pub fn encode(message: impl Into<String>) -> Self {
        Self::Encode {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_creation() {
        let err = TransportError::publish("events", "orders.created", "channel closed");
        assert!(matches!(err, TransportError::Publish { .. }));

        let err = TransportError::acknowledge(42, "channel closed");
        assert!(matches!(err, TransportError::Acknowledge { delivery_tag: 42, .. }));
    }

    #[test]
    fn test_error_display() {
        let err = TransportError::bind("q", "events", "orders.#", "access refused");
        let display = format!("{err}");
        assert!(display.contains("'q'"));
        assert!(display.contains("'events'"));
        assert!(display.contains("orders.#"));
        assert!(display.contains("access refused"));

        let err = CodecError::malformed("missing field `id`");
        assert!(err.to_string().contains("missing field `id`"));
    }
}
