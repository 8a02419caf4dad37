//! # Routing Error Types

use thiserror::Error;

use super::engine::ListenerState;
use crate::messaging::TransportError;

#[derive(Error, Debug)]
pub enum RoutingError {
    #[error(
        "No handler bound for routing key '{routing_key}' (exchange '{exchange}', delivery {delivery_tag}, consumer '{consumer_tag}')"
    )]
    NoMatchingHandler {
        routing_key: String,
        exchange: String,
        delivery_tag: u64,
        consumer_tag: String,
    },

    #[error("Listener is not accepting deliveries in state {state}")]
    NotListening { state: ListenerState },

    #[error("Invalid listener state transition from {from} to {to}")]
    InvalidStateTransition {
        from: ListenerState,
        to: ListenerState,
    },

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl RoutingError {
    /// Create a no-matching-handler error
    pub fn no_matching_handler(
        routing_key: impl Into<String>,
        exchange: impl Into<String>,
        delivery_tag: u64,
        consumer_tag: impl Into<String>,
    ) -> Self {
        Self::NoMatchingHandler {
            routing_key: routing_key.into(),
            exchange: exchange.into(),
            delivery_tag,
            consumer_tag: consumer_tag.into(),
        }
    }
}

/// Result type for routing operations
pub type RoutingResult<T> = Result<T, RoutingError>;
