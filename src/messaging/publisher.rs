//! # Topic Publisher
//!
//! Encodes payloads and publishes them to the bus exchange.

use std::any::type_name;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use super::codec::{JsonCodec, PayloadCodec};
use super::message::{HeaderValue, Headers};
use super::transport::MessageTransport;
use crate::constants::headers::{CONTENT_TYPE, FANOUT_KEY};
use crate::constants::topic::FANOUT_ROUTING_KEY;
use crate::error::Result;
use crate::registry::validate_topic;

/// Publishes typed payloads to one exchange
#[derive(Clone)]
pub struct TopicPublisher<C = JsonCodec> {
    transport: Arc<dyn MessageTransport>,
    exchange: String,
    codec: C,
}

impl TopicPublisher<JsonCodec> {
    pub fn new(transport: Arc<dyn MessageTransport>, exchange: impl Into<String>) -> Self {
        Self::with_codec(transport, exchange, JsonCodec)
    }
}

impl<C: PayloadCodec> TopicPublisher<C> {
    pub fn with_codec(
        transport: Arc<dyn MessageTransport>,
        exchange: impl Into<String>,
        codec: C,
    ) -> Self {
        Self {
            transport,
            exchange: exchange.into(),
            codec,
        }
    }

    pub fn exchange(&self) -> &str {
        &self.exchange
    }

    /// Publish `payload` under a literal topic
    pub async fn publish<T: Serialize>(&self, topic: &str, payload: &T) -> Result<()> {
        self.publish_with_headers(topic, payload, Headers::new())
            .await
    }

    /// Publish `payload` under a literal topic with extra headers
    pub async fn publish_with_headers<T: Serialize>(
        &self,
        topic: &str,
        payload: &T,
        headers: Headers,
    ) -> Result<()> {
        validate_topic(topic)?;
        self.send(topic, payload, headers).await
    }

    /// Publish `payload` to the fanout binding for its type
    ///
    /// The message carries an empty routing key and names its payload type in
    /// the `x-fanout-key` header.
    pub async fn publish_fanout<T: Serialize>(&self, payload: &T) -> Result<()> {
        let mut headers = Headers::new();
        headers.insert(FANOUT_KEY.to_string(), HeaderValue::from(type_name::<T>()));
        self.send(FANOUT_ROUTING_KEY, payload, headers).await
    }

    async fn send<T: Serialize>(
        &self,
        routing_key: &str,
        payload: &T,
        mut headers: Headers,
    ) -> Result<()> {
        let body = self.codec.encode(payload)?;
        headers.insert(
            CONTENT_TYPE.to_string(),
            HeaderValue::from(self.codec.content_type()),
        );

        self.transport
            .publish(&self.exchange, routing_key, headers, body)
            .await?;

        debug!(
            exchange = %self.exchange,
            routing_key = %routing_key,
            payload_type = type_name::<T>(),
            "Published message"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TopicBusError;
    use crate::messaging::providers::InMemoryTransport;
    use crate::registry::RegistryError;

    #[derive(Serialize)]
    struct OrderCreated {
        id: u64,
    }

    #[tokio::test]
    async fn test_publish_encodes_and_tags_content_type() {
        let transport = Arc::new(InMemoryTransport::default());
        let publisher = TopicPublisher::new(transport.clone(), "events");

        publisher
            .publish("orders.created", &OrderCreated { id: 5 })
            .await
            .unwrap();

        let published = transport.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].exchange, "events");
        assert_eq!(published[0].routing_key, "orders.created");
        assert_eq!(published[0].body, br#"{"id":5}"#.to_vec());
        assert_eq!(
            published[0].headers.get(CONTENT_TYPE),
            Some(&HeaderValue::from("application/json"))
        );
    }

    #[tokio::test]
    async fn test_publish_rejects_wildcard_and_blank_topics() {
        let transport = Arc::new(InMemoryTransport::default());
        let publisher = TopicPublisher::new(transport.clone(), "events");

        for topic in ["", "  ", "orders.*"] {
            let err = publisher
                .publish(topic, &OrderCreated { id: 1 })
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                TopicBusError::Registry(RegistryError::InvalidTopic { .. })
            ));
        }
        assert!(transport.published().is_empty());
    }

    #[tokio::test]
    async fn test_fanout_uses_empty_routing_key() {
        let transport = Arc::new(InMemoryTransport::default());
        let publisher = TopicPublisher::new(transport.clone(), "events");

        publisher.publish_fanout(&OrderCreated { id: 2 }).await.unwrap();

        let published = transport.published();
        assert_eq!(published[0].routing_key, "");
        assert!(published[0]
            .headers
            .get(FANOUT_KEY)
            .and_then(HeaderValue::as_str)
            .is_some_and(|key| key.ends_with("OrderCreated")));
    }
}
