//! # Message Transport
//!
//! The broker operations the routing layer depends on. Providers live under
//! [`super::providers`]: RabbitMQ over `lapin`, and an in-memory recorder for
//! tests and local development.
//!
//! Implementations own their internal mutual exclusion; the routing engine
//! calls `publish` and `acknowledge` concurrently from many tasks.

use std::sync::Arc;

use async_trait::async_trait;

use super::errors::TransportResult;
use super::message::{DeliveryTag, Headers, InboundMessage};

/// Callback invoked by a transport once per delivery
///
/// Called from the transport's delivery loop, so implementations must return
/// promptly and move any real work onto their own tasks.
pub trait DeliveryHandler: Send + Sync + 'static {
    fn on_delivery(&self, message: InboundMessage);
}

/// Topic-exchange broker operations
#[async_trait]
pub trait MessageTransport: Send + Sync + 'static {
    /// Declare a durable topic exchange
    async fn declare_topic_exchange(&self, name: &str) -> TransportResult<()>;

    /// Declare a durable queue
    async fn declare_queue(&self, name: &str) -> TransportResult<()>;

    /// Bind `queue` to `exchange` for a literal topic or a raw wildcard pattern
    async fn bind_queue(&self, queue: &str, exchange: &str, routing_key: &str)
        -> TransportResult<()>;

    /// Start consuming `queue` with manual acknowledgement
    ///
    /// Returns the consumer tag assigned to the subscription.
    async fn subscribe(
        &self,
        queue: &str,
        handler: Arc<dyn DeliveryHandler>,
    ) -> TransportResult<String>;

    /// Publish a new message
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        headers: Headers,
        body: Vec<u8>,
    ) -> TransportResult<()>;

    /// Positively acknowledge a delivery
    async fn acknowledge(&self, delivery_tag: DeliveryTag) -> TransportResult<()>;

    /// Stop consuming and release the connection
    async fn close(&self) -> TransportResult<()>;

    fn provider_name(&self) -> &'static str;
}
