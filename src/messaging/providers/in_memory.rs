//! # In-Memory Transport
//!
//! Recording [`MessageTransport`] for tests and local development.
//!
//! ## Features
//!
//! - **Recording**: exchanges, queues, bindings, publishes and acks are kept in order
//! - **Simulated delivery**: [`InMemoryTransport::deliver`] plays the broker's role
//! - **Failure injection**: publish, acknowledge and subscribe failures on demand
//!
//! Publishing does not loop messages back to subscribers; tests deliver
//! republished messages explicitly when they want to follow a retry chain.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::{sleep, Instant};
use tracing::debug;

use crate::messaging::errors::{TransportError, TransportResult};
use crate::messaging::message::{DeliveryTag, Headers, InboundMessage};
use crate::messaging::transport::{DeliveryHandler, MessageTransport};

const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// One queue-to-exchange binding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedBinding {
    pub queue: String,
    pub exchange: String,
    pub routing_key: String,
}

/// One published message
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedMessage {
    pub exchange: String,
    pub routing_key: String,
    pub headers: Headers,
    pub body: Vec<u8>,
}

struct Subscription {
    consumer_tag: String,
    handler: Arc<dyn DeliveryHandler>,
}

#[derive(Default)]
struct Recorded {
    exchanges: Vec<String>,
    queues: Vec<String>,
    bindings: Vec<RecordedBinding>,
    published: Vec<PublishedMessage>,
    acknowledged: Vec<DeliveryTag>,
    subscriptions: HashMap<String, Subscription>,
}

/// In-memory transport
pub struct InMemoryTransport {
    exchange: String,
    recorded: Mutex<Recorded>,
    next_delivery_tag: AtomicU64,
    next_consumer: AtomicU64,
    failing_publishes: AtomicUsize,
    fail_acks: AtomicBool,
    fail_subscribe: AtomicBool,
    closed: AtomicBool,
}

impl std::fmt::Debug for InMemoryTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryTransport")
            .field("exchange", &self.exchange)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Default for InMemoryTransport {
    fn default() -> Self {
        Self::new(crate::constants::defaults::EXCHANGE_NAME)
    }
}

impl InMemoryTransport {
    /// Create a transport whose simulated deliveries come from `exchange`
    pub fn new(exchange: impl Into<String>) -> Self {
        Self {
            exchange: exchange.into(),
            recorded: Mutex::new(Recorded::default()),
            next_delivery_tag: AtomicU64::new(1),
            next_consumer: AtomicU64::new(1),
            failing_publishes: AtomicUsize::new(0),
            fail_acks: AtomicBool::new(false),
            fail_subscribe: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    /// Simulate a broker delivery to the subscriber of `queue`
    ///
    /// Returns the delivery tag assigned to the message.
    pub fn deliver(
        &self,
        queue: &str,
        routing_key: &str,
        headers: Headers,
        body: impl Into<Vec<u8>>,
    ) -> TransportResult<DeliveryTag> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }

        let (consumer_tag, handler) = {
            let recorded = self.recorded.lock();
            let subscription = recorded.subscriptions.get(queue).ok_or_else(|| {
                TransportError::subscribe(queue, "no subscriber for queue")
            })?;
            (
                subscription.consumer_tag.clone(),
                subscription.handler.clone(),
            )
        };

        let delivery_tag = DeliveryTag(self.next_delivery_tag.fetch_add(1, Ordering::SeqCst));
        let message = InboundMessage::builder(routing_key)
            .exchange(self.exchange.as_str())
            .consumer_tag(consumer_tag)
            .delivery_tag(delivery_tag)
            .headers(headers)
            .body(body)
            .build();

        handler.on_delivery(message);
        Ok(delivery_tag)
    }

    /// Make the next `count` publishes fail
    pub fn fail_next_publishes(&self, count: usize) {
        self.failing_publishes.store(count, Ordering::SeqCst);
    }

    /// Make every acknowledge fail until reset
    pub fn set_fail_acks(&self, fail: bool) {
        self.fail_acks.store(fail, Ordering::SeqCst);
    }

    /// Make every subscribe fail until reset
    pub fn set_fail_subscribe(&self, fail: bool) {
        self.fail_subscribe.store(fail, Ordering::SeqCst);
    }

    pub fn exchanges(&self) -> Vec<String> {
        self.recorded.lock().exchanges.clone()
    }

    pub fn queues(&self) -> Vec<String> {
        self.recorded.lock().queues.clone()
    }

    pub fn bindings(&self) -> Vec<RecordedBinding> {
        self.recorded.lock().bindings.clone()
    }

    /// Routing keys bound to `queue`, in binding order
    pub fn bound_keys(&self, queue: &str) -> Vec<String> {
        self.recorded
            .lock()
            .bindings
            .iter()
            .filter(|binding| binding.queue == queue)
            .map(|binding| binding.routing_key.clone())
            .collect()
    }

    pub fn published(&self) -> Vec<PublishedMessage> {
        self.recorded.lock().published.clone()
    }

    pub fn acknowledged(&self) -> Vec<DeliveryTag> {
        self.recorded.lock().acknowledged.clone()
    }

    pub fn is_subscribed(&self, queue: &str) -> bool {
        self.recorded.lock().subscriptions.contains_key(queue)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Wait until at least `count` acknowledgements were recorded
    pub async fn wait_for_acks(&self, count: usize, timeout: Duration) -> bool {
        self.wait_until(timeout, |recorded| recorded.acknowledged.len() >= count)
            .await
    }

    /// Wait until at least `count` publishes were recorded
    pub async fn wait_for_publishes(&self, count: usize, timeout: Duration) -> bool {
        self.wait_until(timeout, |recorded| recorded.published.len() >= count)
            .await
    }

    async fn wait_until(&self, timeout: Duration, done: impl Fn(&Recorded) -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if done(&self.recorded.lock()) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    fn ensure_open(&self) -> TransportResult<()> {
        if self.is_closed() {
            Err(TransportError::Closed)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl MessageTransport for InMemoryTransport {
    async fn declare_topic_exchange(&self, name: &str) -> TransportResult<()> {
        self.ensure_open()?;
        let mut recorded = self.recorded.lock();
        if !recorded.exchanges.iter().any(|exchange| exchange == name) {
            recorded.exchanges.push(name.to_string());
        }
        Ok(())
    }

    async fn declare_queue(&self, name: &str) -> TransportResult<()> {
        self.ensure_open()?;
        let mut recorded = self.recorded.lock();
        if !recorded.queues.iter().any(|queue| queue == name) {
            recorded.queues.push(name.to_string());
        }
        Ok(())
    }

    async fn bind_queue(
        &self,
        queue: &str,
        exchange: &str,
        routing_key: &str,
    ) -> TransportResult<()> {
        self.ensure_open()?;
        let mut recorded = self.recorded.lock();
        if !recorded.queues.iter().any(|name| name == queue) {
            return Err(TransportError::bind(
                queue,
                exchange,
                routing_key,
                "queue not declared",
            ));
        }
        recorded.bindings.push(RecordedBinding {
            queue: queue.to_string(),
            exchange: exchange.to_string(),
            routing_key: routing_key.to_string(),
        });
        Ok(())
    }

    async fn subscribe(
        &self,
        queue: &str,
        handler: Arc<dyn DeliveryHandler>,
    ) -> TransportResult<String> {
        self.ensure_open()?;
        if self.fail_subscribe.load(Ordering::SeqCst) {
            return Err(TransportError::subscribe(queue, "injected subscribe failure"));
        }
        let consumer_tag = format!(
            "in-memory-consumer-{}",
            self.next_consumer.fetch_add(1, Ordering::SeqCst)
        );
        self.recorded.lock().subscriptions.insert(
            queue.to_string(),
            Subscription {
                consumer_tag: consumer_tag.clone(),
                handler,
            },
        );
        debug!(queue = %queue, consumer_tag = %consumer_tag, "In-memory subscription registered");
        Ok(consumer_tag)
    }

    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        headers: Headers,
        body: Vec<u8>,
    ) -> TransportResult<()> {
        self.ensure_open()?;
        let injected_failure = self
            .failing_publishes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |remaining| {
                remaining.checked_sub(1)
            })
            .is_ok();
        if injected_failure {
            return Err(TransportError::publish(
                exchange,
                routing_key,
                "injected publish failure",
            ));
        }

        self.recorded.lock().published.push(PublishedMessage {
            exchange: exchange.to_string(),
            routing_key: routing_key.to_string(),
            headers,
            body,
        });
        Ok(())
    }

    async fn acknowledge(&self, delivery_tag: DeliveryTag) -> TransportResult<()> {
        self.ensure_open()?;
        if self.fail_acks.load(Ordering::SeqCst) {
            return Err(TransportError::acknowledge(
                delivery_tag.value(),
                "injected acknowledge failure",
            ));
        }
        self.recorded.lock().acknowledged.push(delivery_tag);
        Ok(())
    }

    async fn close(&self) -> TransportResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        self.recorded.lock().subscriptions.clear();
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "in_memory"
    }
}
