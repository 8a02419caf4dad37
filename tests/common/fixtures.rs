//! Shared payloads and listener setup for integration tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use topicbus::config::BusConfig;
use topicbus::messaging::providers::InMemoryTransport;
use topicbus::messaging::Headers;
use topicbus::routing::{TopicListener, TopicListenerBuilder};

pub const EXCHANGE: &str = "test.events";
pub const QUEUE: &str = "test.events.queue";
pub const WAIT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCreated {
    pub id: u64,
    pub region: String,
}

impl OrderCreated {
    pub fn body(id: u64) -> Vec<u8> {
        serde_json::to_vec(&OrderCreated {
            id,
            region: "eu".to_string(),
        })
        .unwrap()
    }
}

#[derive(Debug, thiserror::Error)]
#[error("order {id} rejected by billing")]
pub struct BillingRejected {
    pub id: u64,
}

/// Shared invocation counter
#[derive(Debug, Clone, Default)]
pub struct Calls(Arc<AtomicUsize>);

impl Calls {
    pub fn hit(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

pub fn test_config() -> BusConfig {
    BusConfig::builder()
        .with_exchange(EXCHANGE)
        .with_queue(QUEUE)
        .with_drain_timeout(WAIT)
        .build()
        .unwrap()
}

pub fn builder() -> TopicListenerBuilder {
    TopicListenerBuilder::new(test_config())
}

/// Build and start a listener over a fresh in-memory transport
pub async fn start(builder: TopicListenerBuilder) -> (TopicListener, Arc<InMemoryTransport>) {
    let transport = Arc::new(InMemoryTransport::new(EXCHANGE));
    let listener = builder.build(transport.clone());
    listener.start().await.unwrap();
    (listener, transport)
}

/// Deliver a message to the test queue with no headers
pub fn deliver(transport: &InMemoryTransport, routing_key: &str, body: Vec<u8>) -> u64 {
    transport
        .deliver(QUEUE, routing_key, Headers::new(), body)
        .unwrap()
        .value()
}
