//! # Topic Listener
//!
//! Owns the broker-facing lifecycle of one routing engine:
//!
//! ```text
//! Built ──start()──▶ Listening ──stop()──▶ Stopped
//!   └──────────────stop()───────────────────▲
//! ```
//!
//! `start` declares the exchange and queue, binds the queue once per exact
//! topic and once per raw wildcard pattern (plus the empty routing key when
//! fanout bindings exist), then subscribes. `stop` stops routing new
//! deliveries, waits for in-flight handlers up to the configured drain
//! timeout, and closes the transport. Handlers still running at the deadline
//! keep running but their deliveries may never be acknowledged.

use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::engine::{ListenerState, RoutingEngine, RoutingStatsSnapshot};
use super::errors::{RoutingError, RoutingResult};
use crate::config::BusConfig;
use crate::constants::topic::FANOUT_ROUTING_KEY;
use crate::messaging::{DeliveryHandler, MessageTransport};

/// A routing engine bound to a queue on a topic exchange
#[derive(Debug)]
pub struct TopicListener {
    engine: RoutingEngine,
    config: BusConfig,
    consumer_tag: Mutex<Option<String>>,
}

impl TopicListener {
    pub(crate) fn new(engine: RoutingEngine, config: BusConfig) -> Self {
        Self {
            engine,
            config,
            consumer_tag: Mutex::new(None),
        }
    }

    pub fn engine(&self) -> &RoutingEngine {
        &self.engine
    }

    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    pub fn state(&self) -> ListenerState {
        self.engine.state()
    }

    pub fn stats(&self) -> RoutingStatsSnapshot {
        self.engine.stats()
    }

    /// Consumer tag of the active subscription
    pub fn consumer_tag(&self) -> Option<String> {
        self.consumer_tag.lock().clone()
    }

    /// Declare, bind and subscribe, then start routing
    ///
    /// Only valid from `Built`. Any failure, including a rejected
    /// subscription, leaves the listener in `Built` so `start` can be retried.
    pub async fn start(&self) -> RoutingResult<()> {
        let state = self.engine.state();
        if state != ListenerState::Built {
            return Err(RoutingError::InvalidStateTransition {
                from: state,
                to: ListenerState::Listening,
            });
        }

        let transport = self.engine.transport().clone();
        let registry = self.engine.registry().clone();
        let exchange = self.config.exchange_name.as_str();
        let queue = self.config.queue_name.as_str();

        transport.declare_topic_exchange(exchange).await?;
        transport.declare_queue(queue).await?;

        let mut routing_keys: Vec<&str> = registry.topics();
        routing_keys.extend(registry.wildcard_patterns());
        if registry.has_fanout() {
            routing_keys.push(FANOUT_ROUTING_KEY);
        }
        for routing_key in &routing_keys {
            transport.bind_queue(queue, exchange, routing_key).await?;
        }
        debug!(
            queue = %queue,
            exchange = %exchange,
            bindings = routing_keys.len(),
            "Queue bindings declared"
        );

        // Routing must be open before the broker can push the first delivery
        self.engine.transition(ListenerState::Listening)?;
        let handler: Arc<dyn DeliveryHandler> = Arc::new(self.engine.clone());
        match transport.subscribe(queue, handler).await {
            Ok(consumer_tag) => {
                info!(
                    queue = %queue,
                    exchange = %exchange,
                    consumer_tag = %consumer_tag,
                    provider = transport.provider_name(),
                    "Topic listener started"
                );
                *self.consumer_tag.lock() = Some(consumer_tag);
                Ok(())
            }
            Err(e) => {
                self.engine.reopen_after_failed_start();
                warn!(
                    queue = %queue,
                    exchange = %exchange,
                    error = %e,
                    "Subscription failed; listener returned to built"
                );
                Err(e.into())
            }
        }
    }

    /// Stop routing, drain in-flight handlers and close the transport
    ///
    /// Stopping an already stopped listener is a no-op.
    pub async fn stop(&self) -> RoutingResult<()> {
        if self.engine.state() == ListenerState::Stopped {
            debug!("Topic listener already stopped");
            return Ok(());
        }
        self.engine.transition(ListenerState::Stopped)?;

        let timeout = self.config.drain_timeout();
        if !self.engine.drain(timeout).await {
            warn!(
                in_flight = self.engine.in_flight(),
                timeout_ms = self.config.shutdown_drain_timeout_ms,
                "Drain timeout elapsed with handlers still running"
            );
        }

        self.engine.transport().close().await?;
        let stats = self.engine.stats();
        info!(
            queue = %self.config.queue_name,
            received = stats.received,
            handled = stats.handled,
            retried = stats.retried,
            unroutable = stats.unroutable,
            "Topic listener stopped"
        );
        Ok(())
    }

    /// Start, wait for `shutdown` to resolve, then stop
    pub async fn run_until<F>(&self, shutdown: F) -> RoutingResult<()>
    where
        F: Future<Output = ()>,
    {
        self.start().await?;
        shutdown.await;
        self.stop().await
    }

    pub fn transport(&self) -> &Arc<dyn MessageTransport> {
        self.engine.transport()
    }
}
