//! # Routing Engine
//!
//! Resolves each delivery to one dispatch target and drives its lifecycle:
//! dispatch, then acknowledge on success or republish-with-retry-headers and
//! acknowledge on failure.
//!
//! ## Concurrency
//!
//! [`RoutingEngine::route`] resolves synchronously and hands the dispatch off to
//! a task owned by the engine's [`TaskTracker`], so the transport's delivery
//! loop never waits on a handler. Messages therefore complete in no particular
//! order, even for the same routing key. Consumers that need ordering must
//! partition by topic or sequence messages themselves.
//!
//! The registry is frozen before the engine exists and is only read here. No
//! lock is held across an await point; the state lock guards a `Copy` value
//! and is released before any I/O.
//!
//! No timeout is applied to handlers. A handler that never completes holds its
//! task (and its unacknowledged delivery) until the process exits.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::Serialize;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, warn};

use super::errors::{RoutingError, RoutingResult};
use crate::dispatch::{DispatchError, DispatchTarget};
use crate::messaging::{requeue_count, stamp, DeliveryHandler, InboundMessage, MessageTransport};
use crate::registry::HandlerRegistry;

/// Listener lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ListenerState {
    /// Registry frozen, not yet subscribed
    Built,
    /// Subscribed and routing deliveries
    Listening,
    /// Terminal
    Stopped,
}

impl ListenerState {
    pub fn can_transition_to(self, next: ListenerState) -> bool {
        matches!(
            (self, next),
            (Self::Built, Self::Listening)
                | (Self::Built, Self::Stopped)
                | (Self::Listening, Self::Stopped)
        )
    }
}

impl fmt::Display for ListenerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Built => "built",
            Self::Listening => "listening",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Default)]
struct RoutingStats {
    received: AtomicU64,
    handled: AtomicU64,
    retried: AtomicU64,
    unroutable: AtomicU64,
    ack_failures: AtomicU64,
    republish_failures: AtomicU64,
}

/// Point-in-time copy of the engine counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RoutingStatsSnapshot {
    /// Deliveries accepted while listening
    pub received: u64,
    /// Successful dispatches that were acknowledged
    pub handled: u64,
    /// Failed dispatches republished with retry headers
    pub retried: u64,
    /// Deliveries with no matching binding
    pub unroutable: u64,
    pub ack_failures: u64,
    pub republish_failures: u64,
}

struct EngineInner {
    registry: Arc<HandlerRegistry>,
    transport: Arc<dyn MessageTransport>,
    default_exchange: String,
    tracker: TaskTracker,
    state: RwLock<ListenerState>,
    stats: RoutingStats,
}

/// Per-message routing over a frozen registry
///
/// Cheap to clone; clones share state, counters and in-flight tasks.
#[derive(Clone)]
pub struct RoutingEngine {
    inner: Arc<EngineInner>,
}

impl fmt::Debug for RoutingEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoutingEngine")
            .field("state", &self.state())
            .field("bindings", &self.inner.registry.len())
            .field("transport", &self.inner.transport.provider_name())
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

impl RoutingEngine {
    /// Create an engine in the `Built` state
    ///
    /// `default_exchange` is used for republishing when a delivery does not
    /// name its exchange.
    pub fn new(
        registry: Arc<HandlerRegistry>,
        transport: Arc<dyn MessageTransport>,
        default_exchange: impl Into<String>,
    ) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                registry,
                transport,
                default_exchange: default_exchange.into(),
                tracker: TaskTracker::new(),
                state: RwLock::new(ListenerState::Built),
                stats: RoutingStats::default(),
            }),
        }
    }

    pub fn state(&self) -> ListenerState {
        *self.inner.state.read()
    }

    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.inner.registry
    }

    pub fn transport(&self) -> &Arc<dyn MessageTransport> {
        &self.inner.transport
    }

    /// Number of dispatch tasks still running
    pub fn in_flight(&self) -> usize {
        self.inner.tracker.len()
    }

    pub fn stats(&self) -> RoutingStatsSnapshot {
        let stats = &self.inner.stats;
        RoutingStatsSnapshot {
            received: stats.received.load(Ordering::Relaxed),
            handled: stats.handled.load(Ordering::Relaxed),
            retried: stats.retried.load(Ordering::Relaxed),
            unroutable: stats.unroutable.load(Ordering::Relaxed),
            ack_failures: stats.ack_failures.load(Ordering::Relaxed),
            republish_failures: stats.republish_failures.load(Ordering::Relaxed),
        }
    }

    /// Move to `next`, rejecting transitions the lifecycle does not allow
    pub fn transition(&self, next: ListenerState) -> RoutingResult<()> {
        let mut state = self.inner.state.write();
        if !state.can_transition_to(next) {
            return Err(RoutingError::InvalidStateTransition {
                from: *state,
                to: next,
            });
        }

        debug!(from = %*state, to = %next, "Listener state transition");
        *state = next;
        Ok(())
    }

    /// Undo an opening `Built → Listening` move whose subscription failed
    pub(crate) fn reopen_after_failed_start(&self) {
        let mut state = self.inner.state.write();
        if *state == ListenerState::Listening {
            debug!("Listener start rolled back");
            *state = ListenerState::Built;
        }
    }

    /// Resolve `message` and spawn its dispatch
    ///
    /// Returns once the dispatch task is spawned. Fails when the engine is not
    /// listening or no binding matches; in both cases the delivery is left
    /// unacknowledged.
    pub fn route(&self, message: InboundMessage) -> RoutingResult<()> {
        let state = self.state();
        if state != ListenerState::Listening {
            return Err(RoutingError::NotListening { state });
        }
        self.inner.stats.received.fetch_add(1, Ordering::Relaxed);

        let target = self
            .inner
            .registry
            .resolve(message.routing_key(), message.headers())
            .cloned()
            .ok_or_else(|| {
                RoutingError::no_matching_handler(
                    message.routing_key(),
                    message.exchange(),
                    message.delivery_tag().value(),
                    message.consumer_tag(),
                )
            })?;

        let inner = self.inner.clone();
        self.inner
            .tracker
            .spawn(async move { inner.process(target, message).await });
        Ok(())
    }

    /// Stop accepting new tasks and wait for in-flight ones
    ///
    /// Returns `false` when tasks were still running at the deadline.
    pub async fn drain(&self, timeout: Duration) -> bool {
        self.inner.tracker.close();
        tokio::time::timeout(timeout, self.inner.tracker.wait())
            .await
            .is_ok()
    }
}

impl DeliveryHandler for RoutingEngine {
    fn on_delivery(&self, message: InboundMessage) {
        let routing_key = message.routing_key().to_string();
        let exchange = message.exchange().to_string();
        let consumer_tag = message.consumer_tag().to_string();
        let delivery_tag = message.delivery_tag();

        match self.route(message) {
            Ok(()) => {}
            Err(RoutingError::NoMatchingHandler { .. }) => {
                self.inner.stats.unroutable.fetch_add(1, Ordering::Relaxed);
                error!(
                    routing_key = %routing_key,
                    exchange = %exchange,
                    delivery_tag = %delivery_tag,
                    consumer_tag = %consumer_tag,
                    "Delivery left unacknowledged: no handler bound for routing key"
                );
            }
            Err(err) => {
                warn!(
                    routing_key = %routing_key,
                    exchange = %exchange,
                    delivery_tag = %delivery_tag,
                    consumer_tag = %consumer_tag,
                    error = %err,
                    "Delivery ignored"
                );
            }
        }
    }
}

impl EngineInner {
    async fn process(&self, target: DispatchTarget, message: InboundMessage) {
        match target.dispatch(&message).await {
            Ok(()) => {
                if self.acknowledge(&message).await {
                    self.stats.handled.fetch_add(1, Ordering::Relaxed);
                    debug!(
                        routing_key = %message.routing_key(),
                        delivery_tag = %message.delivery_tag(),
                        payload_type = target.payload_type(),
                        "Message handled"
                    );
                }
            }
            Err(failure) => self.retry(&message, &failure).await,
        }
    }

    /// Republish with stamped retry headers, then acknowledge the original
    async fn retry(&self, message: &InboundMessage, failure: &DispatchError) {
        let headers = stamp(message.headers(), failure);
        let count = requeue_count(&headers).unwrap_or(1);
        let exchange = if message.exchange().is_empty() {
            self.default_exchange.as_str()
        } else {
            message.exchange()
        };

        if let Err(e) = self
            .transport
            .publish(
                exchange,
                message.routing_key(),
                headers,
                message.body().to_vec(),
            )
            .await
        {
            self.stats.republish_failures.fetch_add(1, Ordering::Relaxed);
            error!(
                routing_key = %message.routing_key(),
                exchange = %exchange,
                delivery_tag = %message.delivery_tag(),
                consumer_tag = %message.consumer_tag(),
                requeue_count = count,
                handler_error = %failure,
                error = %e,
                "Retry republish failed; original delivery left unacknowledged"
            );
            return;
        }

        self.stats.retried.fetch_add(1, Ordering::Relaxed);
        warn!(
            routing_key = %message.routing_key(),
            exchange = %exchange,
            delivery_tag = %message.delivery_tag(),
            consumer_tag = %message.consumer_tag(),
            requeue_count = count,
            error_type = %failure.error_type(),
            error = %failure,
            "Handler failed; message republished for retry"
        );

        self.acknowledge(message).await;
    }

    async fn acknowledge(&self, message: &InboundMessage) -> bool {
        match self.transport.acknowledge(message.delivery_tag()).await {
            Ok(()) => true,
            Err(e) => {
                self.stats.ack_failures.fetch_add(1, Ordering::Relaxed);
                error!(
                    routing_key = %message.routing_key(),
                    exchange = %message.exchange(),
                    delivery_tag = %message.delivery_tag(),
                    consumer_tag = %message.consumer_tag(),
                    error = %e,
                    "Failed to acknowledge delivery"
                );
                false
            }
        }
    }
}
