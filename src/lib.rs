#![allow(clippy::doc_markdown)] // Allow technical terms like RabbitMQ, AMQP in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # TopicBus Core
//!
//! Topic-based publish/subscribe dispatch over an AMQP topic exchange.
//!
//! ## Overview
//!
//! Handlers are bound to literal topics (`orders.created`) or wildcard
//! patterns (`orders.*`, `orders.#`). One listener consumes a queue bound to
//! every registered topic and pattern, decodes each delivery into the bound
//! handler's payload type and runs the handler on its own task.
//!
//! ## Delivery Semantics
//!
//! - **Exact first**: an exact topic binding always wins over wildcards
//! - **First wildcard wins**: overlapping patterns resolve in registration order
//! - **Ack on success**: the delivery is acknowledged once the handler returns `Ok`
//! - **Republish on failure**: a failed delivery is republished to the same
//!   exchange and routing key with `x-retry-*` headers, then acknowledged
//! - **Unroutable deliveries** are logged and left unacknowledged
//!
//! Handlers run concurrently, so no ordering is guaranteed between messages,
//! even on the same routing key. Partition by topic or sequence messages in
//! the handler when order matters.
//!
//! ## Module Organization
//!
//! - [`registry`] - Topic pattern compilation and the handler registry
//! - [`dispatch`] - Callback and listener dispatchers
//! - [`messaging`] - Message model, codec, retry headers, transports, publisher
//! - [`routing`] - Routing engine, listener lifecycle and registration builder
//! - [`config`] - Broker and listener configuration
//! - [`logging`] - Structured logging setup
//! - [`error`] - Structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use serde::Deserialize;
//! use topicbus::config::BusConfig;
//! use topicbus::messaging::providers::RabbitMqTransport;
//! use topicbus::routing::TopicListenerBuilder;
//!
//! #[derive(Debug, Deserialize)]
//! struct OrderCreated { id: u64 }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! topicbus::logging::init_structured_logging();
//!
//! let config = BusConfig::from_env()?;
//! let transport = Arc::new(RabbitMqTransport::connect(&config).await?);
//!
//! let mut builder = TopicListenerBuilder::new(config);
//! builder.handle("orders.created", |order: OrderCreated| async move {
//!     tracing::info!(order_id = order.id, "order created");
//!     Ok::<_, std::io::Error>(())
//! })?;
//!
//! let listener = builder.build(transport);
//! listener
//!     .run_until(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! ```bash
//! cargo test --lib    # Unit tests
//! cargo test          # All tests, using the in-memory transport
//! ```

pub mod config;
pub mod constants;
pub mod dispatch;
pub mod error;
pub mod logging;
pub mod messaging;
pub mod registry;
pub mod routing;

pub use self::config::{BusConfig, ConfigurationError};
pub use dispatch::{
    CallbackDispatcher, DispatchError, DispatchTarget, Dispatcher, EventListener,
    HandlerFailure, ListenerBindings, ListenerDispatcher,
};
pub use error::{Result, TopicBusError};
pub use messaging::{
    HeaderValue, Headers, InboundMessage, JsonCodec, MessageTransport, PayloadCodec,
    RetryMetadata, TopicPublisher,
};
pub use registry::{HandlerRegistry, RegistryError, TopicPattern};
pub use routing::{
    ListenerState, RoutingEngine, RoutingError, TopicListener, TopicListenerBuilder,
};
