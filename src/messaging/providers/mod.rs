//! # Transport Providers
//!
//! Concrete [`MessageTransport`](super::MessageTransport) implementations:
//!
//! - [`RabbitMqTransport`] - RabbitMQ via the lapin crate
//! - [`InMemoryTransport`] - recording transport for tests and local development

pub mod in_memory;
pub mod rabbitmq;

pub use in_memory::{InMemoryTransport, PublishedMessage, RecordedBinding};
pub use rabbitmq::RabbitMqTransport;
