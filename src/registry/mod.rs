//! # Registry
//!
//! Topic binding registry and the wildcard pattern compiler it relies on.
//!
//! ## Architecture
//!
//! ```text
//! Registry
//! ├── TopicPattern      (wildcard compilation & matching)
//! └── HandlerRegistry   (exact, wildcard and fanout bindings)
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use topicbus::dispatch::{CallbackDispatcher, DispatchTarget, TargetKind};
//! use topicbus::messaging::{Headers, JsonCodec};
//! use topicbus::registry::HandlerRegistry;
//!
//! let dispatcher = CallbackDispatcher::from_sync(JsonCodec, |_event: serde_json::Value| {
//!     Ok::<_, std::io::Error>(())
//! });
//! let target = DispatchTarget::new(TargetKind::Callback, Arc::new(dispatcher));
//!
//! let mut registry = HandlerRegistry::new();
//! registry.register_wildcard("orders.#", target).unwrap();
//! assert!(registry.resolve("orders.created.eu", &Headers::new()).is_some());
//! ```

pub mod errors;
pub mod handler_registry;
pub mod topic_pattern;

pub use errors::{RegistryError, RegistryResult};
pub use handler_registry::{HandlerRegistry, WildcardBinding};
pub use topic_pattern::{is_wildcard_expression, validate_topic, TopicPattern};
