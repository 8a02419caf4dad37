//! # Routing
//!
//! Per-message routing and the listener lifecycle around it.
//!
//! ```text
//! transport delivery loop
//!        │ on_delivery
//!        ▼
//! RoutingEngine::route ──resolve──▶ HandlerRegistry
//!        │ spawn (TaskTracker)
//!        ▼
//! DispatchTarget::dispatch
//!        ├── Ok  ──▶ acknowledge
//!        └── Err ──▶ republish with retry headers ──▶ acknowledge
//! ```

pub mod builder;
pub mod engine;
pub mod errors;
pub mod listener;

pub use builder::TopicListenerBuilder;
pub use engine::{ListenerState, RoutingEngine, RoutingStatsSnapshot};
pub use errors::{RoutingError, RoutingResult};
pub use listener::TopicListener;
