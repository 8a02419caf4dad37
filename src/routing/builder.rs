//! # Listener Builder
//!
//! Explicit registration API. Every binding is validated as it is added, so
//! a bad pattern or a duplicate topic fails at the call site instead of at
//! first delivery. [`TopicListenerBuilder::build`] freezes the registry.
//!
//! ```rust
//! use std::sync::Arc;
//! use serde::Deserialize;
//! use topicbus::config::BusConfig;
//! use topicbus::messaging::providers::InMemoryTransport;
//! use topicbus::routing::TopicListenerBuilder;
//!
//! #[derive(Debug, Deserialize)]
//! struct OrderCreated { id: u64 }
//!
//! # fn main() -> Result<(), topicbus::registry::RegistryError> {
//! let mut builder = TopicListenerBuilder::new(BusConfig::default());
//! builder
//!     .handle("orders.created", |order: OrderCreated| async move {
//!         println!("created {}", order.id);
//!         Ok::<_, std::io::Error>(())
//!     })?
//!     .handle_pattern_sync("orders.#", |_event: serde_json::Value| {
//!         Ok::<_, std::io::Error>(())
//!     })?;
//!
//! let listener = builder.build(Arc::new(InMemoryTransport::default()));
//! assert_eq!(listener.engine().registry().len(), 2);
//! # Ok(())
//! # }
//! ```

use std::any::type_name;
use std::future::Future;
use std::sync::Arc;

use serde::de::DeserializeOwned;

use super::engine::RoutingEngine;
use super::listener::TopicListener;
use crate::config::BusConfig;
use crate::dispatch::{
    BindingKey, BoxError, CallbackDispatcher, DefaultResolver, DispatchTarget, EventListener,
    InstanceResolver, ListenerBindings, TargetKind,
};
use crate::messaging::{JsonCodec, MessageTransport, PayloadCodec};
use crate::registry::{HandlerRegistry, RegistryResult};

/// Collects bindings for one [`TopicListener`]
pub struct TopicListenerBuilder<C = JsonCodec> {
    config: BusConfig,
    codec: C,
    registry: HandlerRegistry,
}

impl TopicListenerBuilder<JsonCodec> {
    pub fn new(config: BusConfig) -> Self {
        Self::with_codec(config, JsonCodec)
    }
}

impl<C: PayloadCodec> TopicListenerBuilder<C> {
    pub fn with_codec(config: BusConfig, codec: C) -> Self {
        Self {
            config,
            codec,
            registry: HandlerRegistry::new(),
        }
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Bind an async callback to an exact topic
    pub fn handle<T, F, Fut, E>(&mut self, topic: &str, callback: F) -> RegistryResult<&mut Self>
    where
        T: DeserializeOwned + Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<BoxError> + 'static,
    {
        let target = callback_target(CallbackDispatcher::new(self.codec.clone(), callback));
        self.registry.register_exact(topic, target)?;
        Ok(self)
    }

    /// Bind a synchronous callback to an exact topic
    pub fn handle_sync<T, F, E>(&mut self, topic: &str, callback: F) -> RegistryResult<&mut Self>
    where
        T: DeserializeOwned + Send + 'static,
        F: Fn(T) -> Result<(), E> + Send + Sync + 'static,
        E: Into<BoxError> + 'static,
    {
        let target = callback_target(CallbackDispatcher::from_sync(self.codec.clone(), callback));
        self.registry.register_exact(topic, target)?;
        Ok(self)
    }

    /// Bind an async callback to a wildcard pattern
    pub fn handle_pattern<T, F, Fut, E>(
        &mut self,
        pattern: &str,
        callback: F,
    ) -> RegistryResult<&mut Self>
    where
        T: DeserializeOwned + Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<BoxError> + 'static,
    {
        let target = callback_target(CallbackDispatcher::new(self.codec.clone(), callback));
        self.registry.register_wildcard(pattern, target)?;
        Ok(self)
    }

    /// Bind a synchronous callback to a wildcard pattern
    pub fn handle_pattern_sync<T, F, E>(
        &mut self,
        pattern: &str,
        callback: F,
    ) -> RegistryResult<&mut Self>
    where
        T: DeserializeOwned + Send + 'static,
        F: Fn(T) -> Result<(), E> + Send + Sync + 'static,
        E: Into<BoxError> + 'static,
    {
        let target = callback_target(CallbackDispatcher::from_sync(self.codec.clone(), callback));
        self.registry.register_wildcard(pattern, target)?;
        Ok(self)
    }

    /// Bind an async callback to fanout publications of `T`
    ///
    /// Matches messages published with an empty routing key whose
    /// `x-fanout-key` header names `T`.
    pub fn handle_fanout<T, F, Fut, E>(&mut self, callback: F) -> RegistryResult<&mut Self>
    where
        T: DeserializeOwned + Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<BoxError> + 'static,
    {
        let target = callback_target(CallbackDispatcher::new(self.codec.clone(), callback));
        self.registry.register_fanout(type_name::<T>(), target)?;
        Ok(self)
    }

    /// Register every binding `L` declares, resolving instances with `resolver`
    pub fn subscribe<L, R>(&mut self, resolver: R) -> RegistryResult<&mut Self>
    where
        L: EventListener,
        R: InstanceResolver<L>,
    {
        let mut bindings = ListenerBindings::new(Arc::new(resolver), self.codec.clone());
        L::bind(&mut bindings);

        for (key, target) in bindings.into_entries() {
            match key {
                BindingKey::Topic(topic) => self.registry.register_exact(&topic, target)?,
                BindingKey::Pattern(pattern) => {
                    self.registry.register_wildcard(&pattern, target)?
                }
            }
        }
        Ok(self)
    }

    /// [`Self::subscribe`] with instances built by `L::default()`
    pub fn subscribe_default<L>(&mut self) -> RegistryResult<&mut Self>
    where
        L: EventListener + Default,
    {
        self.subscribe::<L, _>(DefaultResolver::<L>::new())
    }

    /// Freeze the registry and bind it to `transport`
    pub fn build(self, transport: Arc<dyn MessageTransport>) -> TopicListener {
        let engine = RoutingEngine::new(
            Arc::new(self.registry),
            transport,
            self.config.exchange_name.clone(),
        );
        TopicListener::new(engine, self.config)
    }
}

fn callback_target<T, C>(dispatcher: CallbackDispatcher<T, C>) -> DispatchTarget
where
    T: DeserializeOwned + Send + 'static,
    C: PayloadCodec,
{
    DispatchTarget::new(TargetKind::Callback, Arc::new(dispatcher))
}
