//! # Listener Dispatcher
//!
//! Binds topics to methods on a listener type. Every dispatch resolves a fresh
//! listener instance through an [`InstanceResolver`], decodes the payload into
//! the method's single parameter type, invokes the method and awaits it. The
//! instance is dropped once the method returns.
//!
//! Listener types declare their own bindings by implementing [`EventListener`]:
//!
//! ```rust
//! use topicbus::dispatch::{EventListener, ListenerBindings};
//! use topicbus::messaging::PayloadCodec;
//! use serde::Deserialize;
//!
//! #[derive(Debug, Deserialize)]
//! struct OrderCreated { id: u64 }
//!
//! #[derive(Default)]
//! struct OrderListener;
//!
//! impl OrderListener {
//!     async fn on_created(self, order: OrderCreated) -> Result<(), std::io::Error> {
//!         println!("order {} created", order.id);
//!         Ok(())
//!     }
//! }
//!
//! impl EventListener for OrderListener {
//!     fn bind<C: PayloadCodec>(bindings: &mut ListenerBindings<Self, C>) {
//!         bindings.topic("orders.created", Self::on_created);
//!     }
//! }
//! ```

use std::any::type_name;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::{self, BoxFuture};
use futures::FutureExt;
use serde::de::DeserializeOwned;

use super::errors::{BoxError, DispatchError};
use super::target::{DispatchTarget, TargetKind};
use super::Dispatcher;
use crate::messaging::{InboundMessage, PayloadCodec};

/// Obtains a listener instance for one dispatch
#[async_trait]
pub trait InstanceResolver<L>: Send + Sync + 'static {
    async fn resolve(&self) -> Result<L, BoxError>;
}

/// Resolves instances through `L::default()`
pub struct DefaultResolver<L>(PhantomData<fn() -> L>);

impl<L> DefaultResolver<L> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<L> Default for DefaultResolver<L> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<L> InstanceResolver<L> for DefaultResolver<L>
where
    L: Default + Send + 'static,
{
    async fn resolve(&self) -> Result<L, BoxError> {
        Ok(L::default())
    }
}

/// Resolves instances through a fallible factory closure
pub struct FactoryResolver<F>(F);

impl<F> FactoryResolver<F> {
    pub fn new(factory: F) -> Self {
        Self(factory)
    }
}

#[async_trait]
impl<L, F, E> InstanceResolver<L> for FactoryResolver<F>
where
    F: Fn() -> Result<L, E> + Send + Sync + 'static,
    E: Into<BoxError>,
    L: Send + 'static,
{
    async fn resolve(&self) -> Result<L, BoxError> {
        (self.0)().map_err(Into::into)
    }
}

type BoxedMethod<L, T> =
    Arc<dyn Fn(L, T) -> BoxFuture<'static, Result<(), DispatchError>> + Send + Sync>;

/// Dispatcher bound to one method of listener type `L`
pub struct ListenerDispatcher<L, T, C> {
    resolver: Arc<dyn InstanceResolver<L>>,
    method: BoxedMethod<L, T>,
    method_name: &'static str,
    codec: C,
}

impl<L, T, C> ListenerDispatcher<L, T, C>
where
    L: Send + 'static,
    T: DeserializeOwned + Send + 'static,
    C: PayloadCodec,
{
    /// Bind an async method
    pub fn new<F, Fut, E>(resolver: Arc<dyn InstanceResolver<L>>, codec: C, method: F) -> Self
    where
        F: Fn(L, T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<BoxError> + 'static,
    {
        let method_name = type_name::<F>();
        let boxed: BoxedMethod<L, T> = Arc::new(move |instance, payload| {
            let invoked = method(instance, payload);
            async move { invoked.await.map_err(DispatchError::handler::<E>) }.boxed()
        });

        Self {
            resolver,
            method: boxed,
            method_name,
            codec,
        }
    }

    /// Bind a synchronous method
    pub fn from_sync<F, E>(resolver: Arc<dyn InstanceResolver<L>>, codec: C, method: F) -> Self
    where
        F: Fn(L, T) -> Result<(), E> + Send + Sync + 'static,
        E: Into<BoxError> + 'static,
    {
        let method_name = type_name::<F>();
        let boxed: BoxedMethod<L, T> = Arc::new(move |instance, payload| {
            let result = method(instance, payload).map_err(DispatchError::handler::<E>);
            future::ready(result).boxed()
        });

        Self {
            resolver,
            method: boxed,
            method_name,
            codec,
        }
    }

    pub fn method_name(&self) -> &'static str {
        self.method_name
    }

    /// Wrap into a registry target
    pub fn into_target(self) -> DispatchTarget {
        let kind = TargetKind::Listener {
            listener_type: type_name::<L>(),
            method: self.method_name,
        };
        DispatchTarget::new(kind, Arc::new(self))
    }
}

#[async_trait]
impl<L, T, C> Dispatcher for ListenerDispatcher<L, T, C>
where
    L: Send + 'static,
    T: DeserializeOwned + Send + 'static,
    C: PayloadCodec,
{
    async fn dispatch(&self, message: &InboundMessage) -> Result<(), DispatchError> {
        let payload: T = self
            .codec
            .decode(message.body())
            .map_err(|e| DispatchError::decode(type_name::<T>(), e))?;

        let instance = self
            .resolver
            .resolve()
            .await
            .map_err(|e| DispatchError::resolve(type_name::<L>(), e))?;

        (self.method)(instance, payload).await
    }

    fn payload_type(&self) -> &'static str {
        type_name::<T>()
    }
}

/// Topic key a listener method is bound under
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingKey {
    Topic(String),
    Pattern(String),
}

/// Collects the bindings a listener type declares
///
/// Registration errors (bad patterns, duplicate topics) surface when the
/// bindings are added to the registry, not here.
pub struct ListenerBindings<L, C> {
    resolver: Arc<dyn InstanceResolver<L>>,
    codec: C,
    entries: Vec<(BindingKey, DispatchTarget)>,
}

impl<L, C> ListenerBindings<L, C>
where
    L: Send + 'static,
    C: PayloadCodec,
{
    pub fn new(resolver: Arc<dyn InstanceResolver<L>>, codec: C) -> Self {
        Self {
            resolver,
            codec,
            entries: Vec::new(),
        }
    }

    /// Bind an async method to an exact topic
    pub fn topic<T, F, Fut, E>(&mut self, topic: &str, method: F) -> &mut Self
    where
        T: DeserializeOwned + Send + 'static,
        F: Fn(L, T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<BoxError> + 'static,
    {
        let target =
            ListenerDispatcher::new(self.resolver.clone(), self.codec.clone(), method).into_target();
        self.entries.push((BindingKey::Topic(topic.to_string()), target));
        self
    }

    /// Bind a synchronous method to an exact topic
    pub fn topic_sync<T, F, E>(&mut self, topic: &str, method: F) -> &mut Self
    where
        T: DeserializeOwned + Send + 'static,
        F: Fn(L, T) -> Result<(), E> + Send + Sync + 'static,
        E: Into<BoxError> + 'static,
    {
        let target = ListenerDispatcher::from_sync(self.resolver.clone(), self.codec.clone(), method)
            .into_target();
        self.entries.push((BindingKey::Topic(topic.to_string()), target));
        self
    }

    /// Bind an async method to a wildcard pattern
    pub fn pattern<T, F, Fut, E>(&mut self, pattern: &str, method: F) -> &mut Self
    where
        T: DeserializeOwned + Send + 'static,
        F: Fn(L, T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<BoxError> + 'static,
    {
        let target =
            ListenerDispatcher::new(self.resolver.clone(), self.codec.clone(), method).into_target();
        self.entries
            .push((BindingKey::Pattern(pattern.to_string()), target));
        self
    }

    /// Bind a synchronous method to a wildcard pattern
    pub fn pattern_sync<T, F, E>(&mut self, pattern: &str, method: F) -> &mut Self
    where
        T: DeserializeOwned + Send + 'static,
        F: Fn(L, T) -> Result<(), E> + Send + Sync + 'static,
        E: Into<BoxError> + 'static,
    {
        let target = ListenerDispatcher::from_sync(self.resolver.clone(), self.codec.clone(), method)
            .into_target();
        self.entries
            .push((BindingKey::Pattern(pattern.to_string()), target));
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Declared bindings, in declaration order
    pub fn into_entries(self) -> Vec<(BindingKey, DispatchTarget)> {
        self.entries
    }
}

/// A type whose methods handle topics
///
/// Replaces attribute-driven discovery: the type lists its bindings explicitly
/// and [`crate::routing::TopicListenerBuilder::subscribe`] registers them.
pub trait EventListener: Send + Sized + 'static {
    fn bind<C: PayloadCodec>(bindings: &mut ListenerBindings<Self, C>);
}
