//! # Callback Dispatcher
//!
//! Decodes the message body into a statically known payload type and hands it
//! to a closure.

use std::any::type_name;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::{self, BoxFuture};
use futures::FutureExt;
use serde::de::DeserializeOwned;

use super::errors::{BoxError, DispatchError};
use super::Dispatcher;
use crate::messaging::{InboundMessage, JsonCodec, PayloadCodec};

type BoxedCallback<T> =
    Arc<dyn Fn(T) -> BoxFuture<'static, Result<(), DispatchError>> + Send + Sync>;

/// Dispatcher bound to a closure over `T`
pub struct CallbackDispatcher<T, C = JsonCodec> {
    callback: BoxedCallback<T>,
    codec: C,
    _payload: PhantomData<fn() -> T>,
}

impl<T, C> CallbackDispatcher<T, C>
where
    T: DeserializeOwned + Send + 'static,
    C: PayloadCodec,
{
    /// Bind an async callback
    pub fn new<F, Fut, E>(codec: C, callback: F) -> Self
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<BoxError> + 'static,
    {
        let boxed: BoxedCallback<T> = Arc::new(move |payload| {
            let handled = callback(payload);
            async move { handled.await.map_err(DispatchError::handler::<E>) }.boxed()
        });

        Self {
            callback: boxed,
            codec,
            _payload: PhantomData,
        }
    }

    /// Bind a synchronous callback
    pub fn from_sync<F, E>(codec: C, callback: F) -> Self
    where
        F: Fn(T) -> Result<(), E> + Send + Sync + 'static,
        E: Into<BoxError> + 'static,
    {
        let boxed: BoxedCallback<T> = Arc::new(move |payload| {
            let result = callback(payload).map_err(DispatchError::handler::<E>);
            future::ready(result).boxed()
        });

        Self {
            callback: boxed,
            codec,
            _payload: PhantomData,
        }
    }
}

#[async_trait]
impl<T, C> Dispatcher for CallbackDispatcher<T, C>
where
    T: DeserializeOwned + Send + 'static,
    C: PayloadCodec,
{
    async fn dispatch(&self, message: &InboundMessage) -> Result<(), DispatchError> {
        let payload: T = self
            .codec
            .decode(message.body())
            .map_err(|e| DispatchError::decode(type_name::<T>(), e))?;

        (self.callback)(payload).await
    }

    fn payload_type(&self) -> &'static str {
        type_name::<T>()
    }
}
