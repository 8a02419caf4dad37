//! # Dispatch
//!
//! A dispatcher owns everything needed to turn a raw inbound message into one
//! handler invocation: the payload type, the codec, and the handler itself.
//!
//! Two flavours exist:
//!
//! - [`CallbackDispatcher`] wraps a closure over the decoded payload
//! - [`ListenerDispatcher`] resolves a fresh listener instance per message and
//!   invokes one of its methods
//!
//! Both are stored in the registry behind [`DispatchTarget`], which also
//! converts handler panics into [`DispatchError::Panicked`].

use async_trait::async_trait;

use crate::messaging::InboundMessage;

pub mod callback;
pub mod errors;
pub mod listener;
pub mod target;

pub use callback::CallbackDispatcher;
pub use errors::{BoxError, DispatchError, HandlerFailure};
pub use listener::{
    BindingKey, DefaultResolver, EventListener, FactoryResolver, InstanceResolver,
    ListenerBindings, ListenerDispatcher,
};
pub use target::{DispatchTarget, TargetKind};

/// Invokes one handler for one message
#[async_trait]
pub trait Dispatcher: Send + Sync + 'static {
    /// Decode the body and run the handler to completion
    async fn dispatch(&self, message: &InboundMessage) -> Result<(), DispatchError>;

    /// Type name of the payload the handler accepts
    fn payload_type(&self) -> &'static str;
}
