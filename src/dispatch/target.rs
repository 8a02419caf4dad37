//! # Dispatch Targets
//!
//! The value stored in the handler registry for every binding.

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;

use super::errors::DispatchError;
use super::Dispatcher;
use crate::messaging::InboundMessage;

/// How a target was bound
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetKind {
    /// A closure over the decoded payload
    Callback,
    /// A method on a listener type, invoked on a freshly resolved instance
    Listener {
        listener_type: &'static str,
        method: &'static str,
    },
}

/// A bound handler, shared read-only once the registry is built
#[derive(Clone)]
pub struct DispatchTarget {
    kind: TargetKind,
    dispatcher: Arc<dyn Dispatcher>,
}

impl DispatchTarget {
    pub fn new(kind: TargetKind, dispatcher: Arc<dyn Dispatcher>) -> Self {
        Self { kind, dispatcher }
    }

    pub fn kind(&self) -> &TargetKind {
        &self.kind
    }

    /// Type name of the single payload parameter
    pub fn payload_type(&self) -> &'static str {
        self.dispatcher.payload_type()
    }

    pub fn dispatcher(&self) -> &Arc<dyn Dispatcher> {
        &self.dispatcher
    }

    /// Dispatch `message`, converting a handler panic into a failure
    pub async fn dispatch(&self, message: &InboundMessage) -> Result<(), DispatchError> {
        match AssertUnwindSafe(self.dispatcher.dispatch(message))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(panic) => Err(DispatchError::panicked(panic)),
        }
    }
}

impl fmt::Debug for DispatchTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchTarget")
            .field("kind", &self.kind)
            .field("payload_type", &self.payload_type())
            .field("dispatcher", &"<Arc<dyn Dispatcher>>")
            .finish()
    }
}
