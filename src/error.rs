//! # Crate Error Types
//!
//! Each area owns its error enum (registry, dispatch, messaging, routing,
//! configuration). [`TopicBusError`] wraps them for callers that drive the whole
//! stack from one place, such as an application's startup path.

use thiserror::Error;

use crate::config::ConfigurationError;
use crate::dispatch::DispatchError;
use crate::messaging::{CodecError, TransportError};
use crate::registry::RegistryError;
use crate::routing::RoutingError;

#[derive(Error, Debug)]
pub enum TopicBusError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Routing(#[from] RoutingError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

pub type Result<T> = std::result::Result<T, TopicBusError>;
