//! # Dispatch Error Types
//!
//! Everything a dispatcher can fail with. The routing engine converts each of
//! these into the retry-republish protocol; none of them escape to the
//! delivery loop.

use std::any::{type_name, Any, TypeId};
use std::error::Error as StdError;

use thiserror::Error;

use crate::messaging::{CodecError, TransportError};

/// Boxed error type accepted from handlers and resolvers
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Failed to decode payload as {payload_type}: {source}")]
    Decode {
        payload_type: &'static str,
        #[source]
        source: CodecError,
    },

    #[error("Failed to resolve listener instance of {listener_type}: {source}")]
    Resolve {
        listener_type: &'static str,
        #[source]
        source: BoxError,
    },

    #[error("{source}")]
    Handler {
        error_type: String,
        #[source]
        source: BoxError,
    },

    #[error("Handler panicked: {message}")]
    Panicked { message: String },
}

impl DispatchError {
    /// Create a decode error for `payload_type`
    pub fn decode(payload_type: &'static str, source: CodecError) -> Self {
        Self::Decode {
            payload_type,
            source,
        }
    }

    /// Create a resolver error for `listener_type`
    pub fn resolve(listener_type: &'static str, source: impl Into<BoxError>) -> Self {
        Self::Resolve {
            listener_type,
            source: source.into(),
        }
    }

    /// Wrap an error returned by a handler, remembering its concrete type
    ///
    /// A [`HandlerFailure`] supplies its kind explicitly. For type-erased
    /// errors (`BoxError`, `anyhow::Error`) the first well-known error type in
    /// the cause chain is reported, falling back to the wrapper's name.
    pub fn handler<E>(error: E) -> Self
    where
        E: Into<BoxError> + 'static,
    {
        let declared = type_name::<E>();
        let anyhow_kind = (&error as &dyn Any)
            .downcast_ref::<anyhow::Error>()
            .and_then(|error| match error.downcast_ref::<HandlerFailure>() {
                Some(failure) => Some(failure.kind.clone()),
                None => error.chain().find_map(known_kind).map(str::to_string),
            });

        let source: BoxError = error.into();
        let source = match source.downcast::<HandlerFailure>() {
            Ok(failure) => {
                let HandlerFailure { kind, source } = *failure;
                return Self::Handler {
                    error_type: kind,
                    source,
                };
            }
            Err(source) => source,
        };

        let error_type = if TypeId::of::<E>() == TypeId::of::<BoxError>() {
            cause_chain(source.as_ref())
                .find_map(known_kind)
                .unwrap_or(declared)
                .to_string()
        } else {
            anyhow_kind.unwrap_or_else(|| declared.to_string())
        };

        Self::Handler { error_type, source }
    }

    /// Convert a caught panic payload
    pub fn panicked(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(message) = payload.downcast_ref::<&str>() {
            (*message).to_string()
        } else if let Some(message) = payload.downcast_ref::<String>() {
            message.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self::Panicked { message }
    }

    /// Fully-qualified kind of the failure
    ///
    /// Handler failures report the concrete error type the handler returned;
    /// the other variants report the variant path of this enum.
    pub fn error_type(&self) -> String {
        let this = type_name::<Self>();
        match self {
            Self::Decode { .. } => format!("{this}::Decode"),
            Self::Resolve { .. } => format!("{this}::Resolve"),
            Self::Handler { error_type, .. } => error_type.clone(),
            Self::Panicked { .. } => format!("{this}::Panicked"),
        }
    }

    /// Render the chain of underlying causes, one per line
    ///
    /// Causes already included in the display text are skipped. Empty when the
    /// failure has no deeper cause.
    pub fn trace(&self) -> String {
        let mut current: Option<&(dyn StdError + 'static)> = match self {
            Self::Decode { source, .. } => source.source(),
            Self::Resolve { source, .. } | Self::Handler { source, .. } => source.source(),
            Self::Panicked { .. } => None,
        };

        let mut lines = Vec::new();
        while let Some(cause) = current {
            lines.push(format!("caused by: {cause}"));
            current = cause.source();
        }
        lines.join("\n")
    }
}

/// Handler error carrying an explicit kind for the retry headers
///
/// Useful when a handler works with type-erased errors:
///
/// ```rust
/// use topicbus::dispatch::{DispatchError, HandlerFailure};
///
/// let failure = HandlerFailure::new("billing.rejected", anyhow::anyhow!("card declined"));
/// let err = DispatchError::handler(failure);
/// assert_eq!(err.error_type(), "billing.rejected");
/// assert_eq!(err.to_string(), "card declined");
/// ```
#[derive(Debug, Error)]
#[error("{source}")]
pub struct HandlerFailure {
    kind: String,
    source: BoxError,
}

impl HandlerFailure {
    pub fn new(kind: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self {
            kind: kind.into(),
            source: source.into(),
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }
}

fn cause_chain<'a>(
    error: &'a (dyn StdError + 'static),
) -> impl Iterator<Item = &'a (dyn StdError + 'static)> {
    std::iter::successors(Some(error), |&error| error.source())
}

macro_rules! first_known {
    ($error:expr; $($kind:ty),+ $(,)?) => {
        $(
            if $error.is::<$kind>() {
                return Some(type_name::<$kind>());
            }
        )+
    };
}

/// Name of `error`'s concrete type when it is one the crate can recognise
fn known_kind(error: &(dyn StdError + 'static)) -> Option<&'static str> {
    first_known!(error;
        std::io::Error,
        serde_json::Error,
        CodecError,
        TransportError,
        std::fmt::Error,
        std::num::ParseIntError,
        std::num::ParseFloatError,
        std::str::Utf8Error,
        std::string::FromUtf8Error,
        tokio::time::error::Elapsed,
        tokio::task::JoinError,
    );
    None
}
