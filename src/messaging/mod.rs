//! # Messaging
//!
//! Everything between the broker and the dispatchers: the inbound message
//! model, the payload codec, the retry header protocol, the transport
//! abstraction with its providers, and a typed publisher.
//!
//! ```text
//! Messaging
//! ├── message     (InboundMessage, Headers, DeliveryTag)
//! ├── codec       (PayloadCodec, JsonCodec)
//! ├── retry       (retry header stamping & read-back)
//! ├── transport   (MessageTransport, DeliveryHandler)
//! ├── providers   (RabbitMQ, in-memory)
//! └── publisher   (TopicPublisher)
//! ```

pub mod codec;
pub mod errors;
pub mod message;
pub mod providers;
pub mod publisher;
pub mod retry;
pub mod transport;

pub use codec::{JsonCodec, PayloadCodec};
pub use errors::{CodecError, TransportError, TransportResult};
pub use message::{DeliveryTag, HeaderValue, Headers, InboundMessage, InboundMessageBuilder};
pub use publisher::TopicPublisher;
pub use retry::{requeue_count, stamp, RetryMetadata};
pub use transport::{DeliveryHandler, MessageTransport};
