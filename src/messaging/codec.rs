//! # Payload Codec
//!
//! Serialization contract for message bodies. Dispatchers are generic over the
//! codec so the wire format stays pluggable; [`JsonCodec`] is the default.

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::errors::CodecError;
use crate::constants::defaults::CONTENT_TYPE_JSON;

/// Encode/decode collaborator for message bodies
pub trait PayloadCodec: Send + Sync + Clone + 'static {
    /// Serialize a payload to bytes
    fn encode<T: Serialize>(&self, payload: &T) -> Result<Vec<u8>, CodecError>;

    /// Deserialize bytes into a payload
    ///
    /// Must fail with [`CodecError::EmptyPayload`] or [`CodecError::NullPayload`]
    /// when the body carries no value, rather than producing a default.
    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError>;

    /// Content type advertised on published messages
    fn content_type(&self) -> &'static str;
}

/// JSON codec backed by serde_json
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl PayloadCodec for JsonCodec {
    fn encode<T: Serialize>(&self, payload: &T) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(payload).map_err(|e| CodecError::encode(e.to_string()))
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Err(CodecError::EmptyPayload);
        }

        let value: serde_json::Value =
            serde_json::from_slice(bytes).map_err(|e| CodecError::malformed(e.to_string()))?;
        if value.is_null() {
            return Err(CodecError::NullPayload);
        }

        serde_json::from_value(value).map_err(|e| CodecError::malformed(e.to_string()))
    }

    fn content_type(&self) -> &'static str {
        CONTENT_TYPE_JSON
    }
}
