//! # Retry Metadata Codec
//!
//! Reads and writes the diagnostic headers carried by a message republished
//! after a handler failure. The broker never redelivers a failed message;
//! instead each failure produces a new message whose headers record what went
//! wrong and how many times the message has cycled.
//!
//! All functions here are pure and infallible. Malformed header values are
//! treated as absent.

use crate::constants::headers::{
    RETRY_EXCEPTION_MESSAGE, RETRY_EXCEPTION_STACKTRACE, RETRY_EXCEPTION_TYPE,
    RETRY_REQUEUE_COUNT,
};
use crate::dispatch::DispatchError;

use super::message::{HeaderValue, Headers};

/// Diagnostic metadata stamped on a republished message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryMetadata {
    pub exception_type: String,
    pub exception_message: String,
    pub stack_trace: String,
    /// Always at least 1
    pub requeue_count: u32,
}

impl RetryMetadata {
    /// Build metadata for a failure following `previous` republishes
    pub fn for_failure(error: &DispatchError, previous: Option<u32>) -> Self {
        Self {
            exception_type: error.error_type(),
            exception_message: error.to_string(),
            stack_trace: error.trace(),
            requeue_count: previous.map_or(1, |count| count.saturating_add(1)),
        }
    }

    /// Read metadata back from headers
    ///
    /// Returns `None` on a first delivery, i.e. when no valid requeue count is
    /// present. Missing text headers read back as empty strings.
    pub fn read(headers: &Headers) -> Option<Self> {
        let requeue_count = requeue_count(headers)?;
        let text = |name: &str| {
            headers
                .get(name)
                .and_then(HeaderValue::as_str)
                .unwrap_or_default()
                .to_string()
        };

        Some(Self {
            exception_type: text(RETRY_EXCEPTION_TYPE),
            exception_message: text(RETRY_EXCEPTION_MESSAGE),
            stack_trace: text(RETRY_EXCEPTION_STACKTRACE),
            requeue_count,
        })
    }

    /// Write the four retry headers into `headers`, replacing earlier values
    pub fn write_to(&self, headers: &mut Headers) {
        headers.insert(
            RETRY_EXCEPTION_TYPE.to_string(),
            HeaderValue::from(self.exception_type.as_str()),
        );
        headers.insert(
            RETRY_EXCEPTION_MESSAGE.to_string(),
            HeaderValue::from(self.exception_message.as_str()),
        );
        headers.insert(
            RETRY_EXCEPTION_STACKTRACE.to_string(),
            HeaderValue::from(self.stack_trace.as_str()),
        );
        headers.insert(
            RETRY_REQUEUE_COUNT.to_string(),
            HeaderValue::from(self.requeue_count),
        );
    }
}

/// Requeue count carried by `headers`, if present and numeric
///
/// Integer headers and decimal-string headers are accepted; negative values,
/// zero, and anything else read as absent.
pub fn requeue_count(headers: &Headers) -> Option<u32> {
    let count = match headers.get(RETRY_REQUEUE_COUNT)? {
        HeaderValue::Integer(value) => u32::try_from(*value).ok()?,
        HeaderValue::String(value) => value.trim().parse::<u32>().ok()?,
        _ => return None,
    };
    (count > 0).then_some(count)
}

/// Produce the headers for republishing a failed message
///
/// Headers unrelated to the retry protocol are carried over unchanged.
pub fn stamp(existing: &Headers, error: &DispatchError) -> Headers {
    let metadata = RetryMetadata::for_failure(error, requeue_count(existing));
    let mut headers = existing.clone();
    metadata.write_to(&mut headers);
    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::CodecError;

    fn decode_failure() -> DispatchError {
        DispatchError::decode("orders::OrderCreated", CodecError::EmptyPayload)
    }

    #[test]
    fn test_first_failure_starts_at_one() {
        let headers = stamp(&Headers::new(), &decode_failure());
        assert_eq!(
            headers.get(RETRY_REQUEUE_COUNT),
            Some(&HeaderValue::Integer(1))
        );
        assert!(headers
            .get(RETRY_EXCEPTION_TYPE)
            .and_then(HeaderValue::as_str)
            .is_some_and(|kind| kind.ends_with("DispatchError::Decode")));
        assert_eq!(
            headers.get(RETRY_EXCEPTION_STACKTRACE),
            Some(&HeaderValue::String(String::new()))
        );
    }

    #[test]
    fn test_stamping_own_output_increments() {
        let first = stamp(&Headers::new(), &decode_failure());
        let second = stamp(&first, &decode_failure());
        assert_eq!(requeue_count(&second), Some(2));

        let metadata = RetryMetadata::read(&second).unwrap();
        assert_eq!(metadata.requeue_count, 2);
        assert!(metadata.exception_message.contains("orders::OrderCreated"));
    }

    #[test]
    fn test_string_counts_are_accepted() {
        let mut headers = Headers::new();
        headers.insert(RETRY_REQUEUE_COUNT.to_string(), HeaderValue::from("4"));
        assert_eq!(requeue_count(&stamp(&headers, &decode_failure())), Some(5));
    }

    #[test]
    fn test_malformed_counts_are_treated_as_absent() {
        for value in [
            HeaderValue::from("four"),
            HeaderValue::Integer(-3),
            HeaderValue::Integer(0),
            HeaderValue::Boolean(true),
            HeaderValue::Float(2.0),
            HeaderValue::Integer(i64::MAX),
        ] {
            let mut headers = Headers::new();
            headers.insert(RETRY_REQUEUE_COUNT.to_string(), value.clone());
            assert_eq!(
                requeue_count(&stamp(&headers, &decode_failure())),
                Some(1),
                "value {value:?} should read as absent"
            );
        }
    }

    #[test]
    fn test_unrelated_headers_are_preserved() {
        let mut headers = Headers::new();
        headers.insert("x-correlation-id".to_string(), HeaderValue::from("abc"));
        let stamped = stamp(&headers, &decode_failure());
        assert_eq!(
            stamped.get("x-correlation-id"),
            Some(&HeaderValue::String("abc".to_string()))
        );
        assert_eq!(stamped.len(), 5);
    }

    #[test]
    fn test_read_without_count_is_none() {
        assert!(RetryMetadata::read(&Headers::new()).is_none());
    }

    #[test]
    fn test_count_saturates() {
        let mut headers = Headers::new();
        headers.insert(
            RETRY_REQUEUE_COUNT.to_string(),
            HeaderValue::Integer(i64::from(u32::MAX)),
        );
        assert_eq!(
            requeue_count(&stamp(&headers, &decode_failure())),
            Some(u32::MAX)
        );
    }
}
