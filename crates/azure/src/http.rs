//! Shared reqwest plumbing.

use std::time::Duration;

use azca_rules::TransportError;
use serde_json::Value;

pub(crate) fn build_client(timeout_secs: u64) -> Result<reqwest::Client, TransportError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| TransportError::Http(format!("failed to build HTTP client: {e}")))
}

pub(crate) fn transport_error(e: reqwest::Error, timeout_secs: u64) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout(timeout_secs)
    } else {
        TransportError::Http(e.to_string())
    }
}

/// Decode a response body: empty is `Null`, non-JSON is kept as a string.
pub(crate) fn decode_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}
