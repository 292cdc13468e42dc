//! # Query Server Errors
//!
//! Structured errors reported by a query node inside the `errors` section
//! of a response.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Prepared statement name unknown on the node
pub const PREPARED_NOT_FOUND: i64 = 4050;
/// Prepared statement plan is stale
pub const PREPARED_STALE: i64 = 4070;
/// Generic internal error; retried only with an index-not-found message
pub const INTERNAL_ERROR: i64 = 5000;
/// Marker inside a 5000 message meaning the plan references a dropped index
pub const INDEX_NOT_FOUND_MARKER: &str = "queryport.indexNotFound";

/// Error object returned by a query node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("query error {code}: {message}")]
pub struct QueryServerError {
    #[serde(default)]
    pub code: i64,
    #[serde(rename = "msg", default)]
    pub message: String,
}

impl QueryServerError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Parse a raw error object, tolerating missing fields
    pub fn from_value(value: &Value) -> Self {
        let code = value.get("code").and_then(Value::as_i64).unwrap_or(0);
        let message = value
            .get("msg")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Self { code, message }
    }

    /// Whether this error means the cached plan must be re-prepared
    pub fn is_retry_trigger(&self) -> bool {
        match self.code {
            PREPARED_NOT_FOUND | PREPARED_STALE => true,
            INTERNAL_ERROR => self.message.contains(INDEX_NOT_FOUND_MARKER),
            _ => false,
        }
    }
}
