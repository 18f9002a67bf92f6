//! Error types for lightsc
//!
//! Two error types live here:
//!
//! - **Error**: everything a client call can fail with (uses thiserror)
//! - **JsonRpcErrorData**: the `error` object of a JSON-RPC 2.0 response
//!
//! # Taxonomy
//!
//! - `Connection`: socket-level failure (refused, reset, peer closed mid-read).
//!   Fatal to the current exchange and never retried by the library.
//! - `MalformedResponse`: the peer sent bytes that are not a JSON-RPC response.
//!   The raw payload is kept for diagnosis.
//! - `Rpc`: the server answered with an `error` object. A normal failure
//!   result, not a crash.
//! - `State`: misuse of the batch API (nested `begin_batch`, `end_batch`
//!   outside a batch). A programming error.
//! - `Serialization`, `Timeout`: client-side encoding failures and expired
//!   deadlines.
//!
//! # Examples
//!
//! ```rust
//! use lightsc_core::{Error, JsonRpcErrorData};
//!
//! let error = Error::Rpc(JsonRpcErrorData::new(-1, "boom"));
//! assert_eq!(error.to_string(), "JSON-RPC error: [-1] boom");
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for lightsc operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error code attached to a batched request that got no reply
///
/// Sits in the -32000 to -32099 range JSON-RPC 2.0 reserves for
/// implementation-defined errors, so it can't collide with a lightsd code.
pub const MISSING_REPLY: i32 = -32099;

/// Application-level error type for lightsc operations
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// The server answered with a JSON-RPC error object
    #[error("JSON-RPC error: {0}")]
    Rpc(#[from] JsonRpcErrorData),

    /// Socket-level failure: refused, reset, closed or used after close
    #[error("Connection error: {0}")]
    Connection(String),

    /// The reply could not be parsed as a JSON-RPC response
    ///
    /// `raw` holds every byte read for the exchange.
    #[error("Malformed response ({reason}): {}", String::from_utf8_lossy(.raw))]
    MalformedResponse {
        /// What was wrong with the payload
        reason: String,
        /// The bytes received, verbatim
        raw: Vec<u8>,
    },

    /// Batch API misuse
    #[error("Invalid session state: {0}")]
    State(String),

    /// Parameters or results could not be converted to/from JSON
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A connect or read deadline expired before anything was received
    #[error("Request timeout")]
    Timeout,
}

impl Error {
    /// Build a `MalformedResponse` from a reason and the offending bytes
    pub fn malformed(reason: impl Into<String>, raw: impl Into<Vec<u8>>) -> Self {
        Error::MalformedResponse {
            reason: reason.into(),
            raw: raw.into(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Connection(e.to_string())
    }
}

/// JSON-RPC 2.0 error object
///
/// This is the exact wire format found in the `error` member of a response:
/// an integer `code`, a short `message`, and optional structured `data`.
///
/// # Standard Error Codes
///
/// - `-32700`: Parse error
/// - `-32600`: Invalid Request
/// - `-32601`: Method not found
/// - `-32602`: Invalid params
/// - `-32603`: Internal error
/// - `-32000 to -32099`: Server error (implementation-defined);
///   [`MISSING_REPLY`] is taken from this range
///
/// # Examples
///
/// ```rust
/// use lightsc_core::JsonRpcErrorData;
/// use serde_json::json;
///
/// let error = JsonRpcErrorData::with_data(-32602, "Invalid params", json!({"index": 3}));
/// assert_eq!(error.code, -32602);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcErrorData {
    /// Numeric error code
    pub code: i32,

    /// Human-readable error message
    pub message: String,

    /// Optional additional error information
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl JsonRpcErrorData {
    /// Create an error with code and message
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Create an error with additional data
    pub fn with_data(code: i32, message: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            code,
            message: message.into(),
            data: Some(data),
        }
    }

    /// A batched request that received no reply ([`MISSING_REPLY`])
    ///
    /// The request id is attached as `data` so callers can tell which one.
    pub fn missing_reply(id: &crate::Id) -> Self {
        Self::with_data(
            MISSING_REPLY,
            format!("No reply received for request {}", id),
            serde_json::to_value(id).unwrap_or(serde_json::Value::Null),
        )
    }

    /// Whether this is the synthetic missing-reply error
    pub fn is_missing_reply(&self) -> bool {
        self.code == MISSING_REPLY
    }
}

impl std::fmt::Display for JsonRpcErrorData {
    /// Formats as "[code] message", e.g. "[-32601] Method not found: foo"
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for JsonRpcErrorData {}
