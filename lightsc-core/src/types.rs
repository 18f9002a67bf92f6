//! JSON-RPC 2.0 envelopes exchanged with lightsd
//!
//! The client only ever sends requests (never notifications) and only ever
//! receives responses, so these two envelopes are all the wire model needs.
//!
//! # Request IDs
//!
//! Every request carries a freshly generated UUIDv4 string id. Responses are
//! correlated to requests by id alone: in a batch reply the server is free to
//! reorder elements, so position carries no meaning.
//!
//! A server may echo back any JSON scalar as an id (and uses `null` when it
//! couldn't parse the request at all), so [`Id`] accepts strings, numbers and
//! null on the way in.

use crate::error::JsonRpcErrorData;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The protocol version string carried by every envelope
pub const JSONRPC_VERSION: &str = "2.0";

/// JSON-RPC 2.0 request ID
///
/// This enum uses `#[serde(untagged)]` to serialize directly as the inner
/// value, matching the wire format exactly. It implements `Hash` and `Eq` so
/// that ids can key the reply table built when a batch comes back.
///
/// # Examples
///
/// ```rust
/// use lightsc_core::Id;
///
/// let id: Id = "4f1c".into();
/// assert_eq!(id.to_string(), "\"4f1c\"");
///
/// let generated = Id::generate();
/// assert!(!generated.is_null());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Id {
    /// String identifier, what this client generates
    String(String),
    /// Numeric identifier, accepted from servers that use counters
    Number(i64),
    /// Null identifier, sent by servers that failed to read the request id
    Null,
}

impl Id {
    /// Generate a new unique request id (a UUIDv4 string)
    pub fn generate() -> Self {
        Id::String(uuid::Uuid::new_v4().to_string())
    }

    /// Returns true for `Id::Null`
    pub fn is_null(&self) -> bool {
        matches!(self, Id::Null)
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Id::String(s) => write!(f, "\"{}\"", s),
            Id::Number(n) => write!(f, "{}", n),
            Id::Null => write!(f, "null"),
        }
    }
}

impl From<String> for Id {
    fn from(s: String) -> Self {
        Id::String(s)
    }
}

impl From<&str> for Id {
    fn from(s: &str) -> Self {
        Id::String(s.to_string())
    }
}

impl From<i64> for Id {
    fn from(n: i64) -> Self {
        Id::Number(n)
    }
}

/// JSON-RPC 2.0 request envelope
///
/// lightsd methods always take parameters, either positional (a JSON array,
/// e.g. `set_light_from_hsbk`) or named (an object, e.g. `power_on`), so
/// `params` is not optional here.
///
/// # Examples
///
/// ```rust
/// use lightsc_core::JsonRpcRequest;
/// use serde_json::json;
///
/// let req = JsonRpcRequest::new("power_on", json!({"target": "*"}));
/// assert_eq!(req.jsonrpc, "2.0");
/// assert!(!req.id.is_null());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// Name of the remote method to invoke
    pub method: String,
    /// Positional (array) or named (object) parameters
    pub params: serde_json::Value,
    /// JSON-RPC version - always "2.0"
    pub jsonrpc: String,
    /// Unique identifier to correlate this request with its response
    pub id: Id,
}

impl JsonRpcRequest {
    /// Create a request with a freshly generated id
    pub fn new(method: impl Into<String>, params: serde_json::Value) -> Self {
        Self::with_id(method, params, Id::generate())
    }

    /// Create a request with a caller-chosen id
    pub fn with_id(method: impl Into<String>, params: serde_json::Value, id: Id) -> Self {
        Self {
            method: method.into(),
            params,
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
        }
    }
}

/// JSON-RPC 2.0 response envelope
///
/// A well-formed response has exactly one of `result` or `error`. That is
/// not something serde can express on its own, so [`JsonRpcResponse::into_outcome`]
/// is where the invariant gets checked; use [`crate::codec::decode_response`]
/// to get both parsing and validation in one step.
///
/// `jsonrpc` is tolerated when missing since some servers omit it on error
/// replies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// JSON-RPC version
    #[serde(default = "default_version")]
    pub jsonrpc: String,
    /// Result of the call, present only on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    /// Error reported by the server, present only on failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcErrorData>,
    /// Id of the request this answers
    #[serde(default = "null_id")]
    pub id: Id,
}

fn default_version() -> String {
    JSONRPC_VERSION.to_string()
}

fn null_id() -> Id {
    Id::Null
}

impl JsonRpcResponse {
    /// Check if the response represents an error
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Split the response into the server's outcome
    ///
    /// Returns `None` when the envelope violates the result/error exclusivity
    /// (both present, or neither).
    pub fn into_outcome(self) -> Option<std::result::Result<serde_json::Value, JsonRpcErrorData>> {
        match (self.result, self.error) {
            (Some(result), None) => Some(Ok(result)),
            (None, Some(error)) => Some(Err(error)),
            _ => None,
        }
    }
}

/// A decoded reply to one exchange
///
/// Single calls are answered by one response object. A batch is answered by
/// an array, whose elements are kept as raw values so that one bad element
/// doesn't spoil the rest; see [`crate::codec::decode_batch_responses`].
#[derive(Debug, Clone, PartialEq)]
pub enum JsonRpcReply {
    /// A single response object
    Single(JsonRpcResponse),
    /// An array of (not yet validated) response objects
    Batch(Vec<serde_json::Value>),
}
