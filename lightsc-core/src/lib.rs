//! Core JSON-RPC 2.0 types and framing codec for lightsc
//!
//! This crate holds everything about the lightsd wire protocol that doesn't
//! need a socket:
//!
//! - **Types**: request and response envelopes, request ids
//! - **Codec**: encoding, and incremental decoding of unframed JSON replies
//! - **Error handling**: the error taxonomy shared by the whole client
//! - **Observability**: `tracing` subscriber and OpenTelemetry bootstrap
//!
//! # Overview
//!
//! lightsd accepts JSON-RPC 2.0 over a raw TCP stream. There is no length
//! prefix: a message is exactly one top-level JSON value. The
//! `lightsc-client` crate builds the TCP transport and the batching session
//! on top of this foundation.
//!
//! # Example
//!
//! ```rust
//! use lightsc_core::{codec, JsonRpcRequest};
//! use serde_json::json;
//!
//! let request = JsonRpcRequest::new("get_light_state", json!(["*"]));
//! let bytes = codec::encode(&request).unwrap();
//!
//! let frame = codec::decode_frame(&bytes).unwrap().expect("complete value");
//! assert_eq!(frame.value["method"], "get_light_state");
//! ```

pub mod codec;
pub mod error;
pub mod observability;
pub mod types;

pub use error::{Error, JsonRpcErrorData, Result, MISSING_REPLY};
pub use observability::{
    init_logging, init_observability, shutdown_observability, ObservabilityConfig,
};
pub use types::{Id, JsonRpcReply, JsonRpcRequest, JsonRpcResponse, JSONRPC_VERSION};
