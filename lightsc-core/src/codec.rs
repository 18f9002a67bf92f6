//! Codec for JSON-RPC messages on an unframed byte stream
//!
//! lightsd speaks JSON-RPC over a raw TCP socket with no length prefix and no
//! delimiter: a message ends where its top-level JSON value ends. Reading a
//! reply therefore means accumulating bytes until [`FrameScanner`] sees the
//! outermost value close, then parsing with [`decode_frame`], which still
//! treats "unexpected end of input" as "read more". The read loop itself
//! lives in the client transport.
//!
//! # Error Mapping
//!
//! - Incomplete input is not an error: `decode_frame` returns `Ok(None)`.
//! - Anything else that fails to parse, or parses to something other than an
//!   object or array, is `Error::MalformedResponse` with the raw bytes.
//! - Client-side encoding failures are `Error::Serialization`.
//!
//! # Examples
//!
//! ```rust
//! use lightsc_core::{codec, JsonRpcRequest};
//! use serde_json::json;
//!
//! let request = JsonRpcRequest::new("power_on", json!({"target": "*"}));
//! let bytes = codec::encode(&request).unwrap();
//!
//! // Half a message is not a message yet
//! assert!(codec::decode_frame(&bytes[..bytes.len() / 2]).unwrap().is_none());
//!
//! let frame = codec::decode_frame(&bytes).unwrap().unwrap();
//! assert_eq!(frame.consumed, bytes.len());
//! ```

use crate::error::{Error, Result};
use crate::types::{JsonRpcReply, JsonRpcResponse};
use serde::Serialize;
use serde_json::Value;

/// One complete top-level JSON value cut from the front of a buffer
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// The parsed value (always an object or an array)
    pub value: Value,
    /// How many bytes of the buffer the value spanned, including any
    /// whitespace in front of it
    pub consumed: usize,
}

/// Encode any serializable message to UTF-8 JSON bytes
pub fn encode<T: Serialize>(msg: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(msg).map_err(|e| Error::Serialization(e.to_string()))
}

/// Finds where a top-level JSON value could end as bytes arrive
///
/// Parsing the whole buffer after every read costs time quadratic in the
/// reply size. The scanner instead looks at each byte once, tracking string
/// and nesting state, and says when the buffer is worth handing to
/// [`decode_frame`]: when the outermost object or array closes, or as soon
/// as the reply starts with something other than `{` or `[` (which the
/// parser then has to judge on every read).
///
/// ```rust
/// use lightsc_core::codec::FrameScanner;
///
/// let mut scanner = FrameScanner::default();
/// let mut buf = br#"{"label": "a}b", "#.to_vec();
/// assert!(!scanner.advance(&buf));
///
/// buf.extend_from_slice(br#""tags": []}"#);
/// assert!(scanner.advance(&buf));
/// ```
#[derive(Debug, Clone, Default)]
pub struct FrameScanner {
    scanned: usize,
    depth: usize,
    in_string: bool,
    escaped: bool,
    ready: bool,
}

impl FrameScanner {
    /// Scan the bytes of `buf` not seen yet; `true` once a parse may succeed
    ///
    /// `buf` must be the same buffer as on previous calls, only longer. Once
    /// this returns `true` it keeps returning `true`.
    pub fn advance(&mut self, buf: &[u8]) -> bool {
        while !self.ready && self.scanned < buf.len() {
            let byte = buf[self.scanned];
            self.scanned += 1;

            if self.in_string {
                if self.escaped {
                    self.escaped = false;
                } else if byte == b'\\' {
                    self.escaped = true;
                } else if byte == b'"' {
                    self.in_string = false;
                }
                continue;
            }

            match byte {
                b'{' | b'[' => self.depth += 1,
                b'}' | b']' => {
                    self.depth = self.depth.saturating_sub(1);
                    self.ready = self.depth == 0;
                }
                b'"' if self.depth > 0 => self.in_string = true,
                b if b.is_ascii_whitespace() => {}
                // A scalar or garbage at the top level
                _ if self.depth == 0 => self.ready = true,
                _ => {}
            }
        }
        self.ready
    }
}

/// Try to cut one complete JSON value from the front of `buf`
///
/// Returns `Ok(None)` while the buffer holds only whitespace or a prefix of a
/// valid value; the caller should read more and try again.
///
/// # Errors
///
/// `Error::MalformedResponse` if the bytes can never become valid JSON, or if
/// the value is a scalar rather than an object or array.
pub fn decode_frame(buf: &[u8]) -> Result<Option<Frame>> {
    let mut stream = serde_json::Deserializer::from_slice(buf).into_iter::<Value>();

    match stream.next() {
        None => Ok(None),
        Some(Err(e)) if e.is_eof() => Ok(None),
        Some(Err(e)) => Err(Error::malformed(format!("invalid JSON: {}", e), buf)),
        Some(Ok(value)) => {
            let consumed = stream.byte_offset();
            if value.is_object() || value.is_array() {
                Ok(Some(Frame { value, consumed }))
            } else {
                Err(Error::malformed(
                    "reply is neither an object nor an array",
                    &buf[..consumed],
                ))
            }
        }
    }
}

/// Validate a JSON value as a response envelope
///
/// Beyond deserializing, this enforces that exactly one of `result` and
/// `error` is present. An explicit `"result": null` counts as a result.
pub fn decode_response(value: Value) -> Result<JsonRpcResponse> {
    let has_result = value.get("result").is_some();
    let raw = value.to_string();

    if !value.is_object() {
        return Err(Error::malformed("response is not an object", raw));
    }

    let mut response: JsonRpcResponse = serde_json::from_value(value)
        .map_err(|e| Error::malformed(format!("not a JSON-RPC response: {}", e), raw.clone()))?;

    if has_result && response.result.is_none() {
        response.result = Some(Value::Null);
    }

    match (&response.result, &response.error) {
        (Some(_), None) | (None, Some(_)) => Ok(response),
        (Some(_), Some(_)) => Err(Error::malformed(
            "response carries both result and error",
            raw,
        )),
        (None, None) => Err(Error::malformed(
            "response carries neither result nor error",
            raw,
        )),
    }
}

/// Classify a decoded frame as a single response or a batch reply
///
/// Single objects are fully validated here. Array elements are left raw for
/// [`decode_batch_responses`].
pub fn decode_reply(value: Value) -> Result<JsonRpcReply> {
    match value {
        Value::Array(items) => Ok(JsonRpcReply::Batch(items)),
        other => decode_response(other).map(JsonRpcReply::Single),
    }
}

/// Validate each element of a batch reply independently
///
/// Returns one result per element, in reply order, so that a single broken
/// element doesn't prevent matching the others.
pub fn decode_batch_responses(values: Vec<Value>) -> Vec<Result<JsonRpcResponse>> {
    values.into_iter().map(decode_response).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{JsonRpcErrorData, JsonRpcRequest};
    use serde_json::json;

    #[test]
    fn test_encode_decode_request() {
        let req = JsonRpcRequest::new("set_label", json!(["d073d501a0d5", "kitchen"]));
        let encoded = encode(&req).unwrap();
        let decoded: JsonRpcRequest = serde_json::from_slice(&encoded).unwrap();

        assert_eq!(decoded, req);
    }

    #[test]
    fn test_encode_batch_is_array() {
        let batch = vec![
            JsonRpcRequest::new("power_on", json!({"target": "*"})),
            JsonRpcRequest::new("power_off", json!({"target": "*"})),
        ];
        let encoded = encode(&batch).unwrap();
        let value: Value = serde_json::from_slice(&encoded).unwrap();

        let items = value.as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["method"], "power_on");
        assert_eq!(items[1]["method"], "power_off");
    }

    #[test]
    fn test_scanner_waits_for_outermost_close() {
        let reply = br##"{"id": "a", "result": [{"label": "x]}", "tags": ["#k"]}]}"##;
        let mut scanner = FrameScanner::default();

        for end in 1..reply.len() {
            assert!(!scanner.advance(&reply[..end]), "ready too early at {}", end);
        }
        assert!(scanner.advance(reply));
        assert!(decode_frame(reply).unwrap().is_some());
    }

    #[test]
    fn test_scanner_handles_escaped_quotes() {
        let mut scanner = FrameScanner::default();
        assert!(!scanner.advance(br#"["say "}" \"#));
        assert!(scanner.advance(br#"["say "}" \", 1]"#));
    }

    #[test]
    fn test_scanner_hands_scalars_to_the_parser() {
        let mut scanner = FrameScanner::default();
        assert!(!scanner.advance(b"  \n"));
        assert!(scanner.advance(b"  \nnot json"));
        assert!(decode_frame(b"  \nnot json").is_err());

        // Stays ready for later reads
        assert!(scanner.advance(b"  \nnot json, really"));
    }

    #[test]
    fn test_decode_frame_incomplete() {
        assert!(decode_frame(b"").unwrap().is_none());
        assert!(decode_frame(b"   \n").unwrap().is_none());
        assert!(decode_frame(b"{\"id\": \"1\", \"res").unwrap().is_none());
        assert!(decode_frame(b"[{\"id\": \"1\"}, ").unwrap().is_none());
    }

    #[test]
    fn test_decode_frame_complete_object() {
        let buf = br#"  {"jsonrpc":"2.0","result":true,"id":"1"}"#;
        let frame = decode_frame(buf).unwrap().unwrap();

        assert_eq!(frame.consumed, buf.len());
        assert_eq!(frame.value["result"], true);
    }

    #[test]
    fn test_decode_frame_reports_consumed_with_trailing_bytes() {
        let buf = br#"{"id":"1","result":1}{"id":"2""#;
        let frame = decode_frame(buf).unwrap().unwrap();

        assert_eq!(frame.consumed, br#"{"id":"1","result":1}"#.len());
    }

    #[test]
    fn test_decode_frame_invalid_json() {
        match decode_frame(b"{\"id\": ]") {
            Err(Error::MalformedResponse { raw, .. }) => assert_eq!(raw, b"{\"id\": ]"),
            other => panic!("Expected MalformedResponse, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_frame_rejects_scalars() {
        assert!(matches!(
            decode_frame(b"\"hello\""),
            Err(Error::MalformedResponse { .. })
        ));
        assert!(matches!(
            decode_frame(b"true "),
            Err(Error::MalformedResponse { .. })
        ));
    }

    #[test]
    fn test_decode_response_success_and_error() {
        let ok = decode_response(json!({"jsonrpc": "2.0", "id": "x", "result": 42})).unwrap();
        assert_eq!(ok.result, Some(json!(42)));

        let err = decode_response(json!({
            "jsonrpc": "2.0",
            "id": "x",
            "error": {"code": -1, "message": "boom"}
        }))
        .unwrap();
        assert_eq!(err.error, Some(JsonRpcErrorData::new(-1, "boom")));
    }

    #[test]
    fn test_decode_response_null_result() {
        let resp = decode_response(json!({"id": "x", "result": null})).unwrap();
        assert_eq!(resp.result, Some(Value::Null));
        assert!(resp.error.is_none());
    }

    #[test]
    fn test_decode_response_exclusivity() {
        assert!(matches!(
            decode_response(json!({"id": "x"})),
            Err(Error::MalformedResponse { .. })
        ));
        assert!(matches!(
            decode_response(json!({
                "id": "x",
                "result": 1,
                "error": {"code": 1, "message": "m"}
            })),
            Err(Error::MalformedResponse { .. })
        ));
    }

    #[test]
    fn test_decode_response_bad_error_shape() {
        let result = decode_response(json!({"id": "x", "error": "nope"}));
        assert!(matches!(result, Err(Error::MalformedResponse { .. })));
    }

    #[test]
    fn test_decode_reply() {
        let single = decode_reply(json!({"id": "a", "result": 1})).unwrap();
        assert!(matches!(single, JsonRpcReply::Single(_)));

        let batch = decode_reply(json!([{"id": "a", "result": 1}, {"bogus": true}])).unwrap();
        match batch {
            JsonRpcReply::Batch(items) => {
                let decoded = decode_batch_responses(items);
                assert_eq!(decoded.len(), 2);
                assert!(decoded[0].is_ok());
                assert!(decoded[1].is_err());
            }
            other => panic!("Expected batch, got {:?}", other),
        }
    }
}
