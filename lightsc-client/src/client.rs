//! JSON-RPC session with lightsd
//!
//! This module provides [`LightsClient`], which owns a transport and a batch
//! state machine. It is the only place requests are built and replies are
//! unwrapped.
//!
//! # Modes
//!
//! A session is always in one of two modes:
//!
//! 1. **Single**: each [`LightsClient::call`] sends one request and waits for
//!    its reply, returning [`Call::Completed`].
//! 2. **Batching**: calls are queued and return [`Call::Queued`] with the id
//!    the request will carry. [`LightsClient::end_batch`] sends them all as
//!    one array.
//!
//! The queued requests live inside [`Mode::Batching`], so "pending requests
//! outside a batch" cannot be represented. Flushing resets the mode before
//! any I/O happens; a failed flush never leaves a half-open batch behind.
//!
//! # Exclusivity
//!
//! Every method takes `&mut self`: one exchange is in flight at a time and
//! the borrow checker enforces it. To share a session between tasks, wrap it
//! in a `tokio::sync::Mutex`.

use crate::batch::{Batch, BatchResults};
use crate::metrics::{self, ClientMetrics};
use crate::transport::{CloseHandle, TcpTransport, Transport};
use lightsc_core::{codec, Error, Id, JsonRpcReply, JsonRpcRequest, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;

/// Batch state of a session
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Mode {
    /// Calls are sent immediately
    #[default]
    Single,
    /// Calls are queued until the batch is closed
    Batching {
        /// Requests queued so far, in call order
        pending: Vec<JsonRpcRequest>,
    },
}

/// What a call produced
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    /// The request was sent and this is its result
    Completed(Value),
    /// A batch is open; the request was queued with this id
    Queued(Id),
}

impl Call {
    /// The result, if the call completed
    pub fn into_value(self) -> Option<Value> {
        match self {
            Call::Completed(value) => Some(value),
            Call::Queued(_) => None,
        }
    }

    /// The request id, if the call was queued
    pub fn queued_id(&self) -> Option<&Id> {
        match self {
            Call::Completed(_) => None,
            Call::Queued(id) => Some(id),
        }
    }

    pub fn is_queued(&self) -> bool {
        matches!(self, Call::Queued(_))
    }
}

/// A JSON-RPC session with lightsd
///
/// # Examples
///
/// ```rust,no_run
/// use lightsc_client::LightsClient;
/// use serde_json::json;
///
/// # async fn example() -> lightsc_core::Result<()> {
/// let mut client = LightsClient::connect("localhost", 1234).await?;
///
/// let state = client.call("get_light_state", json!(["*"])).await?;
/// println!("{:?}", state.into_value());
///
/// client.close().await?;
/// # Ok(())
/// # }
/// ```
pub struct LightsClient<T: Transport = TcpTransport> {
    transport: T,
    mode: Mode,
    metrics: Option<Arc<ClientMetrics>>,
}

impl LightsClient<TcpTransport> {
    /// Connect to lightsd with default settings
    ///
    /// Use [`crate::ClientBuilder`] to change timeouts or enable telemetry.
    pub async fn connect(host: &str, port: u16) -> Result<Self> {
        crate::ClientBuilder::new(host, port).connect().await
    }

    /// Handle that closes the connection from another task
    ///
    /// An exchange blocked on a read fails with `Error::Connection` as soon
    /// as the handle is used.
    pub fn close_handle(&self) -> CloseHandle {
        self.transport.close_handle()
    }

    /// `host:port` of the daemon
    pub fn peer(&self) -> &str {
        self.transport.peer()
    }
}

impl<T: Transport> LightsClient<T> {
    /// Start a session over an already connected transport
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            mode: Mode::Single,
            metrics: None,
        }
    }

    pub(crate) fn with_metrics(mut self, metrics: Option<Arc<ClientMetrics>>) -> Self {
        self.metrics = metrics;
        self
    }

    /// The underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    pub fn is_batching(&self) -> bool {
        matches!(self.mode, Mode::Batching { .. })
    }

    /// Number of requests queued in the open batch (0 in single mode)
    pub fn pending_len(&self) -> usize {
        match &self.mode {
            Mode::Single => 0,
            Mode::Batching { pending } => pending.len(),
        }
    }

    /// Invoke `method` with `params`
    ///
    /// In single mode this sends the request and waits for the reply; in
    /// batching mode it only queues the request.
    ///
    /// # Errors
    ///
    /// - `Error::Rpc` if the server answered with an error
    /// - `Error::MalformedResponse` if the reply is not a response to this
    ///   request (wrong id, an array, missing fields)
    /// - `Error::Connection` / `Error::Timeout` from the transport
    #[tracing::instrument(skip(self, params), fields(method = %method))]
    pub async fn call(&mut self, method: &str, params: Value) -> Result<Call> {
        let request = JsonRpcRequest::new(method, params);

        if let Mode::Batching { pending } = &mut self.mode {
            let id = request.id.clone();
            pending.push(request);
            tracing::debug!(id = %id, queued = pending.len(), "Request queued");
            return Ok(Call::Queued(id));
        }

        self.call_single(request).await.map(Call::Completed)
    }

    /// Invoke `method` and decode its result as `R`
    ///
    /// Only valid in single mode, since a queued request has no result yet.
    pub async fn request<R: DeserializeOwned>(&mut self, method: &str, params: Value) -> Result<R> {
        if self.is_batching() {
            return Err(Error::State(format!(
                "{} needs its result and cannot run inside a batch",
                method
            )));
        }

        match self.call(method, params).await? {
            Call::Completed(value) => {
                serde_json::from_value(value).map_err(|e| Error::Serialization(e.to_string()))
            }
            Call::Queued(id) => Err(Error::State(format!("request {} was queued", id))),
        }
    }

    async fn call_single(&mut self, request: JsonRpcRequest) -> Result<Value> {
        let start = Instant::now();
        let result = self.exchange_single(&request).await;
        let duration = start.elapsed().as_secs_f64();

        if let Some(ref m) = self.metrics {
            match &result {
                Ok(_) => m.record_request(&request.method, "success", duration),
                Err(e) => {
                    m.record_request(&request.method, "error", duration);
                    m.record_error(metrics::error_type(e));
                }
            }
        }

        match &result {
            Ok(_) => tracing::debug!(duration_secs = duration, "Request completed"),
            Err(Error::Rpc(e)) => tracing::debug!(error = %e, "Server returned an error"),
            Err(e) => tracing::error!(error = %e, "Request failed"),
        }
        result
    }

    async fn exchange_single(&mut self, request: &JsonRpcRequest) -> Result<Value> {
        let message = serde_json::to_value(request).map_err(|e| Error::Serialization(e.to_string()))?;
        tracing::debug!(id = %request.id, "Sending request");

        let reply = self.transport.send_and_receive(message).await?;

        let response = match codec::decode_reply(reply)? {
            JsonRpcReply::Single(response) => response,
            JsonRpcReply::Batch(items) => {
                return Err(Error::malformed(
                    "array reply to a single request",
                    Value::Array(items).to_string(),
                ))
            }
        };

        // lightsd answers requests it could not parse with a null id
        let id_matches = response.id == request.id || (response.id.is_null() && response.is_error());
        if !id_matches {
            let raw = serde_json::to_vec(&response).unwrap_or_default();
            return Err(Error::malformed(
                format!("reply id {} does not match request id {}", response.id, request.id),
                raw,
            ));
        }

        match response.into_outcome() {
            Some(Ok(value)) => Ok(value),
            Some(Err(error)) => Err(Error::Rpc(error)),
            None => Err(Error::malformed("response carries neither result nor error", Vec::new())),
        }
    }

    /// Start queueing calls
    ///
    /// # Errors
    ///
    /// `Error::State` if a batch is already open.
    pub fn begin_batch(&mut self) -> Result<()> {
        match self.mode {
            Mode::Single => {
                self.mode = Mode::Batching { pending: Vec::new() };
                tracing::debug!("Batch opened");
                Ok(())
            }
            Mode::Batching { .. } => Err(Error::State("a batch is already open".to_string())),
        }
    }

    /// Send every queued call as one request array
    ///
    /// The session is back in single mode when this returns, whatever the
    /// outcome. An empty batch sends nothing.
    ///
    /// # Errors
    ///
    /// - `Error::State` if no batch is open
    /// - `Error::Connection`, `Error::Timeout` or `Error::MalformedResponse`
    ///   if the exchange as a whole failed; per-request server errors are
    ///   reported inside [`BatchResults`] instead, and so is a null-id error
    ///   rejecting the whole batch, which every unanswered request carries
    #[tracing::instrument(skip(self), fields(batch_size = tracing::field::Empty))]
    pub async fn end_batch(&mut self) -> Result<BatchResults> {
        let pending = match std::mem::take(&mut self.mode) {
            Mode::Batching { pending } => pending,
            Mode::Single => return Err(Error::State("no batch is open".to_string())),
        };
        tracing::Span::current().record("batch_size", pending.len());

        if pending.is_empty() {
            tracing::debug!("Empty batch, nothing to send");
            return Ok(BatchResults::default());
        }

        let start = Instant::now();
        let result = self.exchange_batch(&pending).await;
        let duration = start.elapsed().as_secs_f64();

        if let Some(ref m) = self.metrics {
            m.record_batch(pending.len() as u64);
            match &result {
                Ok(_) => m.record_request("batch", "success", duration),
                Err(e) => {
                    m.record_request("batch", "error", duration);
                    m.record_error(metrics::error_type(e));
                }
            }
        }

        match &result {
            Ok(results) => tracing::debug!(
                replies = results.len(),
                failed = results.errors().len(),
                duration_secs = duration,
                "Batch completed"
            ),
            Err(e) => tracing::error!(error = %e, "Batch failed"),
        }
        result
    }

    async fn exchange_batch(&mut self, pending: &[JsonRpcRequest]) -> Result<BatchResults> {
        let message = serde_json::to_value(pending).map_err(|e| Error::Serialization(e.to_string()))?;
        tracing::debug!(requests = pending.len(), "Sending batch");

        let replies = match self.transport.send_and_receive(message).await? {
            Value::Array(items) => items,
            // Servers may collapse a batch into one object, e.g. a parse error
            object @ Value::Object(_) => vec![object],
            other => {
                return Err(Error::malformed(
                    "batch reply is neither an object nor an array",
                    other.to_string(),
                ))
            }
        };

        Ok(BatchResults::correlate(pending, replies))
    }

    /// Open a batch that is flushed by [`Batch::send`] and discarded on drop
    ///
    /// # Errors
    ///
    /// `Error::State` if a batch is already open.
    pub fn batch(&mut self) -> Result<Batch<'_, T>> {
        self.begin_batch()?;
        Ok(Batch::new(self))
    }

    /// Leave batching mode without sending anything
    ///
    /// Returns how many queued requests were dropped.
    pub fn discard_batch(&mut self) -> usize {
        let discarded = match std::mem::take(&mut self.mode) {
            Mode::Batching { pending } => pending.len(),
            Mode::Single => 0,
        };
        if discarded > 0 {
            if let Some(ref m) = self.metrics {
                m.record_discarded(discarded as u64);
            }
            tracing::warn!(discarded, "Discarded queued requests");
        }
        discarded
    }

    /// Close the connection
    ///
    /// A batch still open is discarded. Calling this twice is harmless.
    pub async fn close(&mut self) -> Result<()> {
        self.discard_batch();
        self.transport.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;

    /// Answers each exchange with a closure of the sent message
    struct EchoTransport {
        sent: Vec<Value>,
        replies: VecDeque<Box<dyn FnOnce(&Value) -> Result<Value> + Send>>,
    }

    impl EchoTransport {
        fn new() -> Self {
            Self {
                sent: Vec::new(),
                replies: VecDeque::new(),
            }
        }

        fn reply(mut self, f: impl FnOnce(&Value) -> Result<Value> + Send + 'static) -> Self {
            self.replies.push_back(Box::new(f));
            self
        }
    }

    #[async_trait]
    impl Transport for EchoTransport {
        async fn send_and_receive(&mut self, message: Value) -> Result<Value> {
            self.sent.push(message.clone());
            match self.replies.pop_front() {
                Some(f) => f(&message),
                None => Err(Error::Connection("no scripted reply".into())),
            }
        }

        async fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_single_call_result() {
        let transport =
            EchoTransport::new().reply(|m| Ok(json!({"jsonrpc": "2.0", "id": m["id"], "result": 42})));
        let mut client = LightsClient::new(transport);

        let call = client.call("get_light_state", json!(["*"])).await.unwrap();
        assert_eq!(call, Call::Completed(json!(42)));
        assert_eq!(client.transport().sent.len(), 1);
    }

    #[tokio::test]
    async fn test_single_call_error() {
        let transport = EchoTransport::new()
            .reply(|m| Ok(json!({"id": m["id"], "error": {"code": -1, "message": "boom"}})));
        let mut client = LightsClient::new(transport);

        match client.call("power_on", json!({"target": "*"})).await {
            Err(Error::Rpc(e)) => {
                assert_eq!(e.code, -1);
                assert_eq!(e.message, "boom");
            }
            other => panic!("Expected Rpc error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_single_call_id_mismatch() {
        let transport = EchoTransport::new().reply(|_| Ok(json!({"id": "someone-else", "result": 1})));
        let mut client = LightsClient::new(transport);

        let result = client.call("power_on", json!({"target": "*"})).await;
        assert!(matches!(result, Err(Error::MalformedResponse { .. })));
    }

    #[tokio::test]
    async fn test_single_call_null_id_error() {
        let transport = EchoTransport::new()
            .reply(|_| Ok(json!({"id": null, "error": {"code": -32700, "message": "Parse error"}})));
        let mut client = LightsClient::new(transport);

        match client.call("power_on", json!({"target": "*"})).await {
            Err(Error::Rpc(e)) => assert_eq!(e.code, -32700),
            other => panic!("Expected Rpc error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_single_call_array_reply() {
        let transport = EchoTransport::new().reply(|m| Ok(json!([{"id": m["id"], "result": 1}])));
        let mut client = LightsClient::new(transport);

        let result = client.call("power_on", json!({"target": "*"})).await;
        assert!(matches!(result, Err(Error::MalformedResponse { .. })));
    }

    #[tokio::test]
    async fn test_batch_mode_transitions() {
        let mut client = LightsClient::new(EchoTransport::new());
        assert_eq!(client.mode(), &Mode::Single);

        client.begin_batch().unwrap();
        assert!(client.is_batching());
        assert!(matches!(client.begin_batch(), Err(Error::State(_))));

        let call = client.call("power_on", json!({"target": "*"})).await.unwrap();
        assert!(call.is_queued());
        assert_eq!(client.pending_len(), 1);
        assert!(client.transport().sent.is_empty());

        assert_eq!(client.discard_batch(), 1);
        assert_eq!(client.mode(), &Mode::Single);
        assert!(matches!(client.end_batch().await, Err(Error::State(_))));
    }

    #[tokio::test]
    async fn test_empty_batch_sends_nothing() {
        let mut client = LightsClient::new(EchoTransport::new());

        client.begin_batch().unwrap();
        let results = client.end_batch().await.unwrap();

        assert!(results.is_empty());
        assert!(client.transport().sent.is_empty());
        assert!(!client.is_batching());
    }

    #[tokio::test]
    async fn test_collapsed_batch_reply() {
        let transport = EchoTransport::new()
            .reply(|_| Ok(json!({"id": null, "error": {"code": -32700, "message": "Parse error"}})));
        let mut client = LightsClient::new(transport);

        client.begin_batch().unwrap();
        client.call("power_on", json!({"target": "*"})).await.unwrap();
        let results = client.end_batch().await.unwrap();

        assert_eq!(results.len(), 1);
        let error = results.errors()[0].1;
        assert_eq!(error.code, -32700);
        assert_eq!(error.message, "Parse error");
    }

    #[tokio::test]
    async fn test_request_inside_batch_is_state_error() {
        let mut client = LightsClient::new(EchoTransport::new());
        client.begin_batch().unwrap();

        let result: Result<Value> = client.request("get_light_state", json!(["*"])).await;
        assert!(matches!(result, Err(Error::State(_))));
        assert_eq!(client.pending_len(), 0);
    }

    #[tokio::test]
    async fn test_close_discards_open_batch() {
        let mut client = LightsClient::new(EchoTransport::new());
        client.begin_batch().unwrap();
        client.call("power_on", json!({"target": "*"})).await.unwrap();

        client.close().await.unwrap();
        assert!(!client.is_batching());
        assert_eq!(client.pending_len(), 0);
    }
}
