//! Common test utilities for lightsc-client integration tests
//!
//! Two fakes are provided:
//!
//! - [`MockLightsd`]: a real TCP server that reassembles requests the same
//!   way the client does and answers through a handler, optionally split
//!   across several writes
//! - [`ScriptedTransport`]: an in-memory [`Transport`] that records what the
//!   session sends, for tests that only care about the wire shape

#![allow(dead_code)]

use async_trait::async_trait;
use lightsc_client::Transport;
use lightsc_core::{codec, Error, Result};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

/// What the mock server does with one received message
pub enum Action {
    /// Write the value in one go
    Reply(Value),
    /// Write the value split into this many separate writes
    Chunked(Value, usize),
    /// Write these bytes verbatim
    Raw(Vec<u8>),
    /// Close the connection without answering
    Close,
    /// Don't answer at all
    Ignore,
}

/// Mock lightsd daemon
pub struct MockLightsd {
    addr: SocketAddr,
    shutdown_tx: mpsc::Sender<()>,
    message_rx: mpsc::Receiver<Value>,
}

impl MockLightsd {
    /// Start a server that behaves like lightsd with [`default_bulbs`]
    pub async fn new() -> Self {
        Self::with_handler(lightsd(default_bulbs())).await
    }

    /// Start a server answering every message through `handler`
    pub async fn with_handler<F>(handler: F) -> Self
    where
        F: Fn(Value) -> Action + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handler = Arc::new(handler);

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let (msg_tx, msg_rx) = mpsc::channel::<Value>(100);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    accepted = listener.accept() => {
                        if let Ok((socket, _)) = accepted {
                            tokio::spawn(serve(socket, handler.clone(), msg_tx.clone()));
                        }
                    }
                }
            }
        });

        Self {
            addr,
            shutdown_tx,
            message_rx: msg_rx,
        }
    }

    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Wait for the next message the server received
    ///
    /// Returns None if nothing arrives within 5 seconds.
    pub async fn wait_for_message(&mut self) -> Option<Value> {
        tokio::time::timeout(Duration::from_secs(5), self.message_rx.recv())
            .await
            .ok()
            .flatten()
    }

    /// A message already received, without waiting
    pub fn try_message(&mut self) -> Option<Value> {
        self.message_rx.try_recv().ok()
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

async fn serve<F>(mut socket: TcpStream, handler: Arc<F>, msg_tx: mpsc::Sender<Value>)
where
    F: Fn(Value) -> Action + Send + Sync + 'static,
{
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        let n = match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        buf.extend_from_slice(&chunk[..n]);

        while let Ok(Some(frame)) = codec::decode_frame(&buf) {
            buf.drain(..frame.consumed);
            let _ = msg_tx.send(frame.value.clone()).await;

            let written = match (*handler)(frame.value) {
                Action::Reply(value) => socket.write_all(value.to_string().as_bytes()).await,
                Action::Chunked(value, parts) => write_chunked(&mut socket, &value, parts).await,
                Action::Raw(bytes) => socket.write_all(&bytes).await,
                Action::Close => return,
                Action::Ignore => Ok(()),
            };
            if written.is_err() {
                return;
            }
        }
    }
}

async fn write_chunked(socket: &mut TcpStream, value: &Value, parts: usize) -> std::io::Result<()> {
    let bytes = value.to_string().into_bytes();
    let size = bytes.len().div_ceil(parts.max(1)).max(1);

    for piece in bytes.chunks(size) {
        socket.write_all(piece).await?;
        socket.flush().await?;
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    Ok(())
}

/// Two bulbs: `bulb1` on at 90% in the kitchen, `bulb2` off at 5%
pub fn default_bulbs() -> Vec<Value> {
    vec![
        json!({
            "_lifx": {"addr": "d0:73:d5:01:a0:d5", "gateway": {"site": "d0:73:d5:01:a0:d5"}},
            "hsbk": [0, 0, 0.9, 3500],
            "power": true,
            "label": "bulb1",
            "tags": ["kitchen"]
        }),
        json!({
            "_lifx": {"addr": "d0:73:d5:02:b1:e6", "gateway": {"site": "d0:73:d5:01:a0:d5"}},
            "hsbk": [120.0, 1.0, 0.05, 2700],
            "power": false,
            "label": "bulb2",
            "tags": []
        }),
    ]
}

/// The reply lightsd would give to one request envelope
pub fn respond(request: &Value, bulbs: &[Value]) -> Value {
    let id = request["id"].clone();
    let result = match request["method"].as_str() {
        Some("get_light_state") => Value::Array(bulbs.to_vec()),
        Some(
            "power_on" | "power_off" | "power_toggle" | "set_light_from_hsbk" | "set_waveform"
            | "tag" | "untag" | "set_label",
        ) => json!(true),
        Some(other) => {
            return json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": {"code": -32601, "message": "Method not found", "data": other}
            })
        }
        None => {
            return json!({
                "jsonrpc": "2.0",
                "id": null,
                "error": {"code": -32600, "message": "Invalid Request"}
            })
        }
    };
    json!({"jsonrpc": "2.0", "id": id, "result": result})
}

/// Handler mimicking lightsd; batch replies come back in reverse order
pub fn lightsd(bulbs: Vec<Value>) -> impl Fn(Value) -> Action + Send + Sync + 'static {
    move |message| match message {
        Value::Array(requests) => Action::Reply(Value::Array(
            requests.iter().rev().map(|r| respond(r, &bulbs)).collect(),
        )),
        request => Action::Reply(respond(&request, &bulbs)),
    }
}

type Script = Box<dyn FnOnce(&Value) -> Result<Value> + Send>;

/// In-memory transport recording every message it is given
///
/// Scripted replies are used first, in order; after that it answers like
/// lightsd would.
pub struct ScriptedTransport {
    pub sent: Vec<Value>,
    pub closed: bool,
    script: VecDeque<Script>,
    bulbs: Vec<Value>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::with_bulbs(default_bulbs())
    }

    pub fn with_bulbs(bulbs: Vec<Value>) -> Self {
        Self {
            sent: Vec::new(),
            closed: false,
            script: VecDeque::new(),
            bulbs,
        }
    }

    /// Answer the next exchange with `f`
    pub fn then(mut self, f: impl FnOnce(&Value) -> Result<Value> + Send + 'static) -> Self {
        self.script.push_back(Box::new(f));
        self
    }

    /// Fail the next exchange with `error`
    pub fn then_fail(self, error: Error) -> Self {
        self.then(move |_| Err(error))
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send_and_receive(&mut self, message: Value) -> Result<Value> {
        if self.closed {
            return Err(Error::Connection("transport is closed".to_string()));
        }
        self.sent.push(message.clone());

        match self.script.pop_front() {
            Some(f) => f(&message),
            None => match &message {
                Value::Array(requests) => Ok(Value::Array(
                    requests.iter().map(|r| respond(r, &self.bulbs)).collect(),
                )),
                request => Ok(respond(request, &self.bulbs)),
            },
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_respond_known_method() {
        let reply = respond(&json!({"id": "a", "method": "power_on"}), &[]);
        assert_eq!(reply["result"], true);
        assert_eq!(reply["id"], "a");
    }

    #[test]
    fn test_respond_unknown_method() {
        let reply = respond(&json!({"id": "a", "method": "explode"}), &[]);
        assert_eq!(reply["error"]["code"], -32601);
    }

    #[tokio::test]
    async fn test_mock_server_creation() {
        let server = MockLightsd::new().await;
        assert_eq!(server.host(), "127.0.0.1");
        assert_ne!(server.port(), 0);
        server.shutdown().await;
    }
}
