//! Byte transport between the session and lightsd
//!
//! A transport moves one JSON value out and one JSON value back per
//! exchange. The session only talks to the [`Transport`] trait, which keeps
//! the batching logic testable against a scripted in-memory peer.
//!
//! # Framing
//!
//! lightsd replies are not length-prefixed. [`TcpTransport`] reads into a
//! growing buffer and feeds each read to a [`codec::FrameScanner`]; once the
//! outermost object or array has closed, [`codec::decode_frame`] parses the
//! buffer. Incomplete JSON means "keep reading", a complete object or array
//! ends the exchange. A single fixed-size read is never assumed to hold a
//! whole reply.
//!
//! # Failure Handling
//!
//! | condition | error |
//! |---|---|
//! | peer closed with nothing buffered | `Error::Connection` |
//! | peer closed mid-reply | `Error::MalformedResponse` (raw bytes) |
//! | bytes that can never become JSON | `Error::MalformedResponse` |
//! | deadline expired, nothing received | `Error::Timeout` |
//! | deadline expired mid-reply | `Error::MalformedResponse` (raw bytes) |
//! | [`CloseHandle::close`] during a read | `Error::Connection` |
//!
//! After any failed read the stream position is unknown, so the transport
//! closes itself and later exchanges fail with `Error::Connection`.

use async_trait::async_trait;
use lightsc_core::{codec, Error, Result};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::time::Instant;

/// Size of each socket read
const READ_CHUNK: usize = 8192;

/// Default upper bound on a single reply
pub const DEFAULT_MAX_RESPONSE_SIZE: usize = 16 * 1024 * 1024;

/// Default deadline for reading a reply
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// One-value-out, one-value-in exchange with a JSON-RPC peer
#[async_trait]
pub trait Transport: Send {
    /// Send `message` and wait for exactly one complete JSON reply
    async fn send_and_receive(&mut self, message: Value) -> Result<Value>;

    /// Close the underlying connection; calling it again is a no-op
    async fn close(&mut self) -> Result<()>;
}

/// Tunables for [`TcpTransport`]
#[derive(Debug, Clone, PartialEq)]
pub struct TransportConfig {
    /// Deadline for establishing the connection (`None` waits forever)
    pub connect_timeout: Option<Duration>,
    /// Deadline for receiving a complete reply (`None` waits forever)
    pub read_timeout: Option<Duration>,
    /// Largest reply accepted, in bytes
    pub max_response_size: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: None,
            read_timeout: Some(DEFAULT_READ_TIMEOUT),
            max_response_size: DEFAULT_MAX_RESPONSE_SIZE,
        }
    }
}

/// Cloneable handle that closes a [`TcpTransport`] from another task
///
/// A read blocked in `send_and_receive` wakes up and fails with
/// `Error::Connection` as soon as `close` is called.
#[derive(Debug, Clone)]
pub struct CloseHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CloseHandle {
    fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Request the connection to close
    pub fn close(&self) {
        self.tx.send_replace(true);
    }

    /// Whether `close` has been called
    pub fn is_closed(&self) -> bool {
        *self.tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

/// JSON-RPC transport over a TCP stream
#[derive(Debug)]
pub struct TcpTransport {
    stream: Option<TcpStream>,
    peer: String,
    config: TransportConfig,
    close_handle: CloseHandle,
}

enum ReadFailure {
    Closed,
    TimedOut,
    Io(std::io::Error),
}

impl TcpTransport {
    /// Connect to lightsd at `host:port`
    ///
    /// There is no retry: a refused or unreachable peer is reported
    /// immediately as `Error::Connection`.
    #[tracing::instrument(skip(config))]
    pub async fn connect(host: &str, port: u16, config: TransportConfig) -> Result<Self> {
        let peer = format!("{}:{}", host, port);
        tracing::debug!("Connecting to lightsd");

        let connecting = TcpStream::connect(peer.as_str());
        let connected = match config.connect_timeout {
            Some(limit) => tokio::time::timeout(limit, connecting)
                .await
                .map_err(|_| Error::Timeout)?,
            None => connecting.await,
        };
        let stream = connected
            .map_err(|e| Error::Connection(format!("failed to connect to {}: {}", peer, e)))?;
        stream.set_nodelay(true)?;

        tracing::info!(peer = %peer, "Connected to lightsd");

        Ok(Self {
            stream: Some(stream),
            peer,
            config,
            close_handle: CloseHandle::new(),
        })
    }

    /// `host:port` this transport was connected to
    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Whether the connection is still open
    pub fn is_open(&self) -> bool {
        self.stream.is_some() && !self.close_handle.is_closed()
    }

    /// Handle that can close this transport from another task
    pub fn close_handle(&self) -> CloseHandle {
        self.close_handle.clone()
    }

    /// Effective configuration
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    fn stream_mut(&mut self) -> Result<&mut TcpStream> {
        if self.close_handle.is_closed() {
            self.stream = None;
        }
        self.stream
            .as_mut()
            .ok_or_else(|| Error::Connection(format!("connection to {} is closed", self.peer)))
    }

    async fn write_message(&mut self, message: &Value) -> Result<()> {
        let bytes = codec::encode(message)?;
        let stream = self.stream_mut()?;
        stream.write_all(&bytes).await?;
        stream.flush().await?;
        tracing::debug!(bytes = bytes.len(), "Message sent");
        Ok(())
    }

    async fn read_reply(&mut self) -> Result<Value> {
        let deadline = self.config.read_timeout.map(|limit| Instant::now() + limit);
        let max_size = self.config.max_response_size;
        let mut closed = self.close_handle.subscribe();
        let stream = self.stream_mut()?;

        let mut buf: Vec<u8> = Vec::with_capacity(READ_CHUNK);
        let mut chunk = [0u8; READ_CHUNK];
        let mut scanner = codec::FrameScanner::default();

        loop {
            let read = tokio::select! {
                biased;
                _ = closed.wait_for(|is_closed| *is_closed) => Err(ReadFailure::Closed),
                read = read_chunk(stream, &mut chunk, deadline) => read,
            };

            let n = match read {
                Ok(0) if buf.is_empty() => {
                    return Err(Error::Connection("connection closed by peer".to_string()))
                }
                Ok(0) => {
                    return Err(Error::malformed("connection closed mid-reply", buf));
                }
                Ok(n) => n,
                Err(ReadFailure::Closed) => {
                    return Err(Error::Connection("connection closed locally".to_string()))
                }
                Err(ReadFailure::TimedOut) if buf.is_empty() => return Err(Error::Timeout),
                Err(ReadFailure::TimedOut) => {
                    return Err(Error::malformed("timed out waiting for end of reply", buf));
                }
                Err(ReadFailure::Io(e)) => return Err(e.into()),
            };

            buf.extend_from_slice(&chunk[..n]);
            tracing::trace!(read = n, buffered = buf.len(), "Read from socket");

            if buf.len() > max_size {
                return Err(Error::malformed(
                    format!("reply exceeds {} bytes", max_size),
                    buf,
                ));
            }

            if !scanner.advance(&buf) {
                continue;
            }
            if let Some(frame) = codec::decode_frame(&buf)? {
                let trailing = &buf[frame.consumed..];
                if trailing.iter().any(|b| !b.is_ascii_whitespace()) {
                    tracing::warn!(
                        discarded = trailing.len(),
                        "Discarding unexpected bytes after reply"
                    );
                }
                tracing::debug!(bytes = frame.consumed, "Reply received");
                return Ok(frame.value);
            }
        }
    }
}

async fn read_chunk(
    stream: &mut TcpStream,
    chunk: &mut [u8],
    deadline: Option<Instant>,
) -> std::result::Result<usize, ReadFailure> {
    let read = match deadline {
        Some(deadline) => tokio::time::timeout_at(deadline, stream.read(chunk))
            .await
            .map_err(|_| ReadFailure::TimedOut)?,
        None => stream.read(chunk).await,
    };
    read.map_err(ReadFailure::Io)
}

#[async_trait]
impl Transport for TcpTransport {
    async fn send_and_receive(&mut self, message: Value) -> Result<Value> {
        let exchange = async {
            self.write_message(&message).await?;
            self.read_reply().await
        };
        let result = exchange.await;

        if result.is_err() {
            // The stream may hold part of a reply nobody will read
            self.stream = None;
            self.close_handle.close();
        }
        result
    }

    async fn close(&mut self) -> Result<()> {
        self.close_handle.close();
        if let Some(mut stream) = self.stream.take() {
            match stream.shutdown().await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotConnected => {}
                Err(e) => return Err(e.into()),
            }
            tracing::info!(peer = %self.peer, "Connection closed");
        }
        Ok(())
    }
}
