//! JSON-RPC 2.0 client for lightsd
//!
//! lightsd is a daemon that drives LIFX bulbs and takes commands as
//! JSON-RPC 2.0 over a plain TCP socket. This crate provides the session
//! that talks to it:
//!
//! # Core Features
//!
//! - **TCP Transport**: unframed JSON replies reassembled across reads, with
//!   read deadline, reply size limit and cross-task close
//! - **Request-Response**: one request, one reply, errors surfaced as typed
//!   `Error::Rpc`
//! - **Batching**: queue calls and send them as one array; replies are
//!   matched back by id
//! - **Light Commands**: power, color, waveforms, tags, labels and a
//!   read-modify-write brightness helper
//! - **Observability**: tracing spans plus OpenTelemetry metrics
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use lightsc_client::{Hsbk, LightsClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = LightsClient::connect("localhost", 1234).await?;
//!
//!     client.power_on("*").await?;
//!     client.set_light_from_hsbk("#kitchen", 30.0, 0.6, 0.8, 3500, 600).await?;
//!
//!     for bulb in client.get_light_states("*").await? {
//!         println!("{}: {:?}", bulb.label, bulb.hsbk);
//!     }
//!
//!     client.close().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Batching
//!
//! ```rust,no_run
//! use lightsc_client::{Hsbk, LightsClient};
//!
//! # async fn example(client: &mut LightsClient) -> lightsc_core::Result<()> {
//! let mut batch = client.batch()?;
//! batch.power_on("#porch").await?;
//! batch.sine("#porch", Hsbk::new(0.0, 1.0, 1.0, 3500), 2000, 5.0, 0.5, true).await?;
//! let results = batch.send().await?;
//!
//! for entry in &results {
//!     println!("{} {}: {:?}", entry.method, entry.id, entry.outcome);
//! }
//! # Ok(())
//! # }
//! ```

mod batch;
mod client;
mod client_builder;
mod commands;
mod light;
mod metrics;
mod transport;

pub use batch::{Batch, BatchEntry, BatchResults, Outcome};
pub use client::{Call, LightsClient, Mode};
pub use client_builder::{ClientBuilder, ConfigError, DEFAULT_HOST};
pub use commands::{BRIGHTNESS_TRANSITION_MS, DEFAULT_SKEW_RATIO};
pub use light::{Hsbk, LightState, Target, Waveform};
pub use metrics::ClientMetrics;
pub use transport::{
    CloseHandle, TcpTransport, Transport, TransportConfig, DEFAULT_MAX_RESPONSE_SIZE,
    DEFAULT_READ_TIMEOUT,
};
