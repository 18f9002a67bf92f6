//! lightsc - JSON-RPC 2.0 client for lightsd
//!
//! This is the convenience crate that re-exports the lightsc sub-crates.
//! Depend on it if you want the wire types and the client under one name.
//!
//! # Architecture
//!
//! - **lightsc-core**: envelopes, the unframed JSON codec, errors, observability
//! - **lightsc-client**: TCP transport, the batching session and light commands
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use lightsc::{LightsClient, Target};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = LightsClient::connect("localhost", 1234).await?;
//!
//!     client.power_on(Target::tag("kitchen")).await?;
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
//! # async fn scene(client: &mut lightsc::LightsClient) -> lightsc::core::Result<()> {
//! let mut batch = client.batch()?;
//! batch.power_off("#bedroom").await?;
//! batch.set_light_from_hsbk("#kitchen", 30.0, 0.4, 0.6, 2700, 800).await?;
//! let results = batch.send().await?;
//! assert!(results.all_success());
//! # Ok(())
//! # }
//! ```

pub use lightsc_client as client;
pub use lightsc_core as core;

pub use lightsc_client::{BatchResults, ClientBuilder, Hsbk, LightState, LightsClient, Target, Waveform};
pub use lightsc_core::{Error, Result};
