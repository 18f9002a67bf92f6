//! Client builder for timeouts, limits and observability
//!
//! The `ClientBuilder` provides a fluent API for configuring a session
//! before connecting. It allows you to:
//! - Set the read and connect deadlines
//! - Bound the size of a single reply
//! - Configure observability (OpenTelemetry) and the service name
//! - Pick up the daemon address from the environment
//!
//! # Examples
//!
//! ```rust,no_run
//! use lightsc_client::ClientBuilder;
//! use std::time::Duration;
//!
//! # async fn example() -> lightsc_core::Result<()> {
//! let client = ClientBuilder::new("localhost", 1234)
//!     .read_timeout(Some(Duration::from_secs(5)))
//!     .connect_timeout(Duration::from_secs(2))
//!     .connect()
//!     .await?;
//!
//! // With observability
//! let client2 = ClientBuilder::new("localhost", 1234)
//!     .with_default_observability()
//!     .service_name("garden-lights")
//!     .connect()
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Environment Variables
//!
//! [`ClientBuilder::from_env`] reads:
//!
//! - `LIGHTSD_HOST`: daemon host (default "localhost")
//! - `LIGHTSD_PORT`: daemon port (required)
//! - `LIGHTSD_READ_TIMEOUT_MS`: read deadline in milliseconds, 0 to disable

use crate::transport::{TcpTransport, TransportConfig};
use crate::{ClientMetrics, LightsClient};
use lightsc_core::{ObservabilityConfig, Result};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Daemon host used when `LIGHTSD_HOST` is unset
pub const DEFAULT_HOST: &str = "localhost";

/// Errors reading the builder configuration from the environment
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// A required variable is not set
    #[error("{0} is not set")]
    Missing(&'static str),

    /// A variable is set to something that doesn't parse
    #[error("invalid value for {name}: {value:?}")]
    Invalid {
        /// Variable name
        name: &'static str,
        /// What it was set to
        value: String,
    },
}

/// Builder for configuring and connecting a [`LightsClient`]
#[derive(Debug, Clone)]
pub struct ClientBuilder {
    host: String,
    port: u16,
    transport: TransportConfig,
    observability_config: Option<ObservabilityConfig>,
    service_name: Option<String>,
}

impl ClientBuilder {
    /// Create a new client builder
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            transport: TransportConfig::default(),
            observability_config: None,
            service_name: None,
        }
    }

    /// Create a builder from `LIGHTSD_*` environment variables
    pub fn from_env() -> std::result::Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(
        lookup: impl Fn(&'static str) -> Option<String>,
    ) -> std::result::Result<Self, ConfigError> {
        let host = lookup("LIGHTSD_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());

        let port = lookup("LIGHTSD_PORT").ok_or(ConfigError::Missing("LIGHTSD_PORT"))?;
        let port = port.trim().parse::<u16>().map_err(|_| ConfigError::Invalid {
            name: "LIGHTSD_PORT",
            value: port.clone(),
        })?;

        let mut builder = Self::new(host, port);

        if let Some(raw) = lookup("LIGHTSD_READ_TIMEOUT_MS") {
            let ms = raw.trim().parse::<u64>().map_err(|_| ConfigError::Invalid {
                name: "LIGHTSD_READ_TIMEOUT_MS",
                value: raw.clone(),
            })?;
            builder = builder.read_timeout((ms > 0).then(|| Duration::from_millis(ms)));
        }

        Ok(builder)
    }

    /// Deadline for a complete reply; `None` waits forever
    pub fn read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.transport.read_timeout = timeout;
        self
    }

    /// Deadline for establishing the connection
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.transport.connect_timeout = Some(timeout);
        self
    }

    /// Largest reply accepted, in bytes
    pub fn max_response_size(mut self, bytes: usize) -> Self {
        self.transport.max_response_size = bytes;
        self
    }

    /// Enable OpenTelemetry observability with custom configuration
    pub fn with_observability(mut self, config: ObservabilityConfig) -> Self {
        self.observability_config = Some(config);
        self
    }

    /// Enable OpenTelemetry observability with default configuration
    pub fn with_default_observability(mut self) -> Self {
        self.observability_config = Some(ObservabilityConfig::default());
        self
    }

    /// Set service name for observability (used if observability is enabled)
    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = Some(name.into());
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Transport settings the client will connect with
    pub fn transport_config(&self) -> &TransportConfig {
        &self.transport
    }

    /// Build and connect the client
    pub async fn connect(self) -> Result<LightsClient<TcpTransport>> {
        let metrics = if let Some(mut config) = self.observability_config {
            if let Some(name) = self.service_name {
                config.service_name = name;
            }

            // A subscriber installed by the application takes precedence
            if let Err(e) = lightsc_core::init_observability(config.clone()) {
                tracing::warn!(error = %e, "OpenTelemetry not initialized");
            }

            Some(Arc::new(ClientMetrics::new(config.service_name)))
        } else {
            None
        };

        let transport = TcpTransport::connect(&self.host, self.port, self.transport).await?;
        Ok(LightsClient::new(transport).with_metrics(metrics))
    }
}
