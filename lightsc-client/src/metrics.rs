//! Client metrics definitions
//!
//! OpenTelemetry instruments describing how a session talks to lightsd.
//! They are exported through whatever meter provider
//! `lightsc_core::init_observability` installed; with no provider they are
//! no-ops.
//!
//! # Metrics Collected
//!
//! - **requests_total**: exchanges completed, by method and status (counter)
//! - **request_duration**: exchange latency in seconds (histogram)
//! - **errors_total**: failures by error type (counter)
//! - **batch_size**: requests per flushed batch (histogram)
//! - **batch_discarded_total**: queued requests dropped without sending (counter)
//!
//! # Examples
//!
//! ```rust,no_run
//! use lightsc_client::ClientBuilder;
//!
//! # async fn example() -> lightsc_core::Result<()> {
//! // Metrics are recorded automatically once observability is enabled
//! let client = ClientBuilder::new("localhost", 1234)
//!     .with_default_observability()
//!     .service_name("porch-lights")
//!     .connect()
//!     .await?;
//! # Ok(())
//! # }
//! ```

use lightsc_core::Error;
use opentelemetry::{
    global,
    metrics::{Counter, Histogram, Meter},
    InstrumentationScope, KeyValue,
};

/// Client metrics for monitoring
pub struct ClientMetrics {
    /// Total number of completed exchanges
    pub requests_total: Counter<u64>,
    /// Exchange duration in seconds
    pub request_duration: Histogram<f64>,
    /// Total number of errors
    pub errors_total: Counter<u64>,
    /// Batch size distribution
    pub batch_size: Histogram<u64>,
    /// Requests queued in a batch that was never sent
    pub batch_discarded_total: Counter<u64>,
}

impl ClientMetrics {
    /// Create metrics on the global meter provider, scoped to `service_name`
    pub fn new(service_name: impl Into<String>) -> Self {
        let meter = global::meter_with_scope(meter_scope(service_name.into()));
        Self::new_with_meter(&meter)
    }

    /// Create metrics on a specific meter
    pub fn new_with_meter(meter: &Meter) -> Self {
        Self {
            requests_total: meter
                .u64_counter("lightsc.client.requests.total")
                .with_description("Total number of exchanges with lightsd")
                .build(),
            request_duration: meter
                .f64_histogram("lightsc.client.request.duration")
                .with_description("Exchange duration in seconds")
                .with_unit("s")
                .build(),
            errors_total: meter
                .u64_counter("lightsc.client.errors.total")
                .with_description("Total number of errors encountered")
                .build(),
            batch_size: meter
                .u64_histogram("lightsc.client.batch.size")
                .with_description("Number of requests in flushed batches")
                .build(),
            batch_discarded_total: meter
                .u64_counter("lightsc.client.batch.discarded")
                .with_description("Queued requests dropped without being sent")
                .build(),
        }
    }

    /// Record a completed exchange
    pub fn record_request(&self, method: &str, status: &str, duration_secs: f64) {
        let attributes = &[
            KeyValue::new("method", method.to_string()),
            KeyValue::new("status", status.to_string()),
        ];
        self.requests_total.add(1, attributes);
        self.request_duration.record(duration_secs, attributes);
    }

    /// Record an error
    pub fn record_error(&self, error_type: &str) {
        let attributes = &[KeyValue::new("error_type", error_type.to_string())];
        self.errors_total.add(1, attributes);
    }

    /// Record a flushed batch
    pub fn record_batch(&self, size: u64) {
        self.batch_size.record(size, &[]);
    }

    /// Record requests dropped with a discarded batch
    pub fn record_discarded(&self, count: u64) {
        self.batch_discarded_total.add(count, &[]);
    }
}

fn meter_scope(service_name: String) -> InstrumentationScope {
    InstrumentationScope::builder(service_name)
        .with_version(env!("CARGO_PKG_VERSION"))
        .build()
}

/// Low-cardinality label for an error
pub(crate) fn error_type(error: &Error) -> &'static str {
    match error {
        Error::Rpc(_) => "rpc",
        Error::Connection(_) => "connection",
        Error::MalformedResponse { .. } => "malformed_response",
        Error::State(_) => "state",
        Error::Serialization(_) => "serialization",
        Error::Timeout => "timeout",
    }
}
