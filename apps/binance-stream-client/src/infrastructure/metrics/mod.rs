//! Prometheus Metrics Module
//!
//! Exposes client metrics via Prometheus format for monitoring.
//!
//! # Metrics Categories
//!
//! - **Messages**: Counts of messages received per stream kind
//! - **Failures**: Decode failures and connection failures
//! - **Routing**: User stream payloads dropped by the router
//! - **Streams**: Number of registered streams
//!
//! # Integration
//!
//! The binary serves `/metrics` on `STREAM_CLIENT_METRICS_PORT`. Without an
//! installed recorder every recording function is a no-op.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::OnceLock;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

// =============================================================================
// Exporter Installation
// =============================================================================

static INSTALLED: OnceLock<SocketAddr> = OnceLock::new();

/// Install the Prometheus recorder with an HTTP listener on `port`.
///
/// Must run inside a Tokio runtime. Subsequent calls are no-ops and return
/// the address of the first listener.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound or a recorder is already
/// installed by other code.
pub fn init_metrics(port: u16) -> Result<SocketAddr, BuildError> {
    if let Some(addr) = INSTALLED.get() {
        return Ok(*addr);
    }

    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    register_metrics();

    Ok(*INSTALLED.get_or_init(|| addr))
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "binance_stream_client_messages_received_total",
        "Total messages received by stream kind"
    );
    describe_counter!(
        "binance_stream_client_decode_failures_total",
        "Total payloads that failed to decode"
    );
    describe_counter!(
        "binance_stream_client_messages_dropped_total",
        "Total user stream payloads dropped by the router"
    );
    describe_counter!(
        "binance_stream_client_connection_failures_total",
        "Total failed connection attempts"
    );
    describe_gauge!(
        "binance_stream_client_active_streams",
        "Number of registered stream connections"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Why the user stream router dropped a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Payload matched a marker but its handler slot is empty.
    NoHandler,
    /// Payload matched no known marker.
    Unrecognized,
}

impl DropReason {
    const fn as_str(self) -> &'static str {
        match self {
            Self::NoHandler => "no_handler",
            Self::Unrecognized => "unrecognized",
        }
    }
}

/// Record a message received on a stream of `kind`.
pub fn record_message_received(kind: &'static str) {
    counter!(
        "binance_stream_client_messages_received_total",
        "kind" => kind
    )
    .increment(1);
}

/// Record a payload that failed to decode.
pub fn record_decode_failure(kind: &'static str) {
    counter!(
        "binance_stream_client_decode_failures_total",
        "kind" => kind
    )
    .increment(1);
}

/// Record a user stream payload dropped by the router.
pub fn record_dropped(reason: DropReason) {
    counter!(
        "binance_stream_client_messages_dropped_total",
        "reason" => reason.as_str()
    )
    .increment(1);
}

/// Record a failed connection attempt.
pub fn record_connection_failure(kind: &'static str) {
    counter!(
        "binance_stream_client_connection_failures_total",
        "kind" => kind
    )
    .increment(1);
}

/// Update the registered stream count.
#[allow(clippy::cast_precision_loss)]
pub fn set_active_streams(count: usize) {
    gauge!("binance_stream_client_active_streams").set(count as f64);
}

// =============================================================================
// Tests
// =============================================================================
