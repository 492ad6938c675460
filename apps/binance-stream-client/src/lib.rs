#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements,
        clippy::redundant_clone
    )
)]

//! Binance Stream Client - WebSocket Subscription Manager
//!
//! Opens one WebSocket connection per Binance market stream (klines, depth,
//! aggregated trades), shares a single user data connection between account
//! and order updates, and hands every inbound payload to a typed handler.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Stream identity and wire event types
//!   - `stream`: Stream ids, kinds, kline intervals, address composition
//!   - `events`: Typed Binance payloads and the JSON codec
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: `Transport` and `ConnectionFactory` interfaces
//!   - `services`: `StreamClient`, stream registry, user stream router
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `websocket`: `tokio-tungstenite` transport and factory
//!   - `config`: Environment configuration
//!   - `metrics`: Prometheus instrumentation
//!   - `telemetry`: Tracing subscriber and OpenTelemetry export
//!
//! # Data Flow
//!
//! ```text
//! btcusdt@kline_1m ──► Transport ──► decode KlineEvent ──► kline handler
//! btcusdt@depth    ──► Transport ──► decode DepthEvent ──► depth handler
//! btcusdt@aggTrade ──► Transport ──► decode TradeEvent ──► trade handler
//!
//!                                  ┌─► AccountInfoEvent ──► account handler
//! <listen key>     ──► Transport ──┤
//!                                  └─► OrderUpdateEvent ──► order handler
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Stream identity and event types.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::events::{
    AccountInfoEvent, Balance, CodecError, DepthEvent, JsonCodec, Kline, KlineEvent, OrderSide,
    OrderUpdateEvent, PriceLevel, TradeEvent,
};
pub use domain::stream::{KlineInterval, StreamAddress, StreamId, StreamKind};

// Ports
pub use application::ports::{ConnectionFactory, ProtocolOptions, Transport, TransportError};

// Services
pub use application::services::{StreamClient, StreamClientConfig, StreamClientError, StreamInfo};

// Infrastructure config
pub use infrastructure::config::{ClientConfig, ConfigError, Environment, ListenKey};

// WebSocket adapter
pub use infrastructure::websocket::{WebSocketConnectionFactory, WebSocketTransport};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
