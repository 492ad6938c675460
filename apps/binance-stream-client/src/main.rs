//! Binance Stream Client Binary
//!
//! Subscribes to market streams for the configured symbols (and the user
//! data stream when a listen key is set) and logs every decoded event.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin binance-stream-client
//! ```
//!
//! # Environment Variables
//!
//! - `BINANCE_ENV`: LIVE | TESTNET (default: LIVE)
//! - `BINANCE_STREAM_BASE_URL`: Override the stream base address
//! - `BINANCE_LISTEN_KEY`: Listen key for the user data stream (optional)
//! - `STREAM_CLIENT_SYMBOLS`: Comma separated symbols (default: BTCUSDT)
//! - `STREAM_CLIENT_KLINE_INTERVAL`: Kline interval (default: 1m)
//! - `STREAM_CLIENT_MAX_MESSAGE_SIZE`: Max inbound message size in bytes
//! - `STREAM_CLIENT_MAX_FRAME_SIZE`: Max inbound frame size in bytes
//! - `STREAM_CLIENT_METRICS_PORT`: Prometheus metrics port (default: 0, disabled)
//! - `OTEL_ENABLED`: Enable OpenTelemetry (default: true)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (default: <http://localhost:4318>)
//! - `OTEL_SERVICE_NAME`: Service name (default: binance-stream-client)
//! - `RUST_LOG`: Log level (default: info)

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, anyhow};
use binance_stream_client::infrastructure::telemetry::{self, TelemetryConfig};
use binance_stream_client::{ClientConfig, StreamClient, WebSocketConnectionFactory, init_metrics};
use tokio::signal;

/// Upper bound on waiting for connections to report closed after shutdown.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("failed to install rustls crypto provider"))?;

    load_dotenv();

    let telemetry_guard = telemetry::init(&TelemetryConfig::from_env());

    tracing::info!(
        span_export = telemetry_guard.is_exporting(),
        "Starting Binance stream client"
    );

    let config = ClientConfig::from_env().context("invalid configuration")?;
    log_config(&config);

    if config.metrics_port != 0 {
        let addr = init_metrics(config.metrics_port).context("failed to start metrics exporter")?;
        tracing::info!(%addr, "Metrics exporter listening");
    }

    let client = StreamClient::new(
        config.stream_client_config(),
        Arc::new(WebSocketConnectionFactory::new()),
    );

    for symbol in &config.symbols {
        subscribe_symbol(&client, symbol, &config).await;
    }

    if let Some(listen_key) = &config.listen_key {
        subscribe_user_data(&client, listen_key.as_str()).await;
    }

    tracing::info!(streams = client.active_streams().len(), "Stream client ready");

    await_shutdown().await;

    client.shutdown();
    drain(&client).await;

    tracing::info!("Stream client stopped");
    Ok(())
}

/// Open kline, depth and trade streams for one symbol.
async fn subscribe_symbol(client: &StreamClient, symbol: &str, config: &ClientConfig) {
    match client
        .subscribe_kline(symbol, config.kline_interval, |event| {
            if event.kline.is_closed {
                tracing::info!(
                    symbol = %event.symbol,
                    interval = %event.kline.interval,
                    open = %event.kline.open,
                    close = %event.kline.close,
                    volume = %event.kline.volume,
                    "Kline closed"
                );
            } else {
                tracing::debug!(symbol = %event.symbol, close = %event.kline.close, "Kline update");
            }
        })
        .await
    {
        Ok(stream_id) => tracing::info!(stream_id, symbol, "Subscribed to klines"),
        Err(e) => tracing::error!(error = %e, symbol, "Kline subscription failed"),
    }

    match client
        .subscribe_depth(symbol, |event| {
            tracing::debug!(
                symbol = %event.symbol,
                final_update_id = event.final_update_id,
                bids = event.bids.len(),
                asks = event.asks.len(),
                "Depth update"
            );
        })
        .await
    {
        Ok(stream_id) => tracing::info!(stream_id, symbol, "Subscribed to depth"),
        Err(e) => tracing::error!(error = %e, symbol, "Depth subscription failed"),
    }

    match client
        .subscribe_trades(symbol, |event| {
            tracing::debug!(
                symbol = %event.symbol,
                price = %event.price,
                quantity = %event.quantity,
                "Trade"
            );
        })
        .await
    {
        Ok(stream_id) => tracing::info!(stream_id, symbol, "Subscribed to trades"),
        Err(e) => tracing::error!(error = %e, symbol, "Trade subscription failed"),
    }
}

/// Open the shared user data stream for account and order updates.
async fn subscribe_user_data(client: &StreamClient, listen_key: &str) {
    if let Err(e) = client
        .subscribe_account_updates(listen_key, |event| {
            tracing::info!(balances = event.balances.len(), "Account update");
        })
        .await
    {
        tracing::error!(error = %e, "Account update subscription failed");
    }

    if let Err(e) = client
        .subscribe_order_updates(listen_key, |event| {
            tracing::info!(
                symbol = %event.symbol,
                order_id = event.order_id,
                side = ?event.side,
                status = %event.order_status,
                "Order update"
            );
        })
        .await
    {
        tracing::error!(error = %e, "Order update subscription failed");
    }
}

/// Wait until every connection has reported closed, up to `SHUTDOWN_TIMEOUT`.
async fn drain(client: &StreamClient) {
    let drained = tokio::time::timeout(SHUTDOWN_TIMEOUT, async {
        while !client.active_streams().is_empty() {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await;

    if drained.is_err() {
        tracing::warn!(
            remaining = client.active_streams().len(),
            timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
            "Streams still open after shutdown timeout"
        );
    }
}

/// Log the parsed configuration.
fn log_config(config: &ClientConfig) {
    tracing::info!(
        environment = config.environment.as_str(),
        symbols = ?config.symbols,
        kline_interval = %config.kline_interval,
        user_stream = config.listen_key.is_some(),
        metrics_port = config.metrics_port,
        "Configuration loaded"
    );
    tracing::debug!(base_address = %config.base_address, "Stream endpoint");
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}
