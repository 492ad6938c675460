//! Stream Client Service
//!
//! Opens one WebSocket connection per market subscription, tracks every
//! connection in the `StreamRegistry`, and shares a single user data stream
//! between the account and order update subscriptions.
//!
//! # Lifecycle
//!
//! ```text
//! subscribe_*  ──► open ──► factory.create ──► register callbacks ──► connect
//!                                                                       │
//!                                          registry.add ◄───────────────┘
//!
//! unsubscribe ──► connection.close ──► on_close ──► registry.remove_by_connection
//! ```
//!
//! Registry entries only ever leave through the close notification, so a
//! transport failure and a caller-initiated close follow the same path.

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;

use super::registry::{IdAllocator, StreamHandle, StreamRegistry};
use super::router::{AccountHandler, OrderHandler, UserStreamHandlers, UserStreamRouter};
use crate::application::ports::{
    ConnectionFactory, MessageCallback, ProtocolOptions, TransportError,
};
use crate::domain::events::{
    AccountInfoEvent, CodecError, DepthEvent, JsonCodec, KlineEvent, OrderUpdateEvent, TradeEvent,
};
use crate::domain::stream::{KlineInterval, StreamAddress, StreamId, StreamKind};
use crate::infrastructure::metrics;

// =============================================================================
// Errors
// =============================================================================

/// Stream client errors.
#[derive(Debug, thiserror::Error)]
pub enum StreamClientError {
    /// The connection could not be created or opened.
    #[error("failed to connect to {address}: {source}")]
    ConnectionFailed {
        /// Address that was dialled.
        address: String,
        /// Underlying transport failure.
        #[source]
        source: TransportError,
    },

    /// A user data subscription was requested without a listen key.
    #[error("listen key is required for user data streams")]
    MissingListenKey,

    /// An inbound payload did not decode. Logged and dropped, never returned
    /// from a subscribe call.
    #[error("failed to decode stream payload: {0}")]
    DecodeFailed(#[from] CodecError),
}

// =============================================================================
// Configuration
// =============================================================================

/// Stream client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamClientConfig {
    /// Base WebSocket address, ending in `/`.
    pub base_address: String,
    /// Wire-level options applied to every connection.
    pub protocol_options: ProtocolOptions,
}

impl StreamClientConfig {
    /// Create a configuration for a base address with default protocol options.
    #[must_use]
    pub fn new(base_address: impl Into<String>) -> Self {
        Self {
            base_address: base_address.into(),
            protocol_options: ProtocolOptions::default(),
        }
    }

    /// Override protocol options.
    #[must_use]
    pub const fn with_protocol_options(mut self, options: ProtocolOptions) -> Self {
        self.protocol_options = options;
        self
    }
}

/// Diagnostic view of an open stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamInfo {
    /// Stream id.
    pub stream_id: StreamId,
    /// Connected address.
    pub url: String,
    /// Stream kind.
    pub kind: StreamKind,
    /// Whether this is the shared user data stream.
    pub is_user_stream: bool,
}

impl From<&StreamHandle> for StreamInfo {
    fn from(handle: &StreamHandle) -> Self {
        Self {
            stream_id: handle.stream_id,
            url: handle.connection.url().to_string(),
            kind: handle.kind,
            is_user_stream: handle.is_user_stream,
        }
    }
}

// =============================================================================
// Stream Client
// =============================================================================

/// Subscription manager for Binance market and user data streams.
///
/// `StreamClient` is `Send + Sync`; subscribe and unsubscribe may be called
/// concurrently from any task. Dropping the client requests close on every
/// open connection.
pub struct StreamClient {
    config: StreamClientConfig,
    factory: Arc<dyn ConnectionFactory>,
    registry: Arc<StreamRegistry>,
    ids: IdAllocator,
    codec: JsonCodec,
    user_handlers: Arc<UserStreamHandlers>,
    user_stream_gate: tokio::sync::Mutex<()>,
}

impl StreamClient {
    /// Create a client that opens connections through `factory`.
    #[must_use]
    pub fn new(config: StreamClientConfig, factory: Arc<dyn ConnectionFactory>) -> Self {
        Self {
            config,
            factory,
            registry: Arc::new(StreamRegistry::new()),
            ids: IdAllocator::new(),
            codec: JsonCodec::new(),
            user_handlers: Arc::new(UserStreamHandlers::new()),
            user_stream_gate: tokio::sync::Mutex::new(()),
        }
    }

    /// Client configuration.
    #[must_use]
    pub const fn config(&self) -> &StreamClientConfig {
        &self.config
    }

    // -------------------------------------------------------------------------
    // Market Streams
    // -------------------------------------------------------------------------

    /// Subscribe to candlestick updates for `symbol` at `interval`.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionFailed` if the connection cannot be opened.
    pub async fn subscribe_kline<F>(
        &self,
        symbol: &str,
        interval: KlineInterval,
        handler: F,
    ) -> Result<StreamId, StreamClientError>
    where
        F: Fn(KlineEvent) + Send + Sync + 'static,
    {
        self.subscribe_market(symbol, StreamKind::Kline(interval), handler)
            .await
    }

    /// Subscribe to diff depth updates for `symbol`.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionFailed` if the connection cannot be opened.
    pub async fn subscribe_depth<F>(
        &self,
        symbol: &str,
        handler: F,
    ) -> Result<StreamId, StreamClientError>
    where
        F: Fn(DepthEvent) + Send + Sync + 'static,
    {
        self.subscribe_market(symbol, StreamKind::Depth, handler)
            .await
    }

    /// Subscribe to aggregated trades for `symbol`.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionFailed` if the connection cannot be opened.
    pub async fn subscribe_trades<F>(
        &self,
        symbol: &str,
        handler: F,
    ) -> Result<StreamId, StreamClientError>
    where
        F: Fn(TradeEvent) + Send + Sync + 'static,
    {
        self.subscribe_market(symbol, StreamKind::Trades, handler)
            .await
    }

    async fn subscribe_market<T, F>(
        &self,
        symbol: &str,
        kind: StreamKind,
        handler: F,
    ) -> Result<StreamId, StreamClientError>
    where
        T: DeserializeOwned + 'static,
        F: Fn(T) + Send + Sync + 'static,
    {
        let address = StreamAddress::market(&self.config.base_address, symbol, kind);
        let codec = self.codec;
        let label = kind.label();

        let on_message: MessageCallback = Arc::new(move |raw: &str| {
            metrics::record_message_received(label);
            match codec.decode::<T>(raw).map_err(StreamClientError::from) {
                Ok(event) => handler(event),
                Err(e) => {
                    tracing::error!(kind = label, error = %e, "Dropping undecodable message");
                    metrics::record_decode_failure(label);
                }
            }
        });

        let handle = self.open(address, kind, on_message).await?;
        Ok(handle.stream_id)
    }

    // -------------------------------------------------------------------------
    // User Data Stream
    // -------------------------------------------------------------------------

    /// Subscribe to account updates on the user data stream for `listen_key`.
    ///
    /// Shares the connection with order updates. If a user data stream is
    /// already open, it is reused and `listen_key` is ignored.
    ///
    /// # Errors
    ///
    /// Returns `MissingListenKey` for an empty key, or `ConnectionFailed` if the
    /// shared connection cannot be opened.
    pub async fn subscribe_account_updates<F>(
        &self,
        listen_key: &str,
        handler: F,
    ) -> Result<(), StreamClientError>
    where
        F: Fn(AccountInfoEvent) + Send + Sync + 'static,
    {
        let listen_key = require_listen_key(listen_key)?;
        let handler: AccountHandler = Arc::new(handler);
        self.user_handlers.set_account(Arc::clone(&handler));

        if let Err(e) = self.ensure_user_stream(listen_key).await {
            // A concurrent subscribe may have replaced the handler meanwhile
            self.user_handlers.revoke_account(&handler);
            return Err(e);
        }
        Ok(())
    }

    /// Subscribe to order updates on the user data stream for `listen_key`.
    ///
    /// Shares the connection with account updates. If a user data stream is
    /// already open, it is reused and `listen_key` is ignored.
    ///
    /// # Errors
    ///
    /// Returns `MissingListenKey` for an empty key, or `ConnectionFailed` if the
    /// shared connection cannot be opened.
    pub async fn subscribe_order_updates<F>(
        &self,
        listen_key: &str,
        handler: F,
    ) -> Result<(), StreamClientError>
    where
        F: Fn(OrderUpdateEvent) + Send + Sync + 'static,
    {
        let listen_key = require_listen_key(listen_key)?;
        let handler: OrderHandler = Arc::new(handler);
        self.user_handlers.set_order(Arc::clone(&handler));

        if let Err(e) = self.ensure_user_stream(listen_key).await {
            // A concurrent subscribe may have replaced the handler meanwhile
            self.user_handlers.revoke_order(&handler);
            return Err(e);
        }
        Ok(())
    }

    /// Stop account updates. Closes the shared connection if order updates
    /// are not subscribed either.
    pub fn unsubscribe_account_updates(&self) {
        if self.user_handlers.clear_account() {
            self.close_user_stream();
        }
    }

    /// Stop order updates. Closes the shared connection if account updates
    /// are not subscribed either.
    pub fn unsubscribe_order_updates(&self) {
        if self.user_handlers.clear_order() {
            self.close_user_stream();
        }
    }

    async fn ensure_user_stream(&self, listen_key: &str) -> Result<(), StreamClientError> {
        let _gate = self.user_stream_gate.lock().await;

        if let Some(existing) = self.registry.find_user_stream() {
            tracing::debug!(
                stream_id = existing.stream_id,
                "User data stream already open, listen key ignored"
            );
            return Ok(());
        }

        let router = UserStreamRouter::new(Arc::clone(&self.user_handlers));
        let on_message: MessageCallback = Arc::new(move |raw: &str| {
            metrics::record_message_received(StreamKind::UserData.label());
            router.route(raw);
        });

        let address = StreamAddress::user_data(&self.config.base_address, listen_key);
        let handle = self.open(address, StreamKind::UserData, on_message).await?;
        tracing::info!(stream_id = handle.stream_id, "User data stream opened");

        // Both slots were cleared while the connection was opening
        if !self.user_handlers.any() {
            handle.connection.close();
        }
        Ok(())
    }

    fn close_user_stream(&self) {
        if let Some(handle) = self.registry.find_user_stream() {
            tracing::debug!(stream_id = handle.stream_id, "Closing user data stream");
            handle.connection.close();
        }
    }

    // -------------------------------------------------------------------------
    // Teardown
    // -------------------------------------------------------------------------

    /// Close the stream with `stream_id`. Unknown ids are ignored.
    pub fn unsubscribe(&self, stream_id: StreamId) {
        match self.registry.find_by_id(stream_id) {
            Some(handle) => {
                tracing::debug!(stream_id, kind = %handle.kind, "Unsubscribing stream");
                handle.connection.close();
            }
            None => tracing::trace!(stream_id, "Unsubscribe for unknown stream ignored"),
        }
    }

    /// Close every stream and clear both user stream handlers.
    pub fn unsubscribe_all(&self) {
        self.registry.close_all();
        self.user_handlers.clear_all();
    }

    /// Close every stream. Safe to call repeatedly.
    pub fn shutdown(&self) {
        tracing::info!(streams = self.registry.len(), "Shutting down stream client");
        self.registry.close_all();
    }

    // -------------------------------------------------------------------------
    // Diagnostics
    // -------------------------------------------------------------------------

    /// Snapshot of all registered streams ordered by id.
    #[must_use]
    pub fn active_streams(&self) -> Vec<StreamInfo> {
        self.registry
            .snapshot()
            .iter()
            .map(StreamInfo::from)
            .collect()
    }

    /// Check whether a live user data stream is registered.
    #[must_use]
    pub fn has_user_stream(&self) -> bool {
        self.registry.find_user_stream().is_some()
    }

    // -------------------------------------------------------------------------
    // Connection Open
    // -------------------------------------------------------------------------

    async fn open(
        &self,
        address: StreamAddress,
        kind: StreamKind,
        on_message: MessageCallback,
    ) -> Result<StreamHandle, StreamClientError> {
        let stream_id = self.ids.next_id();

        let connection = self
            .factory
            .create(address.as_str())
            .map_err(|source| connection_failed(&address, kind, source))?;
        connection.set_protocol_options(self.config.protocol_options);

        connection.on_open(Arc::new(move || {
            tracing::debug!(stream_id, kind = %kind, "Stream connection open");
        }));

        connection.on_error(Arc::new(move |e: &TransportError| {
            tracing::error!(stream_id, kind = %kind, error = %e, "Stream transport error");
        }));

        let registry = Arc::downgrade(&self.registry);
        let weak_connection = Arc::downgrade(&connection);
        connection.on_close(Arc::new(move || {
            tracing::debug!(stream_id, kind = %kind, "Stream connection closed");
            if let (Some(registry), Some(connection)) =
                (registry.upgrade(), weak_connection.upgrade())
            {
                registry.remove_by_connection(&connection);
            }
        }));

        connection.on_message(on_message);

        connection
            .connect()
            .await
            .map_err(|source| connection_failed(&address, kind, source))?;

        let handle = StreamHandle::new(stream_id, Arc::clone(&connection), kind);
        self.registry.add(handle.clone());

        // Close reported before the entry existed
        if connection.is_closed() {
            self.registry.remove_by_connection(&connection);
        }

        Ok(handle)
    }
}

impl Drop for StreamClient {
    fn drop(&mut self) {
        self.registry.close_all();
    }
}

impl fmt::Debug for StreamClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamClient")
            .field("base_address", &self.config.base_address)
            .field("streams", &self.registry.len())
            .finish_non_exhaustive()
    }
}

fn require_listen_key(listen_key: &str) -> Result<&str, StreamClientError> {
    let trimmed = listen_key.trim();
    if trimmed.is_empty() {
        return Err(StreamClientError::MissingListenKey);
    }
    Ok(trimmed)
}

fn connection_failed(
    address: &StreamAddress,
    kind: StreamKind,
    source: TransportError,
) -> StreamClientError {
    tracing::error!(kind = %kind, error = %source, "Failed to open stream");
    metrics::record_connection_failure(kind.label());
    StreamClientError::ConnectionFailed {
        address: address.to_string(),
        source,
    }
}

// =============================================================================
// Tests
// =============================================================================
