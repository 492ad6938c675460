//! Transport Port (Driven Port)
//!
//! Interface for a single persistent connection to the stream source and the
//! factory that produces one per address.
//!
//! Events are delivered through registered callbacks. Callbacks run on the
//! transport's own task and must not block.

use std::sync::Arc;

use async_trait::async_trait;

/// Callback invoked with the raw text of each inbound message.
pub type MessageCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Callback invoked on open and close notifications.
pub type EventCallback = Arc<dyn Fn() + Send + Sync>;

/// Callback invoked when the transport reports an error.
pub type ErrorCallback = Arc<dyn Fn(&TransportError) + Send + Sync>;

/// Transport errors.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Address could not be turned into a connection request.
    #[error("invalid address {address}: {reason}")]
    InvalidAddress {
        /// Offending address.
        address: String,
        /// Why it was rejected.
        reason: String,
    },

    /// WebSocket protocol or I/O error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Connection attempt failed.
    #[error("connection failed: {0}")]
    Connect(String),

    /// Operation on a connection that has been closed.
    #[error("connection closed")]
    Closed,

    /// Operation requires an established connection.
    #[error("not connected")]
    NotConnected,
}

/// Wire-level options applied before connecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProtocolOptions {
    /// Maximum size of an incoming message in bytes (`None` = transport default).
    pub max_message_size: Option<usize>,
    /// Maximum size of a single incoming frame in bytes (`None` = transport default).
    pub max_frame_size: Option<usize>,
}

/// A single persistent connection.
///
/// Implementations must make `close` safe in every state (never connected,
/// open, already closed), fire the close callback at most once, and stop
/// delivering messages once `close` has been requested.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Address this transport connects to.
    fn url(&self) -> &str;

    /// Set wire-level options. Takes effect on the next `connect`.
    fn set_protocol_options(&self, options: ProtocolOptions);

    /// Register the open callback.
    fn on_open(&self, callback: EventCallback);

    /// Register the error callback. Errors alone do not close the connection.
    fn on_error(&self, callback: ErrorCallback);

    /// Register the close callback.
    fn on_close(&self, callback: EventCallback);

    /// Register the inbound message callback.
    fn on_message(&self, callback: MessageCallback);

    /// Open the connection. Returns once the handshake completed.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    async fn connect(&self) -> Result<(), TransportError>;

    /// Queue a binary payload for sending.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection is not open.
    fn send(&self, payload: &[u8]) -> Result<(), TransportError>;

    /// Request the connection to close.
    fn close(&self);

    /// Check whether the connection is closed or closing.
    ///
    /// Becomes `true` as soon as `close` is requested and before the close
    /// callback fires.
    fn is_closed(&self) -> bool;
}

/// Produces transports for composed addresses.
pub trait ConnectionFactory: Send + Sync {
    /// Create an unconnected transport for `address`.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is malformed.
    fn create(&self, address: &str) -> Result<Arc<dyn Transport>, TransportError>;
}
