//! WebSocket Connection Factory
//!
//! Validates composed addresses and produces unconnected `WebSocketTransport`s.

use std::sync::Arc;

use tokio_tungstenite::tungstenite::client::IntoClientRequest;

use super::transport::WebSocketTransport;
use crate::application::ports::{ConnectionFactory, Transport, TransportError};

/// Creates one `WebSocketTransport` per address.
#[derive(Debug, Default, Clone, Copy)]
pub struct WebSocketConnectionFactory;

impl WebSocketConnectionFactory {
    /// Create a new factory.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl ConnectionFactory for WebSocketConnectionFactory {
    fn create(&self, address: &str) -> Result<Arc<dyn Transport>, TransportError> {
        validate_address(address)?;
        Ok(Arc::new(WebSocketTransport::new(address)))
    }
}

fn validate_address(address: &str) -> Result<(), TransportError> {
    let invalid = |reason: String| TransportError::InvalidAddress {
        address: address.to_string(),
        reason,
    };

    if !(address.starts_with("ws://") || address.starts_with("wss://")) {
        return Err(invalid("scheme must be ws or wss".to_string()));
    }

    address
        .into_client_request()
        .map(|_| ())
        .map_err(|e| invalid(e.to_string()))
}
