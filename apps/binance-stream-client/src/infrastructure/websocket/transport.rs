//! WebSocket Transport
//!
//! `Transport` implementation over `tokio-tungstenite`. Each connected
//! transport owns one background task that reads frames, answers pings,
//! forwards queued outbound frames and stops when the cancellation token
//! fires or the server goes away.
//!
//! # Close Semantics
//!
//! - `close()` is safe in every state: never connected, connecting, open,
//!   already closed.
//! - The close callback fires exactly once, after `is_closed()` turned true.
//! - No message callback runs after `close()` was requested.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use crate::application::ports::{
    ErrorCallback, EventCallback, MessageCallback, ProtocolOptions, Transport, TransportError,
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// =============================================================================
// Shared State
// =============================================================================

#[derive(Default)]
struct Callbacks {
    on_open: Option<EventCallback>,
    on_error: Option<ErrorCallback>,
    on_close: Option<EventCallback>,
    on_message: Option<MessageCallback>,
}

/// State shared between the transport handle and its connection task.
struct Shared {
    url: String,
    callbacks: RwLock<Callbacks>,
    cancel: CancellationToken,
    started: AtomicBool,
    close_requested: AtomicBool,
    close_notified: AtomicBool,
}

impl Shared {
    fn is_closing(&self) -> bool {
        self.close_requested.load(Ordering::SeqCst) || self.close_notified.load(Ordering::SeqCst)
    }

    fn notify_open(&self) {
        let callback = self.callbacks.read().on_open.clone();
        if let Some(callback) = callback {
            callback();
        }
    }

    fn notify_error(&self, error: &TransportError) {
        let callback = self.callbacks.read().on_error.clone();
        if let Some(callback) = callback {
            callback(error);
        }
    }

    fn notify_message(&self, raw: &str) {
        if self.close_requested.load(Ordering::SeqCst) {
            return;
        }
        let callback = self.callbacks.read().on_message.clone();
        if let Some(callback) = callback {
            callback(raw);
        }
    }

    fn notify_closed(&self) {
        if self.close_notified.swap(true, Ordering::SeqCst) {
            return;
        }
        let callback = self.callbacks.read().on_close.clone();
        if let Some(callback) = callback {
            callback();
        }
    }
}

// =============================================================================
// Transport
// =============================================================================

/// A single WebSocket connection.
pub struct WebSocketTransport {
    shared: Arc<Shared>,
    options: RwLock<ProtocolOptions>,
    outbound: Mutex<Option<mpsc::UnboundedSender<Message>>>,
}

impl WebSocketTransport {
    /// Create an unconnected transport for `url`.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            shared: Arc::new(Shared {
                url: url.into(),
                callbacks: RwLock::new(Callbacks::default()),
                cancel: CancellationToken::new(),
                started: AtomicBool::new(false),
                close_requested: AtomicBool::new(false),
                close_notified: AtomicBool::new(false),
            }),
            options: RwLock::new(ProtocolOptions::default()),
            outbound: Mutex::new(None),
        }
    }

    fn websocket_config(&self) -> WebSocketConfig {
        let options = *self.options.read();
        let mut config = WebSocketConfig::default();
        if let Some(size) = options.max_message_size {
            config = config.max_message_size(Some(size));
        }
        if let Some(size) = options.max_frame_size {
            config = config.max_frame_size(Some(size));
        }
        config
    }

    async fn handshake(&self) -> Result<WsStream, TransportError> {
        let config = self.websocket_config();
        let connecting = tokio_tungstenite::connect_async_with_config(
            self.shared.url.as_str(),
            Some(config),
            false,
        );

        tokio::select! {
            () = self.shared.cancel.cancelled() => Err(TransportError::Closed),
            result = connecting => result.map(|(ws, _response)| ws).map_err(TransportError::from),
        }
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    fn url(&self) -> &str {
        &self.shared.url
    }

    fn set_protocol_options(&self, options: ProtocolOptions) {
        *self.options.write() = options;
    }

    fn on_open(&self, callback: EventCallback) {
        self.shared.callbacks.write().on_open = Some(callback);
    }

    fn on_error(&self, callback: ErrorCallback) {
        self.shared.callbacks.write().on_error = Some(callback);
    }

    fn on_close(&self, callback: EventCallback) {
        self.shared.callbacks.write().on_close = Some(callback);
    }

    fn on_message(&self, callback: MessageCallback) {
        self.shared.callbacks.write().on_message = Some(callback);
    }

    async fn connect(&self) -> Result<(), TransportError> {
        if self.shared.started.swap(true, Ordering::SeqCst) {
            return Err(TransportError::Connect("connect already called".to_string()));
        }
        if self.shared.is_closing() {
            self.shared.notify_closed();
            return Err(TransportError::Closed);
        }

        let ws = match self.handshake().await {
            Ok(ws) => ws,
            Err(e) => {
                if !matches!(e, TransportError::Closed) {
                    self.shared.notify_error(&e);
                }
                self.shared.notify_closed();
                return Err(e);
            }
        };

        let (tx, rx) = mpsc::unbounded_channel();
        *self.outbound.lock() = Some(tx);

        self.shared.notify_open();
        tokio::spawn(run_connection(Arc::clone(&self.shared), ws, rx));

        Ok(())
    }

    fn send(&self, payload: &[u8]) -> Result<(), TransportError> {
        if self.shared.is_closing() {
            return Err(TransportError::Closed);
        }
        match self.outbound.lock().as_ref() {
            Some(tx) => tx
                .send(Message::binary(payload.to_vec()))
                .map_err(|_| TransportError::Closed),
            None => Err(TransportError::NotConnected),
        }
    }

    fn close(&self) {
        if self.shared.close_requested.swap(true, Ordering::SeqCst) {
            return;
        }
        self.shared.cancel.cancel();

        // Nobody else will report the close
        if !self.shared.started.load(Ordering::SeqCst) {
            self.shared.notify_closed();
        }
    }

    fn is_closed(&self) -> bool {
        self.shared.is_closing()
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        self.shared.cancel.cancel();
    }
}

impl std::fmt::Debug for WebSocketTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketTransport")
            .field("url", &self.shared.url)
            .field("closed", &self.shared.is_closing())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Connection Task
// =============================================================================

async fn run_connection(
    shared: Arc<Shared>,
    ws: WsStream,
    mut outbound: mpsc::UnboundedReceiver<Message>,
) {
    let (mut write, mut read) = ws.split();

    loop {
        tokio::select! {
            () = shared.cancel.cancelled() => {
                if let Err(e) = write.send(Message::Close(None)).await {
                    tracing::debug!(error = %e, "Close frame not delivered");
                }
                break;
            }
            Some(message) = outbound.recv() => {
                if let Err(e) = write.send(message).await {
                    shared.notify_error(&TransportError::from(e));
                    break;
                }
            }
            frame = read.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        shared.notify_message(text.as_str());
                    }
                    Some(Ok(Message::Binary(data))) => match std::str::from_utf8(&data) {
                        Ok(text) => shared.notify_message(text),
                        Err(e) => tracing::debug!(error = %e, "Ignoring non-UTF-8 binary frame"),
                    },
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = write.send(Message::Pong(data)).await {
                            shared.notify_error(&TransportError::from(e));
                            break;
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        tracing::debug!(url = %shared.url, ?frame, "Server sent close frame");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        if !shared.close_requested.load(Ordering::SeqCst) {
                            shared.notify_error(&TransportError::from(e));
                        }
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    shared.notify_closed();
}

// =============================================================================
// Tests
// =============================================================================
