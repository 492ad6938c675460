//! Shared test doubles: an in-memory transport and a recording factory.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use binance_stream_client::application::ports::{
    ConnectionFactory, ErrorCallback, EventCallback, MessageCallback, ProtocolOptions, Transport,
    TransportError,
};
use binance_stream_client::{StreamClient, StreamClientConfig};

pub const BASE: &str = "wss://stream.binance.com:9443/ws/";

pub const LISTEN_KEY: &str = "pqia91ma19a5s61cv6a81va65sdf19v8a65a1";

pub const KLINE: &str = r#"{"e":"kline","E":1672515782136,"s":"BTCUSDT","k":{"t":1672515780000,"T":1672515839999,"s":"BTCUSDT","i":"1m","f":100,"L":200,"o":"16500.10","c":"16510.00","h":"16520.00","l":"16495.50","v":"1000","n":100,"x":false,"q":"1.0000","V":"500","Q":"0.500","B":"123456"}}"#;

pub const DEPTH: &str = r#"{"e":"depthUpdate","E":1672515782136,"s":"BNBBTC","U":157,"u":160,"b":[["0.0024","10"]],"a":[["0.0026","100"]]}"#;

pub const TRADE: &str = r#"{"e":"aggTrade","E":1672515782136,"s":"BNBBTC","a":12345,"p":"0.001","q":"100","f":100,"l":105,"T":1672515782136,"m":true,"M":true}"#;

pub const ACCOUNT: &str = r#"{"e":"outboundAccountInfo","E":1499405658849,"m":0,"t":0,"b":0,"s":0,"T":true,"W":true,"D":true,"u":1499405658848,"B":[{"a":"LTC","f":"17366.18538083","l":"0.00000000"}]}"#;

pub const ORDER: &str = r#"{"e":"executionReport","E":1499405658658,"s":"ETHBTC","c":"mUvoqJxFIILMdfAW5iGSOW","S":"BUY","o":"LIMIT","f":"GTC","q":"1.00000000","p":"0.10264410","x":"NEW","X":"NEW","r":"NONE","i":4293153,"l":"0.00000000","z":"0.00000000","L":"0.00000000","n":"0","N":null,"T":1499405658657,"t":-1,"w":true,"m":false}"#;

// =============================================================================
// Mock Transport
// =============================================================================

#[derive(Default)]
struct Callbacks {
    on_open: Option<EventCallback>,
    on_error: Option<ErrorCallback>,
    on_close: Option<EventCallback>,
    on_message: Option<MessageCallback>,
}

/// How a `MockTransport` behaves on `connect`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectBehavior {
    /// Connect succeeds.
    #[default]
    Succeed,
    /// Connect fails.
    Fail,
    /// Connect succeeds but the connection drops before it returns.
    CloseDuringConnect,
}

/// In-memory transport. Messages are injected with `deliver`.
pub struct MockTransport {
    url: String,
    behavior: ConnectBehavior,
    deferred_close: bool,
    callbacks: Mutex<Callbacks>,
    options: Mutex<ProtocolOptions>,
    closed: AtomicBool,
    close_calls: AtomicUsize,
    sent: Mutex<Vec<Vec<u8>>>,
}

impl MockTransport {
    pub fn new(url: &str, behavior: ConnectBehavior, deferred_close: bool) -> Self {
        Self {
            url: url.to_string(),
            behavior,
            deferred_close,
            callbacks: Mutex::new(Callbacks::default()),
            options: Mutex::new(ProtocolOptions::default()),
            closed: AtomicBool::new(false),
            close_calls: AtomicUsize::new(0),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Deliver an inbound payload. Ignored once closed, like a real transport.
    pub fn deliver(&self, raw: &str) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        self.force_deliver(raw);
    }

    /// Deliver an inbound payload even after close.
    pub fn force_deliver(&self, raw: &str) {
        let callback = self.callbacks.lock().on_message.clone();
        if let Some(callback) = callback {
            callback(raw);
        }
    }

    /// Fire the close notification unconditionally, as a misbehaving
    /// transport might.
    pub fn fire_close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let callback = self.callbacks.lock().on_close.clone();
        if let Some(callback) = callback {
            callback();
        }
    }

    /// Fire the error notification.
    pub fn fire_error(&self, error: &TransportError) {
        let callback = self.callbacks.lock().on_error.clone();
        if let Some(callback) = callback {
            callback(error);
        }
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    pub fn options(&self) -> ProtocolOptions {
        *self.options.lock()
    }

    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn url(&self) -> &str {
        &self.url
    }

    fn set_protocol_options(&self, options: ProtocolOptions) {
        *self.options.lock() = options;
    }

    fn on_open(&self, callback: EventCallback) {
        self.callbacks.lock().on_open = Some(callback);
    }

    fn on_error(&self, callback: ErrorCallback) {
        self.callbacks.lock().on_error = Some(callback);
    }

    fn on_close(&self, callback: EventCallback) {
        self.callbacks.lock().on_close = Some(callback);
    }

    fn on_message(&self, callback: MessageCallback) {
        self.callbacks.lock().on_message = Some(callback);
    }

    async fn connect(&self) -> Result<(), TransportError> {
        match self.behavior {
            ConnectBehavior::Fail => {
                self.closed.store(true, Ordering::SeqCst);
                Err(TransportError::Connect("connection refused".to_string()))
            }
            ConnectBehavior::Succeed => {
                let callback = self.callbacks.lock().on_open.clone();
                if let Some(callback) = callback {
                    callback();
                }
                Ok(())
            }
            ConnectBehavior::CloseDuringConnect => {
                self.fire_close();
                Ok(())
            }
        }
    }

    fn send(&self, payload: &[u8]) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        self.sent.lock().push(payload.to_vec());
        Ok(())
    }

    fn close(&self) {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        // A deferred close reports closed later, through `fire_close`
        if !self.closed.swap(true, Ordering::SeqCst) && !self.deferred_close {
            let callback = self.callbacks.lock().on_close.clone();
            if let Some(callback) = callback {
                callback();
            }
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

// =============================================================================
// Mock Factory
// =============================================================================

/// Factory that records every transport it creates.
#[derive(Default)]
pub struct MockFactory {
    behavior: Mutex<ConnectBehavior>,
    deferred_close: AtomicBool,
    transports: Mutex<Vec<Arc<MockTransport>>>,
}

impl MockFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Behavior of transports created from now on.
    pub fn set_behavior(&self, behavior: ConnectBehavior) {
        *self.behavior.lock() = behavior;
    }

    /// Make transports created from now on report close asynchronously,
    /// like a real connection draining its socket.
    pub fn set_deferred_close(&self, deferred: bool) {
        self.deferred_close.store(deferred, Ordering::SeqCst);
    }

    pub fn transports(&self) -> Vec<Arc<MockTransport>> {
        self.transports.lock().clone()
    }

    pub fn created(&self) -> usize {
        self.transports.lock().len()
    }

    pub fn last(&self) -> Arc<MockTransport> {
        self.transports.lock().last().cloned().expect("no transport created")
    }

    pub fn by_url(&self, url: &str) -> Vec<Arc<MockTransport>> {
        self.transports
            .lock()
            .iter()
            .filter(|t| t.url() == url)
            .cloned()
            .collect()
    }
}

impl ConnectionFactory for MockFactory {
    fn create(&self, address: &str) -> Result<Arc<dyn Transport>, TransportError> {
        let transport = Arc::new(MockTransport::new(
            address,
            *self.behavior.lock(),
            self.deferred_close.load(Ordering::SeqCst),
        ));
        self.transports.lock().push(Arc::clone(&transport));
        Ok(transport)
    }
}

/// Client over a fresh recording factory.
pub fn client() -> (StreamClient, Arc<MockFactory>) {
    let factory = MockFactory::new();
    let client = StreamClient::new(StreamClientConfig::new(BASE), factory.clone());
    (client, factory)
}

/// Shared counter plus a handler-friendly clone of it.
pub fn counter() -> (Arc<AtomicUsize>, Arc<AtomicUsize>) {
    let count = Arc::new(AtomicUsize::new(0));
    (Arc::clone(&count), count)
}

pub fn count(counter: &AtomicUsize) -> usize {
    counter.load(Ordering::SeqCst)
}
