//! WebSocket Adapter
//!
//! `tokio-tungstenite` implementations of the `Transport` and
//! `ConnectionFactory` ports.

mod factory;
mod transport;

pub use factory::WebSocketConnectionFactory;
pub use transport::WebSocketTransport;
