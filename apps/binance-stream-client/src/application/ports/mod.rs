//! Port Interfaces
//!
//! Defines the interfaces (ports) for external systems following
//! the Hexagonal Architecture pattern. These are the contracts that
//! infrastructure adapters must implement.
//!
//! ## Driven Ports (Outbound)
//!
//! - `Transport`: A single persistent connection to the stream source
//! - `ConnectionFactory`: Creates a `Transport` for a composed address

mod transport_port;

pub use transport_port::{
    ConnectionFactory, ErrorCallback, EventCallback, MessageCallback, ProtocolOptions, Transport,
    TransportError,
};
