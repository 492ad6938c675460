//! Application Services
//!
//! Services that orchestrate domain logic and coordinate between ports.
//!
//! - `StreamClient`: Subscribe/unsubscribe operations over per-stream connections
//! - `StreamRegistry`: Open connections keyed by stream id
//! - `UserStreamRouter`: Demultiplexes the shared user data stream

mod registry;
mod router;
mod stream_client;

pub use registry::{IdAllocator, StreamHandle, StreamRegistry};
pub use router::{AccountHandler, OrderHandler, UserStreamHandlers, UserStreamRouter};
pub use stream_client::{StreamClient, StreamClientConfig, StreamClientError, StreamInfo};
