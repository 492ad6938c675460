//! Application Layer - Use cases and port definitions.
//!
//! This layer contains the stream client service and the port interfaces
//! that define how it reaches the network.

/// Port interfaces for external systems (WebSocket transport).
pub mod ports;

/// Application services for stream subscription and routing.
pub mod services;
