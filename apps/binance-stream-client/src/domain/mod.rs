//! Domain Layer - Stream identity and event types.
//!
//! This layer contains the stream vocabulary (ids, kinds, intervals,
//! addresses) and the typed event payloads, with no dependency on the
//! transport or the runtime.

/// Stream identifiers, kinds and address composition.
pub mod stream;

/// Typed stream events and their JSON codec.
pub mod events;
