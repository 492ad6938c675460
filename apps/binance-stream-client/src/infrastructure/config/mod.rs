//! Configuration Module
//!
//! Configuration loading for the stream client binary.

mod settings;

pub use settings::{
    ClientConfig, ConfigError, Environment, LIVE_STREAM_BASE_URL, ListenKey,
    TESTNET_STREAM_BASE_URL,
};
