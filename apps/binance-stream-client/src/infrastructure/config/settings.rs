//! Client Configuration Settings
//!
//! Configuration types for the stream client, loaded from environment variables.

use std::str::FromStr;

use crate::application::ports::ProtocolOptions;
use crate::application::services::StreamClientConfig;
use crate::domain::stream::KlineInterval;

/// Production spot stream base address.
pub const LIVE_STREAM_BASE_URL: &str = "wss://stream.binance.com:9443/ws/";

/// Spot testnet stream base address.
pub const TESTNET_STREAM_BASE_URL: &str = "wss://testnet.binance.vision/ws/";

const DEFAULT_SYMBOL: &str = "BTCUSDT";

/// Binance environment (testnet vs live).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    /// Live exchange.
    #[default]
    Live,
    /// Spot testnet.
    Testnet,
}

impl Environment {
    /// Parse environment from string.
    #[must_use]
    pub fn from_str_case_insensitive(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "TESTNET" => Self::Testnet,
            _ => Self::Live,
        }
    }

    /// Get the environment name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Testnet => "testnet",
        }
    }

    /// Get the stream base address for this environment.
    #[must_use]
    pub const fn stream_base_url(&self) -> &'static str {
        match self {
            Self::Live => LIVE_STREAM_BASE_URL,
            Self::Testnet => TESTNET_STREAM_BASE_URL,
        }
    }
}

/// User data stream listen key.
#[derive(Clone, PartialEq, Eq)]
pub struct ListenKey(String);

impl ListenKey {
    /// Wrap a listen key.
    #[must_use]
    pub const fn new(key: String) -> Self {
        Self(key)
    }

    /// Get the listen key.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ListenKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ListenKey([REDACTED])")
    }
}

/// Complete client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Binance environment.
    pub environment: Environment,
    /// Stream base address, always ending in `/`.
    pub base_address: String,
    /// Wire-level options for every connection.
    pub protocol: ProtocolOptions,
    /// Prometheus metrics port (0 = disabled).
    pub metrics_port: u16,
    /// Symbols subscribed by the binary.
    pub symbols: Vec<String>,
    /// Kline interval subscribed by the binary.
    pub kline_interval: KlineInterval,
    /// Listen key for the user data stream, if any.
    pub listen_key: Option<ListenKey>,
}

impl ClientConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set to an unparseable value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set to an unparseable value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = lookup("BINANCE_ENV")
            .map(|s| Environment::from_str_case_insensitive(&s))
            .unwrap_or_default();

        let base_address = lookup("BINANCE_STREAM_BASE_URL")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map_or_else(
                || environment.stream_base_url().to_string(),
                |mut url| {
                    if !url.ends_with('/') {
                        url.push('/');
                    }
                    url
                },
            );

        let protocol = ProtocolOptions {
            max_message_size: parse_optional(&lookup, "STREAM_CLIENT_MAX_MESSAGE_SIZE")?,
            max_frame_size: parse_optional(&lookup, "STREAM_CLIENT_MAX_FRAME_SIZE")?,
        };

        let metrics_port: u16 =
            parse_optional(&lookup, "STREAM_CLIENT_METRICS_PORT")?.unwrap_or(0);

        let mut symbols: Vec<String> = lookup("STREAM_CLIENT_SYMBOLS")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_uppercase)
            .collect();
        if symbols.is_empty() {
            symbols.push(DEFAULT_SYMBOL.to_string());
        }

        let kline_interval = parse_optional(&lookup, "STREAM_CLIENT_KLINE_INTERVAL")?
            .unwrap_or(KlineInterval::OneMinute);

        let listen_key = lookup("BINANCE_LISTEN_KEY")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map(ListenKey::new);

        Ok(Self {
            environment,
            base_address,
            protocol,
            metrics_port,
            symbols,
            kline_interval,
            listen_key,
        })
    }

    /// Settings handed to the stream client.
    #[must_use]
    pub fn stream_client_config(&self) -> StreamClientConfig {
        StreamClientConfig::new(self.base_address.clone()).with_protocol_options(self.protocol)
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Environment variable holds a value that cannot be parsed.
    #[error("invalid value for {key}: {value}")]
    InvalidValue {
        /// Variable name.
        key: String,
        /// Rejected value.
        value: String,
    },
}

fn parse_optional<T, F>(lookup: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|raw| {
            raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value: raw.clone(),
            })
        })
        .transpose()
}
