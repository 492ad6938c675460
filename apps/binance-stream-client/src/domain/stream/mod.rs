//! Stream Identity and Addressing
//!
//! Domain types describing a Binance stream: its caller-visible identifier,
//! its kind, the kline interval vocabulary, and the rule that composes a
//! WebSocket address from a base address, a symbol and a kind.
//!
//! # Address Composition
//!
//! ```text
//! market streams:  <base><lowercase symbol>@<suffix>
//! kline streams:   <base><lowercase symbol>@kline_<interval>
//! user stream:     <base><listen key>
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// =============================================================================
// Types
// =============================================================================

/// Caller-visible identifier of an open stream.
///
/// Allocated strictly increasing from 1 and never reused while the process runs.
pub type StreamId = u64;

/// Kind of stream a connection carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    /// Candlestick updates for a symbol at a fixed interval.
    Kline(KlineInterval),
    /// Diff depth (order book) updates for a symbol.
    Depth,
    /// Aggregated trades for a symbol.
    Trades,
    /// Shared user data stream (account and order updates).
    UserData,
}

impl StreamKind {
    /// Address suffix following the `@` for market streams.
    ///
    /// Returns `None` for the user data stream, which is addressed by listen key.
    #[must_use]
    pub fn suffix(&self) -> Option<String> {
        match self {
            Self::Kline(interval) => Some(format!("kline_{}", interval.as_str())),
            Self::Depth => Some("depth".to_string()),
            Self::Trades => Some("aggTrade".to_string()),
            Self::UserData => None,
        }
    }

    /// Low-cardinality label used for logs and metrics.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Kline(_) => "kline",
            Self::Depth => "depth",
            Self::Trades => "trades",
            Self::UserData => "user_data",
        }
    }

    /// Check if this is the shared user data stream.
    #[must_use]
    pub const fn is_user_data(&self) -> bool {
        matches!(self, Self::UserData)
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Kline(interval) => write!(f, "kline({interval})"),
            other => f.write_str(other.label()),
        }
    }
}

// =============================================================================
// Kline Interval
// =============================================================================

/// Candlestick interval accepted by Binance kline streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KlineInterval {
    /// 1 second
    #[serde(rename = "1s")]
    OneSecond,
    /// 1 minute
    #[serde(rename = "1m")]
    OneMinute,
    /// 3 minutes
    #[serde(rename = "3m")]
    ThreeMinutes,
    /// 5 minutes
    #[serde(rename = "5m")]
    FiveMinutes,
    /// 15 minutes
    #[serde(rename = "15m")]
    FifteenMinutes,
    /// 30 minutes
    #[serde(rename = "30m")]
    ThirtyMinutes,
    /// 1 hour
    #[serde(rename = "1h")]
    OneHour,
    /// 2 hours
    #[serde(rename = "2h")]
    TwoHours,
    /// 4 hours
    #[serde(rename = "4h")]
    FourHours,
    /// 6 hours
    #[serde(rename = "6h")]
    SixHours,
    /// 8 hours
    #[serde(rename = "8h")]
    EightHours,
    /// 12 hours
    #[serde(rename = "12h")]
    TwelveHours,
    /// 1 day
    #[serde(rename = "1d")]
    OneDay,
    /// 3 days
    #[serde(rename = "3d")]
    ThreeDays,
    /// 1 week
    #[serde(rename = "1w")]
    OneWeek,
    /// 1 month
    #[serde(rename = "1M")]
    OneMonth,
}

impl KlineInterval {
    /// Get all intervals.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::OneSecond,
            Self::OneMinute,
            Self::ThreeMinutes,
            Self::FiveMinutes,
            Self::FifteenMinutes,
            Self::ThirtyMinutes,
            Self::OneHour,
            Self::TwoHours,
            Self::FourHours,
            Self::SixHours,
            Self::EightHours,
            Self::TwelveHours,
            Self::OneDay,
            Self::ThreeDays,
            Self::OneWeek,
            Self::OneMonth,
        ]
    }

    /// Wire representation used in stream names and payloads.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::OneSecond => "1s",
            Self::OneMinute => "1m",
            Self::ThreeMinutes => "3m",
            Self::FiveMinutes => "5m",
            Self::FifteenMinutes => "15m",
            Self::ThirtyMinutes => "30m",
            Self::OneHour => "1h",
            Self::TwoHours => "2h",
            Self::FourHours => "4h",
            Self::SixHours => "6h",
            Self::EightHours => "8h",
            Self::TwelveHours => "12h",
            Self::OneDay => "1d",
            Self::ThreeDays => "3d",
            Self::OneWeek => "1w",
            Self::OneMonth => "1M",
        }
    }
}

impl fmt::Display for KlineInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown interval string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown kline interval: {0}")]
pub struct UnknownIntervalError(pub String);

impl FromStr for KlineInterval {
    type Err = UnknownIntervalError;

    /// Parse the wire form. Case matters: `1m` is a minute, `1M` a month.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|interval| interval.as_str() == s.trim())
            .ok_or_else(|| UnknownIntervalError(s.to_string()))
    }
}

// =============================================================================
// Address Composition
// =============================================================================

/// Normalize a symbol to the casing Binance expects in stream names.
#[must_use]
pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_lowercase()
}

/// Fully composed WebSocket address for a single stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StreamAddress(String);

impl StreamAddress {
    /// Compose the address of a market stream.
    ///
    /// `UserData` has no market form; it falls back to the bare base address
    /// followed by the symbol, which callers never request.
    #[must_use]
    pub fn market(base: &str, symbol: &str, kind: StreamKind) -> Self {
        let symbol = normalize_symbol(symbol);
        match kind.suffix() {
            Some(suffix) => Self(format!("{base}{symbol}@{suffix}")),
            None => Self(format!("{base}{symbol}")),
        }
    }

    /// Compose the address of the user data stream for a listen key.
    #[must_use]
    pub fn user_data(base: &str, listen_key: &str) -> Self {
        Self(format!("{base}{}", listen_key.trim()))
    }

    /// Borrow the address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StreamAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Tests
// =============================================================================
