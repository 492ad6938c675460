//! Binance Stream Event Types
//!
//! Wire format types for deserializing messages from Binance WebSocket
//! streams. Field names map one-to-one onto Binance's single-letter JSON keys,
//! which are case sensitive (`e` is the event type, `E` the event time).
//!
//! # Event Types
//!
//! ## Market Streams
//! - `KlineEvent`: `<symbol>@kline_<interval>`
//! - `DepthEvent`: `<symbol>@depth`
//! - `TradeEvent`: `<symbol>@aggTrade`
//!
//! ## User Data Stream
//! - `AccountInfoEvent`: `outboundAccountInfo`
//! - `OrderUpdateEvent`: `executionReport`
//!
//! # References
//!
//! - [Market streams](https://developers.binance.com/docs/binance-spot-api-docs/web-socket-streams)
//! - [User data streams](https://developers.binance.com/docs/binance-spot-api-docs/user-data-stream)

mod codec;

pub use codec::{CodecError, JsonCodec};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::stream::KlineInterval;

// =============================================================================
// Market Stream Events
// =============================================================================

/// Candlestick update.
///
/// # Wire Format (JSON)
/// ```json
/// {"e":"kline","E":1672515782136,"s":"BNBBTC","k":{"t":1672515780000,...}}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KlineEvent {
    /// Event type (always "kline")
    #[serde(rename = "e")]
    pub event_type: String,

    /// Event time
    #[serde(rename = "E", with = "chrono::serde::ts_milliseconds")]
    pub event_time: DateTime<Utc>,

    /// Symbol
    #[serde(rename = "s")]
    pub symbol: String,

    /// Candle data
    #[serde(rename = "k")]
    pub kline: Kline,
}

/// Candle payload carried by a `KlineEvent`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Kline {
    /// Kline start time
    #[serde(rename = "t", with = "chrono::serde::ts_milliseconds")]
    pub open_time: DateTime<Utc>,

    /// Kline close time
    #[serde(rename = "T", with = "chrono::serde::ts_milliseconds")]
    pub close_time: DateTime<Utc>,

    /// Symbol
    #[serde(rename = "s")]
    pub symbol: String,

    /// Interval
    #[serde(rename = "i")]
    pub interval: KlineInterval,

    /// First trade ID
    #[serde(rename = "f")]
    pub first_trade_id: i64,

    /// Last trade ID
    #[serde(rename = "L")]
    pub last_trade_id: i64,

    /// Open price
    #[serde(rename = "o")]
    pub open: Decimal,

    /// Close price
    #[serde(rename = "c")]
    pub close: Decimal,

    /// High price
    #[serde(rename = "h")]
    pub high: Decimal,

    /// Low price
    #[serde(rename = "l")]
    pub low: Decimal,

    /// Base asset volume
    #[serde(rename = "v")]
    pub volume: Decimal,

    /// Number of trades
    #[serde(rename = "n")]
    pub trade_count: u64,

    /// Is this kline closed?
    #[serde(rename = "x")]
    pub is_closed: bool,

    /// Quote asset volume
    #[serde(rename = "q")]
    pub quote_volume: Decimal,

    /// Taker buy base asset volume
    #[serde(rename = "V")]
    pub taker_buy_base_volume: Decimal,

    /// Taker buy quote asset volume
    #[serde(rename = "Q")]
    pub taker_buy_quote_volume: Decimal,
}

/// A single `[price, quantity]` order book level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(Decimal, Decimal)", into = "(Decimal, Decimal)")]
pub struct PriceLevel {
    /// Price level
    pub price: Decimal,
    /// Quantity at this level (zero removes the level)
    pub quantity: Decimal,
}

impl From<(Decimal, Decimal)> for PriceLevel {
    fn from((price, quantity): (Decimal, Decimal)) -> Self {
        Self { price, quantity }
    }
}

impl From<PriceLevel> for (Decimal, Decimal) {
    fn from(level: PriceLevel) -> Self {
        (level.price, level.quantity)
    }
}

/// Diff depth update.
///
/// # Wire Format (JSON)
/// ```json
/// {"e":"depthUpdate","E":1672515782136,"s":"BNBBTC","U":157,"u":160,
///  "b":[["0.0024","10"]],"a":[["0.0026","100"]]}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepthEvent {
    /// Event type (always "depthUpdate")
    #[serde(rename = "e")]
    pub event_type: String,

    /// Event time
    #[serde(rename = "E", with = "chrono::serde::ts_milliseconds")]
    pub event_time: DateTime<Utc>,

    /// Symbol
    #[serde(rename = "s")]
    pub symbol: String,

    /// First update ID in event
    #[serde(rename = "U")]
    pub first_update_id: u64,

    /// Final update ID in event
    #[serde(rename = "u")]
    pub final_update_id: u64,

    /// Bids to be updated
    #[serde(rename = "b")]
    pub bids: Vec<PriceLevel>,

    /// Asks to be updated
    #[serde(rename = "a")]
    pub asks: Vec<PriceLevel>,
}

/// Aggregated trade.
///
/// # Wire Format (JSON)
/// ```json
/// {"e":"aggTrade","E":1672515782136,"s":"BNBBTC","a":12345,"p":"0.001",
///  "q":"100","f":100,"l":105,"T":1672515782136,"m":true,"M":true}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeEvent {
    /// Event type (always "aggTrade")
    #[serde(rename = "e")]
    pub event_type: String,

    /// Event time
    #[serde(rename = "E", with = "chrono::serde::ts_milliseconds")]
    pub event_time: DateTime<Utc>,

    /// Symbol
    #[serde(rename = "s")]
    pub symbol: String,

    /// Aggregate trade ID
    #[serde(rename = "a")]
    pub aggregate_trade_id: u64,

    /// Price
    #[serde(rename = "p")]
    pub price: Decimal,

    /// Quantity
    #[serde(rename = "q")]
    pub quantity: Decimal,

    /// First trade ID
    #[serde(rename = "f")]
    pub first_trade_id: u64,

    /// Last trade ID
    #[serde(rename = "l")]
    pub last_trade_id: u64,

    /// Trade time
    #[serde(rename = "T", with = "chrono::serde::ts_milliseconds")]
    pub trade_time: DateTime<Utc>,

    /// Is the buyer the market maker?
    #[serde(rename = "m")]
    pub buyer_is_maker: bool,

    /// Ignore
    #[serde(rename = "M", default)]
    pub best_match: bool,
}

// =============================================================================
// User Data Stream Events
// =============================================================================

/// Marker that identifies an account update on the user data stream.
pub const ACCOUNT_UPDATE_MARKER: &str = "outboundAccountInfo";

/// Marker that identifies an order update on the user data stream.
pub const ORDER_UPDATE_MARKER: &str = "executionReport";

/// Asset balance entry in an account update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    /// Asset
    #[serde(rename = "a")]
    pub asset: String,

    /// Free amount
    #[serde(rename = "f")]
    pub free: Decimal,

    /// Locked amount
    #[serde(rename = "l")]
    pub locked: Decimal,
}

/// Account balances and permissions snapshot.
///
/// # Wire Format (JSON)
/// ```json
/// {"e":"outboundAccountInfo","E":1499405658849,"m":0,"t":0,"b":0,"s":0,
///  "T":true,"W":true,"D":true,"u":1499405658848,
///  "B":[{"a":"LTC","f":"17366.18538083","l":"0.00000000"}]}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfoEvent {
    /// Event type (always "outboundAccountInfo")
    #[serde(rename = "e")]
    pub event_type: String,

    /// Event time
    #[serde(rename = "E", with = "chrono::serde::ts_milliseconds")]
    pub event_time: DateTime<Utc>,

    /// Maker commission rate (bips)
    #[serde(rename = "m", default)]
    pub maker_commission: i64,

    /// Taker commission rate (bips)
    #[serde(rename = "t", default)]
    pub taker_commission: i64,

    /// Buyer commission rate (bips)
    #[serde(rename = "b", default)]
    pub buyer_commission: i64,

    /// Seller commission rate (bips)
    #[serde(rename = "s", default)]
    pub seller_commission: i64,

    /// Can trade?
    #[serde(rename = "T", default)]
    pub can_trade: bool,

    /// Can withdraw?
    #[serde(rename = "W", default)]
    pub can_withdraw: bool,

    /// Can deposit?
    #[serde(rename = "D", default)]
    pub can_deposit: bool,

    /// Time of last account update
    #[serde(rename = "u", with = "chrono::serde::ts_milliseconds")]
    pub last_update_time: DateTime<Utc>,

    /// Balances
    #[serde(rename = "B")]
    pub balances: Vec<Balance>,
}

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    /// Buy order
    Buy,
    /// Sell order
    Sell,
}

/// Order lifecycle event.
///
/// Order type, status and execution type are kept as the raw Binance strings
/// (`LIMIT`, `NEW`, `TRADE`, ...) since the exchange extends them over time.
///
/// # Wire Format (JSON)
/// ```json
/// {"e":"executionReport","E":1499405658658,"s":"ETHBTC","c":"mUvoqJxFIILMdfAW5iGSOW",
///  "S":"BUY","o":"LIMIT","f":"GTC","q":"1.00000000","p":"0.10264410",...}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderUpdateEvent {
    /// Event type (always "executionReport")
    #[serde(rename = "e")]
    pub event_type: String,

    /// Event time
    #[serde(rename = "E", with = "chrono::serde::ts_milliseconds")]
    pub event_time: DateTime<Utc>,

    /// Symbol
    #[serde(rename = "s")]
    pub symbol: String,

    /// Client order ID
    #[serde(rename = "c")]
    pub client_order_id: String,

    /// Side
    #[serde(rename = "S")]
    pub side: OrderSide,

    /// Order type
    #[serde(rename = "o")]
    pub order_type: String,

    /// Time in force
    #[serde(rename = "f")]
    pub time_in_force: String,

    /// Order quantity
    #[serde(rename = "q")]
    pub quantity: Decimal,

    /// Order price
    #[serde(rename = "p")]
    pub price: Decimal,

    /// Current execution type
    #[serde(rename = "x")]
    pub execution_type: String,

    /// Current order status
    #[serde(rename = "X")]
    pub order_status: String,

    /// Order reject reason; "NONE" unless the order was rejected
    #[serde(rename = "r")]
    pub reject_reason: String,

    /// Order ID
    #[serde(rename = "i")]
    pub order_id: u64,

    /// Last executed quantity
    #[serde(rename = "l")]
    pub last_executed_quantity: Decimal,

    /// Cumulative filled quantity
    #[serde(rename = "z")]
    pub cumulative_filled_quantity: Decimal,

    /// Last executed price
    #[serde(rename = "L")]
    pub last_executed_price: Decimal,

    /// Commission amount
    #[serde(rename = "n")]
    pub commission: Decimal,

    /// Commission asset, absent until a fill occurs
    #[serde(rename = "N")]
    pub commission_asset: Option<String>,

    /// Transaction time
    #[serde(rename = "T", with = "chrono::serde::ts_milliseconds")]
    pub transaction_time: DateTime<Utc>,

    /// Trade ID (-1 when no trade)
    #[serde(rename = "t")]
    pub trade_id: i64,

    /// Is the order on the book?
    #[serde(rename = "w")]
    pub is_working: bool,

    /// Is this trade the maker side?
    #[serde(rename = "m")]
    pub is_maker: bool,
}

// =============================================================================
// Tests
// =============================================================================
