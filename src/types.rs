//! Normalized data model shared across the core pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// +1 for Buy, -1 for Sell, matching the `side ∈ {−1, +1}` convention
    /// used by position-update records.
    pub fn sign(self) -> f64 {
        match self {
            Side::Buy => 1.0,
            Side::Sell => -1.0,
        }
    }

    pub fn from_sign(sign: f64) -> Self {
        if sign >= 0.0 {
            Side::Buy
        } else {
            Side::Sell
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderType {
    Limit,
    Market,
}

/// An order intent (no oid yet) or a live order (oid assigned).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub symbol: String,
    pub side: Side,
    pub order_type: OrderType,
    pub amount: f64,
    pub price: f64,
    pub cloid: Option<String>,
    pub oid: Option<String>,
    pub tp: Option<f64>,
}

impl Order {
    pub fn new(symbol: impl Into<String>, side: Side, order_type: OrderType, amount: f64, price: f64) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            order_type,
            amount,
            price,
            cloid: None,
            oid: None,
            tp: None,
        }
    }

    /// Last three characters of `cloid`: the level tag. Panics-free: returns
    /// an empty-tag-shaped string if `cloid` is absent or shorter than 3
    /// chars, since that can only happen for malformed input from the
    /// exchange side.
    pub fn level_tag(&self) -> Option<&str> {
        self.cloid.as_deref().and_then(|c| {
            if c.len() >= 3 {
                Some(&c[c.len() - 3..])
            } else {
                None
            }
        })
    }

    pub fn is_tp(&self) -> bool {
        self.level_tag() == Some("_tp")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    New,
    PartiallyFilled,
    Filled,
    Cancelled,
    Rejected,
}

impl OrderStatus {
    pub fn is_overwrite(self) -> bool {
        matches!(self, OrderStatus::New | OrderStatus::PartiallyFilled)
    }

    pub fn is_remove(self) -> bool {
        matches!(self, OrderStatus::Filled | OrderStatus::Cancelled)
    }

    pub fn is_rejected(self) -> bool {
        matches!(self, OrderStatus::Rejected)
    }
}

/// Normalized order-update record, as produced by `StreamProvider::subscribe_account`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderUpdate {
    pub status: OrderStatus,
    pub order: Order,
}

/// Normalized position-update record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionUpdate {
    pub symbol: String,
    pub status: Option<String>,
    pub position: PositionRecord,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PositionRecord {
    /// USD notional, non-negative.
    pub value: f64,
    /// -1 or +1.
    pub side: f64,
}

/// `{mid, best_bid:{price}, best_ask:{price}}`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OrderbookUpdate {
    pub mid: f64,
    pub best_bid: PriceLevel,
    pub best_ask: PriceLevel,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct UsdcUsdtUpdate {
    pub mid: f64,
}

/// `{mid, best_bid, best_ask, vol}`, the quoter's only view of market state.
#[derive(Debug, Clone, Copy, Default)]
pub struct LobSnapshot {
    pub mid: f64,
    pub best_bid: f64,
    pub best_ask: f64,
    pub vol: f64,
}

/// The decoded, already-normalized payload for one event. Decoding the
/// "sometimes a JSON string, sometimes a decoded record" ambiguity happens
/// once at the `StreamProvider` boundary; everything downstream sees this.
#[derive(Debug, Clone)]
pub enum EventPayload {
    Orderbook(OrderbookUpdate),
    Position(Vec<PositionUpdate>),
    Order(Vec<OrderUpdate>),
    UsdcUsdt(UsdcUsdtUpdate),
}

impl EventPayload {
    pub fn event_type(&self) -> &'static str {
        match self {
            EventPayload::Orderbook(_) => "orderbook",
            EventPayload::Position(_) => "position",
            EventPayload::Order(_) => "order",
            EventPayload::UsdcUsdt(_) => "USDCUSDT",
        }
    }
}

/// `{seq_id, event_type, data, ts_ms}`. Immutable once enqueued.
#[derive(Debug, Clone)]
pub struct Event {
    pub seq_id: u64,
    pub ts_ms: i64,
    pub payload: EventPayload,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Event(seq={}, type={}, ts={})", self.seq_id, self.payload.event_type(), self.ts_ms)
    }
}
