//! The `StreamProvider` capability (§6): publishes normalized events into
//! the `EventBus`. The wire-level WebSocket/REST driver for any given
//! exchange is out of scope (§1); this module defines the trait boundary
//! plus a dev/test implementation that replays a fixed script of events,
//! in the spirit of `exchange.rs`'s `SimExchange` standing in for a live
//! driver.
//!
//! `subscribe_account` models the pre-distillation source's `DuplexHandler`
//! pattern (`examples/original_source/src/stream.py`): one account stream
//! fans out position- and order-update records, grouped by the record's
//! `symbol`, across every affected per-symbol queue.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::event_bus::{EventBus, EventBusError};
use crate::types::{EventPayload, OrderUpdate, OrderbookUpdate, PositionUpdate};

/// §9 "Dynamic payloads": a live driver's wire events sometimes arrive as a
/// JSON string and sometimes as an already-decoded record. This crate
/// resolves that ambiguity once, at the stream boundary, by decoding into
/// `EventPayload` here; everything downstream only ever sees the typed
/// variant. A `DevStreamProvider` script never needs this (its events are
/// already Rust values); a live driver parsing raw WebSocket text would
/// call this for each frame.
pub fn decode_orderbook_json(raw: &str) -> serde_json::Result<OrderbookUpdate> {
    serde_json::from_str(raw)
}

pub fn decode_position_batch_json(raw: &str) -> serde_json::Result<Vec<PositionUpdate>> {
    serde_json::from_str(raw)
}

pub fn decode_order_batch_json(raw: &str) -> serde_json::Result<Vec<OrderUpdate>> {
    serde_json::from_str(raw)
}

#[async_trait]
pub trait StreamProvider: Send + Sync {
    async fn subscribe_orderbook(&self, bus: &EventBus, symbol: &str) -> Result<(), EventBusError>;
    async fn subscribe_account(&self, bus: &EventBus, symbols: &[String]) -> Result<(), EventBusError>;
}

/// One canned tick for `DevStreamProvider`: either a top-of-book update for
/// a symbol, or a batch of account-stream records (position/order updates,
/// keyed by their own `symbol` field and routed accordingly).
pub enum ScriptedEvent {
    Orderbook { symbol: String, update: OrderbookUpdate },
    Positions(Vec<PositionUpdate>),
    Orders(Vec<OrderUpdate>),
}

/// Replays a fixed script of events into the bus, once, in order. Useful
/// for local runs and integration tests where a live exchange driver isn't
/// available — the production WebSocket/REST driver itself is out of scope
/// (§1); only this trait boundary is built here.
#[derive(Default)]
pub struct DevStreamProvider {
    script: Vec<ScriptedEvent>,
}

impl DevStreamProvider {
    pub fn new(script: Vec<ScriptedEvent>) -> Self {
        Self { script }
    }

    /// Publishes every scripted event in order. Orderbook events go to
    /// their own symbol's queue; position/order batches are routed per the
    /// `DuplexHandler` grouping described above.
    pub async fn replay(&self, bus: &EventBus) -> Result<(), EventBusError> {
        for event in &self.script {
            match event {
                ScriptedEvent::Orderbook { symbol, update } => {
                    bus.put(symbol, EventPayload::Orderbook(*update)).await?;
                }
                ScriptedEvent::Positions(updates) => {
                    self.route_positions(bus, updates).await?;
                }
                ScriptedEvent::Orders(updates) => {
                    self.route_orders(bus, updates).await?;
                }
            }
        }
        Ok(())
    }

    async fn route_positions(&self, bus: &EventBus, updates: &[PositionUpdate]) -> Result<(), EventBusError> {
        let mut by_symbol: HashMap<&str, Vec<PositionUpdate>> = HashMap::new();
        for update in updates {
            by_symbol.entry(update.symbol.as_str()).or_default().push(update.clone());
        }
        for (symbol, group) in by_symbol {
            bus.put(symbol, EventPayload::Position(group)).await?;
        }
        Ok(())
    }

    async fn route_orders(&self, bus: &EventBus, updates: &[OrderUpdate]) -> Result<(), EventBusError> {
        let mut by_symbol: HashMap<&str, Vec<OrderUpdate>> = HashMap::new();
        for update in updates {
            by_symbol.entry(update.order.symbol.as_str()).or_default().push(update.clone());
        }
        for (symbol, group) in by_symbol {
            bus.put(symbol, EventPayload::Order(group)).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl StreamProvider for DevStreamProvider {
    /// `DevStreamProvider` replays its whole script via `replay`; per-symbol
    /// subscription is a no-op for this dev backend (a live driver would
    /// open a venue subscription here instead).
    async fn subscribe_orderbook(&self, _bus: &EventBus, _symbol: &str) -> Result<(), EventBusError> {
        Ok(())
    }

    async fn subscribe_account(&self, _bus: &EventBus, _symbols: &[String]) -> Result<(), EventBusError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{OrderStatus, PositionRecord, PriceLevel};
    use crate::types::{Order, OrderType, Side};

    fn ob_update(mid: f64) -> OrderbookUpdate {
        OrderbookUpdate {
            mid,
            best_bid: PriceLevel { price: mid - 0.05 },
            best_ask: PriceLevel { price: mid + 0.05 },
        }
    }

    #[tokio::test]
    async fn replay_routes_orderbook_to_its_own_symbol_queue() {
        let bus = EventBus::new(["BTC".to_string(), "ETH".to_string()]);
        let provider = DevStreamProvider::new(vec![ScriptedEvent::Orderbook {
            symbol: "BTC".to_string(),
            update: ob_update(100.0),
        }]);
        provider.replay(&bus).await.unwrap();

        assert!(!bus.empty("BTC").await.unwrap());
        assert!(bus.empty("ETH").await.unwrap());
    }

    #[tokio::test]
    async fn replay_fans_out_position_batch_by_symbol() {
        let bus = EventBus::new(["BTC".to_string(), "ETH".to_string()]);
        let updates = vec![
            PositionUpdate {
                symbol: "BTC".to_string(),
                status: None,
                position: PositionRecord { value: 100.0, side: 1.0 },
            },
            PositionUpdate {
                symbol: "ETH".to_string(),
                status: None,
                position: PositionRecord { value: 50.0, side: -1.0 },
            },
        ];
        let provider = DevStreamProvider::new(vec![ScriptedEvent::Positions(updates)]);
        provider.replay(&bus).await.unwrap();

        assert!(!bus.empty("BTC").await.unwrap());
        assert!(!bus.empty("ETH").await.unwrap());
    }

    #[test]
    fn decode_orderbook_json_handles_the_string_payload_case() {
        let raw = r#"{"mid":100.0,"best_bid":{"price":99.95},"best_ask":{"price":100.05}}"#;
        let decoded = decode_orderbook_json(raw).unwrap();
        assert_eq!(decoded.mid, 100.0);
        assert_eq!(decoded.best_bid.price, 99.95);
    }

    #[tokio::test]
    async fn replay_fans_out_order_batch_by_order_symbol() {
        let bus = EventBus::new(["BTC".to_string()]);
        let mut order = Order::new("BTC", Side::Buy, OrderType::Limit, 1.0, 100.0);
        order.cloid = Some("BTC-000".to_string());
        order.oid = Some("X".to_string());
        let updates = vec![OrderUpdate { status: OrderStatus::New, order }];
        let provider = DevStreamProvider::new(vec![ScriptedEvent::Orders(updates)]);
        provider.replay(&bus).await.unwrap();

        let event = bus.get("BTC").await.unwrap();
        match event.payload {
            EventPayload::Order(orders) => assert_eq!(orders.len(), 1),
            _ => panic!("expected an order payload"),
        }
    }
}
