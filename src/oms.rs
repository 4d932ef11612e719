//! Order Management System: keeps `orders_state`/`pending_levels` consistent
//! with the exchange's authoritative view, enforces per-level single-flight,
//! dispatches place/amend/cancel, and fires take-profit orders on fills.

use std::collections::HashMap;
use std::sync::Arc;

use crate::exchange::Exchange;
use crate::quoter::round_step;
use crate::types::{now_ms, Order, OrderStatus, OrderType, OrderUpdate, Side};

const PENDING_TIMEOUT_MS: i64 = 10_000;
const OUT_OF_BOUNDS_SENSITIVITY: f64 = 0.1;

pub struct OmsConfig {
    pub symbol: String,
    pub num_orders: usize,
    pub tp_distance: f64,
    pub tick_size: f64,
}

pub struct Oms {
    config: OmsConfig,
    exchange: Arc<dyn Exchange>,
    orders_state: HashMap<String, Order>,
    pending_levels: HashMap<String, i64>,
    order_count: i64,
}

impl Oms {
    pub fn new(config: OmsConfig, exchange: Arc<dyn Exchange>) -> Self {
        Self {
            config,
            exchange,
            orders_state: HashMap::new(),
            pending_levels: HashMap::new(),
            order_count: 0,
        }
    }

    pub fn order_count(&self) -> i64 {
        self.order_count
    }

    pub fn is_pending(&mut self, level: &str) -> bool {
        self.cleanup_stale_pending(level);
        self.pending_levels.contains_key(level)
    }

    fn add_pending(&mut self, level: &str) {
        self.pending_levels.insert(level.to_string(), now_ms());
    }

    fn remove_pending(&mut self, level: &str) {
        self.pending_levels.remove(level);
    }

    fn cleanup_stale_pending(&mut self, level: &str) {
        if let Some(&ts) = self.pending_levels.get(level) {
            if now_ms() - ts > PENDING_TIMEOUT_MS {
                log::warn!("OMS {} - cleaning up stale pending level: {}", self.config.symbol, level);
                self.pending_levels.remove(level);
            }
        }
    }

    /// §4.6.1 order-update state machine. Returns `true` if at least one
    /// update was processed (the SymbolWorker requotes when this is true).
    pub fn update_orders_state(&mut self, updates: &[OrderUpdate]) -> bool {
        if updates.is_empty() {
            return false;
        }

        let mut filled = Vec::new();

        for update in updates {
            let level = match update.order.level_tag() {
                Some(tag) => tag.to_string(),
                None => {
                    log::error!("order update missing a usable level tag: {:?}", update.order);
                    continue;
                }
            };
            let is_tp = level == "_tp";

            if update.status.is_overwrite() {
                match &update.order.oid {
                    Some(oid) => {
                        self.orders_state.insert(oid.clone(), update.order.clone());
                        if !is_tp {
                            self.order_count += 1;
                            self.remove_pending(&level);
                        }
                    }
                    None => {
                        log::error!("order {:?} has no oid", update.order);
                        if !is_tp {
                            self.remove_pending(&level);
                        }
                    }
                }
            } else if update.status.is_remove() {
                if let Some(oid) = &update.order.oid {
                    if self.orders_state.remove(oid).is_some() {
                        if update.status == OrderStatus::Filled && !is_tp {
                            log::info!(
                                "FILL {} - {} contracts @ {}",
                                self.config.symbol,
                                update.order.amount,
                                update.order.price
                            );
                            filled.push(update.order.clone());
                        }
                        if !is_tp {
                            self.order_count -= 1;
                            self.remove_pending(&level);
                        }
                    }
                }
            } else if update.status.is_rejected() {
                log::info!("OMS {} - order rejected! {:?}", self.config.symbol, update.order);
                self.remove_pending(&level);
            }
        }

        if !filled.is_empty() {
            log::info!("OMS {} - placing TPs for {} filled order(s)", self.config.symbol, filled.len());
            self.place_take_profits(&filled);
        }

        true
    }

    /// Fire-and-forget in the reference design (an `asyncio.create_task`
    /// that the caller never awaits). Since `place_orders` here is async and
    /// `update_orders_state` is not, this spawns a detached task rather than
    /// awaiting inline, preserving the "TP placement does not block the
    /// order-update handler" behavior.
    fn place_take_profits(&self, filled_orders: &[Order]) {
        let exchange = self.exchange.clone();
        let symbol = self.config.symbol.clone();
        let tp_distance = self.config.tp_distance;
        let tick_size = self.config.tick_size;
        let tp_orders: Vec<Order> = filled_orders
            .iter()
            .map(|order| {
                let price = if order.side == Side::Buy {
                    order.price * (1.0 + tp_distance / 10_000.0)
                } else {
                    order.price * (1.0 - tp_distance / 10_000.0)
                };
                let mut tp = Order::new(
                    symbol.clone(),
                    order.side.opposite(),
                    OrderType::Limit,
                    order.amount,
                    round_step(price, tick_size),
                );
                tp.cloid = order.cloid.as_ref().map(|c| format!("{c}_tp"));
                tp
            })
            .collect();

        tokio::spawn(async move {
            for order in tp_orders {
                if let Err(e) = exchange.create_order(order).await {
                    log::error!("OMS {symbol} - failed to place take profit: {e}");
                }
            }
        });
    }

    /// `true` iff `new`'s price has drifted from `old`'s by more than
    /// `distance_from_mid * sensitivity`.
    pub fn is_out_of_bounds(old: Option<&Order>, new: &Order, mid: f64) -> bool {
        let old = match old {
            Some(o) => o,
            None => return false,
        };
        let distance_from_mid = (old.price - mid).abs();
        let buffer = distance_from_mid * OUT_OF_BOUNDS_SENSITIVITY;
        new.price > old.price + buffer || new.price < old.price - buffer
    }

    fn find_matched_order(&self, new_order: &Order) -> Option<Order> {
        let level = new_order.level_tag()?;
        self.orders_state
            .values()
            .find(|o| o.level_tag() == Some(level))
            .cloned()
    }

    async fn cancel_all(&mut self) {
        match self.exchange.cancel_all_orders(&self.config.symbol).await {
            Ok(_) => self.pending_levels.clear(),
            Err(e) => log::warn!("OMS {} - {}", self.config.symbol, e),
        }
    }

    async fn place_orders(&self, orders: Vec<Order>) {
        for order in orders {
            if let Err(e) = self.exchange.create_order(order).await {
                log::error!("OMS {} - order placement failed: {}", self.config.symbol, e);
            }
        }
    }

    async fn amend_orders(&self, orders: Vec<Order>) {
        for order in orders {
            if let Err(e) = self.exchange.amend_order(order).await {
                log::error!("OMS {} - order amend failed: {}", self.config.symbol, e);
            }
        }
    }

    async fn cancel_orders(&self, orders: Vec<Order>) {
        for result in self.exchange.bulk_cancel_order(orders).await {
            if let Err(e) = result {
                log::warn!("OMS {} - {}", self.config.symbol, e);
            }
        }
    }

    /// §4.6.2: buckets `new_orders` into markets/limits/amends (cancels is
    /// reserved and currently always empty), dispatches, then checks for
    /// order-count drift.
    pub async fn update(&mut self, new_orders: Vec<Order>, mid: f64) {
        let mut markets = Vec::new();
        let mut limits = Vec::new();
        let mut amends = Vec::new();
        let cancels: Vec<Order> = Vec::new();

        for mut order in new_orders {
            match order.order_type {
                OrderType::Market => markets.push(order),
                OrderType::Limit => {
                    let level = match order.level_tag() {
                        Some(l) => l.to_string(),
                        None => continue,
                    };
                    if self.is_pending(&level) {
                        log::warn!("OMS {} - skipping level {} - already pending", self.config.symbol, level);
                        continue;
                    }

                    let matched = self.find_matched_order(&order);
                    match matched {
                        Some(matched_old) => {
                            if Self::is_out_of_bounds(Some(&matched_old), &order, mid) {
                                self.add_pending(&level);
                                // Intentional: assigns the matched order's
                                // cloid into the new order's oid slot. This
                                // mirrors a probable bug in the design this
                                // was ported from; preserved verbatim rather
                                // than silently "fixed" (see DESIGN.md).
                                order.oid = matched_old.cloid.clone();
                                amends.push(order);
                            }
                        }
                        None => {
                            self.add_pending(&level);
                            limits.push(order);
                        }
                    }
                }
            }
        }

        if !markets.is_empty() {
            self.place_orders(markets).await;
            self.cancel_all().await;
        }

        tokio::join!(
            self.cancel_orders(cancels),
            self.place_orders(limits),
            self.amend_orders(amends),
        );

        if self.order_count > self.config.num_orders as i64 {
            log::warn!(
                "OMS {} - {} > {}, exceeding max orders! cancelling all...",
                self.config.symbol,
                self.order_count,
                self.config.num_orders
            );
            self.cancel_all().await;
        }
    }

    /// Cancel all, then place all. Reserved for startup/recovery; bypasses
    /// pending discipline.
    pub async fn simple_update(&mut self, new_orders: Vec<Order>) {
        self.cancel_all().await;
        self.place_orders(new_orders).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::SimExchange;
    use crate::types::{OrderType, Side};

    fn config(symbol: &str) -> OmsConfig {
        OmsConfig {
            symbol: symbol.to_string(),
            num_orders: 4,
            tp_distance: 10.0,
            tick_size: 0.1,
        }
    }

    fn tagged_order(side: Side, price: f64, amount: f64, tag: &str) -> Order {
        let mut o = Order::new("BTC", side, OrderType::Limit, amount, price);
        o.cloid = Some(format!("BTC-{tag}"));
        o
    }

    #[tokio::test]
    async fn s2_single_flight_blocks_repeat_placement_for_same_level() {
        let exch = Arc::new(SimExchange::new());
        let mut oms = Oms::new(config("BTC"), exch);

        let orders = vec![tagged_order(Side::Buy, 99.9, 3.75, "000")];
        oms.update(orders.clone(), 100.0).await;
        assert!(oms.is_pending("000"));

        // identical call again before any order-update arrives: the level is
        // still pending, so it must be skipped (no duplicate in-flight action).
        oms.update(orders, 100.0).await;
        assert!(oms.is_pending("000"));
    }

    #[tokio::test]
    async fn s3_fill_decrements_order_count_and_schedules_tp() {
        let exch = Arc::new(SimExchange::new());
        let mut oms = Oms::new(config("BTC"), exch);

        let orders = vec![
            tagged_order(Side::Buy, 99.9, 3.75, "000"),
            tagged_order(Side::Buy, 99.7, 6.25, "001"),
            tagged_order(Side::Sell, 100.0, 3.75, "002"),
            tagged_order(Side::Sell, 100.2, 6.25, "003"),
        ];
        oms.update(orders, 100.0).await;

        let new_update = OrderUpdate {
            status: OrderStatus::New,
            order: {
                let mut o = tagged_order(Side::Buy, 99.9, 3.75, "000");
                o.oid = Some("X".to_string());
                o
            },
        };
        oms.update_orders_state(std::slice::from_ref(&new_update));
        assert_eq!(oms.order_count(), 1);

        let fill_update = OrderUpdate {
            status: OrderStatus::Filled,
            order: new_update.order,
        };
        oms.update_orders_state(std::slice::from_ref(&fill_update));
        assert_eq!(oms.order_count(), 0);
        assert!(!oms.is_pending("000"));
    }

    #[tokio::test]
    async fn s6_rejected_clears_pending_without_touching_state() {
        let exch = Arc::new(SimExchange::new());
        let mut oms = Oms::new(config("BTC"), exch);
        oms.update(vec![tagged_order(Side::Buy, 99.7, 6.25, "001")], 100.0).await;
        assert!(oms.is_pending("001"));

        let rejected = OrderUpdate {
            status: OrderStatus::Rejected,
            order: tagged_order(Side::Buy, 99.7, 6.25, "001"),
        };
        oms.update_orders_state(&[rejected]);
        assert!(!oms.is_pending("001"));
        assert_eq!(oms.order_count(), 0);
    }

    #[test]
    fn out_of_bounds_respects_sensitivity_buffer() {
        let old = tagged_order(Side::Buy, 100.0, 1.0, "000");
        let mid = 100.5;
        // distance_from_mid = 0.5, buffer = 0.05
        let within = tagged_order(Side::Buy, 100.04, 1.0, "000");
        assert!(!Oms::is_out_of_bounds(Some(&old), &within, mid));

        let outside = tagged_order(Side::Buy, 100.10, 1.0, "000");
        assert!(Oms::is_out_of_bounds(Some(&old), &outside, mid));
    }

    #[test]
    fn out_of_bounds_is_false_with_no_prior_order() {
        let new = tagged_order(Side::Buy, 100.0, 1.0, "000");
        assert!(!Oms::is_out_of_bounds(None, &new, 100.0));
    }

    #[tokio::test]
    async fn order_count_drift_triggers_cancel_all() {
        let exch = Arc::new(SimExchange::new());
        let mut oms = Oms::new(config("BTC"), exch);
        // Directly inflate order_count beyond num_orders by feeding NEW
        // updates for 5 distinct levels (num_orders=4).
        for (i, tag) in ["000", "001", "002", "003", "004"].iter().enumerate() {
            let update = OrderUpdate {
                status: OrderStatus::New,
                order: {
                    let mut o = tagged_order(Side::Buy, 100.0, 1.0, tag);
                    o.oid = Some(format!("oid-{i}"));
                    o
                },
            };
            oms.update_orders_state(&[update]);
        }
        assert_eq!(oms.order_count(), 5);

        oms.update(vec![], 100.0).await;
        // cancel_all clears pending levels as a side effect; order_count
        // itself is only corrected by the subsequent order-update stream,
        // matching the reference design (local state is provisional).
        assert!(oms.pending_levels.is_empty());
    }
}
