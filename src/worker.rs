//! SymbolWorker (§4.7): owns the event loop for one symbol, orchestrating
//! `LobManager`/`PositionManager`/`Quoter`/`Oms`, rate-limiting requotes,
//! and tracking time-to-task and requote-latency statistics — grounded on
//! `examples/original_source/src/market_maker.py`'s `MarketMaker` class.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use crate::event_bus::{EventBusError, SharedEventBus};
use crate::exchange::Exchange;
use crate::lob::LobManager;
use crate::oms::{Oms, OmsConfig};
use crate::position::PositionManager;
use crate::quoter::{Quoter, QuoterConfig};
use crate::types::{now_ms, Event, EventPayload, Side};

/// Running count/sum/max per bucket, logged every `log_every` samples —
/// the same bounded, periodic-summary shape as the reference crate's
/// `LatencyAuditor` (`ingestor.rs`) and the pre-distillation source's
/// `_t2t_stats`/`_requote_stats` dicts, without reaching for a full
/// histogram/metrics-export dependency this crate has no Non-goal
/// exception to justify.
#[derive(Default)]
struct LatencyStats {
    count: u64,
    sum: f64,
    max: f64,
}

impl LatencyStats {
    fn record(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        if value > self.max {
            self.max = value;
        }
    }

    fn avg(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

const T2T_LOG_EVERY: u64 = 100;
const REQUOTE_LOG_EVERY: u64 = 100;

pub struct SymbolWorkerConfig {
    pub symbol: String,
    pub num_orders: usize,
    pub tp_distance: f64,
    pub tick_size: f64,
    pub lot_size: f64,
    pub spread_bps: f64,
    pub gross_exposure_dollars: f64,
    pub epsilon: f64,
    pub inventory_max_dollars: f64,
    pub min_requote_interval_ms: i64,
    pub geometric_ratio: f64,
}

pub struct SymbolWorker {
    symbol: String,
    bus: SharedEventBus,
    half_depth: usize,
    lob: LobManager,
    position: PositionManager,
    quoter: Quoter,
    oms: Oms,

    has_orderbook: bool,
    has_position: bool,
    has_usdcusdt: bool,

    min_requote_interval_ms: i64,
    last_requote_time_ms: i64,

    t2t_stats: HashMap<&'static str, LatencyStats>,
    requote_stats: HashMap<&'static str, LatencyStats>,
}

impl SymbolWorker {
    pub fn new(config: SymbolWorkerConfig, bus: SharedEventBus, exchange: Arc<dyn Exchange>) -> Self {
        let half_depth = config.num_orders / 2;

        let quoter_config = QuoterConfig {
            num_orders: config.num_orders,
            lot_size: config.lot_size,
            tick_size: config.tick_size,
            spread_bps: config.spread_bps,
            gross_exposure_dollars: config.gross_exposure_dollars,
            epsilon: config.epsilon,
            inventory_max_dollars: config.inventory_max_dollars,
            geometric_ratio: config.geometric_ratio,
        };
        let oms_config = OmsConfig {
            symbol: config.symbol.clone(),
            num_orders: config.num_orders,
            tp_distance: config.tp_distance,
            tick_size: config.tick_size,
        };

        Self {
            symbol: config.symbol,
            bus,
            half_depth,
            lob: LobManager::new(),
            position: PositionManager::new(config.inventory_max_dollars),
            quoter: Quoter::new(quoter_config),
            oms: Oms::new(oms_config, exchange),
            has_orderbook: false,
            has_position: false,
            has_usdcusdt: false,
            min_requote_interval_ms: config.min_requote_interval_ms,
            last_requote_time_ms: 0,
            t2t_stats: HashMap::new(),
            requote_stats: HashMap::new(),
        }
    }

    /// Drains `self.bus`'s queue for `self.symbol` until the queue is
    /// closed or the key is unrecognized, at which point the worker exits
    /// cleanly (§7: "Queue closed / unknown key — fatal for that worker").
    pub async fn run(mut self) {
        log::info!("MAKER {} - starting", self.symbol);
        loop {
            let event = match self.bus.get(&self.symbol).await {
                Ok(event) => event,
                Err(EventBusError::Closed(_)) => {
                    log::info!("MAKER {} - queue closed, exiting", self.symbol);
                    break;
                }
                Err(EventBusError::UnknownStreamKey(key)) => {
                    log::error!("MAKER {} - unknown stream key {}, exiting", self.symbol, key);
                    break;
                }
            };
            self.process_event(event).await;
        }
    }

    async fn process_event(&mut self, event: Event) {
        self.record_t2t(&event);

        match event.payload {
            EventPayload::Orderbook(update) => {
                self.lob.update_lob(&update);
                self.has_orderbook = true;
                self.requote(false).await;
            }
            EventPayload::Position(updates) => {
                self.position.update_positions(&updates);
                self.has_position = true;
                self.requote(false).await;
            }
            EventPayload::Order(updates) => {
                let requote_on_filled = self.oms.update_orders_state(&updates);
                if requote_on_filled {
                    self.requote(false).await;
                }
            }
            EventPayload::UsdcUsdt(update) => {
                self.lob.update_usdcusdt_rate(&update);
                self.has_usdcusdt = true;
                self.requote(false).await;
            }
        }
    }

    fn record_t2t(&mut self, event: &Event) {
        let event_type = event.payload.event_type();
        let t2t_ms = (now_ms() - event.ts_ms) as f64;
        let stats = self.t2t_stats.entry(event_type).or_default();
        stats.record(t2t_ms);
        if stats.count % T2T_LOG_EVERY == 0 {
            log::info!(
                "MAKER {} - T2T {}: last={:.1}ms avg={:.1}ms max={:.1}ms over {} events",
                self.symbol,
                event_type,
                t2t_ms,
                stats.avg(),
                stats.max,
                stats.count
            );
        }
    }

    fn record_requote_latency(&mut self, component: &'static str, latency_us: f64) {
        let stats = self.requote_stats.entry(component).or_default();
        stats.record(latency_us);
        let count = stats.count;
        if component == "total" && count % REQUOTE_LOG_EVERY == 0 {
            self.log_requote_stats(count);
        }
    }

    fn log_requote_stats(&self, count: u64) {
        log::info!("MAKER {} - REQUOTE LATENCY STATS (over {} requotes):", self.symbol, count);
        for (component, stats) in &self.requote_stats {
            if stats.count > 0 {
                log::info!("  {}: avg={:.1}us max={:.1}us", component.to_uppercase(), stats.avg(), stats.max);
            }
        }
    }

    /// §4.7 requote rate limit + procedure. Non-forced calls inside
    /// `min_requote_interval_ms` are a no-op. Assigns each order's `symbol`
    /// and level-tag `cloid` (§4.6.3: bid index `i` -> `{:03}`, ask index
    /// `i` -> `{:03}` of `half_depth + i`) before handing the ladder to the
    /// OMS, since the Quoter itself leaves `cloid` unset.
    pub async fn requote(&mut self, forced: bool) {
        let current_time = now_ms();
        if !forced && (current_time - self.last_requote_time_ms) < self.min_requote_interval_ms {
            return;
        }
        self.last_requote_time_ms = current_time;

        let t1 = Instant::now();
        let lob_snapshot = self.lob.snapshot();
        let position = self.position.get_position(&self.symbol);
        let mut orders = self.quoter.generate_quote(&lob_snapshot, position, forced);
        let quote_gen_us = t1.elapsed().as_micros() as f64;

        if orders.is_empty() {
            return;
        }

        let mut bid_idx = 0usize;
        let mut ask_idx = 0usize;
        for order in orders.iter_mut() {
            order.symbol = self.symbol.clone();
            let tag = match order.side {
                Side::Buy => {
                    let i = bid_idx;
                    bid_idx += 1;
                    i
                }
                Side::Sell => {
                    let i = ask_idx;
                    ask_idx += 1;
                    self.half_depth + i
                }
            };
            order.cloid = Some(format!("{}-{:03}", self.symbol, tag));
        }

        let t2 = Instant::now();
        self.oms.update(orders, lob_snapshot.mid).await;
        let oms_us = t2.elapsed().as_micros() as f64;
        let total_us = t1.elapsed().as_micros() as f64;

        self.record_requote_latency("quote_gen", quote_gen_us);
        self.record_requote_latency("oms_update", oms_us);
        self.record_requote_latency("total", total_us);
    }

    #[cfg(test)]
    pub fn oms(&self) -> &Oms {
        &self.oms
    }
}
