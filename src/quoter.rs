//! Stateless-per-call quote synthesis: `(lob, position, forced) -> [Order]`.
//!
//! "Stateless" here means the math has no hidden dependency on anything but
//! its arguments; the gating state (`last_mid`, `prev_bid_skew`,
//! `prev_ask_skew`) is carried on `Quoter` itself purely to decide whether to
//! *emit* the freshly computed ladder, matching the reference source.

use rust_decimal::prelude::*;

use crate::types::{LobSnapshot, Order, OrderType, Side};

#[derive(Debug, Clone)]
pub struct QuoterConfig {
    pub num_orders: usize,
    pub lot_size: f64,
    pub tick_size: f64,
    pub spread_bps: f64,
    pub gross_exposure_dollars: f64,
    pub epsilon: f64,
    pub inventory_max_dollars: f64,
    pub geometric_ratio: f64,
}

impl Default for QuoterConfig {
    fn default() -> Self {
        Self {
            num_orders: 4,
            lot_size: 0.001,
            tick_size: 0.1,
            spread_bps: 10.0,
            gross_exposure_dollars: 1000.0,
            epsilon: 1.0,
            inventory_max_dollars: 10_000.0,
            geometric_ratio: 0.6,
        }
    }
}

pub struct Quoter {
    config: QuoterConfig,
    last_mid: f64,
    prev_bid_skew: f64,
    prev_ask_skew: f64,
    prev_vol: f64,
}

impl Quoter {
    pub fn new(config: QuoterConfig) -> Self {
        Self {
            config,
            last_mid: 0.0,
            prev_bid_skew: 0.0,
            prev_ask_skew: 0.0,
            prev_vol: 0.0,
        }
    }

    fn half_depth(&self) -> usize {
        self.config.num_orders / 2
    }

    /// `inv_delta = position / inventory_max_dollars`; `bid_skew`/`ask_skew`
    /// per §4.5, forcing a side to 1 once position breaches the
    /// corresponding bound.
    fn skew(&self, position: f64) -> (f64, f64) {
        let inv_delta = position / self.config.inventory_max_dollars;

        let mut bid_skew = if inv_delta < 0.0 { -inv_delta } else { 0.0 };
        let mut ask_skew = if inv_delta > 0.0 { inv_delta } else { 0.0 };

        if position <= -self.config.inventory_max_dollars {
            bid_skew = 1.0;
        }
        if position >= self.config.inventory_max_dollars {
            ask_skew = 1.0;
        }

        (bid_skew.abs(), ask_skew.abs())
    }

    /// Price ladder. Forcing a side's skew to 1 cancels that side (returns
    /// `None` for it); the other side is computed with the general formula,
    /// per the corrected reading of the skew-cap branches (see SPEC_FULL.md §4.5).
    fn prices(
        &self,
        mid: f64,
        bid_skew: f64,
        ask_skew: f64,
        vol: f64,
    ) -> (Option<Vec<f64>>, Option<Vec<f64>>) {
        let k = self.half_depth();
        let base_range = (self.config.spread_bps * mid) / 10_000.0 + vol;
        let bid0 = mid - base_range / 2.0;
        let ask0 = mid + base_range / 2.0;

        if bid_skew >= 1.0 {
            let ask_upper = ask0 + base_range / 2.0 * k as f64;
            return (None, Some(linspace(ask0, ask_upper, k)));
        }
        if ask_skew >= 1.0 {
            let bid_lower = bid0 - base_range / 2.0 * k as f64;
            return (Some(linspace(bid0, bid_lower, k)), None);
        }

        let bid_lower = bid0 - base_range / 2.0 * (1.0 - bid_skew) * (1.0 + ask_skew) * k as f64;
        let ask_upper = ask0 + base_range / 2.0 * (1.0 - ask_skew) * (1.0 + bid_skew) * k as f64;

        (
            Some(linspace(bid0, bid_lower, k)),
            Some(linspace(ask0, ask_upper, k)),
        )
    }

    /// Same geometric-weighted, mid-normalized size vector for both sides.
    fn sizes(&self, mid: f64) -> Vec<f64> {
        let k = self.half_depth();
        let weights = geometric_weights(k, self.config.geometric_ratio);
        let mut sizes: Vec<f64> = weights
            .iter()
            .map(|w| self.config.gross_exposure_dollars * w / mid)
            .collect();
        sizes.reverse();
        sizes
    }

    /// Runs the full quote-generation pipeline and returns the ladder (BUYs
    /// first, then SELLs) gated by `forced` or any of the epsilon-bps
    /// deltas. Gating deltas are intentionally one-directional (see
    /// SPEC_FULL.md §4.5): only a *decrease* in mid, or a *decrease* in
    /// either skew, counts.
    pub fn generate_quote(&mut self, lob: &LobSnapshot, position: f64, forced: bool) -> Vec<Order> {
        let mid = lob.mid;

        // Degenerate orderbook: an empty top-of-book (mid/best_bid/best_ask
        // at zero) collapses `base_range` and would otherwise divide by zero
        // in `sizes()`. Produce no orders rather than a garbage ladder.
        if mid <= 0.0 || lob.best_bid <= 0.0 || lob.best_ask <= 0.0 {
            self.prev_vol = lob.vol;
            self.prev_bid_skew = self.skew(position).0;
            self.prev_ask_skew = self.skew(position).1;
            self.last_mid = mid;
            return Vec::new();
        }

        let (bid_skew, ask_skew) = self.skew(position);
        let vol = lob.vol;
        let (bid_prices, ask_prices) = self.prices(mid, bid_skew, ask_skew, vol);
        let sizes = self.sizes(mid);

        let condition1 = (self.last_mid - mid) > (self.config.epsilon * mid) / 10_000.0;
        let condition2 = false; // volatility gating intentionally disabled
        let condition3 = (self.prev_bid_skew - bid_skew) > (self.config.epsilon * bid_skew) / 10_000.0;
        let condition4 = (self.prev_ask_skew - ask_skew) > (self.config.epsilon * ask_skew) / 10_000.0;

        let mut orders = Vec::new();
        if condition1 || condition2 || condition3 || condition4 || forced {
            if let Some(prices) = &bid_prices {
                for (price, size) in prices.iter().zip(sizes.iter()) {
                    orders.push(Order::new(
                        "", // symbol is filled in by the caller, which owns the config's symbol
                        Side::Buy,
                        OrderType::Limit,
                        round_step(*size, self.config.lot_size),
                        round_step(*price, self.config.tick_size),
                    ));
                }
            }
            if let Some(prices) = &ask_prices {
                for (price, size) in prices.iter().zip(sizes.iter()) {
                    orders.push(Order::new(
                        "",
                        Side::Sell,
                        OrderType::Limit,
                        round_step(*size, self.config.lot_size),
                        round_step(*price, self.config.tick_size),
                    ));
                }
            }
        }

        self.prev_vol = vol;
        self.prev_bid_skew = bid_skew;
        self.prev_ask_skew = ask_skew;
        self.last_mid = mid;

        orders
    }
}

/// `np.linspace(start, end, n)`: `n` evenly spaced points including both
/// endpoints. `n == 0` yields an empty vector; `n == 1` yields `[start]`.
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    if n == 0 {
        return Vec::new();
    }
    if n == 1 {
        return vec![start];
    }
    let step = (end - start) / (n - 1) as f64;
    (0..n).map(|i| start + step * i as f64).collect()
}

/// `[r^0, r^1, ..., r^(n-1)]` normalized to sum to 1.
pub fn geometric_weights(n: usize, r: f64) -> Vec<f64> {
    if n == 0 {
        return Vec::new();
    }
    let raw: Vec<f64> = (0..n).map(|i| r.powi(i as i32)).collect();
    let total: f64 = raw.iter().sum();
    raw.iter().map(|w| w / total).collect()
}

/// `x - (x mod step)`, computed in decimal arithmetic to avoid binary-float
/// drift at the tick boundary (mirrors `Decimal(str(x)) - Decimal(str(x)) %
/// Decimal(str(step))` in the pre-distillation source).
pub fn round_step(x: f64, step: f64) -> f64 {
    if step == 0.0 {
        return x;
    }
    let (Some(dx), Some(dstep)) = (Decimal::from_f64(x), Decimal::from_f64(step)) else {
        return x;
    };
    if dstep.is_zero() {
        return x;
    }
    let remainder = dx % dstep;
    (dx - remainder).to_f64().unwrap_or(x)
}
