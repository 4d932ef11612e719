//! Last-observed best bid/ask/mid and derived relative volatility, per symbol.

use crate::types::{LobSnapshot, OrderbookUpdate, UsdcUsdtUpdate};
use crate::volatility::{VolatilityEstimator, DEFAULT_WINDOW};

pub struct LobManager {
    mid: f64,
    best_bid: f64,
    best_ask: f64,
    vol: f64,
    volatility_estimator: VolatilityEstimator,
    usdcusdt_rate: f64,
}

impl LobManager {
    pub fn new() -> Self {
        Self::with_window(DEFAULT_WINDOW)
    }

    pub fn with_window(window: usize) -> Self {
        Self {
            mid: 0.0,
            best_bid: 0.0,
            best_ask: 0.0,
            vol: 0.0,
            volatility_estimator: VolatilityEstimator::new(window),
            usdcusdt_rate: 1.0,
        }
    }

    /// Sets bid/ask/mid from the normalized update and appends `mid` to the
    /// volatility estimator; `vol` is stored as stdev/mid (relative).
    pub fn update_lob(&mut self, update: &OrderbookUpdate) {
        self.mid = update.mid;
        self.best_bid = update.best_bid.price;
        self.best_ask = update.best_ask.price;
        let stdev = self.volatility_estimator.update(update.mid);
        self.vol = if update.mid != 0.0 { stdev / update.mid } else { 0.0 };
    }

    pub fn update_usdcusdt_rate(&mut self, update: &UsdcUsdtUpdate) {
        self.usdcusdt_rate = update.mid;
    }

    pub fn usdcusdt_rate(&self) -> f64 {
        self.usdcusdt_rate
    }

    pub fn snapshot(&self) -> LobSnapshot {
        LobSnapshot {
            mid: self.mid,
            best_bid: self.best_bid,
            best_ask: self.best_ask,
            vol: self.vol,
        }
    }
}

impl Default for LobManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PriceLevel;

    fn ob(mid: f64) -> OrderbookUpdate {
        OrderbookUpdate {
            mid,
            best_bid: PriceLevel { price: mid - 0.05 },
            best_ask: PriceLevel { price: mid + 0.05 },
        }
    }

    #[test]
    fn first_update_has_zero_relative_vol() {
        let mut lob = LobManager::new();
        lob.update_lob(&ob(100.0));
        let snap = lob.snapshot();
        assert_eq!(snap.mid, 100.0);
        assert_eq!(snap.best_bid, 99.95);
        assert_eq!(snap.best_ask, 100.05);
        assert_eq!(snap.vol, 0.0);
    }

    #[test]
    fn vol_is_normalized_by_mid() {
        let mut lob = LobManager::with_window(3);
        lob.update_lob(&ob(100.0));
        lob.update_lob(&ob(102.0));
        let snap = lob.snapshot();
        assert!(snap.vol > 0.0);
        assert!(snap.vol < 1.0);
    }

    #[test]
    fn usdcusdt_rate_tracked_separately_from_core_quoting_math() {
        let mut lob = LobManager::new();
        lob.update_usdcusdt_rate(&UsdcUsdtUpdate { mid: 0.999 });
        assert_eq!(lob.usdcusdt_rate(), 0.999);
        assert_eq!(lob.snapshot().mid, 0.0);
    }
}
