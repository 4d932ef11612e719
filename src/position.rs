//! Per-symbol signed net position value (USD).

use std::collections::HashMap;

use crate::types::PositionUpdate;

pub struct PositionManager {
    positions: HashMap<String, f64>,
    inventory_max_dollars: f64,
}

impl PositionManager {
    pub fn new(inventory_max_dollars: f64) -> Self {
        Self {
            positions: HashMap::new(),
            inventory_max_dollars,
        }
    }

    /// For each record with `status == "CLOSED"`, drops the symbol;
    /// otherwise sets `net = value * side`. Logs (does not block) when
    /// `|value|` exceeds `inventory_max_dollars`.
    pub fn update_positions(&mut self, updates: &[PositionUpdate]) {
        for update in updates {
            if update.status.as_deref() == Some("CLOSED") {
                self.positions.remove(&update.symbol);
                continue;
            }
            let value = update.position.value;
            if value.abs() > self.inventory_max_dollars {
                log::warn!(
                    "position {} for {} exceeds inventory_max_dollars ({} > {})",
                    value,
                    update.symbol,
                    value.abs(),
                    self.inventory_max_dollars
                );
            }
            let net = value * update.position.side;
            self.positions.insert(update.symbol.clone(), net);
        }
    }

    pub fn get_position(&self, symbol: &str) -> f64 {
        self.positions.get(symbol).copied().unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PositionRecord;

    fn update(symbol: &str, value: f64, side: f64, status: Option<&str>) -> PositionUpdate {
        PositionUpdate {
            symbol: symbol.to_string(),
            status: status.map(|s| s.to_string()),
            position: PositionRecord { value, side },
        }
    }

    #[test]
    fn absent_symbol_returns_zero() {
        let pm = PositionManager::new(10_000.0);
        assert_eq!(pm.get_position("BTC"), 0.0);
    }

    #[test]
    fn net_is_value_times_side() {
        let mut pm = PositionManager::new(10_000.0);
        pm.update_positions(&[update("BTC", 500.0, -1.0, None)]);
        assert_eq!(pm.get_position("BTC"), -500.0);
    }

    #[test]
    fn closed_status_removes_entry() {
        let mut pm = PositionManager::new(10_000.0);
        pm.update_positions(&[update("BTC", 500.0, 1.0, None)]);
        assert_eq!(pm.get_position("BTC"), 500.0);
        pm.update_positions(&[update("BTC", 0.0, 1.0, Some("CLOSED"))]);
        assert_eq!(pm.get_position("BTC"), 0.0);
    }

    #[test]
    fn over_limit_does_not_block_update() {
        let mut pm = PositionManager::new(1_000.0);
        pm.update_positions(&[update("BTC", 5_000.0, 1.0, None)]);
        assert_eq!(pm.get_position("BTC"), 5_000.0);
    }
}
