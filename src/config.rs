//! Typed configuration tree, loaded from a YAML file plus `.env`-sourced
//! credential overrides, matching the reference crate's existing
//! `dotenvy`-based bootstrap and the pre-distillation source's own
//! `config/base_config.yaml` (`config["mm"]["symbols"]`, `config["mm"]["symbol_params"]`).

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;

use serde::Deserialize;

#[derive(Debug)]
pub enum ConfigError {
    Io(String),
    Parse(String),
    MissingSymbol(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(m) => write!(f, "failed to read config file: {m}"),
            ConfigError::Parse(m) => write!(f, "failed to parse config file: {m}"),
            ConfigError::MissingSymbol(s) => write!(f, "symbol {s} listed in mm.symbols has no symbol_params entry"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// One symbol's quoting/OMS parameters (§6 "Configuration").
#[derive(Debug, Clone, Deserialize)]
pub struct SymbolConfig {
    pub num_orders: usize,
    pub tp_distance: f64,
    pub tick_size: f64,
    pub lot_size: f64,
    pub spread_bps: f64,
    pub gross_exposure_dollars: f64,
    pub epsilon: f64,
    pub inventory_max_dollars: f64,
    pub min_requote_interval: u64,
    #[serde(default = "default_geometric_ratio")]
    pub geometric_ratio: f64,
}

fn default_geometric_ratio() -> f64 {
    0.6
}

#[derive(Debug, Clone, Deserialize)]
pub struct MmSection {
    pub symbols: Vec<String>,
    pub symbol_params: HashMap<String, SymbolConfig>,
}

/// Top-level config tree. API credentials are intentionally not modeled
/// here: they are opaque to the core (§6) and are read directly from the
/// process environment (populated by `dotenvy::dotenv()` in `main`) at
/// driver-construction time, never stored in this struct.
#[derive(Debug, Clone, Deserialize)]
pub struct MmConfig {
    pub mm: MmSection,
}

impl MmConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let config: MmConfig = serde_yaml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        for symbol in &config.mm.symbols {
            if !config.mm.symbol_params.contains_key(symbol) {
                return Err(ConfigError::MissingSymbol(symbol.clone()));
            }
        }
        Ok(config)
    }

    pub fn symbol_config(&self, symbol: &str) -> Option<&SymbolConfig> {
        self.mm.symbol_params.get(symbol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
mm:
  symbols: ["BTC", "ETH"]
  symbol_params:
    BTC:
      num_orders: 4
      tp_distance: 10.0
      tick_size: 0.1
      lot_size: 0.001
      spread_bps: 10.0
      gross_exposure_dollars: 1000.0
      epsilon: 1.0
      inventory_max_dollars: 10000.0
      min_requote_interval: 250
    ETH:
      num_orders: 6
      tp_distance: 8.0
      tick_size: 0.01
      lot_size: 0.01
      spread_bps: 12.0
      gross_exposure_dollars: 500.0
      epsilon: 1.0
      inventory_max_dollars: 5000.0
      min_requote_interval: 250
      geometric_ratio: 0.5
"#;

    #[test]
    fn parses_symbols_and_per_symbol_params() {
        let cfg = MmConfig::parse(SAMPLE).unwrap();
        assert_eq!(cfg.mm.symbols, vec!["BTC", "ETH"]);
        let btc = cfg.symbol_config("BTC").unwrap();
        assert_eq!(btc.num_orders, 4);
        assert_eq!(btc.geometric_ratio, 0.6);
        let eth = cfg.symbol_config("ETH").unwrap();
        assert_eq!(eth.geometric_ratio, 0.5);
    }

    #[test]
    fn missing_symbol_params_is_an_error() {
        let bad = r#"
mm:
  symbols: ["BTC"]
  symbol_params: {}
"#;
        let err = MmConfig::parse(bad).unwrap_err();
        assert!(matches!(err, ConfigError::MissingSymbol(_)));
    }

    #[test]
    fn unknown_symbol_lookup_is_none() {
        let cfg = MmConfig::parse(SAMPLE).unwrap();
        assert!(cfg.symbol_config("SOL").is_none());
    }
}
