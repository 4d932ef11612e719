//! mm-engine-rs: per-symbol market-making engine.
//!
//! Boots one `SymbolWorker` task per configured symbol against a shared
//! `EventBus` and a shared `Exchange` client, matching the pre-distillation
//! source's `main.py` (`MultiEventBus(symbols)`, one `MarketMaker` task per
//! symbol, `asyncio.gather`'d alongside the stream driver) and this crate's
//! own one-task-per-concern style inherited from the reference crate.

mod config;
mod event_bus;
mod exchange;
mod lob;
mod oms;
mod position;
mod quoter;
mod stream;
mod types;
mod volatility;
mod worker;

use std::env;
use std::sync::Arc;

use config::MmConfig;
use event_bus::{EventBus, SharedEventBus};
use exchange::{Exchange, SimExchange};
use stream::{DevStreamProvider, StreamProvider};
use worker::{SymbolWorker, SymbolWorkerConfig};

fn worker_config(symbol: &str, params: &config::SymbolConfig) -> SymbolWorkerConfig {
    SymbolWorkerConfig {
        symbol: symbol.to_string(),
        num_orders: params.num_orders,
        tp_distance: params.tp_distance,
        tick_size: params.tick_size,
        lot_size: params.lot_size,
        spread_bps: params.spread_bps,
        gross_exposure_dollars: params.gross_exposure_dollars,
        epsilon: params.epsilon,
        inventory_max_dollars: params.inventory_max_dollars,
        min_requote_interval_ms: params.min_requote_interval as i64,
        geometric_ratio: params.geometric_ratio,
    }
}

#[tokio::main]
async fn main() {
    // Credentials are supplied via config file / environment (§6); `.env`
    // is loaded first so a driver constructed below can read them. Missing
    // `.env` is not an error — the same bootstrap style as the reference
    // crate's `main.rs`.
    dotenvy::dotenv().ok();
    env_logger::init();

    let config_path = env::var("MM_CONFIG_PATH").unwrap_or_else(|_| "config/base_config.yaml".to_string());
    let config = match MmConfig::load(&config_path) {
        Ok(c) => c,
        Err(e) => {
            log::error!("failed to load config from {}: {}", config_path, e);
            std::process::exit(1);
        }
    };

    log::info!("mm-engine-rs starting for symbols: {:?}", config.mm.symbols);

    // The Exchange client is shared across every worker (§5: "must be
    // internally safe for concurrent requests"). The real venue-specific
    // REST/WebSocket driver is out of scope (§1); `SimExchange` is the
    // runnable default and is what tests exercise against.
    let exchange: Arc<dyn Exchange> = Arc::new(SimExchange::new());
    if let Err(e) = exchange.load_markets().await {
        log::error!("load_markets failed: {}", e);
        std::process::exit(1);
    }

    let bus: SharedEventBus = Arc::new(EventBus::new(config.mm.symbols.iter().cloned()));

    let stream_provider: Arc<dyn StreamProvider> = Arc::new(DevStreamProvider::default());
    for symbol in &config.mm.symbols {
        if let Err(e) = stream_provider.subscribe_orderbook(&bus, symbol).await {
            log::error!("subscribe_orderbook({symbol}) failed: {e}");
        }
    }
    if let Err(e) = stream_provider.subscribe_account(&bus, &config.mm.symbols).await {
        log::error!("subscribe_account failed: {e}");
    }

    let mut handles = Vec::new();
    for symbol in &config.mm.symbols {
        let params = match config.symbol_config(symbol) {
            Some(p) => p.clone(),
            None => {
                log::error!("no symbol_params entry for {symbol}, skipping");
                continue;
            }
        };
        let worker = SymbolWorker::new(worker_config(symbol, &params), bus.clone(), exchange.clone());
        handles.push(tokio::spawn(worker.run()));
    }

    for handle in handles {
        if let Err(e) = handle.await {
            log::error!("symbol worker task panicked: {e}");
        }
    }
}
