// src/main.rs
use vwap_trader::config::Config;
use vwap_trader::domain::errors::AppResult;
use vwap_trader::exchange::paper::PaperBroker;
use vwap_trader::exchange::replay::{load_replay_ticks, spawn_replay};
use vwap_trader::storage::HistoricalStore;
use vwap_trader::trading::{ObserveOnly, TradingSession};

use std::sync::Arc;
use tokio::signal::ctrl_c;
use tokio::sync::watch;
use tokio::time::Duration;

#[tokio::main]
async fn main() -> AppResult<()> {
    // Load configuration: explicit JSON file first, environment otherwise
    let config = match std::env::args().nth(1) {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };

    // Initialize logging
    config.init_logging()?;

    log::info!("Starting vwap_trader v{}", env!("CARGO_PKG_VERSION"));
    log::info!(
        "Trading {} with {}s windows",
        config.trading.symbol,
        config.trading.window_secs
    );

    // Paper broker stands in for the brokerage session
    let mut broker = PaperBroker::new();
    if let Some(seed) = &config.paper.history_seed_path {
        let bars = HistoricalStore::new(seed).load()?;
        log::info!("Seeded {} historical bars from {}", bars.len(), seed);
        broker = broker.with_history(bars);
    }
    let broker = Arc::new(broker);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let replay_handle = match &config.paper.tick_replay_path {
        Some(path) => {
            let ticks = load_replay_ticks(path)?;
            Some(spawn_replay(
                broker.clone(),
                config.trading.symbol.clone(),
                ticks,
                Duration::from_millis(config.paper.tick_delay_ms),
                shutdown_rx.clone(),
            ))
        }
        None => {
            log::warn!("No TICK_REPLAY_PATH set; live windows will stay empty");
            None
        }
    };

    // Wait for shutdown signal
    tokio::spawn(async move {
        match ctrl_c().await {
            Ok(()) => log::info!("Interrupt received, shutting down..."),
            Err(e) => log::error!("Failed to listen for control-c event: {}", e),
        }
        let _ = shutdown_tx.send(true);
    });

    let session = TradingSession::new(config, broker.clone(), broker.clone(), broker);
    let result = session.run(&mut ObserveOnly, shutdown_rx).await;

    if let Some(handle) = replay_handle {
        handle.abort();
    }

    match result {
        Ok(summary) => {
            log::info!(
                "Shutdown complete: {} windows published, {} orders completed",
                summary.windows_published,
                summary.orders_completed
            );
            Ok(())
        }
        Err(e) => {
            log::error!("Trading session ended with error: {}", e);
            Err(e)
        }
    }
}
