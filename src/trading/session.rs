// src/trading/session.rs
use crate::analysis::metrics::{compute_metrics, Metrics};
use crate::config::Config;
use crate::domain::errors::{AppResult, MarketDataError, TradingError};
use crate::domain::models::{Bar, OrderHandle, OrderIntent, WindowStats};
use crate::exchange::client::{HistoricalDataSource, OrderVenue, TickFeed};
use crate::market_data::live_state::live_state;
use crate::market_data::window_loop::WindowedMetricsLoop;
use crate::storage::{HistoricalStore, LiveWindowRecorder};
use crate::trading::execution::{ExecutionParameters, OrderExecutor};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};

/// Everything the decision logic gets to look at on one iteration
#[derive(Debug)]
pub struct DecisionContext<'a> {
    pub symbol: &'a str,
    pub now: DateTime<Utc>,
    pub live: Option<WindowStats>,
    pub metrics: Metrics,
    pub history: &'a [Bar],
}

/// The trading signal. Opaque to the session: it only turns a context into
/// an optional order intent and hears back about the outcome.
pub trait TradingAlgorithm: Send {
    fn decide(&mut self, ctx: &DecisionContext<'_>) -> Option<OrderIntent>;

    fn on_order(&mut self, _handle: &OrderHandle) {}
}

/// Never trades; logs what it sees.
#[derive(Debug, Default)]
pub struct ObserveOnly;

impl TradingAlgorithm for ObserveOnly {
    fn decide(&mut self, ctx: &DecisionContext<'_>) -> Option<OrderIntent> {
        if let Some(live) = &ctx.live {
            log::debug!(
                "{} live vwap={:?} vol={:?} metrics={:?}",
                ctx.symbol,
                live.vwap,
                live.volatility,
                ctx.metrics
            );
        }
        None
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub windows_published: usize,
    pub orders_completed: usize,
}

/// Top-level decision loop wiring the metrics loop, the bar store and the
/// order executor together.
pub struct TradingSession {
    config: Config,
    feed: Arc<dyn TickFeed>,
    history_source: Arc<dyn HistoricalDataSource>,
    executor: OrderExecutor<dyn OrderVenue>,
    store: HistoricalStore,
}

impl TradingSession {
    pub fn new(
        config: Config,
        feed: Arc<dyn TickFeed>,
        venue: Arc<dyn OrderVenue>,
        history_source: Arc<dyn HistoricalDataSource>,
    ) -> Self {
        let params = ExecutionParameters {
            poll_interval: config.trading.poll_interval(),
            fill_timeout: config.trading.fill_timeout(),
        };
        let store = HistoricalStore::new(&config.storage.historical_path);

        Self {
            config,
            feed,
            history_source,
            executor: OrderExecutor::with_parameters(venue, params),
            store,
        }
    }

    pub fn store(&self) -> &HistoricalStore {
        &self.store
    }

    /// Fetch recent bars, merge them into the store and return the stored
    /// history. Fetch and persistence failures are logged; the best
    /// available bars are returned regardless.
    pub async fn refresh_history(&self, as_of: NaiveDate) -> Vec<Bar> {
        let symbol = &self.config.trading.symbol;
        let fetched = match self
            .history_source
            .fetch_bars(symbol, as_of, self.config.trading.lookback_days)
            .await
        {
            Ok(bars) => bars,
            Err(source) => {
                let err = MarketDataError::HistoricalFetch {
                    symbol: symbol.clone(),
                    source,
                };
                log::error!("{}", err);
                Vec::new()
            }
        };

        match (fetched.first(), fetched.last()) {
            (Some(first), Some(last)) => log::info!(
                "Fetched historical data {} - {} ({} bars)",
                first.date,
                last.date,
                fetched.len()
            ),
            _ => log::warn!("No historical bars returned for {}", symbol),
        }

        if let Err(e) = self.store.merge(&fetched) {
            log::error!("Failed to persist historical bars: {}", e);
        }

        match self.store.load() {
            Ok(stored) if !stored.is_empty() => stored,
            Ok(_) => fetched,
            Err(e) => {
                log::error!("Failed to read historical store: {}", e);
                fetched
            }
        }
    }

    /// Run until `shutdown` flips to true or submissions keep failing.
    pub async fn run<A: TradingAlgorithm>(
        &self,
        algorithm: &mut A,
        mut shutdown: watch::Receiver<bool>,
    ) -> AppResult<SessionSummary> {
        let trading = &self.config.trading;
        let mut history_date = Utc::now().date_naive();
        let mut history = self.refresh_history(history_date).await;

        let (publisher, reader) = live_state();
        let (stop_tx, stop_rx) = watch::channel(false);
        let mut metrics_loop = WindowedMetricsLoop::new(self.feed.clone(), &trading.symbol, publisher)
            .with_window(trading.window());
        if let Some(path) = &self.config.storage.live_path {
            metrics_loop = metrics_loop.with_recorder(LiveWindowRecorder::new(path));
        }
        let metrics_handle = metrics_loop.spawn(stop_rx);

        let mut ticker = interval(trading.decision_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut consecutive_failures = 0u32;
        let mut orders_completed = 0usize;
        let mut outcome: AppResult<()> = Ok(());

        log::info!("Trading session for {} running", trading.symbol);
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        log::info!("Trading loop interrupted by operator");
                        break;
                    }
                    continue;
                }
            }

            let now = Utc::now();
            if now.date_naive() != history_date {
                history_date = now.date_naive();
                history = self.refresh_history(history_date).await;
            }

            let live = reader.latest();
            let metrics = compute_metrics(&history, live.as_ref(), now.weekday());
            let ctx = DecisionContext {
                symbol: &trading.symbol,
                now,
                live,
                metrics,
                history: &history,
            };

            let Some(intent) = algorithm.decide(&ctx) else {
                continue;
            };

            match self.executor.execute(&intent).await {
                Ok(handle) => {
                    consecutive_failures = 0;
                    orders_completed += 1;
                    algorithm.on_order(&handle);
                }
                Err(TradingError::Submission(e)) => {
                    consecutive_failures += 1;
                    log::error!(
                        "Order submission failed ({}/{}): {}",
                        consecutive_failures,
                        trading.max_submission_failures,
                        e
                    );
                    if consecutive_failures >= trading.max_submission_failures {
                        outcome = Err(TradingError::Submission(e).into());
                        break;
                    }
                }
                Err(e) => log::error!("Order for {} failed: {}", intent.symbol, e),
            }
        }

        // The metrics loop unsubscribes before it returns
        let _ = stop_tx.send(true);
        let windows_published = match metrics_handle.await {
            Ok(count) => count,
            Err(e) => {
                log::error!("Metrics loop task failed: {}", e);
                0
            }
        };

        outcome.map(|_| SessionSummary {
            windows_published,
            orders_completed,
        })
    }
}
