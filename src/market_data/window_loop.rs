// src/market_data/window_loop.rs
use crate::domain::errors::MarketDataError;
use crate::domain::models::WindowStats;
use crate::exchange::client::TickFeed;
use crate::market_data::aggregator::TickAggregator;
use crate::market_data::live_state::LivePublisher;
use crate::storage::LiveWindowRecorder;
use chrono::Utc;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Duration, Instant};

pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug)]
enum WindowOutcome {
    Completed(WindowStats),
    Abandoned(MarketDataError),
    Stopped,
}

/// Drives back-to-back, non-overlapping aggregation windows over a tick
/// feed and publishes each finished window to the live slot.
pub struct WindowedMetricsLoop<F: TickFeed + ?Sized> {
    feed: Arc<F>,
    symbol: String,
    window: Duration,
    publisher: LivePublisher,
    recorder: Option<LiveWindowRecorder>,
}

impl<F: TickFeed + ?Sized + 'static> WindowedMetricsLoop<F> {
    pub fn new(feed: Arc<F>, symbol: &str, publisher: LivePublisher) -> Self {
        Self {
            feed,
            symbol: symbol.to_string(),
            window: DEFAULT_WINDOW,
            publisher,
            recorder: None,
        }
    }

    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Also append every completed window to a summary file
    pub fn with_recorder(mut self, recorder: LiveWindowRecorder) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<usize> {
        tokio::spawn(self.run(shutdown))
    }

    /// Run windows until `shutdown` becomes true (or its sender is dropped).
    /// Returns the number of windows published.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> usize {
        log::info!(
            "Starting {}s metrics windows for {}",
            self.window.as_secs_f64(),
            self.symbol
        );

        let mut published = 0;
        loop {
            match self.run_window(&mut shutdown).await {
                WindowOutcome::Completed(stats) => {
                    self.publish(stats);
                    published += 1;
                }
                WindowOutcome::Abandoned(e) => {
                    log::error!("Window abandoned: {}", e);
                }
                WindowOutcome::Stopped => break,
            }
        }

        log::info!(
            "Metrics loop for {} stopped after {} windows",
            self.symbol,
            published
        );
        published
    }

    async fn run_window(&self, shutdown: &mut watch::Receiver<bool>) -> WindowOutcome {
        let aggregator = Arc::new(Mutex::new(TickAggregator::new(Utc::now())));
        let deadline = Instant::now() + self.window;

        if let Err(source) = self.feed.subscribe(&self.symbol, aggregator.clone()).await {
            // Sit out the window so a dead feed is not hammered
            if wait_until(deadline, shutdown).await {
                return WindowOutcome::Stopped;
            }
            return WindowOutcome::Abandoned(MarketDataError::Subscription {
                symbol: self.symbol.clone(),
                source,
            });
        }

        let stopped = wait_until(deadline, shutdown).await;

        // Must finish before the next window subscribes
        if let Err(source) = self.feed.unsubscribe(&self.symbol).await {
            let err = MarketDataError::Unsubscription {
                symbol: self.symbol.clone(),
                source,
            };
            if stopped {
                log::error!("{}", err);
                return WindowOutcome::Stopped;
            }
            return WindowOutcome::Abandoned(err);
        }

        if stopped {
            return WindowOutcome::Stopped;
        }

        let stats = aggregator
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .finalize(Utc::now());
        WindowOutcome::Completed(stats)
    }

    fn publish(&self, stats: WindowStats) {
        match stats.vwap {
            Some(vwap) => log::info!(
                "{} window VWAP {:.2} over {} ticks (volatility {})",
                self.symbol,
                vwap,
                stats.tick_count,
                stats
                    .volatility
                    .map(|v| format!("{:.4}", v))
                    .unwrap_or_else(|| "n/a".to_string())
            ),
            None => log::warn!("No trades for {} in the last window", self.symbol),
        }

        if let Some(recorder) = &self.recorder {
            if let Err(e) = recorder.append(&stats) {
                log::error!("Failed to record window summary: {}", e);
            }
        }

        self.publisher.publish(stats);
    }
}

/// Sleep until `deadline`. Returns true if shutdown was requested first.
async fn wait_until(deadline: Instant, shutdown: &mut watch::Receiver<bool>) -> bool {
    loop {
        if *shutdown.borrow_and_update() {
            return true;
        }
        tokio::select! {
            _ = sleep_until(deadline) => return false,
            changed = shutdown.changed() => {
                if changed.is_err() {
                    return true;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::{ExchangeError, ExchangeResult};
    use crate::domain::models::TickEvent;
    use crate::exchange::client::TickSink;
    use crate::exchange::paper::PaperBroker;
    use crate::market_data::live_state::live_state;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    async fn wait_for_subscription(broker: &PaperBroker, symbol: &str) {
        while !broker.is_subscribed(symbol) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn publishes_window_stats_and_unsubscribes_on_stop() {
        let broker = Arc::new(PaperBroker::new());
        let (publisher, reader) = live_state();
        let (stop_tx, stop_rx) = watch::channel(false);

        let handle = WindowedMetricsLoop::new(broker.clone(), "SPY", publisher)
            .with_window(Duration::from_secs(60))
            .spawn(stop_rx);

        wait_for_subscription(&broker, "SPY").await;
        for (price, size) in [(dec!(10), 100), (dec!(12), 50), (dec!(11), 50)] {
            broker.publish("SPY", TickEvent::trade(price, size, Utc::now()));
        }

        while reader.latest().is_none() {
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
        let stats = reader.latest().unwrap();
        assert_eq!(stats.vwap, Some(dec!(10.75)));
        assert_eq!(stats.volatility.map(|v| v.round_dp(10)), Some(dec!(1)));

        stop_tx.send(true).unwrap();
        let published = handle.await.unwrap();
        assert!(published >= 1);
        assert!(!broker.is_subscribed("SPY"));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_mid_window_discards_the_partial_window() {
        let broker = Arc::new(PaperBroker::new());
        let (publisher, reader) = live_state();
        let (stop_tx, stop_rx) = watch::channel(false);

        let handle = WindowedMetricsLoop::new(broker.clone(), "SPY", publisher).spawn(stop_rx);
        wait_for_subscription(&broker, "SPY").await;
        broker.publish("SPY", TickEvent::trade(dec!(10), 1, Utc::now()));

        stop_tx.send(true).unwrap();
        assert_eq!(handle.await.unwrap(), 0);
        assert!(reader.latest().is_none());
        assert!(!broker.is_subscribed("SPY"));
    }

    /// Fails the first subscribe, then delegates to the paper broker
    struct FlakyFeed {
        inner: PaperBroker,
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl TickFeed for FlakyFeed {
        async fn subscribe(&self, symbol: &str, sink: Arc<dyn TickSink>) -> ExchangeResult<()> {
            if self.attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(ExchangeError::Connection("feed not ready".to_string()));
            }
            self.inner.subscribe(symbol, sink).await
        }

        async fn unsubscribe(&self, symbol: &str) -> ExchangeResult<()> {
            self.inner.unsubscribe(symbol).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn failed_subscription_does_not_kill_the_loop() {
        let feed = Arc::new(FlakyFeed {
            inner: PaperBroker::new(),
            attempts: AtomicUsize::new(0),
        });
        let (publisher, reader) = live_state();
        let (stop_tx, stop_rx) = watch::channel(false);

        let handle = WindowedMetricsLoop::new(feed.clone(), "QQQ", publisher)
            .with_window(Duration::from_secs(5))
            .spawn(stop_rx);

        wait_for_subscription(&feed.inner, "QQQ").await;
        assert!(feed.attempts.load(Ordering::SeqCst) >= 2);
        feed.inner
            .publish("QQQ", TickEvent::trade(dec!(400), 10, Utc::now()));

        while reader.latest().is_none() {
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
        assert_eq!(reader.latest_vwap(), Some(dec!(400)));

        stop_tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn completed_windows_are_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let broker = Arc::new(PaperBroker::new());
        let (publisher, reader) = live_state();
        let (stop_tx, stop_rx) = watch::channel(false);
        let recorder = LiveWindowRecorder::new(dir.path().join("live.csv"));

        let handle = WindowedMetricsLoop::new(broker.clone(), "SPY", publisher)
            .with_window(Duration::from_secs(1))
            .with_recorder(recorder.clone())
            .spawn(stop_rx);

        while reader.latest().is_none() {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        stop_tx.send(true).unwrap();
        handle.await.unwrap();

        let text = std::fs::read_to_string(recorder.path()).unwrap();
        assert!(text.starts_with("date,day_of_week,start_time"));
        assert!(text.lines().count() >= 2);
    }

    /// Fails the first unsubscribe (after dropping the sink) and counts any
    /// subscribe issued while a previous subscription is still open
    struct StrictFeed {
        inner: PaperBroker,
        active: AtomicBool,
        overlaps: AtomicUsize,
        subscribes: AtomicUsize,
        unsubscribes: AtomicUsize,
    }

    impl StrictFeed {
        fn new() -> Self {
            Self {
                inner: PaperBroker::new(),
                active: AtomicBool::new(false),
                overlaps: AtomicUsize::new(0),
                subscribes: AtomicUsize::new(0),
                unsubscribes: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl TickFeed for StrictFeed {
        async fn subscribe(&self, symbol: &str, sink: Arc<dyn TickSink>) -> ExchangeResult<()> {
            self.subscribes.fetch_add(1, Ordering::SeqCst);
            if self.active.swap(true, Ordering::SeqCst) {
                self.overlaps.fetch_add(1, Ordering::SeqCst);
            }
            self.inner.subscribe(symbol, sink).await
        }

        async fn unsubscribe(&self, symbol: &str) -> ExchangeResult<()> {
            self.active.store(false, Ordering::SeqCst);
            self.inner.unsubscribe(symbol).await?;
            if self.unsubscribes.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(ExchangeError::Connection("cancel not acknowledged".to_string()));
            }
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn failed_unsubscribe_and_recorder_errors_do_not_stop_the_loop() {
        let dir = tempfile::tempdir().unwrap();
        let feed = Arc::new(StrictFeed::new());
        let (publisher, reader) = live_state();
        let (stop_tx, stop_rx) = watch::channel(false);

        // A directory cannot be appended to, so every record attempt fails
        let handle = WindowedMetricsLoop::new(feed.clone(), "SPY", publisher)
            .with_window(Duration::from_secs(2))
            .with_recorder(LiveWindowRecorder::new(dir.path()))
            .spawn(stop_rx);

        wait_for_subscription(&feed.inner, "SPY").await;
        feed.inner
            .publish("SPY", TickEvent::trade(dec!(50), 10, Utc::now()));

        // windows end at 2s, 4s, 6s and 8s; the stop lands mid-window
        tokio::time::sleep(Duration::from_secs(9)).await;
        stop_tx.send(true).unwrap();
        let published = handle.await.unwrap();

        // first window dropped by the failed unsubscribe, the rest published
        assert_eq!(published, 3);
        let latest = reader.latest().unwrap();
        assert_eq!(latest.tick_count, 0);
        assert_eq!(latest.vwap, None);

        assert_eq!(feed.overlaps.load(Ordering::SeqCst), 0);
        assert_eq!(
            feed.subscribes.load(Ordering::SeqCst),
            feed.unsubscribes.load(Ordering::SeqCst)
        );
        assert!(!feed.inner.is_subscribed("SPY"));
    }
}
