// src/exchange/client.rs
use crate::domain::errors::ExchangeResult;
use crate::domain::models::{Bar, OrderHandle, OrderIntent, TickEvent};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;

/// Receiver of raw tick events.
///
/// Feeds call `on_tick` from whatever context they deliver on, so
/// implementations must not block.
pub trait TickSink: Send + Sync {
    fn on_tick(&self, event: TickEvent);
}

/// Streaming trade feed for a single symbol at a time.
#[async_trait]
pub trait TickFeed: Send + Sync {
    /// Start delivering ticks for `symbol` to `sink`
    async fn subscribe(&self, symbol: &str, sink: Arc<dyn TickSink>) -> ExchangeResult<()>;

    /// Stop delivering ticks for `symbol`. No tick reaches the previous sink
    /// once this returns.
    async fn unsubscribe(&self, symbol: &str) -> ExchangeResult<()>;
}

/// Brokerage order interface
#[async_trait]
pub trait OrderVenue: Send + Sync {
    /// Place a new order; the returned handle is at least `Submitted`
    async fn submit(&self, intent: &OrderIntent) -> ExchangeResult<OrderHandle>;

    /// Current state of a previously submitted order
    async fn order_status(&self, order_id: &str) -> ExchangeResult<OrderHandle>;
}

/// Daily bar history service
#[async_trait]
pub trait HistoricalDataSource: Send + Sync {
    /// Bars for the `lookback_days` trading days ending before `as_of`.
    /// An empty vector means no data, not an error.
    async fn fetch_bars(
        &self,
        symbol: &str,
        as_of: NaiveDate,
        lookback_days: u32,
    ) -> ExchangeResult<Vec<Bar>>;
}
