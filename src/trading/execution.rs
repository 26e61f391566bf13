// src/trading/execution.rs
use crate::domain::errors::{TradingError, TradingResult};
use crate::domain::models::{OrderAction, OrderHandle, OrderIntent, OrderKind};
use crate::exchange::client::OrderVenue;
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::time::{sleep, Duration, Instant};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);
pub const DEFAULT_FILL_TIMEOUT: Duration = Duration::from_secs(300);

/// Timing for the market-order wait
#[derive(Debug, Clone, Copy)]
pub struct ExecutionParameters {
    pub poll_interval: Duration,
    pub fill_timeout: Duration,
}

impl Default for ExecutionParameters {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            fill_timeout: DEFAULT_FILL_TIMEOUT,
        }
    }
}

/// Submits order intents and follows them to a terminal state.
///
/// Market orders are awaited until Filled / Cancelled / Rejected; limit
/// orders are returned as soon as the venue accepts them. Nothing is
/// retried here: every venue failure goes back to the caller.
pub struct OrderExecutor<V: OrderVenue + ?Sized> {
    venue: Arc<V>,
    params: ExecutionParameters,
}

impl<V: OrderVenue + ?Sized> OrderExecutor<V> {
    pub fn new(venue: Arc<V>) -> Self {
        Self::with_parameters(venue, ExecutionParameters::default())
    }

    pub fn with_parameters(venue: Arc<V>, params: ExecutionParameters) -> Self {
        Self { venue, params }
    }

    /// Place a market order and wait for its outcome
    pub async fn place_market_order(
        &self,
        symbol: &str,
        action: OrderAction,
        quantity: i64,
    ) -> TradingResult<OrderHandle> {
        self.execute(&OrderIntent::market(symbol, action, quantity)).await
    }

    /// Place a limit order and return without waiting for a fill
    pub async fn place_limit_order(
        &self,
        symbol: &str,
        action: OrderAction,
        quantity: i64,
        price: Decimal,
    ) -> TradingResult<OrderHandle> {
        self.execute(&OrderIntent::limit(symbol, action, quantity, price)).await
    }

    /// Validate, submit and (for market orders) wait for a terminal state
    pub async fn execute(&self, intent: &OrderIntent) -> TradingResult<OrderHandle> {
        validate_intent(intent)?;

        let handle = self
            .venue
            .submit(intent)
            .await
            .map_err(TradingError::Submission)?;

        log::info!(
            "Placed {} {} order for {} {} (id {})",
            intent.kind,
            intent.action,
            intent.symbol,
            intent.quantity,
            handle.id
        );

        match intent.kind {
            OrderKind::Market => self.wait_for_completion(handle).await,
            OrderKind::Limit(_) => Ok(handle),
        }
    }

    /// Current venue state of an order, for callers tracking limit orders
    pub async fn order_status(&self, order_id: &str) -> TradingResult<OrderHandle> {
        self.venue
            .order_status(order_id)
            .await
            .map_err(|source| TradingError::StatusPoll {
                order_id: order_id.to_string(),
                source,
            })
    }

    async fn wait_for_completion(&self, mut handle: OrderHandle) -> TradingResult<OrderHandle> {
        let started = Instant::now();

        while !handle.is_done() {
            if started.elapsed() >= self.params.fill_timeout {
                log::error!(
                    "Order {} still {} after {:?}",
                    handle.id,
                    handle.status,
                    self.params.fill_timeout
                );
                return Err(TradingError::FillTimeout {
                    order_id: handle.id,
                    waited_ms: started.elapsed().as_millis(),
                });
            }
            sleep(self.params.poll_interval).await;
            handle = self.order_status(&handle.id).await?;
        }

        match handle.fill_price {
            Some(price) => log::info!("Order {} {} @ {:.2}", handle.id, handle.status, price),
            None => log::warn!("Order {} finished as {}", handle.id, handle.status),
        }
        Ok(handle)
    }
}

fn validate_intent(intent: &OrderIntent) -> TradingResult<()> {
    if intent.symbol.trim().is_empty() {
        return Err(TradingError::InvalidOrder("symbol is empty".to_string()));
    }
    if intent.quantity <= 0 {
        return Err(TradingError::InvalidOrder(format!(
            "quantity must be positive, got {}",
            intent.quantity
        )));
    }
    if let OrderKind::Limit(price) = intent.kind {
        if price <= Decimal::ZERO {
            return Err(TradingError::InvalidOrder(format!(
                "limit price must be positive, got {}",
                price
            )));
        }
    }
    Ok(())
}
