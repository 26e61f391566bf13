// src/exchange/paper.rs
use crate::domain::errors::{ExchangeError, ExchangeResult};
use crate::domain::models::{Bar, OrderAction, OrderHandle, OrderIntent, OrderKind, OrderStatus, TickEvent};
use crate::exchange::client::{HistoricalDataSource, OrderVenue, TickFeed, TickSink};
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Clone)]
struct PaperOrder {
    handle: OrderHandle,
    kind: OrderKind,
    polls: u32,
}

/// In-process stand-in for a brokerage session.
///
/// Ticks are pushed in with [`PaperBroker::publish`]. Market orders fill at
/// the last traded price after `fill_after_polls` status requests; limit
/// orders rest until a published trade crosses their price.
pub struct PaperBroker {
    subscriptions: Mutex<HashMap<String, Arc<dyn TickSink>>>,
    last_prices: Mutex<HashMap<String, Decimal>>,
    orders: Mutex<HashMap<String, PaperOrder>>,
    history: Vec<Bar>,
    next_order_id: AtomicU64,
    fill_after_polls: u32,
    rejecting: AtomicBool,
}

impl Default for PaperBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl PaperBroker {
    pub fn new() -> Self {
        Self {
            subscriptions: Mutex::new(HashMap::new()),
            last_prices: Mutex::new(HashMap::new()),
            orders: Mutex::new(HashMap::new()),
            history: Vec::new(),
            next_order_id: AtomicU64::new(1),
            fill_after_polls: 1,
            rejecting: AtomicBool::new(false),
        }
    }

    /// Seed the bars served by [`HistoricalDataSource::fetch_bars`]
    pub fn with_history(mut self, mut bars: Vec<Bar>) -> Self {
        bars.sort_by_key(|b| b.date);
        self.history = bars;
        self
    }

    /// Number of status polls before a market order fills
    pub fn with_fill_after_polls(mut self, polls: u32) -> Self {
        self.fill_after_polls = polls;
        self
    }

    /// Make every subsequent submission fail at the venue
    pub fn set_rejecting(&self, rejecting: bool) {
        self.rejecting.store(rejecting, Ordering::SeqCst);
    }

    pub fn is_subscribed(&self, symbol: &str) -> bool {
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(symbol)
    }

    pub fn last_price(&self, symbol: &str) -> Option<Decimal> {
        self.last_prices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(symbol)
            .copied()
    }

    /// Deliver a tick to the current subscriber (if any) and match resting
    /// limit orders against it.
    pub fn publish(&self, symbol: &str, event: TickEvent) {
        if let Some(price) = event.last {
            self.last_prices
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(symbol.to_string(), price);
            self.match_limits(symbol, price);
        }

        // Held across the callback so nothing is delivered after unsubscribe returns
        let subscriptions = self.subscriptions.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(sink) = subscriptions.get(symbol) {
            sink.on_tick(event);
        }
    }

    /// Cancel a resting order. Terminal orders are returned unchanged.
    pub fn cancel_order(&self, order_id: &str) -> ExchangeResult<OrderHandle> {
        let mut orders = self.orders.lock().unwrap_or_else(PoisonError::into_inner);
        let order = orders
            .get_mut(order_id)
            .ok_or_else(|| ExchangeError::UnknownOrder(order_id.to_string()))?;
        if !order.handle.is_done() {
            order.handle.status = OrderStatus::Cancelled;
            log::info!("Paper order {} cancelled", order_id);
        }
        Ok(order.handle.clone())
    }

    fn match_limits(&self, symbol: &str, price: Decimal) {
        let mut orders = self.orders.lock().unwrap_or_else(PoisonError::into_inner);
        for order in orders.values_mut() {
            if order.handle.symbol != symbol || order.handle.is_done() {
                continue;
            }
            if let OrderKind::Limit(limit) = order.kind {
                let crosses = match order.handle.action {
                    OrderAction::Buy => price <= limit,
                    OrderAction::Sell => price >= limit,
                };
                if crosses {
                    order.handle.status = OrderStatus::Filled;
                    order.handle.fill_price = Some(limit);
                    log::info!("Paper limit order {} filled @ {}", order.handle.id, limit);
                }
            }
        }
    }
}

#[async_trait]
impl TickFeed for PaperBroker {
    async fn subscribe(&self, symbol: &str, sink: Arc<dyn TickSink>) -> ExchangeResult<()> {
        if symbol.is_empty() {
            return Err(ExchangeError::InvalidSymbol("empty symbol".to_string()));
        }
        let mut subscriptions = self.subscriptions.lock().unwrap_or_else(PoisonError::into_inner);
        if subscriptions.insert(symbol.to_string(), sink).is_some() {
            log::warn!("Replaced existing paper subscription for {}", symbol);
        }
        Ok(())
    }

    async fn unsubscribe(&self, symbol: &str) -> ExchangeResult<()> {
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(symbol);
        Ok(())
    }
}

#[async_trait]
impl OrderVenue for PaperBroker {
    async fn submit(&self, intent: &OrderIntent) -> ExchangeResult<OrderHandle> {
        if self.rejecting.load(Ordering::SeqCst) {
            return Err(ExchangeError::Rejected(format!(
                "{} {} {} refused by paper venue",
                intent.action, intent.quantity, intent.symbol
            )));
        }

        let id = format!("paper-{}", self.next_order_id.fetch_add(1, Ordering::SeqCst));
        let handle = OrderHandle {
            id: id.clone(),
            symbol: intent.symbol.clone(),
            action: intent.action,
            quantity: intent.quantity,
            status: OrderStatus::Submitted,
            fill_price: None,
        };

        self.orders.lock().unwrap_or_else(PoisonError::into_inner).insert(
            id,
            PaperOrder {
                handle: handle.clone(),
                kind: intent.kind,
                polls: 0,
            },
        );

        Ok(handle)
    }

    async fn order_status(&self, order_id: &str) -> ExchangeResult<OrderHandle> {
        let mut orders = self.orders.lock().unwrap_or_else(PoisonError::into_inner);
        let order = orders
            .get_mut(order_id)
            .ok_or_else(|| ExchangeError::UnknownOrder(order_id.to_string()))?;

        if order.kind == OrderKind::Market && !order.handle.is_done() {
            order.polls += 1;
            if order.polls >= self.fill_after_polls {
                match self.last_price(&order.handle.symbol) {
                    Some(price) => {
                        order.handle.status = OrderStatus::Filled;
                        order.handle.fill_price = Some(price);
                    }
                    None => order.handle.status = OrderStatus::Rejected,
                }
            }
        }

        Ok(order.handle.clone())
    }
}

#[async_trait]
impl HistoricalDataSource for PaperBroker {
    async fn fetch_bars(
        &self,
        _symbol: &str,
        as_of: NaiveDate,
        lookback_days: u32,
    ) -> ExchangeResult<Vec<Bar>> {
        let eligible: Vec<&Bar> = self.history.iter().filter(|b| b.date < as_of).collect();
        let skip = eligible.len().saturating_sub(lookback_days as usize);
        Ok(eligible.into_iter().skip(skip).cloned().collect())
    }
}
