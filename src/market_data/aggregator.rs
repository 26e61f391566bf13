// src/market_data/aggregator.rs
use crate::domain::models::{Tick, TickEvent, WindowStats};
use crate::exchange::client::TickSink;
use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, MathematicalOps};
use std::sync::{Mutex, PoisonError};

/// Running VWAP / volatility / OHLCV accumulator for one window.
///
/// Constant memory per tick: price dispersion is tracked with Welford's
/// running mean and sum of squared deviations rather than a price buffer.
/// Build a fresh aggregator for every window; `finalize` does not reset.
#[derive(Debug, Clone)]
pub struct TickAggregator {
    window_start: DateTime<Utc>,
    price_volume: Decimal,
    volume: u64,
    count: usize,
    mean: Decimal,
    m2: Decimal,
    open: Option<Decimal>,
    high: Option<Decimal>,
    low: Option<Decimal>,
    close: Option<Decimal>,
}

impl TickAggregator {
    pub fn new(window_start: DateTime<Utc>) -> Self {
        Self {
            window_start,
            price_volume: Decimal::ZERO,
            volume: 0,
            count: 0,
            mean: Decimal::ZERO,
            m2: Decimal::ZERO,
            open: None,
            high: None,
            low: None,
            close: None,
        }
    }

    pub fn ingest(&mut self, tick: &Tick) {
        let price = tick.price;

        self.price_volume += price * Decimal::from(tick.size);
        self.volume = self.volume.saturating_add(tick.size);

        self.count += 1;
        let delta = price - self.mean;
        self.mean += delta / Decimal::from(self.count);
        self.m2 += delta * (price - self.mean);

        self.open.get_or_insert(price);
        self.close = Some(price);
        self.high = Some(self.high.map_or(price, |h| h.max(price)));
        self.low = Some(self.low.map_or(price, |l| l.min(price)));
    }

    /// Ingest a raw feed event; events missing price or size are skipped.
    /// Returns whether the event was used.
    pub fn ingest_event(&mut self, event: &TickEvent) -> bool {
        match event.as_tick() {
            Some(tick) => {
                self.ingest(&tick);
                true
            }
            None => false,
        }
    }

    pub fn tick_count(&self) -> usize {
        self.count
    }

    pub fn vwap(&self) -> Option<Decimal> {
        if self.volume == 0 {
            return None;
        }
        self.price_volume.checked_div(Decimal::from(self.volume))
    }

    /// Unbiased (n - 1) sample standard deviation of observed prices
    pub fn volatility(&self) -> Option<Decimal> {
        match self.count {
            0 => None,
            1 => Some(Decimal::ZERO),
            n => {
                let variance = (self.m2 / Decimal::from(n - 1)).max(Decimal::ZERO);
                variance.sqrt()
            }
        }
    }

    pub fn finalize(&self, window_end: DateTime<Utc>) -> WindowStats {
        WindowStats {
            vwap: self.vwap(),
            volatility: self.volatility(),
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
            tick_count: self.count,
            window_start: self.window_start,
            window_end,
        }
    }
}

impl TickSink for Mutex<TickAggregator> {
    fn on_tick(&self, event: TickEvent) {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .ingest_event(&event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, 14, 30, 0).unwrap()
    }

    fn feed(agg: &mut TickAggregator, ticks: &[(Decimal, u64)]) {
        for (i, (price, size)) in ticks.iter().enumerate() {
            let ts = start() + chrono::Duration::seconds(i as i64);
            agg.ingest_event(&TickEvent::trade(*price, *size, ts));
        }
    }

    #[test]
    fn vwap_and_sample_stdev_for_three_trades() {
        let mut agg = TickAggregator::new(start());
        feed(&mut agg, &[(dec!(10), 100), (dec!(12), 50), (dec!(11), 50)]);

        let stats = agg.finalize(start() + chrono::Duration::seconds(60));
        assert_eq!(stats.vwap, Some(dec!(10.75)));
        assert_eq!(stats.volatility.map(|v| v.round_dp(10)), Some(dec!(1)));
        assert_eq!(stats.open, Some(dec!(10)));
        assert_eq!(stats.high, Some(dec!(12)));
        assert_eq!(stats.low, Some(dec!(10)));
        assert_eq!(stats.close, Some(dec!(11)));
        assert_eq!(stats.volume, 200);
        assert_eq!(stats.tick_count, 3);
    }

    #[test]
    fn empty_window_has_no_prices() {
        let agg = TickAggregator::new(start());
        let stats = agg.finalize(start());
        assert_eq!(stats.vwap, None);
        assert_eq!(stats.volatility, None);
        assert_eq!(stats.open, None);
        assert!(!stats.has_trades());
    }

    #[test]
    fn single_trade_has_zero_volatility() {
        let mut agg = TickAggregator::new(start());
        feed(&mut agg, &[(dec!(101.25), 7)]);
        assert_eq!(agg.volatility(), Some(Decimal::ZERO));
        assert_eq!(agg.vwap(), Some(dec!(101.25)));
    }

    #[test]
    fn zero_size_trades_leave_vwap_absent() {
        let mut agg = TickAggregator::new(start());
        feed(&mut agg, &[(dec!(10), 0), (dec!(12), 0)]);
        assert_eq!(agg.vwap(), None);
        assert!(agg.volatility().is_some());
    }

    #[test]
    fn incomplete_events_are_ignored() {
        let mut agg = TickAggregator::new(start());
        let quote_only = TickEvent {
            last: Some(dec!(99)),
            last_size: None,
            timestamp: start(),
        };
        let size_only = TickEvent {
            last: None,
            last_size: Some(10),
            timestamp: start(),
        };
        assert!(!agg.ingest_event(&quote_only));
        assert!(!agg.ingest_event(&size_only));
        assert_eq!(agg.tick_count(), 0);
    }

    #[test]
    fn finalize_does_not_reset() {
        let mut agg = TickAggregator::new(start());
        feed(&mut agg, &[(dec!(5), 2)]);
        let first = agg.finalize(start());
        let second = agg.finalize(start());
        assert_eq!(first, second);
    }

    #[test]
    fn sink_impl_feeds_the_aggregator() {
        let sink = Mutex::new(TickAggregator::new(start()));
        sink.on_tick(TickEvent::trade(dec!(20), 3, start()));
        sink.on_tick(TickEvent::trade(dec!(22), 1, start()));
        assert_eq!(sink.lock().unwrap().vwap(), Some(dec!(20.5)));
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn vwap_is_size_weighted_mean(
                ticks in proptest::collection::vec((1u32..100_000, 0u64..10_000), 1..50)
            ) {
                let mut agg = TickAggregator::new(start());
                let mut pv = Decimal::ZERO;
                let mut total = 0u64;
                for (cents, size) in &ticks {
                    let price = Decimal::new(*cents as i64, 2);
                    pv += price * Decimal::from(*size);
                    total += size;
                    agg.ingest_event(&TickEvent::trade(price, *size, start()));
                }

                if total == 0 {
                    prop_assert_eq!(agg.vwap(), None);
                } else {
                    prop_assert_eq!(agg.vwap(), Some(pv / Decimal::from(total)));
                }
                prop_assert_eq!(agg.tick_count(), ticks.len());
            }
        }
    }
}
