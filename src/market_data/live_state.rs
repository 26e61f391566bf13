// src/market_data/live_state.rs
use crate::domain::models::WindowStats;
use rust_decimal::Decimal;
use std::sync::{Arc, Mutex, PoisonError};

/// Create the shared slot for the most recent window, starting empty.
///
/// The publisher is not `Clone`: whoever owns it is the only writer.
pub fn live_state() -> (LivePublisher, LiveReader) {
    let slot = Arc::new(Mutex::new(None));
    (
        LivePublisher { slot: slot.clone() },
        LiveReader { slot },
    )
}

/// Write side of the live window slot
#[derive(Debug)]
pub struct LivePublisher {
    slot: Arc<Mutex<Option<WindowStats>>>,
}

impl LivePublisher {
    /// Replace the latest window
    pub fn publish(&self, stats: WindowStats) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(stats);
    }

    pub fn reader(&self) -> LiveReader {
        LiveReader {
            slot: self.slot.clone(),
        }
    }
}

/// Read side; hands out copies so the lock is never held by callers
#[derive(Debug, Clone)]
pub struct LiveReader {
    slot: Arc<Mutex<Option<WindowStats>>>,
}

impl LiveReader {
    /// Latest completed window, or `None` before the first one lands
    pub fn latest(&self) -> Option<WindowStats> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn latest_vwap(&self) -> Option<Decimal> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .and_then(|s| s.vwap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::aggregator::TickAggregator;
    use chrono::Utc;

    #[test]
    fn starts_empty_and_keeps_only_the_latest() {
        let (publisher, reader) = live_state();
        assert!(reader.latest().is_none());

        let first = TickAggregator::new(Utc::now()).finalize(Utc::now());
        let second = TickAggregator::new(Utc::now()).finalize(Utc::now());
        publisher.publish(first);
        publisher.publish(second.clone());

        assert_eq!(reader.latest(), Some(second));
        assert_eq!(publisher.reader().latest_vwap(), None);
    }

    #[test]
    fn readers_see_writes_across_threads() {
        let (publisher, reader) = live_state();
        let handle = std::thread::spawn(move || {
            publisher.publish(TickAggregator::new(Utc::now()).finalize(Utc::now()));
        });
        handle.join().unwrap();
        assert!(reader.latest().is_some());
    }
}
