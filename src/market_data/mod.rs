// src/market_data/mod.rs
pub mod aggregator;
pub mod live_state;
pub mod window_loop;

pub use aggregator::TickAggregator;
pub use live_state::{live_state, LivePublisher, LiveReader};
pub use window_loop::WindowedMetricsLoop;
