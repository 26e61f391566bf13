// src/analysis/mod.rs
pub mod metrics;

pub use metrics::{compute_metrics, historical_vwap, weekday_index, Metrics};
