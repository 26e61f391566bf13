// src/trading/mod.rs
pub mod execution;
pub mod session;

pub use execution::{ExecutionParameters, OrderExecutor};
pub use session::{DecisionContext, ObserveOnly, SessionSummary, TradingAlgorithm, TradingSession};
