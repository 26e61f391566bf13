// src/domain/mod.rs
pub mod errors;
pub mod models;

// Re-export common types for convenience
pub use errors::{
    AppError, AppResult, ExchangeError, ExchangeResult, MarketDataError,
    StoreError, StoreResult, TradingError, TradingResult,
};
pub use models::{
    Bar, OrderAction, OrderHandle, OrderIntent, OrderKind, OrderStatus, Tick, TickEvent,
    WindowStats,
};
