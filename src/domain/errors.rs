// src/domain/errors.rs
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Exchange error: {0}")]
    Exchange(#[from] ExchangeError),

    #[error("Market data error: {0}")]
    MarketData(#[from] MarketDataError),

    #[error("Trading error: {0}")]
    Trading(#[from] TradingError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Failures reported by the brokerage side: venue, feed or history service.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExchangeError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Order rejected: {0}")]
    Rejected(String),

    #[error("Unknown order: {0}")]
    UnknownOrder(String),

    #[error("Invalid symbol: {0}")]
    InvalidSymbol(String),
}

#[derive(Error, Debug)]
pub enum MarketDataError {
    #[error("Stream subscription error for {symbol}: {source}")]
    Subscription {
        symbol: String,
        #[source]
        source: ExchangeError,
    },

    #[error("Stream unsubscription error for {symbol}: {source}")]
    Unsubscription {
        symbol: String,
        #[source]
        source: ExchangeError,
    },

    #[error("Historical fetch failed for {symbol}: {source}")]
    HistoricalFetch {
        symbol: String,
        #[source]
        source: ExchangeError,
    },
}

#[derive(Error, Debug)]
pub enum TradingError {
    #[error("Invalid order: {0}")]
    InvalidOrder(String),

    #[error("Order submission failed: {0}")]
    Submission(#[source] ExchangeError),

    #[error("Order status poll failed for {order_id}: {source}")]
    StatusPoll {
        order_id: String,
        #[source]
        source: ExchangeError,
    },

    #[error("Order {order_id} not terminal after {waited_ms}ms")]
    FillTimeout { order_id: String, waited_ms: u128 },
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error on {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },
}

// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;
pub type ExchangeResult<T> = Result<T, ExchangeError>;
pub type TradingResult<T> = Result<T, TradingError>;
pub type StoreResult<T> = Result<T, StoreError>;
