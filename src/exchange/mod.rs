// src/exchange/mod.rs
pub mod client;
pub mod paper;
pub mod replay;

pub use client::{HistoricalDataSource, OrderVenue, TickFeed, TickSink};
pub use paper::PaperBroker;
