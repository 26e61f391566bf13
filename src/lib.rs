// src/lib.rs
// Main library module declarations

pub mod analysis;
pub mod config;
pub mod domain;
pub mod exchange;
pub mod market_data;
pub mod storage;
pub mod trading;
