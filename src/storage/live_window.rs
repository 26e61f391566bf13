// src/storage/live_window.rs
use crate::domain::errors::StoreResult;
use crate::domain::models::{weekday_name, WindowStats};
use crate::storage::append_csv_rows;
use chrono::{Datelike, NaiveDate, Weekday};
use rust_decimal::Decimal;
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize)]
struct LiveWindowRow {
    date: NaiveDate,
    #[serde(with = "weekday_name")]
    day_of_week: Weekday,
    start_time: String,
    end_time: String,
    #[serde(with = "rust_decimal::serde::str_option")]
    open: Option<Decimal>,
    #[serde(with = "rust_decimal::serde::str_option")]
    high: Option<Decimal>,
    #[serde(with = "rust_decimal::serde::str_option")]
    low: Option<Decimal>,
    #[serde(with = "rust_decimal::serde::str_option")]
    close: Option<Decimal>,
    volume: u64,
    #[serde(with = "rust_decimal::serde::str_option")]
    average: Option<Decimal>,
}

impl From<&WindowStats> for LiveWindowRow {
    fn from(stats: &WindowStats) -> Self {
        let round = |v: Option<Decimal>| v.map(|d| d.round_dp(2));
        let start = stats.window_start;
        Self {
            date: start.date_naive(),
            day_of_week: start.weekday(),
            start_time: start.format("%H:%M:%S").to_string(),
            end_time: stats.window_end.format("%H:%M:%S").to_string(),
            open: round(stats.open),
            high: round(stats.high),
            low: round(stats.low),
            close: round(stats.close),
            volume: stats.volume,
            average: round(stats.vwap),
        }
    }
}

/// Appends one summary row per completed window. Windows are unique by
/// their timestamps, so nothing is deduplicated here.
#[derive(Debug, Clone)]
pub struct LiveWindowRecorder {
    path: PathBuf,
}

impl LiveWindowRecorder {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, stats: &WindowStats) -> StoreResult<()> {
        append_csv_rows(&self.path, &[LiveWindowRow::from(stats)])?;
        log::debug!("Appended window summary to {}", self.path.display());
        Ok(())
    }
}
