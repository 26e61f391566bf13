// src/storage/historical.rs
use crate::domain::errors::{StoreError, StoreResult};
use crate::domain::models::Bar;
use crate::storage::append_csv_rows;
use chrono::NaiveDate;
use std::collections::HashSet;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Bars from `fetched` whose date is neither in `existing` nor repeated
/// earlier in `fetched`, in fetched order.
pub fn new_bars(existing: &[Bar], fetched: &[Bar]) -> Vec<Bar> {
    let mut seen: HashSet<NaiveDate> = existing.iter().map(|b| b.date).collect();
    fetched
        .iter()
        .filter(|b| seen.insert(b.date))
        .cloned()
        .collect()
}

/// Append-only CSV of daily bars, unique by date.
///
/// Columns: date, day_of_week, open, high, low, close, volume, average, bar_count
#[derive(Debug, Clone)]
pub struct HistoricalStore {
    path: PathBuf,
}

impl HistoricalStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored bars in file order; a missing file is an empty store
    pub fn load(&self) -> StoreResult<Vec<Bar>> {
        let path_str = self.path.display().to_string();
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: path_str,
                    source,
                })
            }
        };

        let mut reader = csv::Reader::from_reader(file);
        let mut bars = Vec::new();
        for row in reader.deserialize::<Bar>() {
            bars.push(row.map_err(|source| StoreError::Csv {
                path: path_str.clone(),
                source,
            })?);
        }
        Ok(bars)
    }

    /// Append the fetched bars whose dates are not stored yet.
    /// Returns how many rows were appended; merging the same batch again
    /// appends nothing.
    pub fn merge(&self, fetched: &[Bar]) -> StoreResult<usize> {
        let existing = self.load()?;
        let fresh = new_bars(&existing, fetched);

        if fresh.is_empty() {
            log::info!("No new bars to append to {}", self.path.display());
            return Ok(0);
        }

        append_csv_rows(&self.path, &fresh)?;
        log::info!(
            "Appended {} new bars to {} ({} already stored)",
            fresh.len(),
            self.path.display(),
            existing.len()
        );
        Ok(fresh.len())
    }
}
