// src/exchange/replay.rs
use crate::domain::errors::{StoreError, StoreResult};
use crate::domain::models::TickEvent;
use crate::exchange::paper::PaperBroker;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};

#[derive(Debug, Deserialize)]
struct ReplayRow {
    #[serde(default, with = "rust_decimal::serde::str_option")]
    price: Option<Decimal>,
    #[serde(default)]
    size: Option<u64>,
}

/// Read a `price,size` CSV of recorded trades. Blank cells become missing
/// fields on the event, the same way a live feed reports quote-only updates.
pub fn load_replay_ticks<P: AsRef<Path>>(path: P) -> StoreResult<Vec<(Option<Decimal>, Option<u64>)>> {
    let path_str = path.as_ref().display().to_string();
    let mut reader = csv::Reader::from_path(path.as_ref()).map_err(|source| StoreError::Csv {
        path: path_str.clone(),
        source,
    })?;

    let mut rows = Vec::new();
    for row in reader.deserialize::<ReplayRow>() {
        let row = row.map_err(|source| StoreError::Csv {
            path: path_str.clone(),
            source,
        })?;
        rows.push((row.price, row.size));
    }

    log::info!("Loaded {} replay ticks from {}", rows.len(), path_str);
    Ok(rows)
}

/// Push recorded ticks into the paper broker at a fixed pace, looping over
/// the recording until `shutdown` flips to true.
pub fn spawn_replay(
    broker: Arc<PaperBroker>,
    symbol: String,
    ticks: Vec<(Option<Decimal>, Option<u64>)>,
    delay: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        if ticks.is_empty() {
            log::warn!("Replay for {} has no ticks; nothing to publish", symbol);
            return;
        }

        for (last, last_size) in ticks.iter().cycle() {
            if *shutdown.borrow() {
                break;
            }

            broker.publish(
                &symbol,
                TickEvent {
                    last: *last,
                    last_size: *last_size,
                    timestamp: Utc::now(),
                },
            );

            tokio::select! {
                _ = sleep(delay) => {}
                _ = shutdown.changed() => break,
            }
        }

        log::info!("Tick replay for {} stopped", symbol);
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::io::Write;

    #[test]
    fn blank_cells_are_missing_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ticks.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "price,size").unwrap();
        writeln!(file, "10.25,100").unwrap();
        writeln!(file, ",5").unwrap();
        writeln!(file, "10.30,").unwrap();

        let ticks = load_replay_ticks(&path).unwrap();
        assert_eq!(
            ticks,
            vec![
                (Some(dec!(10.25)), Some(100)),
                (None, Some(5)),
                (Some(dec!(10.30)), None),
            ]
        );
    }

    #[test]
    fn missing_file_is_a_store_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_replay_ticks(dir.path().join("nope.csv")).unwrap_err();
        assert!(matches!(err, StoreError::Csv { .. }));
    }
}
