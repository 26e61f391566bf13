// src/storage/mod.rs
pub mod historical;
pub mod live_window;

pub use historical::{new_bars, HistoricalStore};
pub use live_window::LiveWindowRecorder;

use crate::domain::errors::{StoreError, StoreResult};
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

/// True when a non-empty file does not end with a newline, so the next
/// append would be glued onto its last row.
fn missing_trailing_newline(path: &Path) -> std::io::Result<bool> {
    let mut file = File::open(path)?;
    if file.metadata()?.len() == 0 {
        return Ok(false);
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] != b'\n')
}

/// Append `rows` to a CSV file, writing the header only when the file is new
/// or empty.
///
/// Rows are encoded in memory first and then written with a single append,
/// so an encoding failure never touches the file and existing rows are never
/// rewritten. A last row left without its newline (hand edit, torn write) is
/// terminated before the new rows go in.
pub(crate) fn append_csv_rows<T: Serialize>(path: &Path, rows: &[T]) -> StoreResult<()> {
    if rows.is_empty() {
        return Ok(());
    }

    let path_str = path.display().to_string();
    let io_err = |source: std::io::Error| StoreError::Io {
        path: path_str.clone(),
        source,
    };

    let needs_header = match std::fs::metadata(path) {
        Ok(meta) => meta.len() == 0,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
        Err(e) => return Err(io_err(e)),
    };

    let mut encoded = Vec::new();
    if !needs_header && missing_trailing_newline(path).map_err(io_err)? {
        encoded.push(b'\n');
    }

    let mut writer = csv::WriterBuilder::new()
        .has_headers(needs_header)
        .from_writer(encoded);
    for row in rows {
        writer.serialize(row).map_err(|source| StoreError::Csv {
            path: path_str.clone(),
            source,
        })?;
    }
    let encoded = writer
        .into_inner()
        .map_err(|e| io_err(e.into_error()))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(io_err)?;
    file.write_all(&encoded).map_err(io_err)?;
    file.flush().map_err(io_err)?;

    Ok(())
}
