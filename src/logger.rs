// SPDX-License-Identifier: GPL-3.0-only

//! Flat sample log
//!
//! One comma-separated row per depth sample:
//!
//! ```text
//! index,depth_value,angle,direction
//! 0,712,-29,0
//! 1,705,-28,0
//! ```
//!
//! The header is written only when the file does not exist yet; later runs
//! append below it. Every row starts with a newline, so the file never ends
//! with one. The file is reopened and closed for every row.
//!
//! Logs are read back with the `csv` crate.

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, Trim};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::backends::DepthSample;
use crate::constants::LOG_HEADER;
use crate::errors::LogError;
use crate::sweep::{Direction, SweepSnapshot};

/// One line of the sample log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct LogRow {
    /// Row number within the current run, starting at 0
    pub index: u64,
    pub depth_value: u16,
    pub angle: i8,
    pub direction: Direction,
}

impl LogRow {
    /// Render the row without the leading newline
    pub fn to_line(&self) -> String {
        format!(
            "{},{},{},{}",
            self.index,
            self.depth_value,
            self.angle,
            self.direction.code()
        )
    }
}

/// Appends rows to the sample log
#[derive(Debug)]
pub struct SampleLogger {
    path: PathBuf,
    next_index: u64,
}

impl SampleLogger {
    /// Logger for `path`; the file is not touched until the first row
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            next_index: 0,
        }
    }

    /// Rows written by this logger so far
    pub fn rows_written(&self) -> u64 {
        self.next_index
    }

    /// Append one row for `sample` taken at `snapshot`
    pub fn append(
        &mut self,
        sample: DepthSample,
        snapshot: SweepSnapshot,
    ) -> Result<LogRow, LogError> {
        let row = LogRow {
            index: self.next_index,
            depth_value: sample.value,
            angle: snapshot.angle,
            direction: snapshot.direction,
        };

        let mut file = self.open()?;
        write!(file, "\n{}", row.to_line()).map_err(|e| LogError::Write {
            path: self.path.clone(),
            message: e.to_string(),
        })?;

        self.next_index += 1;
        Ok(row)
    }

    fn open(&self) -> Result<File, LogError> {
        let create_error = |e: std::io::Error| LogError::Create {
            path: self.path.clone(),
            message: e.to_string(),
        };

        // create_new decides atomically whether this call owns the header
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
        {
            Ok(mut file) => {
                info!(path = %self.path.display(), "Creating sample log");
                file.write_all(LOG_HEADER.as_bytes())
                    .map_err(|e| LogError::Write {
                        path: self.path.clone(),
                        message: e.to_string(),
                    })?;
                Ok(file)
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => OpenOptions::new()
                .append(true)
                .open(&self.path)
                .map_err(create_error),
            Err(e) => Err(create_error(e)),
        }
    }
}

/// Read every row of a sample log
///
/// Blank lines are skipped. Rows from several runs are returned in file
/// order, so indices restart at 0 where a new run began.
pub fn read_rows(path: &Path) -> Result<Vec<LogRow>, LogError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_path(path)
        .map_err(|e| row_error(path, e))?;

    let mut rows = Vec::new();
    for record in reader.deserialize::<LogRow>() {
        rows.push(record.map_err(|e| row_error(path, e))?);
    }

    debug!(path = %path.display(), rows = rows.len(), "Read sample log");
    Ok(rows)
}

fn row_error(path: &Path, err: csv::Error) -> LogError {
    if let csv::ErrorKind::Io(io) = err.kind() {
        return LogError::Read {
            path: path.to_path_buf(),
            message: io.to_string(),
        };
    }

    LogError::Parse {
        line: err.position().map_or(0, |pos| pos.line() as usize),
        message: err.to_string(),
    }
}

/// Aggregate view of a sample log
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogSummary {
    pub rows: usize,
    /// Number of runs in the file (index restarts at 0 for each)
    pub runs: usize,
    pub min_angle: Option<i8>,
    pub max_angle: Option<i8>,
    pub rows_up: usize,
    pub rows_down: usize,
    pub mean_depth: Option<f64>,
}

impl LogSummary {
    pub fn from_rows(rows: &[LogRow]) -> Self {
        let depth_total: u64 = rows.iter().map(|r| u64::from(r.depth_value)).sum();
        Self {
            rows: rows.len(),
            runs: rows.iter().filter(|r| r.index == 0).count(),
            min_angle: rows.iter().map(|r| r.angle).min(),
            max_angle: rows.iter().map(|r| r.angle).max(),
            rows_up: rows.iter().filter(|r| r.direction == Direction::Up).count(),
            rows_down: rows.iter().filter(|r| r.direction == Direction::Down).count(),
            mean_depth: (!rows.is_empty()).then(|| depth_total as f64 / rows.len() as f64),
        }
    }
}
