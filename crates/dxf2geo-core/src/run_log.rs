//! The per-run extraction log (`export.log`).
//!
//! The log is JSON Lines: a `start` entry, one `geometry` entry per requested
//! type in request order (a single `ALL` entry for a flattened run), and a
//! `finish` entry. Each entry is flushed as soon
//! as it is written, so an interrupted run still leaves every completed attempt
//! on disk.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::drivers::OutputFormat;
use crate::error::{OutputError, Result};
use crate::geometry_type::{GeometryType, TypeSelection};

/// File name of the run log inside the output directory.
pub const LOG_FILE_NAME: &str = "export.log";

/// Result of one geometry-type attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractStatus {
    Succeeded,
    Failed,
}

/// What happened to one requested geometry type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeometryOutcome {
    pub geometry_type: TypeSelection,
    pub status: ExtractStatus,
    /// Features written; 0 for failures
    pub feature_count: usize,
    /// Output file, when one was kept on disk
    pub output: Option<PathBuf>,
    /// Failure detail
    pub error: Option<String>,
    pub elapsed_ms: u64,
}

impl GeometryOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == ExtractStatus::Succeeded
    }
}

/// One line of the run log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LogEntry {
    Start {
        timestamp: DateTime<Utc>,
        input: PathBuf,
        format: OutputFormat,
        /// Empty for a flattened run
        geometry_types: Vec<GeometryType>,
        #[serde(default)]
        flatten: bool,
        translator: String,
    },
    Geometry {
        timestamp: DateTime<Utc>,
        #[serde(flatten)]
        outcome: GeometryOutcome,
    },
    Finish {
        timestamp: DateTime<Utc>,
        succeeded: usize,
        failed: usize,
        total_features: usize,
    },
}

/// Append-only writer for `export.log`.
#[derive(Debug)]
pub struct RunLog {
    path: PathBuf,
    file: File,
}

impl RunLog {
    /// Creates (or truncates) the log file.
    ///
    /// # Errors
    ///
    /// Returns [`OutputError::Write`] if the file cannot be created.
    pub fn create(path: impl Into<PathBuf>) -> std::result::Result<Self, OutputError> {
        let path = path.into();
        let file = File::create(&path).map_err(|source| OutputError::Write {
            path: path.clone(),
            source: Box::new(source),
        })?;
        Ok(Self { path, file })
    }

    /// Appends one entry and flushes it.
    ///
    /// # Errors
    ///
    /// Returns [`OutputError::Write`] if serialisation or the write fails.
    pub fn append(&mut self, entry: &LogEntry) -> std::result::Result<(), OutputError> {
        let write_error = |source: Box<dyn std::error::Error + Send + Sync>| OutputError::Write {
            path: self.path.clone(),
            source,
        };
        let mut line = serde_json::to_vec(entry).map_err(|e| write_error(Box::new(e)))?;
        line.push(b'\n');
        self.file
            .write_all(&line)
            .and_then(|()| self.file.flush())
            .map_err(|e| write_error(Box::new(e)))
    }

    /// Reads a log back, one entry per non-blank line.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or a line is not a valid entry.
    pub fn read(path: &Path) -> Result<Vec<LogEntry>> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read run log '{}'", path.display()))?;
        let entries = text
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(number, line)| {
                serde_json::from_str(line).with_context(|| {
                    format!("Invalid run log entry at {}:{}", path.display(), number + 1)
                })
            })
            .collect::<anyhow::Result<Vec<LogEntry>>>()?;
        Ok(entries)
    }

    /// Convenience: the `geometry` entries of a log, in order.
    ///
    /// # Errors
    ///
    /// See [`RunLog::read`].
    pub fn read_outcomes(path: &Path) -> Result<Vec<GeometryOutcome>> {
        Ok(Self::read(path)?
            .into_iter()
            .filter_map(|entry| match entry {
                LogEntry::Geometry { outcome, .. } => Some(outcome),
                LogEntry::Start { .. } | LogEntry::Finish { .. } => None,
            })
            .collect())
    }
}
