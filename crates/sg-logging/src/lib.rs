//! sg-logging: durable operator records.
//!
//! Three kinds of state live on disk here. Event streams (cheat detections,
//! training runs, edge cases) go through [`EventLog`]: newline-delimited
//! JSON, one record per line, written through to the OS on every append.
//! Small stateful documents (model metadata, store snapshots) use
//! [`write_json_atomic`] (tmp + rename). Readers are lenient: a line torn
//! by a crash mid-append is skipped, never an error.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

pub mod events;

pub use events::{CheatEventV1, MetricsV1, TrainingRunEventV1};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Error)]
pub enum LogError {
    #[error("io: {0}")]
    Io(#[from] io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Current unix time in milliseconds.
pub fn now_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Write-through NDJSON event stream.
///
/// These logs record low-rate, high-value operator events — a rejected
/// submission, a finished training run, a rule/model disagreement — so each
/// append serializes the record, terminates it with `\n`, and hands the
/// whole line to the OS in one write. There is no in-process buffer to
/// lose: a crash can tear at most the line being written, and the readers
/// below skip torn lines.
pub struct EventLog {
    file: File,
}

impl EventLog {
    /// Open the stream for appending, creating the file and any missing
    /// parent directories.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, LogError> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        Ok(Self { file })
    }

    /// Append one record as a single `line + \n` write.
    pub fn append<T: Serialize>(&mut self, record: &T) -> Result<(), LogError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        self.file.write_all(&line)?;
        Ok(())
    }
}

/// Read every intact record of an NDJSON file.
///
/// Blank lines and lines that fail to parse (a torn final line after a
/// crash, or a record written by a newer schema) are skipped.
pub fn read_ndjson<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<Vec<T>, LogError> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(Vec::new());
    }
    let s = std::fs::read_to_string(path)?;
    let mut out = Vec::new();
    for line in s.lines() {
        if line.trim().is_empty() {
            continue;
        }
        if let Ok(v) = serde_json::from_str::<T>(line) {
            out.push(v);
        }
    }
    Ok(out)
}

/// Count non-blank lines without materializing records.
pub fn count_ndjson_lines(path: impl AsRef<Path>) -> Result<u64, LogError> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(0);
    }
    let s = std::fs::read_to_string(path)?;
    Ok(s.lines().filter(|l| !l.trim().is_empty()).count() as u64)
}

/// Last `limit` intact records of an NDJSON file, oldest first.
pub fn read_ndjson_tail<T: DeserializeOwned>(
    path: impl AsRef<Path>,
    limit: usize,
) -> Result<Vec<T>, LogError> {
    let mut all: Vec<T> = read_ndjson(path)?;
    if all.len() > limit {
        all.drain(..all.len() - limit);
    }
    Ok(all)
}

/// Write a JSON document atomically via tmp + rename.
pub fn write_json_atomic<T: Serialize>(path: impl AsRef<Path>, doc: &T) -> Result<(), LogError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, serde_json::to_vec_pretty(doc)?)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Read a JSON document written by [`write_json_atomic`].
pub fn read_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, LogError> {
    let bytes = std::fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}
