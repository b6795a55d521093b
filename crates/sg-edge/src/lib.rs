//! sg-edge: Where the rule engine and the shadow model disagree.
//!
//! The arbiter classifies each (rule verdict, ML probability) pair; anything
//! that is not plain agreement is an edge case, appended to a persistent log
//! that the retraining scheduler watches. In shadow mode the classification
//! never changes the accept/reject decision.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use sg_features::F;
use sg_logging::{EventLog, LogError};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Error)]
pub enum EdgeError {
    #[error("log: {0}")]
    Log(#[from] LogError),
}

/// The four disagreement classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    RulesPositiveMlNegative,
    RulesNegativeMlPositive,
    MlUncertainRulesPositive,
    MlUncertainRulesNegative,
}

impl EdgeType {
    /// Cases where the model suspects something the rules missed get a
    /// human-review flag.
    pub fn should_flag(&self) -> bool {
        matches!(
            self,
            EdgeType::RulesNegativeMlPositive | EdgeType::MlUncertainRulesNegative
        )
    }
}

/// Classify one submission. `None` means the rules and the model agree and
/// nothing is logged.
pub fn classify(rules_cheat: bool, probability: f64, low: f64, high: f64) -> Option<EdgeType> {
    if rules_cheat {
        if probability > high {
            None
        } else if probability < low {
            Some(EdgeType::RulesPositiveMlNegative)
        } else {
            Some(EdgeType::MlUncertainRulesPositive)
        }
    } else if probability > high {
        Some(EdgeType::RulesNegativeMlPositive)
    } else if probability < low {
        None
    } else {
        Some(EdgeType::MlUncertainRulesNegative)
    }
}

/// One persisted edge case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeCaseRecord {
    #[serde(skip_deserializing, default = "edge_event_name")]
    pub event: &'static str,
    pub ts_ms: u64,
    pub player_id: String,
    pub score: u32,
    /// "cheat" or "legit".
    pub rule_verdict: String,
    pub ml_probability: f64,
    pub edge_type: EdgeType,
    pub should_flag: bool,
    pub features: [f64; F],
}

fn edge_event_name() -> &'static str {
    EdgeCaseRecord::EVENT
}

impl EdgeCaseRecord {
    pub const EVENT: &'static str = "edge_case";

    pub fn new(
        player_id: impl Into<String>,
        score: u32,
        rules_cheat: bool,
        ml_probability: f64,
        edge_type: EdgeType,
        features: [f64; F],
    ) -> Self {
        Self {
            event: Self::EVENT,
            ts_ms: sg_logging::now_ms(),
            player_id: player_id.into(),
            score,
            rule_verdict: if rules_cheat { "cheat" } else { "legit" }.to_string(),
            ml_probability,
            edge_type,
            should_flag: edge_type.should_flag(),
            features,
        }
    }
}

/// Append-only edge-case log with an in-memory total the scheduler can poll
/// without touching the file.
pub struct EdgeCaseLog {
    path: PathBuf,
    writer: Mutex<EventLog>,
    count: AtomicU64,
}

impl EdgeCaseLog {
    /// Open (or create) the log and count existing records.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, EdgeError> {
        let path = path.as_ref().to_path_buf();
        let count = sg_logging::count_ndjson_lines(&path)?;
        let writer = EventLog::create(&path)?;
        Ok(Self {
            path,
            writer: Mutex::new(writer),
            count: AtomicU64::new(count),
        })
    }

    /// Append one record. Arrival order is preserved: the lock serializes
    /// concurrent appenders.
    pub fn append(&self, record: &EdgeCaseRecord) -> Result<(), EdgeError> {
        let mut w = self.writer.lock();
        w.append(record)?;
        self.count.fetch_add(1, Ordering::Release);
        Ok(())
    }

    /// Total records ever appended (including previous runs).
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Acquire)
    }

    /// Newest `limit` records, oldest first.
    pub fn recent(&self, limit: usize) -> Result<Vec<EdgeCaseRecord>, EdgeError> {
        Ok(sg_logging::read_ndjson_tail(&self.path, limit)?)
    }
}
