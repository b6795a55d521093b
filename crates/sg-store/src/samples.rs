//! Labeled training-sample store.
//!
//! Append-only NDJSON. The pipeline appends one sample per decided
//! submission; the trainer reads a frozen snapshot at run start and never
//! chases the appender. This one-way flow is what keeps the
//! detect → log → train → predict cycle acyclic.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use sg_features::F;
use sg_logging::EventLog;

use crate::scores::StoreError;

/// One labeled observation. `label` is 1.0 for cheat, 0.0 for legit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingSample {
    pub ts_ms: u64,
    pub player_id: String,
    pub label: f64,
    /// Cheat kind for labeled positives, "legit" otherwise.
    pub source: String,
    /// True for generator-produced samples (kept distinguishable so real
    /// labels can be weighted separately later).
    pub synthetic: bool,
    pub features: [f64; F],
}

/// Append-only store with serialized writers.
pub struct TrainingSampleStore {
    path: PathBuf,
    writer: Mutex<EventLog>,
}

impl TrainingSampleStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let writer = EventLog::create(&path)?;
        Ok(Self {
            path,
            writer: Mutex::new(writer),
        })
    }

    pub fn append(&self, sample: &TrainingSample) -> Result<(), StoreError> {
        let mut w = self.writer.lock();
        w.append(sample)?;
        Ok(())
    }

    /// Total stored samples.
    pub fn count(&self) -> Result<u64, StoreError> {
        Ok(sg_logging::count_ndjson_lines(&self.path)?)
    }

    /// Read every stored sample as of now. Appends are write-through, so
    /// the snapshot sees everything appended before this call and nothing
    /// appended after it.
    pub fn snapshot(&self) -> Result<Vec<TrainingSample>, StoreError> {
        Ok(sg_logging::read_ndjson(&self.path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(label: f64, source: &str) -> TrainingSample {
        TrainingSample {
            ts_ms: 1,
            player_id: "p".to_string(),
            label,
            source: source.to_string(),
            synthetic: false,
            features: [0.5; F],
        }
    }

    #[test]
    fn appended_samples_appear_in_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = TrainingSampleStore::open(dir.path().join("samples.ndjson")).unwrap();
        store.append(&sample(1.0, "speed_hack")).unwrap();
        store.append(&sample(0.0, "legit")).unwrap();

        let snap = store.snapshot().unwrap();
        assert_eq!(snap.len(), 2);
        assert_eq!(snap[0].label, 1.0);
        assert_eq!(snap[1].source, "legit");
        assert_eq!(store.count().unwrap(), 2);
    }

    #[test]
    fn snapshot_is_stable_against_later_appends() {
        let dir = tempfile::tempdir().unwrap();
        let store = TrainingSampleStore::open(dir.path().join("samples.ndjson")).unwrap();
        store.append(&sample(1.0, "bot_usage")).unwrap();
        let snap = store.snapshot().unwrap();
        store.append(&sample(0.0, "legit")).unwrap();
        assert_eq!(snap.len(), 1);
        assert_eq!(store.count().unwrap(), 2);
    }
}
