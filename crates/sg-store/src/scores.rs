//! Leaderboard ("hall of fame") and cheater-record ("hall of shame") store.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("log: {0}")]
    Log(#[from] sg_logging::LogError),
}

/// Result of recording an accepted score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreAck {
    pub best_score: u32,
    /// 1-based rank by best score (ties share the better rank).
    pub rank: usize,
    pub is_new_best: bool,
}

/// One leaderboard row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FameEntry {
    pub player_id: String,
    pub best_score: u32,
    pub games: u32,
    pub ts_ms: u64,
}

/// One recorded cheat incident.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheatIncident {
    pub kind: String,
    pub reason: String,
    pub score: u32,
    pub ts_ms: u64,
}

/// One cheater-board row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShameEntry {
    pub player_id: String,
    pub incidents: u32,
    pub last: CheatIncident,
}

/// The persistence port the orchestrator writes through.
pub trait ScoreStore: Send + Sync {
    /// Record an accepted score; returns the player's standing.
    fn record_score(&self, player_id: &str, score: u32) -> Result<ScoreAck, StoreError>;
    /// Record a rejected submission.
    fn record_cheat(&self, player_id: &str, incident: CheatIncident) -> Result<(), StoreError>;
    fn hall_of_fame(&self, limit: usize) -> Result<Vec<FameEntry>, StoreError>;
    fn hall_of_shame(&self, limit: usize) -> Result<Vec<ShameEntry>, StoreError>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct PlayerRow {
    best_score: u32,
    games: u32,
    ts_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct CheaterRow {
    incidents: Vec<CheatIncident>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Document {
    players: HashMap<String, PlayerRow>,
    cheaters: HashMap<String, CheaterRow>,
}

/// File-backed store: the whole document is rewritten atomically on each
/// mutation, guarded by one writer lock.
pub struct FsScoreStore {
    path: PathBuf,
    doc: RwLock<Document>,
}

impl FsScoreStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let doc = if path.exists() {
            sg_logging::read_json(&path)?
        } else {
            Document::default()
        };
        Ok(Self {
            path,
            doc: RwLock::new(doc),
        })
    }

    fn persist(&self, doc: &Document) -> Result<(), StoreError> {
        sg_logging::write_json_atomic(&self.path, doc)?;
        Ok(())
    }
}

fn rank_of(doc: &Document, best: u32) -> usize {
    1 + doc
        .players
        .values()
        .filter(|p| p.best_score > best)
        .count()
}

impl ScoreStore for FsScoreStore {
    fn record_score(&self, player_id: &str, score: u32) -> Result<ScoreAck, StoreError> {
        let mut doc = self.doc.write();
        let row = doc.players.entry(player_id.to_string()).or_default();
        let is_new_best = score > row.best_score || row.games == 0;
        if is_new_best {
            row.best_score = score.max(row.best_score);
        }
        row.games += 1;
        row.ts_ms = sg_logging::now_ms();
        let best = row.best_score;
        self.persist(&doc)?;
        Ok(ScoreAck {
            best_score: best,
            rank: rank_of(&doc, best),
            is_new_best,
        })
    }

    fn record_cheat(&self, player_id: &str, incident: CheatIncident) -> Result<(), StoreError> {
        let mut doc = self.doc.write();
        doc.cheaters
            .entry(player_id.to_string())
            .or_default()
            .incidents
            .push(incident);
        self.persist(&doc)
    }

    fn hall_of_fame(&self, limit: usize) -> Result<Vec<FameEntry>, StoreError> {
        let doc = self.doc.read();
        let mut rows: Vec<FameEntry> = doc
            .players
            .iter()
            .map(|(id, p)| FameEntry {
                player_id: id.clone(),
                best_score: p.best_score,
                games: p.games,
                ts_ms: p.ts_ms,
            })
            .collect();
        rows.sort_by(|a, b| {
            b.best_score
                .cmp(&a.best_score)
                .then_with(|| a.ts_ms.cmp(&b.ts_ms))
        });
        rows.truncate(limit);
        Ok(rows)
    }

    fn hall_of_shame(&self, limit: usize) -> Result<Vec<ShameEntry>, StoreError> {
        let doc = self.doc.read();
        let mut rows: Vec<ShameEntry> = doc
            .cheaters
            .iter()
            .filter_map(|(id, c)| {
                c.incidents.last().map(|last| ShameEntry {
                    player_id: id.clone(),
                    incidents: c.incidents.len() as u32,
                    last: last.clone(),
                })
            })
            .collect();
        rows.sort_by(|a, b| {
            b.incidents
                .cmp(&a.incidents)
                .then_with(|| b.last.ts_ms.cmp(&a.last.ts_ms))
        });
        rows.truncate(limit);
        Ok(rows)
    }
}
