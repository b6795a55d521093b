//! sg-store: Persistence ports.
//!
//! Two stores with different shapes: the score/cheater store is a small
//! JSON document rewritten atomically on every mutation (player counts are
//! modest and reads dominate), and the training-sample store is append-only
//! NDJSON that the trainer reads as a frozen snapshot.

pub mod samples;
pub mod scores;

pub use samples::{TrainingSample, TrainingSampleStore};
pub use scores::{CheatIncident, FameEntry, FsScoreStore, ScoreAck, ScoreStore, ShameEntry,
    StoreError};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
