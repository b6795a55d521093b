//! Durable operator event records.
//!
//! Versioned by struct name; fields are only ever added, never repurposed.

use serde::{Deserialize, Serialize};

/// Evaluation metrics as stored with a model version and in run events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsV1 {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

/// One rejected submission, with enough context to re-triage by hand.
///
/// `replay` carries the capped frame log when the replay rule fired. This
/// record never leaves the server. (Write-only: admin reads go through
/// `serde_json::Value`.)
#[derive(Debug, Clone, Serialize)]
pub struct CheatEventV1 {
    pub event: &'static str,
    pub ts_ms: u64,
    pub player_id: String,
    pub kind: String,
    pub reason: String,
    pub score: u32,
    pub food_eaten: u32,
    pub seed: u32,
    pub game_duration_s: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replay: Option<serde_json::Value>,
}

impl CheatEventV1 {
    pub const EVENT: &'static str = "cheat_detected";
}

/// One completed training-worker run, successful or not. Write-only, as
/// [`CheatEventV1`].
#[derive(Debug, Clone, Serialize)]
pub struct TrainingRunEventV1 {
    pub event: &'static str,
    pub ts_ms: u64,
    /// What started the run ("scheduler", "cheat_event", "manual").
    pub trigger: String,
    pub total_samples: usize,
    pub synthetic_samples: usize,
    pub train_samples: usize,
    pub val_samples: usize,
    pub epochs: u32,
    pub metrics: MetricsV1,
    pub activated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_f1: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_id: Option<String>,
    pub duration_ms: u64,
}

impl TrainingRunEventV1 {
    pub const EVENT: &'static str = "training_run";
}
