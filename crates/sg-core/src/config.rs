//! Unified configuration schema.
//!
//! Every tolerance and interval the pipeline uses is a field here so an
//! operator can recalibrate without a rebuild. The file loads from YAML;
//! a handful of deployment settings also accept environment overrides at
//! boot (`SG_LISTEN`, `SG_DATA_DIR`, `SG_SESSION_SECRET`).

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration loading errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub game: GameRules,
    #[serde(default)]
    pub detect: DetectConfig,
    #[serde(default)]
    pub ml: MlConfig,
    #[serde(default)]
    pub training: TrainingConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

/// Deployment surface settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Bind address for the HTTP surface.
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Root directory for all persisted state (stores, logs, models).
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// Opaque secret mixed into session handling. Never logged.
    #[serde(default)]
    pub session_secret: String,
    /// Per-request pipeline deadline in seconds.
    #[serde(default = "default_request_deadline_s")]
    pub request_deadline_s: u64,
    /// Sliding-window rate limit: events per window per player.
    #[serde(default = "default_rate_limit_events")]
    pub rate_limit_events: u32,
    /// Sliding-window length in seconds.
    #[serde(default = "default_rate_limit_window_s")]
    pub rate_limit_window_s: u64,
    /// Idle TTL for in-flight game sessions, seconds.
    #[serde(default = "default_session_ttl_s")]
    pub session_ttl_s: u64,
    /// Sweep interval for session TTL + rate-limiter GC, seconds.
    #[serde(default = "default_sweep_interval_s")]
    pub sweep_interval_s: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            data_dir: default_data_dir(),
            session_secret: String::new(),
            request_deadline_s: default_request_deadline_s(),
            rate_limit_events: default_rate_limit_events(),
            rate_limit_window_s: default_rate_limit_window_s(),
            session_ttl_s: default_session_ttl_s(),
            sweep_interval_s: default_sweep_interval_s(),
        }
    }
}

fn default_listen() -> String {
    "0.0.0.0:8080".to_string()
}
fn default_data_dir() -> String {
    "data".to_string()
}
fn default_request_deadline_s() -> u64 {
    5
}
fn default_rate_limit_events() -> u32 {
    10
}
fn default_rate_limit_window_s() -> u64 {
    60
}
fn default_session_ttl_s() -> u64 {
    30 * 60
}
fn default_sweep_interval_s() -> u64 {
    5 * 60
}

/// Simulation rules shared with the browser client. Changing any of these
/// desynchronizes replay for in-flight games; deploy in lockstep.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct GameRules {
    #[serde(default = "default_grid")]
    pub grid: i32,
    /// Starting simulation step, ms per frame.
    #[serde(default = "default_initial_speed_ms")]
    pub initial_speed_ms: u32,
    /// Speed-up per food eaten, ms.
    #[serde(default = "default_speed_increase_ms")]
    pub speed_increase_ms: u32,
    /// Fastest allowed simulation step, ms per frame.
    #[serde(default = "default_min_speed_ms")]
    pub min_speed_ms: u32,
    /// Absolute frame cap for replay.
    #[serde(default = "default_max_frames")]
    pub max_frames: u32,
    /// Defensive bound on food eaten during replay.
    #[serde(default = "default_max_food")]
    pub max_food: u32,
}

impl Default for GameRules {
    fn default() -> Self {
        Self {
            grid: default_grid(),
            initial_speed_ms: default_initial_speed_ms(),
            speed_increase_ms: default_speed_increase_ms(),
            min_speed_ms: default_min_speed_ms(),
            max_frames: default_max_frames(),
            max_food: default_max_food(),
        }
    }
}

fn default_grid() -> i32 {
    30
}
fn default_initial_speed_ms() -> u32 {
    150
}
fn default_speed_increase_ms() -> u32 {
    3
}
fn default_min_speed_ms() -> u32 {
    50
}
fn default_max_frames() -> u32 {
    10_000
}
fn default_max_food() -> u32 {
    1_000
}

/// Rule-detector tolerances.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct DetectConfig {
    /// Score tolerance granted when food_eaten is at or below
    /// `low_food_threshold`; zero otherwise.
    #[serde(default = "default_score_tolerance")]
    pub score_tolerance: u32,
    #[serde(default = "default_low_food_threshold")]
    pub low_food_threshold: u32,
    /// Duration check passes within max(floor, submitted * frac) seconds.
    #[serde(default = "default_duration_tolerance_floor_s")]
    pub duration_tolerance_floor_s: f64,
    #[serde(default = "default_duration_tolerance_frac")]
    pub duration_tolerance_frac: f64,
    /// Inter-move gap above this is a suspicious pause, ms.
    #[serde(default = "default_pause_gap_ms")]
    pub pause_gap_ms: f64,
    /// Suspicious gaps at or above this count reject the submission.
    #[serde(default = "default_max_suspicious_gaps")]
    pub max_suspicious_gaps: u32,
    /// Bot heuristic only applies above this score.
    #[serde(default = "default_bot_min_score")]
    pub bot_min_score: u32,
    /// Bot heuristic fires above this moves-per-food ratio.
    #[serde(default = "default_bot_moves_per_food")]
    pub bot_moves_per_food: f64,
    /// Speed-floor rule: reject when speed_level exceeds this and
    /// duration < speed_level * speed_floor_factor.
    #[serde(default = "default_speed_floor_level")]
    pub speed_floor_level: u32,
    #[serde(default = "default_speed_floor_factor")]
    pub speed_floor_factor: f64,
    /// Heartbeat detector engages at or above this score.
    #[serde(default = "default_heartbeat_min_score")]
    pub heartbeat_min_score: u32,
    /// Heartbeat interval tolerance: max(floor_ms, expected * frac).
    #[serde(default = "default_heartbeat_tolerance_floor_ms")]
    pub heartbeat_tolerance_floor_ms: f64,
    #[serde(default = "default_heartbeat_tolerance_frac")]
    pub heartbeat_tolerance_frac: f64,
    /// Wall vs monotonic clock divergence flagged above this, ms.
    #[serde(default = "default_clock_divergence_ms")]
    pub clock_divergence_ms: f64,
    /// Plausible global ms-per-frame band.
    #[serde(default = "default_ms_per_frame_min")]
    pub ms_per_frame_min: f64,
    #[serde(default = "default_ms_per_frame_max")]
    pub ms_per_frame_max: f64,
}

impl Default for DetectConfig {
    fn default() -> Self {
        Self {
            score_tolerance: default_score_tolerance(),
            low_food_threshold: default_low_food_threshold(),
            duration_tolerance_floor_s: default_duration_tolerance_floor_s(),
            duration_tolerance_frac: default_duration_tolerance_frac(),
            pause_gap_ms: default_pause_gap_ms(),
            max_suspicious_gaps: default_max_suspicious_gaps(),
            bot_min_score: default_bot_min_score(),
            bot_moves_per_food: default_bot_moves_per_food(),
            speed_floor_level: default_speed_floor_level(),
            speed_floor_factor: default_speed_floor_factor(),
            heartbeat_min_score: default_heartbeat_min_score(),
            heartbeat_tolerance_floor_ms: default_heartbeat_tolerance_floor_ms(),
            heartbeat_tolerance_frac: default_heartbeat_tolerance_frac(),
            clock_divergence_ms: default_clock_divergence_ms(),
            ms_per_frame_min: default_ms_per_frame_min(),
            ms_per_frame_max: default_ms_per_frame_max(),
        }
    }
}

fn default_score_tolerance() -> u32 {
    20
}
fn default_low_food_threshold() -> u32 {
    2
}
fn default_duration_tolerance_floor_s() -> f64 {
    10.0
}
fn default_duration_tolerance_frac() -> f64 {
    0.20
}
fn default_pause_gap_ms() -> f64 {
    10_000.0
}
fn default_max_suspicious_gaps() -> u32 {
    1
}
fn default_bot_min_score() -> u32 {
    1_000
}
fn default_bot_moves_per_food() -> f64 {
    4.0
}
fn default_speed_floor_level() -> u32 {
    5
}
fn default_speed_floor_factor() -> f64 {
    1.5
}
fn default_heartbeat_min_score() -> u32 {
    100
}
fn default_heartbeat_tolerance_floor_ms() -> f64 {
    200.0
}
fn default_heartbeat_tolerance_frac() -> f64 {
    0.30
}
fn default_clock_divergence_ms() -> f64 {
    5_000.0
}
fn default_ms_per_frame_min() -> f64 {
    40.0
}
fn default_ms_per_frame_max() -> f64 {
    200.0
}

/// Shadow predictor settings.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct MlConfig {
    /// Predictions are only made at or above this score.
    #[serde(default = "default_min_score_for_prediction")]
    pub min_score_for_prediction: u32,
    #[serde(default = "default_high_threshold")]
    pub high_threshold: f64,
    #[serde(default = "default_low_threshold")]
    pub low_threshold: f64,
}

impl Default for MlConfig {
    fn default() -> Self {
        Self {
            min_score_for_prediction: default_min_score_for_prediction(),
            high_threshold: default_high_threshold(),
            low_threshold: default_low_threshold(),
        }
    }
}

fn default_min_score_for_prediction() -> u32 {
    50
}
fn default_high_threshold() -> f64 {
    0.7
}
fn default_low_threshold() -> f64 {
    0.3
}

/// Training worker settings.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct TrainingConfig {
    /// Below this many stored samples, synthetic archetypes are added.
    #[serde(default = "default_min_samples")]
    pub min_samples: usize,
    #[serde(default = "default_epochs")]
    pub epochs: u32,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    #[serde(default = "default_dropout")]
    pub dropout: f64,
    /// Minimum gap between event-driven training runs, seconds.
    #[serde(default = "default_debounce_s")]
    pub debounce_s: u64,
    /// A new model may regress at most this much on F1 and on accuracy.
    #[serde(default = "default_max_regression")]
    pub max_regression: f64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            min_samples: default_min_samples(),
            epochs: default_epochs(),
            batch_size: default_batch_size(),
            learning_rate: default_learning_rate(),
            dropout: default_dropout(),
            debounce_s: default_debounce_s(),
            max_regression: default_max_regression(),
        }
    }
}

fn default_min_samples() -> usize {
    100
}
fn default_epochs() -> u32 {
    50
}
fn default_batch_size() -> usize {
    32
}
fn default_learning_rate() -> f64 {
    0.001
}
fn default_dropout() -> f64 {
    0.3
}
fn default_debounce_s() -> u64 {
    5 * 60
}
fn default_max_regression() -> f64 {
    0.02
}

/// Periodic retraining scheduler settings.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct SchedulerConfig {
    /// Tick period, seconds.
    #[serde(default = "default_scheduler_period_s")]
    pub period_s: u64,
    /// Minimum time since last training completion, seconds.
    #[serde(default = "default_scheduler_cooldown_s")]
    pub cooldown_s: u64,
    /// New edge cases since the last observation needed to trigger.
    #[serde(default = "default_edge_case_threshold")]
    pub edge_case_threshold: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            period_s: default_scheduler_period_s(),
            cooldown_s: default_scheduler_cooldown_s(),
            edge_case_threshold: default_edge_case_threshold(),
        }
    }
}

fn default_scheduler_period_s() -> u64 {
    30 * 60
}
fn default_scheduler_cooldown_s() -> u64 {
    2 * 60 * 60
}
fn default_edge_case_threshold() -> u64 {
    10
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Apply deployment environment overrides (`SG_LISTEN`, `SG_DATA_DIR`,
    /// `SG_SESSION_SECRET`).
    pub fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("SG_LISTEN") {
            if !v.is_empty() {
                self.server.listen = v;
            }
        }
        if let Ok(v) = std::env::var("SG_DATA_DIR") {
            if !v.is_empty() {
                self.server.data_dir = v;
            }
        }
        if let Ok(v) = std::env::var("SG_SESSION_SECRET") {
            if !v.is_empty() {
                self.server.session_secret = v;
            }
        }
    }
}
