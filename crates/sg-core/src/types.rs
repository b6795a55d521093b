//! Canonical domain types shared across the pipeline.

use std::time::Instant;

use serde::{Deserialize, Serialize};

/// One grid cell. Coordinates are valid in `[0, grid)`; the replay engine
/// uses signed math so a wall hit is representable before it terminates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    pub x: i32,
    pub y: i32,
}

impl Cell {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Snake heading. Wire encoding is the numeric value (0..=3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum Direction {
    Up = 0,
    Right = 1,
    Down = 2,
    Left = 3,
}

impl Direction {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Direction::Up),
            1 => Some(Direction::Right),
            2 => Some(Direction::Down),
            3 => Some(Direction::Left),
            _ => None,
        }
    }

    /// (dx, dy) with y growing downward.
    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Right => (1, 0),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
        }
    }

    /// The opposite heading. A move into the inverse of the current heading
    /// is ignored during replay, matching the client.
    pub fn inverse(self) -> Self {
        match self {
            Direction::Up => Direction::Down,
            Direction::Right => Direction::Left,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
        }
    }
}

/// One committed direction change.
///
/// `frame` is the simulation frame the move takes effect on, monotonically
/// non-decreasing within a submission. `time_ms` is milliseconds since game
/// start as measured by the client.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Move {
    pub direction: Direction,
    pub frame: u32,
    pub time_ms: f64,
}

/// Periodic client self-report used to corroborate wall-clock vs
/// monotonic-clock progress.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Heartbeat {
    /// Wall-clock delta since game start (ms).
    pub time_ms: f64,
    /// High-resolution monotonic delta since game start (ms).
    pub perf_ms: f64,
    pub frame: u32,
    /// Simulation step at the time of the beat (ms/frame).
    pub speed_ms: f64,
    pub score: Option<u32>,
}

/// A fully decoded, field-validated score submission.
///
/// Submissions are consumed values: the orchestrator takes ownership and the
/// pipeline threads them through by reference.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub player_id: String,
    pub score: u32,
    pub speed_level: u32,
    pub food_eaten: u32,
    /// Client-reported game duration in seconds.
    pub game_duration_s: f64,
    pub seed: u32,
    pub moves: Vec<Move>,
    pub heartbeats: Vec<Heartbeat>,
    pub total_frames: u32,
}

/// Transient per-player in-flight game, owned by the session registry.
///
/// At most one live session exists per player; starting a new game
/// overwrites the old session (last write wins).
#[derive(Debug, Clone)]
pub struct GameSession {
    pub player_id: String,
    pub seed: u32,
    pub started: Instant,
}

impl GameSession {
    pub fn new(player_id: impl Into<String>, seed: u32) -> Self {
        Self {
            player_id: player_id.into(),
            seed,
            started: Instant::now(),
        }
    }
}

/// Why a submission was rejected. The fixed set is part of the persisted
/// cheater-record format; variants are never renamed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheatKind {
    ScoreMismatch,
    SpeedHack,
    InvalidSession,
    PauseAbuse,
    BotUsage,
    TimingManipulation,
    ReplayFail,
    MissingMoves,
}

impl CheatKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheatKind::ScoreMismatch => "score_mismatch",
            CheatKind::SpeedHack => "speed_hack",
            CheatKind::InvalidSession => "invalid_session",
            CheatKind::PauseAbuse => "pause_abuse",
            CheatKind::BotUsage => "bot_usage",
            CheatKind::TimingManipulation => "timing_manipulation",
            CheatKind::ReplayFail => "replay_fail",
            CheatKind::MissingMoves => "missing_moves",
        }
    }
}
