//! Structured replay diagnostics for operator review.
//!
//! The full frame-by-frame trace of a long game is too large to keep, so the
//! log is capped: the first and last few frames plus every food event. That
//! is enough to see where a replay diverged without shipping megabytes.
//! None of this ever reaches the client.

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};
use sg_core::{Cell, Direction};

/// Frames kept verbatim at each end of the trace.
const EDGE_FRAMES: usize = 5;

/// One recorded simulation step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameEvent {
    pub frame: u32,
    pub head: Cell,
    pub direction: Direction,
    pub score: u32,
    /// True when food was eaten on this frame.
    pub ate: bool,
}

/// Capped frame trace: first/last `EDGE_FRAMES` frames + all food events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameLog {
    pub first: Vec<FrameEvent>,
    pub last: Vec<FrameEvent>,
    pub food: Vec<FrameEvent>,
    pub total_frames: u32,
}

impl FrameLog {
    pub(crate) fn recorder() -> FrameLogRecorder {
        FrameLogRecorder {
            first: Vec::with_capacity(EDGE_FRAMES),
            last: VecDeque::with_capacity(EDGE_FRAMES + 1),
            food: Vec::new(),
            total_frames: 0,
        }
    }
}

pub(crate) struct FrameLogRecorder {
    first: Vec<FrameEvent>,
    last: VecDeque<FrameEvent>,
    food: Vec<FrameEvent>,
    total_frames: u32,
}

impl FrameLogRecorder {
    pub(crate) fn record(&mut self, ev: FrameEvent) {
        self.total_frames = ev.frame;
        if self.first.len() < EDGE_FRAMES {
            self.first.push(ev);
        }
        self.last.push_back(ev);
        if self.last.len() > EDGE_FRAMES {
            self.last.pop_front();
        }
        if ev.ate {
            self.food.push(ev);
        }
    }

    pub(crate) fn finish(self) -> FrameLog {
        FrameLog {
            first: self.first,
            last: self.last.into_iter().collect(),
            food: self.food,
            total_frames: self.total_frames,
        }
    }
}

/// A single verification failure. `Display` produces the exact operator-log
/// phrasing, e.g. `Score mismatch: replay calculated 0, client sent 50`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReplayFailure {
    ScoreMismatch { replayed: u32, submitted: u32 },
    FoodMismatch { replayed: u32, submitted: u32 },
    DurationMismatch {
        simulated_s: u64,
        submitted_s: f64,
        tolerance_s: f64,
    },
}

impl fmt::Display for ReplayFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplayFailure::ScoreMismatch {
                replayed,
                submitted,
            } => write!(
                f,
                "Score mismatch: replay calculated {replayed}, client sent {submitted}"
            ),
            ReplayFailure::FoodMismatch {
                replayed,
                submitted,
            } => write!(
                f,
                "Food mismatch: replay calculated {replayed}, client sent {submitted}"
            ),
            ReplayFailure::DurationMismatch {
                simulated_s,
                submitted_s,
                tolerance_s,
            } => write!(
                f,
                "Duration mismatch: replay simulated {simulated_s}s, client sent {submitted_s}s (tolerance {tolerance_s}s)"
            ),
        }
    }
}

/// Full verification result handed to the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayVerdict {
    pub passed: bool,
    pub failures: Vec<ReplayFailure>,
    pub replayed_score: u32,
    pub replayed_food: u32,
    pub simulated_duration_s: u64,
    pub frame_log: FrameLog,
}

impl ReplayVerdict {
    /// One-line reason string for the cheat record (first failure wins).
    pub fn reason(&self) -> String {
        match self.failures.first() {
            Some(f) => f.to_string(),
            None => "replay ok".to_string(),
        }
    }
}
