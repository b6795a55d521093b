//! Replay engine: the single place that re-executes game rules.
//!
//! Mirrors the client simulation exactly: one frame advances the simulated
//! clock by the current speed, applies at most the moves logged for that
//! frame, steps the head, and resolves wall/self/food outcomes in that
//! order. Any drift from the client here breaks verification for honest
//! players, so changes must ship in lockstep with the browser build.

use sg_core::{rng, Cell, Direction, GameRules, Move, Submission};

use crate::report::{FrameEvent, FrameLog, ReplayFailure, ReplayVerdict};

/// Slack frames granted beyond the client-reported total. The client's final
/// frame count can lag its last committed move by a few frames.
const FRAME_SLACK: u32 = 10;

/// Why the simulation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    WallCollision { frame: u32 },
    SelfCollision { frame: u32 },
    FrameCapReached,
    /// Defensive bound tripped; the submission is hostile or the engine is
    /// out of sync. Never expected from an honest client.
    FoodBoundExceeded,
}

/// Raw result of re-executing a game.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayOutcome {
    pub score: u32,
    pub food_eaten: u32,
    pub frames_simulated: u32,
    pub simulated_clock_ms: u64,
    pub end: EndReason,
    pub frame_log: FrameLog,
}

impl ReplayOutcome {
    pub fn simulated_duration_s(&self) -> u64 {
        self.simulated_clock_ms / 1000
    }
}

/// Re-execute a game from its seed and move log.
///
/// Moves must be sorted by frame (the codec preserves client order). Stale
/// entries (frame already passed, e.g. legacy frame-0 moves) are consumed
/// without effect so one bad entry cannot dam the rest of the log.
pub fn replay(rules: &GameRules, seed: u32, moves: &[Move], total_frames: u32) -> ReplayOutcome {
    let grid = rules.grid;
    let center = grid / 2;

    // Three cells ending at the center column, heading right. Head first.
    let mut snake: Vec<Cell> = vec![
        Cell::new(center, center),
        Cell::new(center - 1, center),
        Cell::new(center - 2, center),
    ];
    let mut direction = Direction::Right;
    let mut score: u32 = 0;
    let mut food_eaten: u32 = 0;
    let mut speed_ms: u32 = rules.initial_speed_ms;
    let mut food = rng::spawn_food(seed, food_eaten, grid, &snake);

    let mut clock_ms: u64 = 0;
    let mut next_move = 0usize;
    let mut log = FrameLog::recorder();

    let frame_cap = total_frames.saturating_add(FRAME_SLACK).min(rules.max_frames);

    let mut end = EndReason::FrameCapReached;
    let mut frames_simulated = 0u32;

    for frame in 1..=frame_cap {
        clock_ms += speed_ms as u64;

        while let Some(m) = moves.get(next_move) {
            if m.frame > frame {
                break;
            }
            if m.frame == frame && m.direction != direction.inverse() {
                direction = m.direction;
            }
            next_move += 1;
        }

        let (dx, dy) = direction.delta();
        let head = snake[0];
        let new_head = Cell::new(head.x + dx, head.y + dy);

        frames_simulated = frame;

        if new_head.x < 0 || new_head.x >= grid || new_head.y < 0 || new_head.y >= grid {
            end = EndReason::WallCollision { frame };
            break;
        }
        if snake.contains(&new_head) {
            end = EndReason::SelfCollision { frame };
            break;
        }

        snake.insert(0, new_head);

        let ate = new_head == food;
        if ate {
            score += 10;
            food_eaten += 1;
            food = rng::spawn_food(seed, food_eaten, grid, &snake);
            speed_ms = speed_ms
                .saturating_sub(rules.speed_increase_ms)
                .max(rules.min_speed_ms);
        } else {
            snake.pop();
        }

        log.record(FrameEvent {
            frame,
            head: new_head,
            direction,
            score,
            ate,
        });

        if food_eaten > rules.max_food {
            end = EndReason::FoodBoundExceeded;
            break;
        }
    }

    ReplayOutcome {
        score,
        food_eaten,
        frames_simulated,
        simulated_clock_ms: clock_ms,
        end,
        frame_log: log.finish(),
    }
}

/// Replay a submission and verify score, food count, and duration.
///
/// Tolerances: score ±`score_tolerance` only when the replayed food count is
/// at or below `low_food_threshold`; food count exact; duration within
/// max(floor, submitted × frac) seconds of the simulated clock.
pub fn verify(
    rules: &GameRules,
    detect: &sg_core::DetectConfig,
    sub: &Submission,
) -> ReplayVerdict {
    let outcome = replay(rules, sub.seed, &sub.moves, sub.total_frames);
    let mut failures = Vec::new();

    let score_tolerance = if outcome.food_eaten <= detect.low_food_threshold {
        detect.score_tolerance
    } else {
        0
    };
    if sub.score.abs_diff(outcome.score) > score_tolerance {
        failures.push(ReplayFailure::ScoreMismatch {
            replayed: outcome.score,
            submitted: sub.score,
        });
    }

    if sub.food_eaten != outcome.food_eaten {
        failures.push(ReplayFailure::FoodMismatch {
            replayed: outcome.food_eaten,
            submitted: sub.food_eaten,
        });
    }

    let simulated_s = outcome.simulated_duration_s();
    let tolerance_s = detect
        .duration_tolerance_floor_s
        .max(sub.game_duration_s * detect.duration_tolerance_frac);
    if (simulated_s as f64 - sub.game_duration_s).abs() > tolerance_s {
        failures.push(ReplayFailure::DurationMismatch {
            simulated_s,
            submitted_s: sub.game_duration_s,
            tolerance_s,
        });
    }

    ReplayVerdict {
        passed: failures.is_empty(),
        failures,
        replayed_score: outcome.score,
        replayed_food: outcome.food_eaten,
        simulated_duration_s: simulated_s,
        frame_log: outcome.frame_log,
    }
}
