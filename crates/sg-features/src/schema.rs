//! Behavioral feature schema v1.
//!
//! A stable, versioned 12-element vector summarizing how a game was played.
//! Order is load-bearing: stored normalization statistics and model weights
//! are positional.
//!
//! ### Layout (v1)
//! 0. `avg_time_between_moves` — mean inter-move delta, ms
//! 1. `move_time_variance` — population variance of the same deltas
//! 2. `moves_per_food` — moves / max(food, 1)
//! 3. `direction_entropy` — Shannon entropy (base 2) over the 4 directions
//! 4. `heartbeat_consistency` — 1 − min(1, stdev(|interval − 1000|) / 500)
//! 5. `score_rate` — score per second of reported duration
//! 6. `frame_timing_deviation` — stdev of Δtime/Δframe across moves
//! 7. `pause_gap_count` — heartbeat gaps > 2000 ms
//! 8. `speed_progression` — summed per-heartbeat speed decreases
//! 9. `movement_burst_rate` — fraction of move deltas < 100 ms
//! 10. `performance_time_drift` — mean |wall − monotonic| over heartbeats
//! 11. `avg_speed_per_food` — mean heartbeat speed / max(food, 1)
//!
//! Degenerate input (no moves, no heartbeats, zero denominators) resolves to
//! 0.0; no NaN or infinity ever leaves this crate.

/// Increment this whenever the feature layout changes.
pub const FEATURE_SCHEMA_ID: u32 = 1;

/// Feature vector length for schema v1.
pub const F: usize = 12;

/// Positional feature names, used in stored stats and importance logs.
pub const FEATURE_NAMES: [&str; F] = [
    "avg_time_between_moves",
    "move_time_variance",
    "moves_per_food",
    "direction_entropy",
    "heartbeat_consistency",
    "score_rate",
    "frame_timing_deviation",
    "pause_gap_count",
    "speed_progression",
    "movement_burst_rate",
    "performance_time_drift",
    "avg_speed_per_food",
];

/// Time-series tensor shape for the hybrid model input contract.
pub const SERIES_LEN: usize = 50;
pub const SERIES_CHANNELS: usize = 3;
