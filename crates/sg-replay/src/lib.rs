//! sg-replay: Server-side re-execution of a game from (seed, moves).
//!
//! The engine is pure: the same inputs always produce the same outcome
//! (no clocks, no I/O, no RNG state beyond the seed). The orchestrator
//! treats divergence as a verdict value, never as an error.

pub mod engine;
pub mod report;


pub use engine::{replay, verify, EndReason, ReplayOutcome};
pub use report::{FrameEvent, FrameLog, ReplayFailure, ReplayVerdict};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
