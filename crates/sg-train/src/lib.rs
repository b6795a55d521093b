//! sg-train: Background retraining of the shadow model.
//!
//! Pieces, in data-flow order: seeded synthetic archetype generators fill
//! the sample pool when real labels are scarce; the trainer fits and
//! evaluates a candidate; the activation gate rejects regressions; the
//! worker serializes runs through an atomic Idle/Running/RunningWithPending
//! state machine; the scheduler turns accumulated edge cases into runs,
//! subject to a cooldown.

pub mod scheduler;
pub mod synthetic;
pub mod trainer;
pub mod worker;

pub use scheduler::{Scheduler, SchedulerCore};
pub use synthetic::{generate_synthetic, Archetype};
pub use trainer::{should_activate, train, TrainError, TrainOutcome};
pub use worker::{RequestOutcome, TrainingWorker, WorkerDeps};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
