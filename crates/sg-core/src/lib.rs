//! sg-core: Domain types, shared game rules, the client-mirrored food RNG,
//! and configuration.

pub mod config;
pub mod rng;
pub mod types;

pub use config::{Config, ConfigError, DetectConfig, GameRules, MlConfig, SchedulerConfig,
    ServerConfig, TrainingConfig};
pub use rng::{spawn_food, unit_rand};
pub use types::{CheatKind, Cell, Direction, GameSession, Heartbeat, Move, Submission};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
