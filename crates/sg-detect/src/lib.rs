//! sg-detect: Layered rule detectors.
//!
//! Detectors run in a fixed order and the first to fire short-circuits the
//! rest; the replay engine is the final, most expensive rule. The crate is
//! I/O-free: the caller supplies the expected session seed, and detector
//! outcomes are values for the orchestrator to translate.

pub mod detectors;

#[cfg(test)]
mod detector_tests;

pub use detectors::{run, CheatFinding, RuleVerdict};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
