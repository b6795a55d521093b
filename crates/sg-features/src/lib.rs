//! sg-features: Behavioral feature vector + normalization for the shadow
//! detector. See `schema` for the versioned layout.

pub mod extract;
pub mod schema;

pub use extract::{extract, time_series, Normalizer};
pub use schema::{FEATURE_NAMES, FEATURE_SCHEMA_ID, F, SERIES_CHANNELS, SERIES_LEN};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
