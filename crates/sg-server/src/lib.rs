//! sg-server: Session registry, rate limiter, submission orchestrator, and
//! the HTTP surface that fronts them.

pub mod orchestrator;
pub mod ratelimit;
pub mod routes;
pub mod session;
pub mod state;

pub use orchestrator::{Pipeline, PipelineError, ScoreRequest, SubmitOutcome};
pub use ratelimit::RateLimiter;
pub use routes::router;
pub use session::SessionRegistry;
pub use state::{BootError, Services};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
