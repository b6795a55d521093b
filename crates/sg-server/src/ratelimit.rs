//! Per-player sliding-window rate limiter.

use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Entries idle longer than this are dropped during sweeps.
const IDLE_GC: Duration = Duration::from_secs(60 * 60);

pub struct RateLimiter {
    events: DashMap<String, Vec<Instant>>,
    max_events: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_events: u32, window: Duration) -> Self {
        Self {
            events: DashMap::new(),
            max_events,
            window,
        }
    }

    /// Record an event for the player; false means over the limit (the
    /// event is not recorded, so backing off actually helps).
    pub fn check(&self, player_id: &str) -> bool {
        let now = Instant::now();
        let mut entry = self.events.entry(player_id.to_string()).or_default();
        entry.retain(|t| now.duration_since(*t) < self.window);
        if entry.len() >= self.max_events as usize {
            return false;
        }
        entry.push(now);
        true
    }

    /// Drop players with no events inside the GC horizon.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let before = self.events.len();
        self.events
            .retain(|_, ts| ts.iter().any(|t| now.duration_since(*t) < IDLE_GC));
        before - self.events.len()
    }
}
