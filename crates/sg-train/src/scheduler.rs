//! Periodic retraining scheduler.
//!
//! Every tick it compares the edge-case total against the last count it
//! acted on, and starts a training run when enough new disagreements have
//! accumulated, the cooldown since the last completion has passed, and no
//! run is in flight. The decision core is separated from the clock so the
//! trigger logic is testable with synthetic time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use sg_core::SchedulerConfig;
use sg_edge::EdgeCaseLog;

use crate::worker::TrainingWorker;

/// Clock-free trigger decision state.
pub struct SchedulerCore {
    cfg: SchedulerConfig,
    last_seen_edge_count: u64,
}

impl SchedulerCore {
    pub fn new(cfg: SchedulerConfig) -> Self {
        Self {
            cfg,
            last_seen_edge_count: 0,
        }
    }

    /// One tick. Returns true when a training run should start now; the
    /// observed count is only consumed on a trigger, so quiet periods keep
    /// accumulating toward the threshold.
    pub fn should_trigger(
        &mut self,
        edge_count: u64,
        last_completion_ms: u64,
        in_progress: bool,
        now_ms: u64,
    ) -> bool {
        let delta = edge_count.saturating_sub(self.last_seen_edge_count);
        if delta < self.cfg.edge_case_threshold {
            return false;
        }
        if in_progress {
            return false;
        }
        let cooldown_ms = self.cfg.cooldown_s * 1000;
        if last_completion_ms != 0 && now_ms.saturating_sub(last_completion_ms) < cooldown_ms {
            return false;
        }
        self.last_seen_edge_count = edge_count;
        true
    }
}

/// Background scheduler thread. Sleeps in short slices so shutdown is
/// prompt even with a 30-minute period.
pub struct Scheduler {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Scheduler {
    pub fn start(
        cfg: SchedulerConfig,
        edge_log: Arc<EdgeCaseLog>,
        worker: Arc<TrainingWorker>,
    ) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stop2 = Arc::clone(&stop);
        let period = Duration::from_secs(cfg.period_s.max(1));
        let mut core = SchedulerCore::new(cfg);

        let handle = std::thread::spawn(move || {
            let slice = Duration::from_millis(500);
            loop {
                // Sleep one period, stop-aware.
                let mut slept = Duration::ZERO;
                while slept < period {
                    if stop2.load(Ordering::Relaxed) {
                        return;
                    }
                    std::thread::sleep(slice);
                    slept += slice;
                }

                let edge_count = edge_log.count();
                if core.should_trigger(
                    edge_count,
                    worker.last_completion_ms(),
                    worker.in_progress(),
                    sg_logging::now_ms(),
                ) {
                    tracing::info!(edge_count, "edge-case threshold reached; training");
                    worker.request("scheduler");
                }
            }
        });

        Self {
            stop,
            handle: Some(handle),
        }
    }

    pub fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> SchedulerConfig {
        SchedulerConfig::default() // threshold 10, cooldown 2h, period 30m
    }

    const HOUR_MS: u64 = 60 * 60 * 1000;

    #[test]
    fn triggers_once_threshold_and_cooldown_allow() {
        let mut core = SchedulerCore::new(cfg());
        // 10 new edge cases, never trained before: go.
        assert!(core.should_trigger(10, 0, false, 3 * HOUR_MS));
    }

    #[test]
    fn below_threshold_keeps_accumulating() {
        let mut core = SchedulerCore::new(cfg());
        assert!(!core.should_trigger(9, 0, false, HOUR_MS));
        // Nothing was consumed; one more case crosses the line.
        assert!(core.should_trigger(10, 0, false, HOUR_MS + 1));
    }

    #[test]
    fn cooldown_blocks_a_second_run() {
        let mut core = SchedulerCore::new(cfg());
        let t0 = 10 * HOUR_MS;
        assert!(core.should_trigger(10, 0, false, t0));
        // Training completed shortly after; ten more cases arrive within
        // the two-hour cooldown.
        let completed = t0 + 60_000;
        assert!(!core.should_trigger(20, completed, false, t0 + HOUR_MS));
        // After the cooldown those same cases do trigger.
        assert!(core.should_trigger(20, completed, false, completed + 2 * HOUR_MS));
    }

    #[test]
    fn in_progress_run_defers_the_trigger() {
        let mut core = SchedulerCore::new(cfg());
        assert!(!core.should_trigger(15, 0, true, HOUR_MS));
        // Run finished: same backlog fires on the next tick.
        assert!(core.should_trigger(15, 0, false, 5 * HOUR_MS));
    }
}
