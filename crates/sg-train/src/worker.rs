//! The training worker: one run at a time, never a dropped request.
//!
//! State machine {Idle, Running, RunningWithPending} with CAS transitions.
//! A request during a run marks pending; completion launches exactly one
//! follow-up. A debouncer drops event-driven re-triggers that arrive within
//! the minimum gap of the last start. The stop flag is honored between
//! epochs for graceful shutdown.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use parking_lot::Mutex;

use sg_core::TrainingConfig;
use sg_logging::{EventLog, TrainingRunEventV1};
use sg_ml::{ActiveModel, ModelBundle, ModelStore, ModelVersionMeta};
use sg_store::TrainingSampleStore;

use crate::synthetic::generate_synthetic;
use crate::trainer::{feature_importance, should_activate, train};

const IDLE: u8 = 0;
const RUNNING: u8 = 1;
const RUNNING_PENDING: u8 = 2;

/// Floor on synthetic samples per archetype when augmenting.
const MIN_PER_ARCHETYPE: usize = 5;

/// Lock-free run flags. Separated out so the race-sensitive transitions are
/// testable without spinning up real training.
pub(crate) struct RunFlags {
    state: AtomicU8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Begin {
    Started,
    MarkedPending,
    AlreadyPending,
}

impl RunFlags {
    pub(crate) fn new() -> Self {
        Self {
            state: AtomicU8::new(IDLE),
        }
    }

    /// Attempt to start a run, or record the wish for one.
    pub(crate) fn try_begin(&self) -> Begin {
        loop {
            match self.state.compare_exchange(
                IDLE,
                RUNNING,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Begin::Started,
                Err(RUNNING) => {
                    match self.state.compare_exchange(
                        RUNNING,
                        RUNNING_PENDING,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    ) {
                        Ok(_) => return Begin::MarkedPending,
                        // Raced with a completion or another marker; retry
                        // from the top.
                        Err(_) => continue,
                    }
                }
                Err(RUNNING_PENDING) => return Begin::AlreadyPending,
                Err(_) => continue,
            }
        }
    }

    /// Finish a run. Returns true when a pending request was queued: the
    /// caller must run again (state is already back to Running).
    pub(crate) fn finish(&self) -> bool {
        match self
            .state
            .compare_exchange(RUNNING, IDLE, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => false,
            Err(_) => {
                // Must be RunningWithPending: consume the pending slot.
                self.state.store(RUNNING, Ordering::Release);
                true
            }
        }
    }

    pub(crate) fn is_idle(&self) -> bool {
        self.state.load(Ordering::Acquire) == IDLE
    }
}

/// What `request` did with your trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    Started,
    QueuedPending,
    AlreadyPending,
    Debounced,
}

/// Everything a run needs, shared with the background thread.
pub struct WorkerDeps {
    pub config: TrainingConfig,
    pub samples: Arc<TrainingSampleStore>,
    pub model_store: Arc<ModelStore>,
    pub active: Arc<ActiveModel>,
    /// NDJSON file receiving one `training_run` event per completed run.
    pub events_path: PathBuf,
}

struct Inner {
    deps: WorkerDeps,
    flags: RunFlags,
    stop: AtomicBool,
    last_attempt_ms: AtomicU64,
    last_completion_ms: AtomicU64,
    runs_completed: AtomicU64,
}

pub struct TrainingWorker {
    inner: Arc<Inner>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl TrainingWorker {
    pub fn new(deps: WorkerDeps) -> Self {
        Self {
            inner: Arc::new(Inner {
                deps,
                flags: RunFlags::new(),
                stop: AtomicBool::new(false),
                last_attempt_ms: AtomicU64::new(0),
                last_completion_ms: AtomicU64::new(0),
                runs_completed: AtomicU64::new(0),
            }),
            handle: Mutex::new(None),
        }
    }

    /// Ask for a training run. Starts one, queues exactly one follow-up if a
    /// run is already going, or drops the request inside the debounce gap.
    pub fn request(&self, trigger: &str) -> RequestOutcome {
        let inner = &self.inner;
        if inner.stop.load(Ordering::Relaxed) {
            return RequestOutcome::Debounced;
        }

        let now = sg_logging::now_ms();
        let debounce_ms = inner.deps.config.debounce_s * 1000;
        if inner.flags.is_idle() {
            let last = inner.last_attempt_ms.load(Ordering::Acquire);
            if last != 0 && now.saturating_sub(last) < debounce_ms {
                return RequestOutcome::Debounced;
            }
        }

        match inner.flags.try_begin() {
            Begin::Started => {
                inner.last_attempt_ms.store(now, Ordering::Release);
                let inner2 = Arc::clone(inner);
                let trigger = trigger.to_string();
                let handle = std::thread::spawn(move || run_loop(&inner2, trigger));
                let mut slot = self.handle.lock();
                if let Some(prev) = slot.take() {
                    // A previous run already finished (we were Idle); reap it.
                    let _ = prev.join();
                }
                *slot = Some(handle);
                RequestOutcome::Started
            }
            Begin::MarkedPending => RequestOutcome::QueuedPending,
            Begin::AlreadyPending => RequestOutcome::AlreadyPending,
        }
    }

    pub fn in_progress(&self) -> bool {
        !self.inner.flags.is_idle()
    }

    /// Unix ms of the last successful completion, 0 if none.
    pub fn last_completion_ms(&self) -> u64 {
        self.inner.last_completion_ms.load(Ordering::Acquire)
    }

    pub fn runs_completed(&self) -> u64 {
        self.inner.runs_completed.load(Ordering::Acquire)
    }

    /// Signal stop and wait for any in-flight run to wind down.
    pub fn shutdown(&self) {
        self.inner.stop.store(true, Ordering::Relaxed);
        if let Some(h) = self.handle.lock().take() {
            let _ = h.join();
        }
    }
}

impl Drop for TrainingWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_loop(inner: &Inner, mut trigger: String) {
    loop {
        run_once(inner, &trigger);
        let follow_up = inner.flags.finish();
        if !follow_up || inner.stop.load(Ordering::Relaxed) {
            if follow_up {
                // We consumed the pending slot but are shutting down; put
                // the state back so nothing looks stuck.
                let _ = inner.flags.finish();
            }
            break;
        }
        trigger = "pending".to_string();
        inner
            .last_attempt_ms
            .store(sg_logging::now_ms(), Ordering::Release);
    }
}

fn run_once(inner: &Inner, trigger: &str) {
    let t0 = Instant::now();
    let cfg = &inner.deps.config;

    let mut samples = match inner.deps.samples.snapshot() {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(error = %e, "training run aborted: sample snapshot failed");
            return;
        }
    };
    let real = samples.len();

    if real < cfg.min_samples {
        let deficit = cfg.min_samples - real;
        let per_archetype = (deficit.div_ceil(7)).max(MIN_PER_ARCHETYPE);
        let seed = 0x5EED_F00D ^ real as u64;
        samples.extend(generate_synthetic(seed, per_archetype));
        tracing::debug!(
            real,
            synthetic = samples.len() - real,
            "augmented sparse sample pool"
        );
    }

    let outcome = match train(cfg, &samples, 0xC0DE ^ samples.len() as u64, &inner.stop) {
        Ok(o) => o,
        Err(e) => {
            tracing::warn!(error = %e, trigger, "training run failed");
            return;
        }
    };

    let previous = inner.deps.active.current_meta();
    let activated = should_activate(
        &outcome.metrics,
        previous.as_ref().map(|m| &m.metrics),
        cfg.max_regression,
    );

    let meta = ModelVersionMeta {
        version_id: String::new(),
        created_ts_ms: sg_logging::now_ms(),
        arch: "dense_v1".to_string(),
        feature_schema_id: sg_features::FEATURE_SCHEMA_ID,
        metrics: outcome.metrics,
        train_samples: outcome.train_samples,
        val_samples: outcome.val_samples,
        synthetic_samples: outcome.synthetic_samples,
        epochs: outcome.epochs_run,
    };
    let saved = match inner
        .deps
        .model_store
        .save_version(&outcome.mlp, &outcome.normalizer, meta)
    {
        Ok(m) => m,
        Err(e) => {
            tracing::error!(error = %e, "failed to persist model version");
            return;
        }
    };

    if activated {
        if let Err(e) = inner.deps.model_store.set_active(&saved.version_id) {
            tracing::error!(error = %e, "failed to repoint ACTIVE");
            return;
        }
        inner.deps.active.publish(ModelBundle {
            meta: saved.clone(),
            normalizer: outcome.normalizer.clone(),
            mlp: outcome.mlp.clone(),
        });
        let importance = feature_importance(&outcome.mlp);
        tracing::info!(
            version = %saved.version_id,
            f1 = outcome.metrics.f1,
            accuracy = outcome.metrics.accuracy,
            ?importance,
            "activated new model version"
        );
    } else {
        tracing::info!(
            version = %saved.version_id,
            f1 = outcome.metrics.f1,
            "trained model did not pass the activation gate"
        );
    }

    let event = TrainingRunEventV1 {
        event: TrainingRunEventV1::EVENT,
        ts_ms: sg_logging::now_ms(),
        trigger: trigger.to_string(),
        total_samples: outcome.total_samples,
        synthetic_samples: outcome.synthetic_samples,
        train_samples: outcome.train_samples,
        val_samples: outcome.val_samples,
        epochs: outcome.epochs_run,
        metrics: outcome.metrics,
        activated,
        previous_f1: previous.map(|m| m.metrics.f1),
        version_id: Some(saved.version_id),
        duration_ms: t0.elapsed().as_millis() as u64,
    };
    let appended = EventLog::create(&inner.deps.events_path).and_then(|mut log| log.append(&event));
    if let Err(e) = appended {
        tracing::warn!(error = %e, "could not append training_run event");
    }

    inner
        .last_completion_ms
        .store(sg_logging::now_ms(), Ordering::Release);
    inner.runs_completed.fetch_add(1, Ordering::AcqRel);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn flags_idle_running_pending_cycle() {
        let f = RunFlags::new();
        assert!(f.is_idle());
        assert_eq!(f.try_begin(), Begin::Started);
        assert!(!f.is_idle());
        // A second and third request while running: one pending slot.
        assert_eq!(f.try_begin(), Begin::MarkedPending);
        assert_eq!(f.try_begin(), Begin::AlreadyPending);
        // Completion consumes the pending slot and stays Running.
        assert!(f.finish());
        assert!(!f.is_idle());
        // The follow-up completes with nothing queued.
        assert!(!f.finish());
        assert!(f.is_idle());
    }

    #[test]
    fn pending_pair_never_drops_a_request() {
        // Request storm: every outcome must be one of the three accounted
        // states, and the run count implied by finish() matches.
        let f = RunFlags::new();
        assert_eq!(f.try_begin(), Begin::Started);
        for _ in 0..100 {
            let b = f.try_begin();
            assert!(matches!(b, Begin::MarkedPending | Begin::AlreadyPending));
        }
        // One follow-up, not a hundred.
        assert!(f.finish());
        assert!(!f.finish());
        assert!(f.is_idle());
    }

    fn test_worker(dir: &std::path::Path) -> TrainingWorker {
        let samples =
            Arc::new(TrainingSampleStore::open(dir.join("samples.ndjson")).unwrap());
        let model_store = Arc::new(ModelStore::open(dir.join("models")).unwrap());
        let active = Arc::new(ActiveModel::empty());
        let config = TrainingConfig {
            epochs: 5,
            batch_size: 16,
            debounce_s: 0,
            ..TrainingConfig::default()
        };
        TrainingWorker::new(WorkerDeps {
            config,
            samples,
            model_store,
            active,
            events_path: dir.join("training_runs.ndjson"),
        })
    }

    fn wait_done(w: &TrainingWorker, runs: u64) {
        for _ in 0..600 {
            if w.runs_completed() >= runs && !w.in_progress() {
                return;
            }
            std::thread::sleep(Duration::from_millis(50));
        }
        panic!("training did not finish in time");
    }

    #[test]
    fn first_run_trains_on_synthetic_and_activates() {
        let dir = tempfile::tempdir().unwrap();
        let w = test_worker(dir.path());
        assert_eq!(w.request("manual"), RequestOutcome::Started);
        wait_done(&w, 1);

        assert!(w.last_completion_ms() > 0);
        assert!(w.inner.deps.active.current().is_some(), "first model active");
        let versions = w.inner.deps.model_store.list_versions().unwrap();
        assert_eq!(versions.len(), 1);
        assert!(w
            .inner
            .deps
            .model_store
            .active_version_id()
            .unwrap()
            .is_some());

        let events: Vec<serde_json::Value> =
            sg_logging::read_ndjson(dir.path().join("training_runs.ndjson")).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["event"], "training_run");
        assert_eq!(events[0]["activated"], true);
        assert_eq!(events[0]["trigger"], "manual");
    }

    #[test]
    fn debounce_drops_rapid_retriggers() {
        let dir = tempfile::tempdir().unwrap();
        let samples =
            Arc::new(TrainingSampleStore::open(dir.path().join("samples.ndjson")).unwrap());
        let model_store = Arc::new(ModelStore::open(dir.path().join("models")).unwrap());
        let active = Arc::new(ActiveModel::empty());
        let config = TrainingConfig {
            epochs: 2,
            debounce_s: 3600,
            ..TrainingConfig::default()
        };
        let w = TrainingWorker::new(WorkerDeps {
            config,
            samples,
            model_store,
            active,
            events_path: dir.path().join("training_runs.ndjson"),
        });
        assert_eq!(w.request("manual"), RequestOutcome::Started);
        wait_done(&w, 1);
        // Within the gap and idle: dropped.
        assert_eq!(w.request("cheat_event"), RequestOutcome::Debounced);
    }
}
