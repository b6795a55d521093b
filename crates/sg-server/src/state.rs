//! Service composition and lifecycle.
//!
//! Startup order: persistence → model registry (publish the active bundle
//! before any request can ask for a prediction) → registry/limiter →
//! background workers → HTTP. Shutdown walks the same order backwards.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;

use sg_core::Config;
use sg_edge::EdgeCaseLog;
use sg_logging::EventLog;
use sg_ml::{ActiveModel, ModelStore, Predictor};
use sg_store::{FsScoreStore, ScoreStore, TrainingSampleStore};
use sg_train::{Scheduler, TrainingWorker, WorkerDeps};

use crate::orchestrator::Pipeline;
use crate::ratelimit::RateLimiter;
use crate::session::SessionRegistry;

#[derive(Debug, Error)]
pub enum BootError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("store: {0}")]
    Store(#[from] sg_store::StoreError),
    #[error("edge log: {0}")]
    Edge(#[from] sg_edge::EdgeError),
    #[error("model store: {0}")]
    Model(#[from] sg_ml::ModelStoreError),
    #[error("log: {0}")]
    Log(#[from] sg_logging::LogError),
}

/// Everything the HTTP surface needs, plus owned background services.
pub struct Services {
    pub config: Config,
    pub registry: Arc<SessionRegistry>,
    pub limiter: Arc<RateLimiter>,
    pub store: Arc<dyn ScoreStore>,
    pub samples: Arc<TrainingSampleStore>,
    pub edge_log: Arc<EdgeCaseLog>,
    pub active: Arc<ActiveModel>,
    pub model_store: Arc<ModelStore>,
    pub worker: Arc<TrainingWorker>,
    pub pipeline: Arc<Pipeline>,
    pub training_events_path: PathBuf,
    scheduler: Mutex<Option<Scheduler>>,
    sweeper: Mutex<Option<Sweeper>>,
}

impl Services {
    /// Build the full service graph under `config.server.data_dir`.
    pub fn build(config: Config) -> Result<Arc<Self>, BootError> {
        let data_dir = PathBuf::from(&config.server.data_dir);
        std::fs::create_dir_all(&data_dir)?;

        // Persistence first.
        let store = Arc::new(FsScoreStore::open(data_dir.join("scores.json"))?);
        let samples = Arc::new(TrainingSampleStore::open(
            data_dir.join("training_samples.ndjson"),
        )?);
        let edge_log = Arc::new(EdgeCaseLog::open(data_dir.join("edge_cases.ndjson"))?);

        // Model registry, with the stored active version published before
        // the first request.
        let model_store = Arc::new(ModelStore::open(data_dir.join("models"))?);
        let active = Arc::new(ActiveModel::empty());
        if let Some(bundle) = model_store.load_active()? {
            tracing::info!(version = %bundle.meta.version_id, "loaded active model");
            active.publish(bundle);
        } else {
            tracing::info!("no trained model yet; predictor is uninformative");
        }

        let registry = Arc::new(SessionRegistry::new(Duration::from_secs(
            config.server.session_ttl_s,
        )));
        let limiter = Arc::new(RateLimiter::new(
            config.server.rate_limit_events,
            Duration::from_secs(config.server.rate_limit_window_s),
        ));

        let training_events_path = data_dir.join("training_runs.ndjson");
        let worker = Arc::new(TrainingWorker::new(WorkerDeps {
            config: config.training,
            samples: Arc::clone(&samples),
            model_store: Arc::clone(&model_store),
            active: Arc::clone(&active),
            events_path: training_events_path.clone(),
        }));

        let store_port: Arc<dyn ScoreStore> = store.clone();
        let predictor = Predictor::new(Arc::clone(&active), config.ml.min_score_for_prediction);
        let cheat_log = EventLog::create(data_dir.join("cheat_detections.ndjson"))?;
        let pipeline = Arc::new(Pipeline::new(
            config.clone(),
            Arc::clone(&registry),
            Arc::clone(&limiter),
            Arc::clone(&store_port),
            Arc::clone(&samples),
            Arc::clone(&edge_log),
            predictor,
            Arc::clone(&worker),
            cheat_log,
        ));

        let sweeper = Sweeper::start(
            Arc::clone(&registry),
            Arc::clone(&limiter),
            Duration::from_secs(config.server.sweep_interval_s),
        );
        let scheduler = Scheduler::start(
            config.scheduler,
            Arc::clone(&edge_log),
            Arc::clone(&worker),
        );

        Ok(Arc::new(Self {
            config,
            registry,
            limiter,
            store: store_port,
            samples,
            edge_log,
            active,
            model_store,
            worker,
            pipeline,
            training_events_path,
            scheduler: Mutex::new(Some(scheduler)),
            sweeper: Mutex::new(Some(sweeper)),
        }))
    }

    /// Stop background services: scheduler first (no new runs), then the
    /// sweeper, then the worker (honors its stop flag between epochs).
    pub fn shutdown(&self) {
        if let Some(mut s) = self.scheduler.lock().take() {
            s.shutdown();
        }
        if let Some(mut s) = self.sweeper.lock().take() {
            s.shutdown();
        }
        self.worker.shutdown();
    }
}

/// TTL/GC sweeper for the session registry and the rate limiter.
struct Sweeper {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Sweeper {
    fn start(
        registry: Arc<SessionRegistry>,
        limiter: Arc<RateLimiter>,
        interval: Duration,
    ) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stop2 = Arc::clone(&stop);
        let handle = std::thread::spawn(move || {
            let slice = Duration::from_millis(500);
            loop {
                let mut slept = Duration::ZERO;
                while slept < interval {
                    if stop2.load(Ordering::Relaxed) {
                        return;
                    }
                    std::thread::sleep(slice);
                    slept += slice;
                }
                let sessions = registry.sweep();
                let limiter_entries = limiter.sweep();
                if sessions > 0 || limiter_entries > 0 {
                    tracing::debug!(sessions, limiter_entries, "sweep evicted stale entries");
                }
            }
        });
        Self {
            stop,
            handle: Some(handle),
        }
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        self.shutdown();
    }
}
