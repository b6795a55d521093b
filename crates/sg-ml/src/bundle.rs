//! Published model state and the shadow predictor.

use std::sync::Arc;

use ndarray::Array1;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use sg_features::{Normalizer, F};
use sg_logging::MetricsV1;

use crate::model::Mlp;

/// Metadata persisted as `metrics.json` next to the weights.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelVersionMeta {
    pub version_id: String,
    pub created_ts_ms: u64,
    pub arch: String,
    pub feature_schema_id: u32,
    pub metrics: MetricsV1,
    pub train_samples: usize,
    pub val_samples: usize,
    pub synthetic_samples: usize,
    pub epochs: u32,
}

/// Everything a reader needs to score a submission: immutable once built.
#[derive(Debug, Clone)]
pub struct ModelBundle {
    pub meta: ModelVersionMeta,
    pub normalizer: Normalizer,
    pub mlp: Mlp,
}

impl ModelBundle {
    /// Cheat probability for a raw (unnormalized) feature vector.
    pub fn predict(&self, raw: &[f64; F]) -> f64 {
        let z = self.normalizer.apply(raw);
        let x = Array1::from_iter(z);
        self.mlp.forward(&x).clamp(0.0, 1.0)
    }
}

/// The active model pointer: one writer (the training worker), many readers.
///
/// Readers clone the `Arc` under a short read lock and keep using that
/// snapshot for the rest of their request; a publish can never expose a
/// half-initialized bundle.
#[derive(Default)]
pub struct ActiveModel {
    inner: RwLock<Option<Arc<ModelBundle>>>,
}

impl ActiveModel {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn publish(&self, bundle: ModelBundle) {
        *self.inner.write() = Some(Arc::new(bundle));
    }

    pub fn current(&self) -> Option<Arc<ModelBundle>> {
        self.inner.read().clone()
    }

    pub fn current_meta(&self) -> Option<ModelVersionMeta> {
        self.inner.read().as_ref().map(|b| b.meta.clone())
    }
}

/// Shadow-mode predictor. Its output drives edge-case logging and training
/// signal only; it never rejects a submission.
pub struct Predictor {
    active: Arc<ActiveModel>,
    min_score: u32,
}

impl Predictor {
    pub fn new(active: Arc<ActiveModel>, min_score: u32) -> Self {
        Self { active, min_score }
    }

    /// `None` below the score floor (no prediction is made at all);
    /// 0.5 when no model has been trained yet.
    pub fn predict(&self, score: u32, raw: &[f64; F]) -> Option<f64> {
        if score < self.min_score {
            return None;
        }
        match self.active.current() {
            Some(bundle) => Some(bundle.predict(raw)),
            None => Some(0.5),
        }
    }
}
