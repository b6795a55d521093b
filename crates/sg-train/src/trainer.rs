//! Training pipeline: normalize, shuffle, split, fit, evaluate.

use ndarray::Array1;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use rand_core::SeedableRng;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

use sg_core::TrainingConfig;
use sg_features::Normalizer;
use sg_logging::MetricsV1;
use sg_ml::{DropoutMask, Grads, Mlp};
use sg_store::TrainingSample;

#[derive(Debug, Error)]
pub enum TrainError {
    #[error("not enough samples to train: {got} < {need}")]
    NotEnoughSamples { got: usize, need: usize },
    #[error("training needs both classes; got {cheats} cheat / {legits} legit")]
    SingleClass { cheats: usize, legits: usize },
    #[error("stopped before completion")]
    Stopped,
}

/// Everything a finished run produces.
#[derive(Debug, Clone)]
pub struct TrainOutcome {
    pub mlp: Mlp,
    pub normalizer: Normalizer,
    pub metrics: MetricsV1,
    pub total_samples: usize,
    pub synthetic_samples: usize,
    pub train_samples: usize,
    pub val_samples: usize,
    pub epochs_run: u32,
}

/// Minimum usable sample count (after augmentation).
pub const MIN_TRAINABLE: usize = 10;

/// Adam optimizer state over all parameters.
struct Adam {
    m: Grads,
    v: Grads,
    t: i32,
    lr: f64,
}

const BETA1: f64 = 0.9;
const BETA2: f64 = 0.999;
const ADAM_EPS: f64 = 1e-8;

impl Adam {
    fn new(lr: f64) -> Self {
        Self {
            m: Grads::zeros(),
            v: Grads::zeros(),
            t: 0,
            lr,
        }
    }

    fn step(&mut self, mlp: &mut Mlp, g: &Grads) {
        self.t += 1;
        let bc1 = 1.0 - BETA1.powi(self.t);
        let bc2 = 1.0 - BETA2.powi(self.t);
        let lr = self.lr;

        macro_rules! update {
            ($param:ident) => {{
                self.m.$param = &self.m.$param * BETA1 + &(g.$param.mapv(|x| x * (1.0 - BETA1)));
                self.v.$param =
                    &self.v.$param * BETA2 + &(g.$param.mapv(|x| x * x * (1.0 - BETA2)));
                let mhat = self.m.$param.mapv(|x| x / bc1);
                let vhat = self.v.$param.mapv(|x| x / bc2);
                let delta = &mhat / &(vhat.mapv(|x| x.sqrt() + ADAM_EPS));
                mlp.$param = &mlp.$param - &delta.mapv(|x| x * lr);
            }};
        }
        update!(w1);
        update!(b1);
        update!(w2);
        update!(b2);
        update!(w3);
        update!(b3);
    }
}

/// Train a fresh model on the given samples.
///
/// Deterministic in `seed` (init, shuffle, and dropout all derive from it).
/// `stop` is honored between epochs; a stopped run returns `Stopped` rather
/// than a half-trained model.
pub fn train(
    cfg: &TrainingConfig,
    samples: &[TrainingSample],
    seed: u64,
    stop: &AtomicBool,
) -> Result<TrainOutcome, TrainError> {
    if samples.len() < MIN_TRAINABLE {
        return Err(TrainError::NotEnoughSamples {
            got: samples.len(),
            need: MIN_TRAINABLE,
        });
    }
    let cheats = samples.iter().filter(|s| s.label >= 0.5).count();
    let legits = samples.len() - cheats;
    if cheats == 0 || legits == 0 {
        return Err(TrainError::SingleClass { cheats, legits });
    }

    let normalizer = {
        let feats: Vec<[f64; sg_features::F]> = samples.iter().map(|s| s.features).collect();
        Normalizer::fit(&feats)
    };

    let mut order: Vec<usize> = (0..samples.len()).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    order.shuffle(&mut rng);

    // 80/20 split, at least one sample on each side.
    let val_len = (samples.len() / 5).clamp(1, samples.len() - 1);
    let (val_idx, train_idx) = order.split_at(val_len);

    let xs: Vec<Array1<f64>> = samples
        .iter()
        .map(|s| Array1::from_iter(normalizer.apply(&s.features)))
        .collect();

    let mut mlp = Mlp::init(seed ^ 0xA11CE);
    let mut adam = Adam::new(cfg.learning_rate);
    let mut epoch_order = train_idx.to_vec();
    let mut epochs_run = 0u32;

    for _epoch in 0..cfg.epochs {
        if stop.load(Ordering::Relaxed) {
            return Err(TrainError::Stopped);
        }
        epoch_order.shuffle(&mut rng);
        for batch in epoch_order.chunks(cfg.batch_size.max(1)) {
            let mut acc = Grads::zeros();
            for &i in batch {
                let mask = DropoutMask::sample(&mut rng, cfg.dropout);
                let (g, _loss, _p) = mlp.grads(&xs[i], samples[i].label, &mask);
                acc.accumulate(&g);
            }
            acc.scale(1.0 / batch.len() as f64);
            adam.step(&mut mlp, &acc);
        }
        epochs_run += 1;
    }

    let metrics = evaluate(&mlp, &xs, samples, val_idx);
    let synthetic_samples = samples.iter().filter(|s| s.synthetic).count();

    Ok(TrainOutcome {
        mlp,
        normalizer,
        metrics,
        total_samples: samples.len(),
        synthetic_samples,
        train_samples: train_idx.len(),
        val_samples: val_idx.len(),
        epochs_run,
    })
}

fn evaluate(
    mlp: &Mlp,
    xs: &[Array1<f64>],
    samples: &[TrainingSample],
    val_idx: &[usize],
) -> MetricsV1 {
    let mut tp = 0usize;
    let mut tn = 0usize;
    let mut fp = 0usize;
    let mut fne = 0usize;
    for &i in val_idx {
        let p = mlp.forward(&xs[i]);
        let pred_cheat = p >= 0.5;
        let is_cheat = samples[i].label >= 0.5;
        match (pred_cheat, is_cheat) {
            (true, true) => tp += 1,
            (false, false) => tn += 1,
            (true, false) => fp += 1,
            (false, true) => fne += 1,
        }
    }
    let total = (tp + tn + fp + fne).max(1) as f64;
    let accuracy = (tp + tn) as f64 / total;
    let precision = if tp + fp == 0 {
        0.0
    } else {
        tp as f64 / (tp + fp) as f64
    };
    let recall = if tp + fne == 0 {
        0.0
    } else {
        tp as f64 / (tp + fne) as f64
    };
    let f1 = if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    };
    MetricsV1 {
        accuracy,
        precision,
        recall,
        f1,
    }
}

/// Activation gate: the first model always activates; afterwards a
/// candidate may regress at most `max_regression` on F1 and on accuracy.
pub fn should_activate(
    candidate: &MetricsV1,
    active: Option<&MetricsV1>,
    max_regression: f64,
) -> bool {
    match active {
        None => true,
        Some(prev) => {
            candidate.f1 >= prev.f1 - max_regression
                && candidate.accuracy >= prev.accuracy - max_regression
        }
    }
}

/// Mean |first-layer weight| per input feature: a cheap importance signal
/// logged at activation time.
pub fn feature_importance(mlp: &Mlp) -> [f64; sg_features::F] {
    let mut out = [0.0f64; sg_features::F];
    let rows = mlp.w1.nrows() as f64;
    for ((_, j), v) in mlp.w1.indexed_iter() {
        out[j] += v.abs();
    }
    for v in &mut out {
        *v /= rows;
    }
    out
}
