//! Feature extraction + z-score normalization.

use serde::{Deserialize, Serialize};
use sg_core::Submission;

use crate::schema::{F, SERIES_CHANNELS, SERIES_LEN};

/// Replace non-finite intermediates with 0.0 before they can propagate.
fn finite(v: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    xs.iter().sum::<f64>() / xs.len() as f64
}

/// Population variance.
fn variance(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    let m = mean(xs);
    xs.iter().map(|x| (x - m) * (x - m)).sum::<f64>() / xs.len() as f64
}

fn stdev(xs: &[f64]) -> f64 {
    variance(xs).sqrt()
}

/// Extract the schema-v1 feature vector from a submission.
pub fn extract(sub: &Submission) -> [f64; F] {
    let move_deltas: Vec<f64> = sub
        .moves
        .windows(2)
        .map(|p| p[1].time_ms - p[0].time_ms)
        .collect();

    let hb_intervals: Vec<f64> = sub
        .heartbeats
        .windows(2)
        .map(|p| p[1].time_ms - p[0].time_ms)
        .collect();

    // 0, 1: inter-move timing.
    let avg_time_between_moves = mean(&move_deltas);
    let move_time_variance = variance(&move_deltas);

    // 2: moves per food.
    let moves_per_food = sub.moves.len() as f64 / sub.food_eaten.max(1) as f64;

    // 3: direction entropy (base 2) over the four symbols.
    let mut counts = [0usize; 4];
    for m in &sub.moves {
        counts[m.direction as usize] += 1;
    }
    let total = sub.moves.len() as f64;
    let mut direction_entropy = 0.0;
    if total > 0.0 {
        for &c in &counts {
            if c > 0 {
                let p = c as f64 / total;
                direction_entropy -= p * p.log2();
            }
        }
    }

    // 4: heartbeat regularity around the nominal 1s cadence.
    let heartbeat_consistency = if hb_intervals.is_empty() {
        0.0
    } else {
        let offsets: Vec<f64> = hb_intervals.iter().map(|i| (i - 1000.0).abs()).collect();
        1.0 - (stdev(&offsets) / 500.0).min(1.0)
    };

    // 5: scoring pace.
    let score_rate = sub.score as f64 / sub.game_duration_s.max(f64::EPSILON);

    // 6: ms-per-frame spread across consecutive moves.
    let per_frame: Vec<f64> = sub
        .moves
        .windows(2)
        .filter(|p| p[1].frame > p[0].frame)
        .map(|p| (p[1].time_ms - p[0].time_ms) / (p[1].frame - p[0].frame) as f64)
        .collect();
    let frame_timing_deviation = stdev(&per_frame);

    // 7: heartbeat silences.
    let pause_gap_count = hb_intervals.iter().filter(|&&g| g > 2000.0).count() as f64;

    // 8: total speed-up across heartbeats (speed decreases as food is eaten).
    let speed_progression = sub
        .heartbeats
        .windows(2)
        .map(|p| (p[0].speed_ms - p[1].speed_ms).max(0.0))
        .sum::<f64>();

    // 9: rapid-fire inputs.
    let movement_burst_rate = if move_deltas.is_empty() {
        0.0
    } else {
        move_deltas.iter().filter(|&&d| d < 100.0).count() as f64 / move_deltas.len() as f64
    };

    // 10: wall vs monotonic clock drift.
    let drifts: Vec<f64> = sub
        .heartbeats
        .iter()
        .map(|h| (h.time_ms - h.perf_ms).abs())
        .collect();
    let performance_time_drift = mean(&drifts);

    // 11: reported simulation speed per food.
    let speeds: Vec<f64> = sub.heartbeats.iter().map(|h| h.speed_ms).collect();
    let avg_speed_per_food = mean(&speeds) / sub.food_eaten.max(1) as f64;

    let raw = [
        avg_time_between_moves,
        move_time_variance,
        moves_per_food,
        direction_entropy,
        heartbeat_consistency,
        score_rate,
        frame_timing_deviation,
        pause_gap_count,
        speed_progression,
        movement_burst_rate,
        performance_time_drift,
        avg_speed_per_food,
    ];
    raw.map(finite)
}

/// Map the first `SERIES_LEN` moves to the hybrid model's time-series input:
/// `(direction/3, Δtime/1000, frame/1000)`, zero right-padded.
pub fn time_series(sub: &Submission) -> [[f32; SERIES_CHANNELS]; SERIES_LEN] {
    let mut out = [[0.0f32; SERIES_CHANNELS]; SERIES_LEN];
    let mut prev_time = 0.0f64;
    for (i, m) in sub.moves.iter().take(SERIES_LEN).enumerate() {
        let dt = m.time_ms - prev_time;
        prev_time = m.time_ms;
        out[i] = [
            m.direction as u8 as f32 / 3.0,
            finite(dt / 1000.0) as f32,
            m.frame as f32 / 1000.0,
        ];
    }
    out
}

/// Per-feature z-score statistics, stored next to the model weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Normalizer {
    pub means: [f64; F],
    pub stds: [f64; F],
}

impl Normalizer {
    /// Identity normalizer (zero mean, unit std).
    pub fn identity() -> Self {
        Self {
            means: [0.0; F],
            stds: [1.0; F],
        }
    }

    /// Fit means and stds over a sample set. Zero-variance features get a
    /// unit std so their z-score is exactly 0.
    pub fn fit(samples: &[[f64; F]]) -> Self {
        if samples.is_empty() {
            return Self::identity();
        }
        let n = samples.len() as f64;
        let mut means = [0.0; F];
        for s in samples {
            for (m, v) in means.iter_mut().zip(s.iter()) {
                *m += v;
            }
        }
        for m in &mut means {
            *m /= n;
        }
        let mut stds = [0.0; F];
        for s in samples {
            for i in 0..F {
                let d = s[i] - means[i];
                stds[i] += d * d;
            }
        }
        for s in &mut stds {
            *s = (*s / n).sqrt();
            if *s < 1e-8 {
                *s = 1.0;
            }
        }
        Self { means, stds }
    }

    pub fn apply(&self, raw: &[f64; F]) -> [f64; F] {
        let mut out = [0.0; F];
        for i in 0..F {
            out[i] = finite((raw[i] - self.means[i]) / self.stds[i]);
        }
        out
    }
}
