//! Dense feedforward network: 12 → 32 (ReLU) → 16 (ReLU) → 1 (sigmoid).
//!
//! Forward and per-example gradients live here with the architecture; the
//! training loop (batching, Adam, epochs) belongs to the trainer. Dropout is
//! inverted-scaling at train time and absent at inference.

use ndarray::{Array1, Array2};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rand_core::SeedableRng;
use rand_distr::{Distribution, Normal};

use sg_features::F;

/// Hidden layer widths.
pub const H1: usize = 32;
pub const H2: usize = 16;

fn relu(x: f64) -> f64 {
    x.max(0.0)
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Network parameters. Weight matrices are (out, in).
#[derive(Debug, Clone, PartialEq)]
pub struct Mlp {
    pub w1: Array2<f64>,
    pub b1: Array1<f64>,
    pub w2: Array2<f64>,
    pub b2: Array1<f64>,
    pub w3: Array2<f64>,
    pub b3: Array1<f64>,
}

/// Per-parameter gradients, same shapes as [`Mlp`].
#[derive(Debug, Clone)]
pub struct Grads {
    pub w1: Array2<f64>,
    pub b1: Array1<f64>,
    pub w2: Array2<f64>,
    pub b2: Array1<f64>,
    pub w3: Array2<f64>,
    pub b3: Array1<f64>,
}

impl Grads {
    pub fn zeros() -> Self {
        Self {
            w1: Array2::zeros((H1, F)),
            b1: Array1::zeros(H1),
            w2: Array2::zeros((H2, H1)),
            b2: Array1::zeros(H2),
            w3: Array2::zeros((1, H2)),
            b3: Array1::zeros(1),
        }
    }

    pub fn accumulate(&mut self, other: &Grads) {
        self.w1 += &other.w1;
        self.b1 += &other.b1;
        self.w2 += &other.w2;
        self.b2 += &other.b2;
        self.w3 += &other.w3;
        self.b3 += &other.b3;
    }

    pub fn scale(&mut self, k: f64) {
        self.w1 *= k;
        self.b1 *= k;
        self.w2 *= k;
        self.b2 *= k;
        self.w3 *= k;
        self.b3 *= k;
    }
}

/// Train-time dropout masks for the two hidden layers, pre-scaled by
/// 1/keep (inverted dropout). All-ones at inference.
#[derive(Debug, Clone)]
pub struct DropoutMask {
    pub h1: Array1<f64>,
    pub h2: Array1<f64>,
}

impl DropoutMask {
    pub fn none() -> Self {
        Self {
            h1: Array1::ones(H1),
            h2: Array1::ones(H2),
        }
    }

    pub fn sample<R: Rng>(rng: &mut R, rate: f64) -> Self {
        let keep = (1.0 - rate).max(f64::EPSILON);
        let draw = |n: usize, rng: &mut R| {
            Array1::from_iter((0..n).map(|_| {
                if rng.gen::<f64>() < keep {
                    1.0 / keep
                } else {
                    0.0
                }
            }))
        };
        Self {
            h1: draw(H1, rng),
            h2: draw(H2, rng),
        }
    }
}

impl Mlp {
    /// He-initialized network, deterministic in `seed`.
    pub fn init(seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut layer = |out: usize, inp: usize, rng: &mut ChaCha8Rng| {
            let std = (2.0 / inp as f64).sqrt();
            let dist = Normal::new(0.0, std).expect("valid normal");
            Array2::from_shape_fn((out, inp), |_| dist.sample(rng))
        };
        Self {
            w1: layer(H1, F, &mut rng),
            b1: Array1::zeros(H1),
            w2: layer(H2, H1, &mut rng),
            b2: Array1::zeros(H2),
            w3: layer(1, H2, &mut rng),
            b3: Array1::zeros(1),
        }
    }

    /// Inference forward pass: cheat probability in (0, 1).
    pub fn forward(&self, x: &Array1<f64>) -> f64 {
        let h1 = (self.w1.dot(x) + &self.b1).mapv(relu);
        let h2 = (self.w2.dot(&h1) + &self.b2).mapv(relu);
        let z = self.w3.dot(&h2)[0] + self.b3[0];
        sigmoid(z)
    }

    /// One-example forward + backward under binary cross-entropy.
    ///
    /// Returns (gradients, loss, prediction). `y` is the 0/1 label.
    pub fn grads(&self, x: &Array1<f64>, y: f64, mask: &DropoutMask) -> (Grads, f64, f64) {
        // Forward with dropout.
        let z1 = self.w1.dot(x) + &self.b1;
        let h1 = z1.mapv(relu) * &mask.h1;
        let z2 = self.w2.dot(&h1) + &self.b2;
        let h2 = z2.mapv(relu) * &mask.h2;
        let z3 = self.w3.dot(&h2)[0] + self.b3[0];
        let p = sigmoid(z3);

        let eps = 1e-12;
        let loss = -(y * (p + eps).ln() + (1.0 - y) * (1.0 - p + eps).ln());

        // Backward. BCE + sigmoid collapses to (p - y) at the logit.
        let dz3 = p - y;
        let gw3 = {
            let mut g = Array2::zeros((1, H2));
            g.row_mut(0).assign(&(h2.mapv(|v| v * dz3)));
            g
        };
        let gb3 = Array1::from_elem(1, dz3);

        let dh2 = self.w3.row(0).mapv(|w| w * dz3) * &mask.h2;
        let dz2 = &dh2 * &z2.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 });
        let gw2 = outer(&dz2, &h1);
        let gb2 = dz2.clone();

        let dh1 = self.w2.t().dot(&dz2) * &mask.h1;
        let dz1 = &dh1 * &z1.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 });
        let gw1 = outer(&dz1, x);
        let gb1 = dz1.clone();

        (
            Grads {
                w1: gw1,
                b1: gb1,
                w2: gw2,
                b2: gb2,
                w3: gw3,
                b3: gb3,
            },
            loss,
            p,
        )
    }
}

fn outer(a: &Array1<f64>, b: &Array1<f64>) -> Array2<f64> {
    let (n, m) = (a.len(), b.len());
    Array2::from_shape_fn((n, m), |(i, j)| a[i] * b[j])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn x() -> Array1<f64> {
        Array1::from_iter((0..F).map(|i| (i as f64 - 6.0) / 6.0))
    }

    #[test]
    fn init_is_deterministic_in_seed() {
        assert_eq!(Mlp::init(7), Mlp::init(7));
        assert_ne!(Mlp::init(7), Mlp::init(8));
    }

    #[test]
    fn forward_is_a_probability() {
        let m = Mlp::init(1);
        let p = m.forward(&x());
        assert!((0.0..=1.0).contains(&p), "p={p}");
    }

    #[test]
    fn gradient_matches_finite_difference() {
        let m = Mlp::init(3);
        let input = x();
        let mask = DropoutMask::none();
        let (g, _, _) = m.grads(&input, 1.0, &mask);

        // Check a handful of w1 entries against central differences.
        let h = 1e-6;
        for &(i, j) in &[(0usize, 0usize), (5, 3), (31, 11)] {
            let mut plus = m.clone();
            plus.w1[[i, j]] += h;
            let mut minus = m.clone();
            minus.w1[[i, j]] -= h;
            let lp = bce(plus.forward(&input), 1.0);
            let lm = bce(minus.forward(&input), 1.0);
            let numeric = (lp - lm) / (2.0 * h);
            assert!(
                (numeric - g.w1[[i, j]]).abs() < 1e-4,
                "w1[{i},{j}]: numeric {numeric} vs analytic {}",
                g.w1[[i, j]]
            );
        }
    }

    fn bce(p: f64, y: f64) -> f64 {
        let eps = 1e-12;
        -(y * (p + eps).ln() + (1.0 - y) * (1.0 - p + eps).ln())
    }

    #[test]
    fn dropout_mask_is_inverted_scaled() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let mask = DropoutMask::sample(&mut rng, 0.3);
        for &v in mask.h1.iter().chain(mask.h2.iter()) {
            assert!(v == 0.0 || (v - 1.0 / 0.7).abs() < 1e-12);
        }
    }

    #[test]
    fn a_training_step_reduces_loss_on_one_example() {
        let mut m = Mlp::init(5);
        let input = x();
        let mask = DropoutMask::none();
        let (g, loss0, _) = m.grads(&input, 1.0, &mask);
        let lr = 0.05;
        m.w1 = &m.w1 - &(g.w1.mapv(|v| v * lr));
        m.b1 = &m.b1 - &(g.b1.mapv(|v| v * lr));
        m.w2 = &m.w2 - &(g.w2.mapv(|v| v * lr));
        m.b2 = &m.b2 - &(g.b2.mapv(|v| v * lr));
        m.w3 = &m.w3 - &(g.w3.mapv(|v| v * lr));
        m.b3 = &m.b3 - &(g.b3.mapv(|v| v * lr));
        let (_, loss1, _) = m.grads(&input, 1.0, &mask);
        assert!(loss1 < loss0, "{loss1} !< {loss0}");
    }
}
