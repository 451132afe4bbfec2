//! Manifold projection of embedding vectors to 2D.
//!
//! A compact UMAP:
//!
//! 1. Brute-force k-nearest neighbours (euclidean). Corpora are small, so
//!    O(n²) beats building an approximate index.
//! 2. Smooth k-NN distances: per point, `rho` (nearest non-zero distance) and
//!    `sigma` (bandwidth found by binary search so the membership strengths
//!    sum to `log2(k)`).
//! 3. Fuzzy union of the directed graph: `w = a + b - a·b`.
//! 4. Fit the low-dimensional curve `1 / (1 + a·d^(2b))` to `min_dist` /
//!    `spread`.
//! 5. Random initial layout, then epoch-scheduled SGD with negative sampling.
//!
//! The random stream comes from a seeded `ChaCha8Rng`, so the same input and
//! seed always give the same layout.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

const SMOOTH_K_TOLERANCE: f64 = 1e-5;
const SMOOTH_K_ITERATIONS: usize = 64;
const MIN_K_DIST_SCALE: f64 = 1e-3;
const GRADIENT_CLIP: f64 = 4.0;
const INIT_RANGE: f64 = 10.0;

/// Projection parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManifoldConfig {
    /// Neighbourhood size, including the point itself. Capped at `n - 1`
    /// (but never below 2).
    pub n_neighbors: usize,
    pub min_dist: f64,
    pub spread: f64,
    /// Fixed epoch count; `None` picks one from the data size.
    pub n_epochs: Option<usize>,
    pub learning_rate: f64,
    pub negative_sample_rate: usize,
    /// Repulsion weight of negative samples.
    pub repulsion_strength: f64,
    pub seed: u64,
}

impl Default for ManifoldConfig {
    fn default() -> Self {
        Self {
            n_neighbors: 15,
            min_dist: 0.1,
            spread: 1.0,
            n_epochs: None,
            learning_rate: 1.0,
            negative_sample_rate: 5,
            repulsion_strength: 1.0,
            seed: 42,
        }
    }
}

impl ManifoldConfig {
    /// Epoch budget for `n` points.
    pub fn epochs_for(&self, n: usize) -> usize {
        if let Some(epochs) = self.n_epochs {
            return epochs.max(1);
        }
        match n {
            0..=2500 => 500,
            2501..=5000 => 400,
            5001..=7500 => 300,
            _ => 200,
        }
    }
}

// =============================================================================
// NEIGHBOUR GRAPH
// =============================================================================

fn euclidean(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = f64::from(*x) - f64::from(*y);
            d * d
        })
        .sum::<f64>()
        .sqrt()
}

/// `k` nearest other points of every point, closest first.
fn nearest_neighbors(vectors: &[Vec<f32>], k: usize) -> Vec<Vec<(usize, f64)>> {
    (0..vectors.len())
        .map(|i| {
            let mut row: Vec<(usize, f64)> = (0..vectors.len())
                .filter(|j| *j != i)
                .map(|j| (j, euclidean(&vectors[i], &vectors[j])))
                .collect();
            row.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
            row.truncate(k);
            row
        })
        .collect()
}

/// `(rho, sigma)` for one neighbour row.
fn smooth_knn_dist(row: &[(usize, f64)], target: f64) -> (f64, f64) {
    let rho = row
        .iter()
        .map(|(_, d)| *d)
        .find(|d| *d > 0.0)
        .unwrap_or(0.0);

    let mut lo = 0.0f64;
    let mut hi = f64::INFINITY;
    let mut mid = 1.0f64;

    for _ in 0..SMOOTH_K_ITERATIONS {
        let psum: f64 = row
            .iter()
            .map(|(_, d)| {
                let gap = d - rho;
                if gap > 0.0 {
                    (-gap / mid).exp()
                } else {
                    1.0
                }
            })
            .sum();

        if (psum - target).abs() < SMOOTH_K_TOLERANCE {
            break;
        }
        if psum > target {
            hi = mid;
            mid = (lo + hi) / 2.0;
        } else {
            lo = mid;
            mid = if hi.is_infinite() {
                mid * 2.0
            } else {
                (lo + hi) / 2.0
            };
        }
    }

    let mean = if row.is_empty() {
        0.0
    } else {
        row.iter().map(|(_, d)| *d).sum::<f64>() / row.len() as f64
    };
    let sigma = mid.max(MIN_K_DIST_SCALE * mean).max(f64::EPSILON);
    (rho, sigma)
}

/// Symmetric fuzzy graph as undirected edges `(i, j, weight)` with `i < j`.
fn fuzzy_graph(knn: &[Vec<(usize, f64)>], k_with_self: usize) -> Vec<(usize, usize, f64)> {
    let target = (k_with_self as f64).log2();
    let mut directed: BTreeMap<(usize, usize), f64> = BTreeMap::new();

    for (i, row) in knn.iter().enumerate() {
        let (rho, sigma) = smooth_knn_dist(row, target);
        for (j, d) in row {
            let gap = d - rho;
            let w = if gap > 0.0 { (-gap / sigma).exp() } else { 1.0 };
            directed.insert((i, *j), w);
        }
    }

    let mut undirected: BTreeMap<(usize, usize), f64> = BTreeMap::new();
    for (&(i, j), &w) in &directed {
        let key = (i.min(j), i.max(j));
        if undirected.contains_key(&key) {
            continue;
        }
        let reverse = directed.get(&(j, i)).copied().unwrap_or(0.0);
        undirected.insert(key, w + reverse - w * reverse);
    }

    undirected
        .into_iter()
        .filter(|(_, w)| *w > 0.0)
        .map(|((i, j), w)| (i, j, w))
        .collect()
}

// =============================================================================
// CURVE FIT
// =============================================================================

fn curve_loss(a: f64, b: f64, xs: &[f64], ys: &[f64]) -> f64 {
    xs.iter()
        .zip(ys)
        .map(|(x, y)| {
            let fitted = 1.0 / (1.0 + a * x.powf(2.0 * b));
            (fitted - y).powi(2)
        })
        .sum()
}

/// Least-squares fit of `1 / (1 + a·x^(2b))` to the target membership curve.
///
/// Coarse grid search, then three rounds of local refinement.
pub fn find_ab_params(spread: f64, min_dist: f64) -> (f64, f64) {
    let xs: Vec<f64> = (0..300).map(|i| 3.0 * spread * i as f64 / 299.0).collect();
    let ys: Vec<f64> = xs
        .iter()
        .map(|x| {
            if *x < min_dist {
                1.0
            } else {
                (-(x - min_dist) / spread).exp()
            }
        })
        .collect();

    let mut best = (1.0, 1.0);
    let mut best_loss = f64::INFINITY;
    let consider = |a: f64, b: f64, best: &mut (f64, f64), best_loss: &mut f64| {
        if a <= 0.0 || b <= 0.0 {
            return;
        }
        let loss = curve_loss(a, b, &xs, &ys);
        if loss < *best_loss {
            *best_loss = loss;
            *best = (a, b);
        }
    };

    for ai in 1..=100 {
        for bi in 1..=80 {
            consider(ai as f64 * 0.05, bi as f64 * 0.025, &mut best, &mut best_loss);
        }
    }

    let (mut step_a, mut step_b) = (0.05, 0.025);
    for _ in 0..3 {
        step_a /= 10.0;
        step_b /= 10.0;
        let (ca, cb) = best;
        for da in -10..=10 {
            for db in -10..=10 {
                consider(
                    ca + da as f64 * step_a,
                    cb + db as f64 * step_b,
                    &mut best,
                    &mut best_loss,
                );
            }
        }
    }

    best
}

// =============================================================================
// OPTIMISATION
// =============================================================================

fn clip(value: f64) -> f64 {
    value.clamp(-GRADIENT_CLIP, GRADIENT_CLIP)
}

fn dist_sq(a: [f64; 2], b: [f64; 2]) -> f64 {
    (a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2)
}

struct EdgeSchedule {
    head: usize,
    tail: usize,
    epochs_per_sample: f64,
    epochs_per_negative: f64,
    next_sample: f64,
    next_negative: f64,
}

/// Project `vectors` to raw (unnormalized) 2D coordinates.
///
/// Fewer than two vectors have no neighbourhood structure: the result is one
/// origin point per input.
pub fn project(vectors: &[Vec<f32>], config: &ManifoldConfig) -> Vec<[f64; 2]> {
    let n = vectors.len();
    if n < 2 {
        return vec![[0.0, 0.0]; n];
    }

    let k_with_self = config.n_neighbors.min(n - 1).max(2);
    let knn = nearest_neighbors(vectors, k_with_self - 1);
    let edges = fuzzy_graph(&knn, k_with_self);
    let (a, b) = find_ab_params(config.spread, config.min_dist);
    let n_epochs = config.epochs_for(n);

    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let mut embedding: Vec<[f64; 2]> = (0..n)
        .map(|_| {
            [
                rng.gen_range(-INIT_RANGE..INIT_RANGE),
                rng.gen_range(-INIT_RANGE..INIT_RANGE),
            ]
        })
        .collect();

    let max_weight = edges.iter().map(|e| e.2).fold(0.0f64, f64::max);
    let negative_rate = config.negative_sample_rate.max(1) as f64;
    let mut schedule: Vec<EdgeSchedule> = edges
        .iter()
        .filter(|(_, _, w)| *w >= max_weight / n_epochs as f64)
        .map(|&(head, tail, w)| {
            let epochs_per_sample = max_weight / w;
            let epochs_per_negative = epochs_per_sample / negative_rate;
            EdgeSchedule {
                head,
                tail,
                epochs_per_sample,
                epochs_per_negative,
                next_sample: epochs_per_sample,
                next_negative: epochs_per_negative,
            }
        })
        .collect();

    debug!(
        points = n,
        edges = schedule.len(),
        n_epochs,
        a,
        b,
        "manifold optimisation"
    );

    let gamma = config.repulsion_strength;
    let mut alpha = config.learning_rate;

    for epoch in 0..n_epochs {
        let now = epoch as f64;
        for edge in schedule.iter_mut() {
            if edge.next_sample > now {
                continue;
            }

            let (j, k) = (edge.head, edge.tail);
            let current = embedding[j];
            let other = embedding[k];
            let d2 = dist_sq(current, other);
            let attract = if d2 > 0.0 {
                -2.0 * a * b * d2.powf(b - 1.0) / (a * d2.powf(b) + 1.0)
            } else {
                0.0
            };
            for d in 0..2 {
                let grad = clip(attract * (current[d] - other[d]));
                embedding[j][d] += grad * alpha;
                embedding[k][d] -= grad * alpha;
            }
            edge.next_sample += edge.epochs_per_sample;

            let n_neg = ((now - edge.next_negative) / edge.epochs_per_negative)
                .floor()
                .max(0.0) as usize;
            for _ in 0..n_neg {
                let sample = rng.gen_range(0..n);
                if sample == j {
                    continue;
                }
                let current = embedding[j];
                let other = embedding[sample];
                let d2 = dist_sq(current, other);
                for d in 0..2 {
                    let grad = if d2 > 0.0 {
                        let repel = 2.0 * gamma * b / ((0.001 + d2) * (a * d2.powf(b) + 1.0));
                        clip(repel * (current[d] - other[d]))
                    } else {
                        GRADIENT_CLIP
                    };
                    embedding[j][d] += grad * alpha;
                }
            }
            edge.next_negative += n_neg as f64 * edge.epochs_per_negative;
        }
        alpha = config.learning_rate * (1.0 - (epoch + 1) as f64 / n_epochs as f64);
    }

    embedding
}
