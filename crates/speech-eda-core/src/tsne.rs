//! Exact t-SNE layout of document embeddings for plotting.
//!
//! Pairwise affinities come from a Gaussian per document whose bandwidth
//! is binary-searched to hit the target perplexity. The layout is
//! optimized by gradient descent with momentum and per-coordinate gains,
//! starting from the PCA scores shrunk to a tiny spread. Nothing is
//! random, so the same embeddings always produce the same layout.
//!
//! Time and memory are `O(n²)` per iteration, which is fine for a few
//! hundred speeches. The result is min-max scaled into `[0, 1]` like the
//! PCA projection.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::TextEmbedding;
use crate::project::{check_dimensions, principal_scores, scale_unit, to_projections, Projection};

pub const DEFAULT_PERPLEXITY: f64 = 30.0;
pub const DEFAULT_ITERATIONS: usize = 1000;

const EARLY_EXAGGERATION: f64 = 12.0;
const EXAGGERATION_ITERATIONS: usize = 250;
const MIN_GAIN: f64 = 0.01;
const MIN_LEARNING_RATE: f64 = 50.0;
const INIT_SPREAD: f64 = 1e-4;
const BANDWIDTH_STEPS: usize = 100;
const ENTROPY_TOLERANCE: f64 = 1e-5;
const MIN_PROBABILITY: f64 = f64::EPSILON;

/// Knobs for [`tsne_2d`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TsneParams {
    /// Effective number of neighbors per document. Capped at `(n - 1) / 3`
    /// for small corpora.
    pub perplexity: f64,
    /// Total gradient steps, including the early-exaggeration phase.
    pub iterations: usize,
}

impl Default for TsneParams {
    fn default() -> Self {
        Self {
            perplexity: DEFAULT_PERPLEXITY,
            iterations: DEFAULT_ITERATIONS,
        }
    }
}

/// Lay embeddings out in 2-D with t-SNE. Output order matches input order.
pub fn tsne_2d(embeddings: &[TextEmbedding], params: &TsneParams) -> Result<Vec<Projection>> {
    check_dimensions(embeddings)?;
    let n = embeddings.len();
    if n < 2 {
        return Ok(to_projections(embeddings, vec![0.5; n], vec![0.5; n]));
    }

    let perplexity = effective_perplexity(params.perplexity, n);
    let distances = squared_distances(embeddings);
    let p = joint_probabilities(&distances, perplexity);

    let (xs, ys) = principal_scores(embeddings)?;
    let mut layout = initial_layout(&xs, &ys);
    optimize(&p, &mut layout, params.iterations);

    let xs = layout.iter().map(|pt| pt[0]).collect();
    let ys = layout.iter().map(|pt| pt[1]).collect();
    Ok(to_projections(embeddings, scale_unit(xs), scale_unit(ys)))
}

fn effective_perplexity(requested: f64, n: usize) -> f64 {
    requested.min((n - 1) as f64 / 3.0).max(1.0)
}

fn squared_distances(embeddings: &[TextEmbedding]) -> Vec<Vec<f64>> {
    let n = embeddings.len();
    let mut d = vec![vec![0.0f64; n]; n];
    for i in 0..n {
        for j in (i + 1)..n {
            let dist: f64 = embeddings[i]
                .embedding
                .iter()
                .zip(embeddings[j].embedding.iter())
                .map(|(&a, &b)| {
                    let diff = a as f64 - b as f64;
                    diff * diff
                })
                .sum();
            d[i][j] = dist;
            d[j][i] = dist;
        }
    }
    d
}

/// Conditional probabilities `p(j | i)` for one row of squared distances.
///
/// The Gaussian precision is binary-searched until the row's entropy is
/// `ln(perplexity)`. Entry `i` itself is zero.
fn conditional_row(distances: &[f64], i: usize, perplexity: f64) -> Vec<f64> {
    let target = perplexity.ln();
    let mut beta = 1.0f64;
    let mut beta_min = f64::NEG_INFINITY;
    let mut beta_max = f64::INFINITY;
    let mut row = vec![0.0f64; distances.len()];

    for _ in 0..BANDWIDTH_STEPS {
        let mut sum = 0.0;
        for (j, (p, &d)) in row.iter_mut().zip(distances).enumerate() {
            *p = if j == i { 0.0 } else { (-d * beta).exp() };
            sum += *p;
        }
        if sum == 0.0 {
            sum = 1e-8;
        }

        let mut weighted = 0.0;
        for (p, &d) in row.iter_mut().zip(distances) {
            *p /= sum;
            weighted += d * *p;
        }

        let entropy = sum.ln() + beta * weighted;
        let diff = entropy - target;
        if diff.abs() <= ENTROPY_TOLERANCE {
            break;
        }

        if diff > 0.0 {
            beta_min = beta;
            beta = if beta_max.is_infinite() {
                beta * 2.0
            } else {
                (beta + beta_max) / 2.0
            };
        } else {
            beta_max = beta;
            beta = if beta_min.is_infinite() {
                beta / 2.0
            } else {
                (beta + beta_min) / 2.0
            };
        }
    }
    row
}

/// Symmetrized joint probabilities `(p(j|i) + p(i|j)) / 2n`.
fn joint_probabilities(distances: &[Vec<f64>], perplexity: f64) -> Vec<Vec<f64>> {
    let n = distances.len();
    let conditional: Vec<Vec<f64>> = (0..n)
        .map(|i| conditional_row(&distances[i], i, perplexity))
        .collect();

    let total = (conditional.iter().flatten().sum::<f64>() * 2.0).max(MIN_PROBABILITY);
    let mut p = vec![vec![0.0f64; n]; n];
    for i in 0..n {
        for j in 0..n {
            if i != j {
                p[i][j] = ((conditional[i][j] + conditional[j][i]) / total).max(MIN_PROBABILITY);
            }
        }
    }
    p
}

/// PCA scores rescaled so the first axis has standard deviation
/// [`INIT_SPREAD`].
fn initial_layout(xs: &[f64], ys: &[f64]) -> Vec<[f64; 2]> {
    let n = xs.len() as f64;
    let mean = xs.iter().sum::<f64>() / n;
    let std = (xs.iter().map(|x| (x - mean) * (x - mean)).sum::<f64>() / n).sqrt();
    let factor = if std > 0.0 { INIT_SPREAD / std } else { 0.0 };
    xs.iter()
        .zip(ys)
        .map(|(x, y)| [x * factor, y * factor])
        .collect()
}

/// Gradient of the KL divergence between `p` and the Student-t affinities
/// of `layout`.
fn gradient(p: &[Vec<f64>], layout: &[[f64; 2]], exaggeration: f64) -> Vec<[f64; 2]> {
    let n = layout.len();
    let mut kernel = vec![vec![0.0f64; n]; n];
    let mut kernel_sum = 0.0;
    for i in 0..n {
        for j in (i + 1)..n {
            let dx = layout[i][0] - layout[j][0];
            let dy = layout[i][1] - layout[j][1];
            let k = 1.0 / (1.0 + dx * dx + dy * dy);
            kernel[i][j] = k;
            kernel[j][i] = k;
            kernel_sum += 2.0 * k;
        }
    }

    let mut grad = vec![[0.0f64; 2]; n];
    for i in 0..n {
        for j in 0..n {
            if i == j {
                continue;
            }
            let q = (kernel[i][j] / kernel_sum).max(MIN_PROBABILITY);
            let w = 4.0 * (exaggeration * p[i][j] - q) * kernel[i][j];
            grad[i][0] += w * (layout[i][0] - layout[j][0]);
            grad[i][1] += w * (layout[i][1] - layout[j][1]);
        }
    }
    grad
}

fn optimize(p: &[Vec<f64>], layout: &mut [[f64; 2]], iterations: usize) {
    let n = layout.len();
    let learning_rate = (n as f64 / EARLY_EXAGGERATION / 4.0).max(MIN_LEARNING_RATE);
    let mut update = vec![[0.0f64; 2]; n];
    let mut gains = vec![[1.0f64; 2]; n];

    for it in 0..iterations {
        let (exaggeration, momentum) = if it < EXAGGERATION_ITERATIONS {
            (EARLY_EXAGGERATION, 0.5)
        } else {
            (1.0, 0.8)
        };

        let grad = gradient(p, layout, exaggeration);
        for i in 0..n {
            for c in 0..2 {
                let g = grad[i][c];
                gains[i][c] = if update[i][c] * g < 0.0 {
                    gains[i][c] + 0.2
                } else {
                    (gains[i][c] * 0.8).max(MIN_GAIN)
                };
                update[i][c] = momentum * update[i][c] - learning_rate * gains[i][c] * g;
                layout[i][c] += update[i][c];
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn emb(text_id: u32, v: &[f32]) -> TextEmbedding {
        TextEmbedding {
            text_id,
            embedding: v.to_vec(),
        }
    }

    fn clusters() -> Vec<TextEmbedding> {
        (0..12u32)
            .map(|i| {
                let jitter = (i % 6) as f32 * 0.01;
                if i < 6 {
                    emb(i, &[1.0, jitter, 0.0])
                } else {
                    emb(i, &[0.0, jitter, 1.0])
                }
            })
            .collect()
    }

    #[test]
    fn test_empty_and_single() {
        let params = TsneParams::default();
        assert!(tsne_2d(&[], &params).unwrap().is_empty());
        let out = tsne_2d(&[emb(3, &[0.1, 0.2])], &params).unwrap();
        assert_eq!(out, vec![Projection { text_id: 3, x: 0.5, y: 0.5 }]);
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let e = vec![emb(0, &[1.0, 0.0]), emb(1, &[1.0])];
        assert!(matches!(
            tsne_2d(&e, &TsneParams::default()),
            Err(Error::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_perplexity_capped_for_small_corpus() {
        assert_eq!(effective_perplexity(30.0, 10), 3.0);
        assert_eq!(effective_perplexity(30.0, 400), 30.0);
        assert_eq!(effective_perplexity(30.0, 2), 1.0);
    }

    #[test]
    fn test_conditional_row_hits_perplexity() {
        let distances: Vec<f64> = (0..12).map(|j| j as f64 * 0.3).collect();
        let row = conditional_row(&distances, 0, 4.0);
        assert_eq!(row[0], 0.0);
        assert!((row.iter().sum::<f64>() - 1.0).abs() < 1e-9);

        let entropy: f64 = row
            .iter()
            .filter(|&&p| p > 0.0)
            .map(|&p| -p * p.ln())
            .sum();
        assert!((entropy.exp() - 4.0).abs() < 1e-3, "perplexity {}", entropy.exp());
    }

    #[test]
    fn test_joint_probabilities_symmetric() {
        let d = squared_distances(&clusters());
        let p = joint_probabilities(&d, 3.0);
        let total: f64 = p.iter().flatten().sum();
        assert!((total - 1.0).abs() < 1e-6);
        for i in 0..p.len() {
            assert_eq!(p[i][i], 0.0);
            for j in 0..p.len() {
                assert_eq!(p[i][j], p[j][i]);
            }
        }
    }

    #[test]
    fn test_layout_in_unit_square_and_ordered() {
        let e = clusters();
        let out = tsne_2d(&e, &TsneParams::default()).unwrap();
        assert_eq!(out.len(), e.len());
        for (p, src) in out.iter().zip(e.iter()) {
            assert_eq!(p.text_id, src.text_id);
            assert!((0.0..=1.0).contains(&p.x));
            assert!((0.0..=1.0).contains(&p.y));
        }
    }

    #[test]
    fn test_separated_clusters_stay_apart() {
        let out = tsne_2d(&clusters(), &TsneParams::default()).unwrap();
        let centroid = |pts: &[Projection]| {
            let n = pts.len() as f64;
            (
                pts.iter().map(|p| p.x).sum::<f64>() / n,
                pts.iter().map(|p| p.y).sum::<f64>() / n,
            )
        };
        let (a, b) = out.split_at(6);
        let (ca, cb) = (centroid(a), centroid(b));
        let dist = |p: &Projection, c: (f64, f64)| (p.x - c.0).hypot(p.y - c.1);

        assert!(a.iter().all(|p| dist(p, ca) < dist(p, cb)));
        assert!(b.iter().all(|p| dist(p, cb) < dist(p, ca)));
    }

    #[test]
    fn test_deterministic() {
        let e = clusters();
        let params = TsneParams {
            perplexity: 3.0,
            iterations: 300,
        };
        assert_eq!(tsne_2d(&e, &params).unwrap(), tsne_2d(&e, &params).unwrap());
    }
}
