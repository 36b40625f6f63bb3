//! Two-dimensional projection of document embeddings for plotting.
//!
//! Principal-component analysis by power iteration: the data is centered,
//! the top two eigenvectors of its covariance are found one after the
//! other (the second kept orthogonal to the first), and each document is
//! projected onto them. Each axis is then min-max scaled into `[0, 1]`;
//! an axis with no spread maps every point to `0.5`.
//!
//! The covariance matrix is never materialized. Each iteration computes
//! `Xᵀ(Xv)`, which is `O(n·d)` instead of `O(d²)`.

use serde::Serialize;

use crate::error::{Error, Result};
use crate::models::TextEmbedding;

const MAX_ITERATIONS: usize = 1000;
const TOLERANCE: f64 = 1e-12;
/// Eigenvalues this far below the reference scale are rounding residue.
const RELATIVE_EIGEN_FLOOR: f64 = 1e-18;

/// A document's position in the 2-D feature space.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Projection {
    pub text_id: u32,
    pub x: f64,
    pub y: f64,
}

/// Project embeddings onto their first two principal components.
///
/// Output order matches input order.
pub fn project_2d(embeddings: &[TextEmbedding]) -> Result<Vec<Projection>> {
    let (xs, ys) = principal_scores(embeddings)?;
    Ok(to_projections(embeddings, scale_unit(xs), scale_unit(ys)))
}

/// Unscaled coordinates of every embedding on the first two principal
/// axes. An axis whose variance is negligible next to the data's
/// magnitude (or, for the second axis, next to the first) is all zeros.
pub(crate) fn principal_scores(embeddings: &[TextEmbedding]) -> Result<(Vec<f64>, Vec<f64>)> {
    let dims = check_dimensions(embeddings)?;
    if embeddings.is_empty() {
        return Ok((Vec::new(), Vec::new()));
    }

    let n = embeddings.len();
    let mut mean = vec![0.0f64; dims];
    for e in embeddings {
        for (m, &x) in mean.iter_mut().zip(e.embedding.iter()) {
            *m += x as f64 / n as f64;
        }
    }
    let centered: Vec<Vec<f64>> = embeddings
        .iter()
        .map(|e| {
            e.embedding
                .iter()
                .zip(mean.iter())
                .map(|(&x, m)| x as f64 - m)
                .collect()
        })
        .collect();

    let magnitude: f64 = embeddings
        .iter()
        .flat_map(|e| e.embedding.iter())
        .map(|&x| (x as f64) * (x as f64))
        .sum();

    let (mut pc1, lambda1) = principal_axis(&centered, dims, &[]);
    if lambda1 <= magnitude * RELATIVE_EIGEN_FLOOR {
        pc1.iter_mut().for_each(|x| *x = 0.0);
    }
    let (mut pc2, lambda2) = principal_axis(&centered, dims, &[pc1.as_slice()]);
    // f32 inputs carry relative noise near 1e-8, so a second eigenvalue
    // below 1e-9 of the first is flat.
    let floor2 = (lambda1 * RELATIVE_EIGEN_FLOOR.sqrt()).max(magnitude * RELATIVE_EIGEN_FLOOR);
    if lambda2 <= floor2 {
        pc2.iter_mut().for_each(|x| *x = 0.0);
    }

    let xs = centered.iter().map(|row| dot(row, &pc1)).collect();
    let ys = centered.iter().map(|row| dot(row, &pc2)).collect();
    Ok((xs, ys))
}

/// Common dimension of all embeddings, `0` for an empty slice.
pub(crate) fn check_dimensions(embeddings: &[TextEmbedding]) -> Result<usize> {
    let dims = embeddings.first().map(|e| e.embedding.len()).unwrap_or(0);
    if let Some(bad) = embeddings.iter().find(|e| e.embedding.len() != dims) {
        return Err(Error::DimensionMismatch {
            expected: dims,
            actual: bad.embedding.len(),
            context: format!("document embedding of text_id {}", bad.text_id),
        });
    }
    Ok(dims)
}

pub(crate) fn to_projections(
    embeddings: &[TextEmbedding],
    xs: Vec<f64>,
    ys: Vec<f64>,
) -> Vec<Projection> {
    embeddings
        .iter()
        .zip(xs.into_iter().zip(ys))
        .map(|(e, (x, y))| Projection {
            text_id: e.text_id,
            x,
            y,
        })
        .collect()
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

fn normalize(v: &mut [f64]) -> f64 {
    let norm = dot(v, v).sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
    norm
}

fn orthogonalize(v: &mut [f64], against: &[&[f64]]) {
    for axis in against {
        let p = dot(v, axis);
        for (x, a) in v.iter_mut().zip(axis.iter()) {
            *x -= p * a;
        }
    }
}

/// Dominant eigenvector of `XᵀX` orthogonal to `against`, with its
/// eigenvalue.
///
/// Returns the zero vector and `0.0` when the data has no variance left in
/// the orthogonal complement. The sign is fixed so the largest-magnitude
/// component is positive.
fn principal_axis(rows: &[Vec<f64>], dims: usize, against: &[&[f64]]) -> (Vec<f64>, f64) {
    // Deterministic, dense start that is unlikely to be orthogonal to the
    // answer.
    let mut v: Vec<f64> = (0..dims).map(|i| 1.0 / (i as f64 + 1.0)).collect();
    orthogonalize(&mut v, against);
    if normalize(&mut v) == 0.0 {
        return (vec![0.0; dims], 0.0);
    }

    let mut lambda = 0.0;
    for _ in 0..MAX_ITERATIONS {
        let projected: Vec<f64> = rows.iter().map(|row| dot(row, &v)).collect();
        let mut next = vec![0.0f64; dims];
        for (row, p) in rows.iter().zip(projected.iter()) {
            for (nx, x) in next.iter_mut().zip(row.iter()) {
                *nx += x * p;
            }
        }
        orthogonalize(&mut next, against);
        lambda = normalize(&mut next);
        if lambda == 0.0 {
            return (vec![0.0; dims], 0.0);
        }

        let delta: f64 = next.iter().zip(v.iter()).map(|(a, b)| (a - b).abs()).sum();
        v = next;
        if delta < TOLERANCE {
            break;
        }
    }

    let pivot = v
        .iter()
        .copied()
        .fold(0.0f64, |best, x| if x.abs() > best.abs() { x } else { best });
    if pivot < 0.0 {
        for x in v.iter_mut() {
            *x = -*x;
        }
    }
    (v, lambda)
}

/// Min-max scale into `[0, 1]`. No spread maps everything to `0.5`.
pub(crate) fn scale_unit(values: Vec<f64>) -> Vec<f64> {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    values
        .into_iter()
        .map(|v| {
            if range > 0.0 {
                (v - min) / range
            } else {
                0.5
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emb(text_id: u32, v: &[f32]) -> TextEmbedding {
        TextEmbedding {
            text_id,
            embedding: v.to_vec(),
        }
    }

    #[test]
    fn test_empty_input() {
        assert!(project_2d(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_single_point_centered() {
        let out = project_2d(&[emb(4, &[0.3, 0.4])]).unwrap();
        assert_eq!(out, vec![Projection { text_id: 4, x: 0.5, y: 0.5 }]);
    }

    #[test]
    fn test_points_in_unit_square() {
        let e: Vec<TextEmbedding> = (0..12u32)
            .map(|i| {
                let t = i as f32;
                emb(i, &[t.sin(), (t * 0.7).cos(), t * 0.1, 1.0 - t * 0.05])
            })
            .collect();
        let out = project_2d(&e).unwrap();
        assert_eq!(out.len(), 12);
        for (p, src) in out.iter().zip(e.iter()) {
            assert_eq!(p.text_id, src.text_id);
            assert!((0.0..=1.0).contains(&p.x));
            assert!((0.0..=1.0).contains(&p.y));
        }
        assert!(out.iter().any(|p| p.x == 0.0));
        assert!(out.iter().any(|p| p.x == 1.0));
    }

    #[test]
    fn test_first_axis_follows_largest_spread() {
        // Spread along dim 0 dominates; x order must follow dim 0 order.
        let e = vec![
            emb(0, &[-10.0, 0.1, 0.0]),
            emb(1, &[0.0, -0.1, 0.0]),
            emb(2, &[10.0, 0.0, 0.0]),
        ];
        let out = project_2d(&e).unwrap();
        let mut by_x = out.clone();
        by_x.sort_by(|a, b| a.x.partial_cmp(&b.x).unwrap());
        let order: Vec<u32> = by_x.iter().map(|p| p.text_id).collect();
        assert!(order == vec![0, 1, 2] || order == vec![2, 1, 0]);
        assert!((out[1].x - 0.5).abs() < 0.05);
    }

    #[test]
    fn test_collinear_data_flat_second_axis() {
        let e = vec![emb(0, &[0.0, 0.0]), emb(1, &[1.0, 1.0]), emb(2, &[2.0, 2.0])];
        let out = project_2d(&e).unwrap();
        assert!(out.iter().all(|p| p.y == 0.5));
    }

    #[test]
    fn test_collinear_data_in_higher_dimension() {
        let e: Vec<TextEmbedding> = (0..6u32)
            .map(|i| {
                let t = i as f32;
                emb(i, &[0.1 * t, 0.2 * t, 0.3 * t])
            })
            .collect();
        let out = project_2d(&e).unwrap();
        assert!(out.iter().all(|p| p.y == 0.5), "got {:?}", out);
        assert_eq!(out[0].x, 0.0);
        assert_eq!(out[5].x, 1.0);
    }

    #[test]
    fn test_identical_points_centered() {
        let e: Vec<TextEmbedding> = (0..3u32).map(|i| emb(i, &[0.3, 0.7, 0.1])).collect();
        let out = project_2d(&e).unwrap();
        assert!(out.iter().all(|p| p.x == 0.5 && p.y == 0.5), "got {:?}", out);
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let e = vec![emb(0, &[1.0, 0.0]), emb(1, &[1.0])];
        assert!(matches!(project_2d(&e), Err(Error::DimensionMismatch { .. })));
    }

    #[test]
    fn test_deterministic() {
        let e = vec![emb(0, &[0.2, 0.9]), emb(1, &[0.8, 0.1]), emb(2, &[0.5, 0.5])];
        assert_eq!(project_2d(&e).unwrap(), project_2d(&e).unwrap());
    }
}
