//! Paragraph-weighted embedding aggregation.
//!
//! A document's embedding is the unit vector along the length-weighted sum
//! of its paragraph embeddings:
//!
//! ```text
//! w_i = len_i / Σ len_j
//! v   = Σ w_i · e_i
//! out = v / ‖v‖₂
//! ```
//!
//! Sums are accumulated in `f64` and the result is stored as `f32`.
//! Renormalization always runs, even when the inputs are already unit
//! length.

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::models::{ParagraphEmbedding, TextEmbedding};

/// Euclidean norm of a vector.
pub fn l2_norm(v: &[f32]) -> f64 {
    v.iter().map(|&x| (x as f64) * (x as f64)).sum::<f64>().sqrt()
}

/// Aggregate one document's `(length, vector)` pairs.
///
/// `text_id` is only used to label errors.
pub fn aggregate(text_id: u32, paragraphs: &[(usize, &[f32])]) -> Result<Vec<f32>> {
    let (_, first) = paragraphs.first().ok_or(Error::EmptyDocument(text_id))?;
    let dims = first.len();

    let total: usize = paragraphs.iter().map(|(len, _)| *len).sum();
    if total == 0 {
        return Err(Error::ZeroWeight(text_id));
    }

    let mut acc = vec![0.0f64; dims];
    for (len, vec) in paragraphs {
        if vec.len() != dims {
            return Err(Error::DimensionMismatch {
                expected: dims,
                actual: vec.len(),
                context: format!("paragraph embedding of text_id {}", text_id),
            });
        }
        let w = *len as f64 / total as f64;
        for (a, &x) in acc.iter_mut().zip(vec.iter()) {
            *a += w * x as f64;
        }
    }

    let norm = acc.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm == 0.0 || !norm.is_finite() {
        return Err(Error::ZeroNorm(text_id));
    }

    Ok(acc.into_iter().map(|x| (x / norm) as f32).collect())
}

/// Partition paragraph embeddings by `text_id` and aggregate each document.
///
/// Results are ordered by `text_id`. A failing document yields an `Err`
/// beside its `text_id` and does not affect the others. Paragraph order within a
/// document does not change the result beyond floating-point rounding, but
/// rows are visited in `paragraph_id` order so reruns are bit-identical.
pub fn aggregate_by_document(rows: &[ParagraphEmbedding]) -> Vec<(u32, Result<TextEmbedding>)> {
    let mut groups: BTreeMap<u32, Vec<&ParagraphEmbedding>> = BTreeMap::new();
    for row in rows {
        groups.entry(row.text_id).or_default().push(row);
    }

    groups
        .into_iter()
        .map(|(text_id, mut group)| {
            group.sort_by_key(|p| p.paragraph_id);
            let pairs: Vec<(usize, &[f32])> = group
                .iter()
                .map(|p| (p.paragraph_length, p.embedding.as_slice()))
                .collect();
            let result =
                aggregate(text_id, &pairs).map(|embedding| TextEmbedding { text_id, embedding });
            (text_id, result)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: &[f32], b: &[f64]) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| (*x as f64 - y).abs() < 1e-6)
    }

    #[test]
    fn test_single_unit_vector_unchanged() {
        let v: &[f32] = &[0.6, 0.8];
        let out = aggregate(0, &[(17, v)]).unwrap();
        assert!(close(&out, &[0.6, 0.8]));
    }

    #[test]
    fn test_single_paragraph_renormalized() {
        let v: &[f32] = &[3.0, 4.0];
        let out = aggregate(0, &[(5, v)]).unwrap();
        assert!(close(&out, &[0.6, 0.8]));
    }

    #[test]
    fn test_length_weighted_scenario() {
        let s = std::f32::consts::FRAC_1_SQRT_2;
        let a: &[f32] = &[1.0, 0.0];
        let b: &[f32] = &[0.0, 1.0];
        let c: &[f32] = &[s, s];
        let out = aggregate(3, &[(10, a), (20, b), (30, c)]).unwrap();

        let h = std::f64::consts::FRAC_1_SQRT_2;
        let x = (10.0 + 30.0 * h) / 60.0;
        let y = (20.0 + 30.0 * h) / 60.0;
        let n = (x * x + y * y).sqrt();
        assert!(close(&out, &[x / n, y / n]), "got {:?}", out);
    }

    #[test]
    fn test_output_unit_norm() {
        let a: &[f32] = &[0.3, -2.0, 5.5, 0.0];
        let b: &[f32] = &[1.0, 1.0, 1.0, 1.0];
        let c: &[f32] = &[-4.0, 0.25, 0.0, 9.0];
        let out = aggregate(0, &[(120, a), (3, b), (44, c)]).unwrap();
        assert!((l2_norm(&out) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_longer_paragraph_dominates() {
        let a: &[f32] = &[1.0, 0.0];
        let b: &[f32] = &[0.0, 1.0];
        let out = aggregate(0, &[(90, a), (10, b)]).unwrap();
        assert!(out[0] > out[1]);
    }

    #[test]
    fn test_empty_rejected() {
        assert!(matches!(aggregate(7, &[]), Err(Error::EmptyDocument(7))));
    }

    #[test]
    fn test_zero_weight_rejected() {
        let v: &[f32] = &[1.0];
        assert!(matches!(
            aggregate(2, &[(0, v), (0, v)]),
            Err(Error::ZeroWeight(2))
        ));
    }

    #[test]
    fn test_zero_vectors_rejected() {
        let v: &[f32] = &[0.0, 0.0];
        assert!(matches!(aggregate(1, &[(4, v)]), Err(Error::ZeroNorm(1))));
    }

    #[test]
    fn test_tiny_nonzero_vector_renormalized() {
        let v: &[f32] = &[1e-20, 0.0];
        let out = aggregate(0, &[(5, v)]).unwrap();
        assert!(close(&out, &[1.0, 0.0]), "got {:?}", out);
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let a: &[f32] = &[1.0, 0.0];
        let b: &[f32] = &[1.0];
        assert!(matches!(
            aggregate(0, &[(1, a), (1, b)]),
            Err(Error::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_by_document_partitions() {
        let row = |text_id, paragraph_id, len, embedding: Vec<f32>| ParagraphEmbedding {
            text_id,
            paragraph_id,
            paragraph_length: len,
            embedding,
        };
        let rows = vec![
            row(1, 0, 5, vec![0.0, 2.0]),
            row(0, 1, 5, vec![1.0, 0.0]),
            row(0, 0, 5, vec![1.0, 0.0]),
            row(2, 0, 5, vec![0.0, 0.0]),
        ];
        let out = aggregate_by_document(&rows);
        assert_eq!(out.len(), 3);

        let ids: Vec<u32> = out.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![0, 1, 2]);

        let d0 = out[0].1.as_ref().unwrap();
        assert_eq!(d0.text_id, 0);
        assert!(close(&d0.embedding, &[1.0, 0.0]));

        let d1 = out[1].1.as_ref().unwrap();
        assert_eq!(d1.text_id, 1);
        assert!(close(&d1.embedding, &[0.0, 1.0]));

        assert!(matches!(out[2].1, Err(Error::ZeroNorm(2))));
    }
}
