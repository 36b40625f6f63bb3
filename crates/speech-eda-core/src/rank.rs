//! Nearest-neighbor ranking by cosine distance.
//!
//! Builds the full `n × n` distance matrix and keeps, for each document,
//! the `k` closest *other* documents. This is O(n²) in time and memory,
//! which is fine for a corpus of a few hundred speeches and not meant to
//! scale beyond that.
//!
//! # Ordering
//!
//! Neighbors are sorted by ascending distance, then ascending `text_id`,
//! so exact ties always rank the same way. The query document is never its
//! own neighbor, even if another document has distance zero to it.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{Error, Result};
use crate::models::{EmbeddingKind, Neighbor, TextEmbedding, TextRow};

/// Default number of neighbors kept per document.
pub const DEFAULT_K: usize = 20;

/// Cosine distance `1 - cos(θ)`.
///
/// Returns `1.0` (orthogonal) when either vector has zero norm or the
/// result is not finite.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f64 {
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (&x, &y) in a.iter().zip(b.iter()) {
        let (x, y) = (x as f64, y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f64::EPSILON {
        return 1.0;
    }

    let d = 1.0 - dot / denom;
    if d.is_finite() {
        d
    } else {
        1.0
    }
}

/// Pairwise distance matrix, rows and columns in input order.
pub fn distance_matrix(embeddings: &[TextEmbedding]) -> Result<Vec<Vec<f64>>> {
    let dims = embeddings.first().map(|e| e.embedding.len()).unwrap_or(0);
    if let Some(bad) = embeddings.iter().find(|e| e.embedding.len() != dims) {
        return Err(Error::DimensionMismatch {
            expected: dims,
            actual: bad.embedding.len(),
            context: format!("document embedding of text_id {}", bad.text_id),
        });
    }

    let n = embeddings.len();
    let mut matrix = vec![vec![0.0f64; n]; n];
    for i in 0..n {
        for j in (i + 1)..n {
            let d = cosine_distance(&embeddings[i].embedding, &embeddings[j].embedding);
            matrix[i][j] = d;
            matrix[j][i] = d;
        }
    }
    Ok(matrix)
}

/// Top-`k` neighbors of every document, keyed by query `text_id`.
///
/// `texts` supplies the metadata attached to each neighbor; every
/// embedding's `text_id` must be present there.
pub fn nearest_neighbors(
    embeddings: &[TextEmbedding],
    texts: &[TextRow],
    k: usize,
) -> Result<BTreeMap<u32, Vec<Neighbor>>> {
    let meta: BTreeMap<u32, &TextRow> = texts.iter().map(|t| (t.text_id, t)).collect();
    for e in embeddings {
        if !meta.contains_key(&e.text_id) {
            return Err(Error::MissingText(e.text_id));
        }
    }

    let matrix = distance_matrix(embeddings)?;
    let mut out = BTreeMap::new();

    for (i, query) in embeddings.iter().enumerate() {
        let mut candidates: Vec<(f64, u32)> = embeddings
            .iter()
            .enumerate()
            .filter(|(j, other)| *j != i && other.text_id != query.text_id)
            .map(|(j, other)| (matrix[i][j], other.text_id))
            .collect();

        candidates.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        candidates.truncate(k);

        let neighbors = candidates
            .into_iter()
            .enumerate()
            .map(|(pos, (distance, text_id))| {
                let t = meta[&text_id];
                Neighbor {
                    rank: pos + 1,
                    text_id,
                    year: t.year,
                    author: t.author.clone(),
                    title: t.title.clone(),
                    distance,
                }
            })
            .collect();

        out.insert(query.text_id, neighbors);
    }

    Ok(out)
}

/// One rank position of a query document across several embedding kinds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankRow {
    pub rank: usize,
    /// `None` where a kind has fewer neighbors than this rank, or no
    /// ranking at all for the query document.
    pub by_kind: BTreeMap<EmbeddingKind, Option<Neighbor>>,
}

/// Outer-join per-kind rankings by `text_id` and rank position.
///
/// Every query document present in any kind appears in the output, with
/// as many rows as its longest ranking.
pub fn combine_rankings(
    per_kind: &BTreeMap<EmbeddingKind, BTreeMap<u32, Vec<Neighbor>>>,
) -> BTreeMap<u32, Vec<RankRow>> {
    let text_ids: BTreeSet<u32> = per_kind.values().flat_map(|m| m.keys().copied()).collect();

    text_ids
        .into_iter()
        .map(|text_id| {
            let depth = per_kind
                .values()
                .filter_map(|m| m.get(&text_id))
                .map(|v| v.len())
                .max()
                .unwrap_or(0);

            let rows = (0..depth)
                .map(|pos| RankRow {
                    rank: pos + 1,
                    by_kind: per_kind
                        .iter()
                        .map(|(kind, m)| {
                            let n = m.get(&text_id).and_then(|v| v.get(pos)).cloned();
                            (*kind, n)
                        })
                        .collect(),
                })
                .collect();

            (text_id, rows)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(text_id: u32) -> TextRow {
        TextRow {
            year: 1789 + text_id as i32,
            author_id: 0,
            author: format!("Author {}", text_id),
            title: format!("Title {}", text_id),
            text_id,
            text: String::new(),
            text_length: 0,
        }
    }

    fn emb(text_id: u32, v: &[f32]) -> TextEmbedding {
        TextEmbedding {
            text_id,
            embedding: v.to_vec(),
        }
    }

    #[test]
    fn test_cosine_distance_basics() {
        assert!(cosine_distance(&[1.0, 2.0], &[1.0, 2.0]).abs() < 1e-9);
        assert!((cosine_distance(&[1.0, 0.0], &[0.0, 1.0]) - 1.0).abs() < 1e-9);
        assert!((cosine_distance(&[1.0, 0.0], &[-1.0, 0.0]) - 2.0).abs() < 1e-9);
        assert_eq!(cosine_distance(&[0.0, 0.0], &[1.0, 0.0]), 1.0);
    }

    #[test]
    fn test_matrix_symmetric_zero_diagonal() {
        let e = vec![emb(0, &[1.0, 0.0]), emb(1, &[0.6, 0.8]), emb(2, &[0.0, 1.0])];
        let m = distance_matrix(&e).unwrap();
        for i in 0..3 {
            assert_eq!(m[i][i], 0.0);
            for j in 0..3 {
                assert_eq!(m[i][j], m[j][i]);
            }
        }
    }

    #[test]
    fn test_matrix_dimension_mismatch() {
        let e = vec![emb(0, &[1.0, 0.0]), emb(1, &[1.0])];
        assert!(matches!(
            distance_matrix(&e),
            Err(Error::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_neighbors_exclude_self_sorted_bounded() {
        let e: Vec<TextEmbedding> = (0..30u32)
            .map(|i| {
                let a = i as f32 * 0.05;
                emb(i, &[a.cos(), a.sin()])
            })
            .collect();
        let texts: Vec<TextRow> = (0..30).map(text).collect();

        let ranked = nearest_neighbors(&e, &texts, DEFAULT_K).unwrap();
        assert_eq!(ranked.len(), 30);
        for (query, neighbors) in &ranked {
            assert!(neighbors.len() <= DEFAULT_K);
            assert!(neighbors.iter().all(|n| n.text_id != *query));
            assert!(neighbors.windows(2).all(|w| w[0].distance <= w[1].distance));
            for (i, n) in neighbors.iter().enumerate() {
                assert_eq!(n.rank, i + 1);
            }
        }
        let first = &ranked[&0];
        assert_eq!(first[0].text_id, 1);
        assert_eq!(first[0].year, 1790);
        assert_eq!(first[0].author, "Author 1");
    }

    #[test]
    fn test_self_excluded_even_with_duplicate_vector() {
        let e = vec![emb(0, &[1.0, 0.0]), emb(1, &[1.0, 0.0]), emb(2, &[0.0, 1.0])];
        let texts: Vec<TextRow> = (0..3).map(text).collect();
        let ranked = nearest_neighbors(&e, &texts, 5).unwrap();
        assert_eq!(ranked[&0].len(), 2);
        assert_eq!(ranked[&0][0].text_id, 1);
        assert!(ranked[&0][0].distance.abs() < 1e-9);
    }

    #[test]
    fn test_ties_break_by_text_id() {
        let e = vec![
            emb(0, &[1.0, 0.0]),
            emb(3, &[0.0, 1.0]),
            emb(1, &[0.0, -1.0]),
            emb(2, &[0.0, 1.0]),
        ];
        let texts: Vec<TextRow> = (0..4).map(text).collect();
        let ranked = nearest_neighbors(&e, &texts, 3).unwrap();
        let ids: Vec<u32> = ranked[&0].iter().map(|n| n.text_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_non_finite_vector_ranks_as_orthogonal() {
        let e = vec![
            emb(0, &[1.0, 0.0]),
            emb(1, &[f32::NAN, 0.0]),
            emb(2, &[0.6, 0.8]),
            emb(3, &[0.0, 1.0]),
        ];
        let texts: Vec<TextRow> = (0..4).map(text).collect();
        let ranked = nearest_neighbors(&e, &texts, 3).unwrap();
        let ids: Vec<u32> = ranked[&0].iter().map(|n| n.text_id).collect();
        assert_eq!(ids, vec![2, 1, 3]);
        assert_eq!(ranked[&0][1].distance, 1.0);

        let mut reversed = e.clone();
        reversed.reverse();
        let again = nearest_neighbors(&reversed, &texts, 3).unwrap();
        assert_eq!(ranked, again);
    }

    #[test]
    fn test_k_smaller_than_corpus() {
        let e: Vec<TextEmbedding> = (0..5u32).map(|i| emb(i, &[1.0, i as f32])).collect();
        let texts: Vec<TextRow> = (0..5).map(text).collect();
        let ranked = nearest_neighbors(&e, &texts, 2).unwrap();
        assert!(ranked.values().all(|v| v.len() == 2));
    }

    #[test]
    fn test_missing_metadata_rejected() {
        let e = vec![emb(0, &[1.0]), emb(9, &[1.0])];
        let texts: Vec<TextRow> = (0..2).map(text).collect();
        assert!(matches!(
            nearest_neighbors(&e, &texts, 3),
            Err(Error::MissingText(9))
        ));
    }

    #[test]
    fn test_combine_outer_join() {
        let texts: Vec<TextRow> = (0..4).map(text).collect();
        let a = nearest_neighbors(
            &[emb(0, &[1.0, 0.0]), emb(1, &[0.0, 1.0]), emb(2, &[1.0, 1.0])],
            &texts,
            5,
        )
        .unwrap();
        let b = nearest_neighbors(&[emb(0, &[1.0]), emb(3, &[1.0])], &texts, 5).unwrap();

        let mut per_kind = BTreeMap::new();
        per_kind.insert(EmbeddingKind::Tfidf, a);
        per_kind.insert(EmbeddingKind::OpenAi3Small, b);

        let combined = combine_rankings(&per_kind);
        assert_eq!(combined.keys().copied().collect::<Vec<_>>(), vec![0, 1, 2, 3]);

        let rows = &combined[&0];
        assert_eq!(rows.len(), 2);
        assert!(rows[0].by_kind[&EmbeddingKind::Tfidf].is_some());
        assert_eq!(
            rows[0].by_kind[&EmbeddingKind::OpenAi3Small]
                .as_ref()
                .map(|n| n.text_id),
            Some(3)
        );
        assert!(rows[1].by_kind[&EmbeddingKind::OpenAi3Small].is_none());

        let rows = &combined[&3];
        assert_eq!(rows.len(), 1);
        assert!(rows[0].by_kind[&EmbeddingKind::Tfidf].is_none());
    }
}
