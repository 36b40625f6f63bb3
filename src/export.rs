//! Export the similarity and feature-space artifacts for the viewer.
//!
//! Reads the text table and every `<kind>.text.jsonl` present in the table
//! directory, then writes into the output directory:
//!
//! - `similarity.json`: object keyed by query `text_id`, each value the
//!   outer-joined rank rows across kinds. Every row repeats the query's
//!   `author`, `year` and `title`, then carries per-kind neighbor columns
//!   prefixed with the kind name (`openai-3-small_distance`). The first
//!   row is the nearest other document; the query itself never appears.
//! - `featurespace.json` and `featurespace.csv`: one row per document with
//!   its metadata and, per kind, a PCA and a t-SNE position scaled into
//!   `[0, 1]`, in columns `x_<dim>_<kind>` and `y_<dim>_<kind>` where
//!   `<dim>` is `pca` or `tsne` and `<kind>` uses underscores
//!   (`x_tsne_openai_ada_002`).
//!
//! A kind with no value for a row is written as `null` (JSON) or an empty
//! field (CSV).

use anyhow::{bail, Context, Result};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

use speech_eda_core::models::{EmbeddingKind, Neighbor, TextEmbedding, TextRow};
use speech_eda_core::project::project_2d;
use speech_eda_core::rank::{combine_rankings, nearest_neighbors, RankRow};
use speech_eda_core::tsne::{tsne_2d, TsneParams};

use crate::config::Config;
use crate::store::{TableDir, TEXT_TABLE};

pub const SIMILARITY_FILE: &str = "similarity.json";
pub const FEATURESPACE_JSON: &str = "featurespace.json";
pub const FEATURESPACE_CSV: &str = "featurespace.csv";

/// Write all export artifacts for the tables in `dir` into `output`.
pub fn run_export(config: &Config, dir: &Path, output: &Path) -> Result<()> {
    let tables = TableDir::new(dir);
    let texts: Vec<TextRow> = tables.read(TEXT_TABLE)?;

    let kinds = tables.available_kinds();
    if kinds.is_empty() {
        bail!(
            "No document embeddings found in {}. Run `eda embed` first.",
            dir.display()
        );
    }

    let mut embeddings: BTreeMap<EmbeddingKind, Vec<TextEmbedding>> = BTreeMap::new();
    for kind in &kinds {
        let rows: Vec<TextEmbedding> = tables.read(&kind.text_table())?;
        tracing::debug!(%kind, documents = rows.len(), "loaded document embeddings");
        embeddings.insert(*kind, rows);
    }

    let similarity = build_similarity(&embeddings, &texts, config.neighbors.k)?;
    let features = build_featurespace(&embeddings, &texts, &config.projection.tsne_params())?;

    std::fs::create_dir_all(output)
        .with_context(|| format!("Failed to create output directory: {}", output.display()))?;

    let json = serde_json::to_string_pretty(&similarity)?;
    write_file(&output.join(SIMILARITY_FILE), &json)?;

    let json = serde_json::to_string_pretty(&features)?;
    write_file(&output.join(FEATURESPACE_JSON), &json)?;
    write_file(&output.join(FEATURESPACE_CSV), &features.to_csv())?;

    let kind_names: Vec<&str> = kinds.iter().map(|k| k.as_str()).collect();
    println!("export {}", output.display());
    println!("  kinds: {}", kind_names.join(", "));
    println!("  documents: {}", features.rows.len());
    println!("  neighbors per document: {}", config.neighbors.k);

    Ok(())
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    std::fs::write(path, contents).with_context(|| format!("Failed to write {}", path.display()))
}

// ============ Similarity ============

/// Metadata of a query document, repeated on each of its rank rows.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryInfo {
    pub author: String,
    pub year: i32,
    pub title: String,
}

/// Rank rows per query document, ordered by `text_id`.
#[derive(Debug)]
pub struct Similarity {
    pub by_text: BTreeMap<u32, Vec<RankRow>>,
    pub queries: BTreeMap<u32, QueryInfo>,
}

/// Rank every kind's documents and outer-join the rankings.
pub fn build_similarity(
    embeddings: &BTreeMap<EmbeddingKind, Vec<TextEmbedding>>,
    texts: &[TextRow],
    k: usize,
) -> Result<Similarity> {
    let mut per_kind = BTreeMap::new();
    for (kind, rows) in embeddings {
        let ranked = nearest_neighbors(rows, texts, k)
            .with_context(|| format!("Failed to rank {} embeddings", kind))?;
        per_kind.insert(*kind, ranked);
    }
    let by_text = combine_rankings(&per_kind);
    let queries = texts
        .iter()
        .filter(|t| by_text.contains_key(&t.text_id))
        .map(|t| {
            let info = QueryInfo {
                author: t.author.clone(),
                year: t.year,
                title: t.title.clone(),
            };
            (t.text_id, info)
        })
        .collect();
    Ok(Similarity { by_text, queries })
}

impl Serialize for Similarity {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.by_text.len()))?;
        for (text_id, rows) in &self.by_text {
            let query = self.queries.get(text_id);
            let rows: Vec<RankRowColumns<'_>> = rows
                .iter()
                .map(|row| RankRowColumns { query, row })
                .collect();
            map.serialize_entry(&text_id.to_string(), &rows)?;
        }
        map.end()
    }
}

/// Flattens a [`RankRow`] into the query's metadata, `rank`, and
/// prefixed columns per kind.
struct RankRowColumns<'a> {
    query: Option<&'a QueryInfo>,
    row: &'a RankRow,
}

impl Serialize for RankRowColumns<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let row = self.row;
        let q = self.query;
        let mut map = serializer.serialize_map(Some(4 + row.by_kind.len() * 5))?;
        map.serialize_entry("author", &q.map(|q| q.author.as_str()))?;
        map.serialize_entry("year", &q.map(|q| q.year))?;
        map.serialize_entry("title", &q.map(|q| q.title.as_str()))?;
        map.serialize_entry("rank", &row.rank)?;
        for (kind, neighbor) in &row.by_kind {
            let n: Option<&Neighbor> = neighbor.as_ref();
            map.serialize_entry(&format!("{}_text_id", kind), &n.map(|n| n.text_id))?;
            map.serialize_entry(&format!("{}_distance", kind), &n.map(|n| n.distance))?;
            map.serialize_entry(&format!("{}_author", kind), &n.map(|n| n.author.as_str()))?;
            map.serialize_entry(&format!("{}_year", kind), &n.map(|n| n.year))?;
            map.serialize_entry(&format!("{}_title", kind), &n.map(|n| n.title.as_str()))?;
        }
        map.end()
    }
}

// ============ Feature space ============

/// Projection methods, in column order.
const DIMS: [&str; 2] = ["pca", "tsne"];

/// A document's scaled positions under one embedding kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KindCoords {
    pub pca: (f64, f64),
    pub tsne: (f64, f64),
}

impl KindCoords {
    fn by_dim(&self) -> [(f64, f64); 2] {
        [self.pca, self.tsne]
    }
}

/// One document's metadata and per-kind 2-D positions.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub text_id: u32,
    pub year: i32,
    pub author: String,
    pub title: String,
    pub coords: BTreeMap<EmbeddingKind, Option<KindCoords>>,
}

/// The feature-space table, one row per document in the text table.
#[derive(Debug)]
pub struct FeatureSpace {
    pub kinds: Vec<EmbeddingKind>,
    pub rows: Vec<FeatureRow>,
}

/// Project each kind to 2-D and join the positions onto the text table.
pub fn build_featurespace(
    embeddings: &BTreeMap<EmbeddingKind, Vec<TextEmbedding>>,
    texts: &[TextRow],
    tsne: &TsneParams,
) -> Result<FeatureSpace> {
    let mut positions: BTreeMap<EmbeddingKind, BTreeMap<u32, KindCoords>> = BTreeMap::new();
    for (kind, rows) in embeddings {
        let pca =
            project_2d(rows).with_context(|| format!("Failed to project {} embeddings", kind))?;
        let laid_out = tsne_2d(rows, tsne)
            .with_context(|| format!("Failed to run t-SNE on {} embeddings", kind))?;
        tracing::debug!(%kind, documents = rows.len(), "projected embeddings");

        let coords = pca
            .into_iter()
            .zip(laid_out)
            .map(|(p, t)| {
                let c = KindCoords {
                    pca: (p.x, p.y),
                    tsne: (t.x, t.y),
                };
                (p.text_id, c)
            })
            .collect();
        positions.insert(*kind, coords);
    }

    let rows = texts
        .iter()
        .map(|t| FeatureRow {
            text_id: t.text_id,
            year: t.year,
            author: t.author.clone(),
            title: t.title.clone(),
            coords: positions
                .iter()
                .map(|(kind, m)| (*kind, m.get(&t.text_id).copied()))
                .collect(),
        })
        .collect();

    Ok(FeatureSpace {
        kinds: embeddings.keys().copied().collect(),
        rows,
    })
}

/// `(x, y)` column names for every kind and projection, in output order.
fn coordinate_columns(kinds: &[EmbeddingKind]) -> Vec<(String, String)> {
    let mut cols = Vec::with_capacity(kinds.len() * DIMS.len());
    for kind in kinds {
        for dim in DIMS {
            let key = kind.column_key();
            cols.push((format!("x_{}_{}", dim, key), format!("y_{}_{}", dim, key)));
        }
    }
    cols
}

/// Positions of one row in [`coordinate_columns`] order.
fn coordinate_values(row: &FeatureRow, kinds: &[EmbeddingKind]) -> Vec<Option<(f64, f64)>> {
    let mut values = Vec::with_capacity(kinds.len() * DIMS.len());
    for kind in kinds {
        match row.coords.get(kind).copied().flatten() {
            Some(c) => values.extend(c.by_dim().map(Some)),
            None => values.extend([None, None]),
        }
    }
    values
}

impl FeatureSpace {
    fn header(&self) -> Vec<String> {
        let mut cols: Vec<String> = ["text_id", "year", "author", "title"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        for (x, y) in coordinate_columns(&self.kinds) {
            cols.push(x);
            cols.push(y);
        }
        cols
    }

    /// Render as RFC 4180 CSV with a header row.
    pub fn to_csv(&self) -> String {
        let mut out = String::new();
        push_csv_line(&mut out, &self.header());

        for row in &self.rows {
            let mut fields = vec![
                row.text_id.to_string(),
                row.year.to_string(),
                row.author.clone(),
                row.title.clone(),
            ];
            for xy in coordinate_values(row, &self.kinds) {
                match xy {
                    Some((x, y)) => {
                        fields.push(x.to_string());
                        fields.push(y.to_string());
                    }
                    None => {
                        fields.push(String::new());
                        fields.push(String::new());
                    }
                }
            }
            push_csv_line(&mut out, &fields);
        }
        out
    }
}

impl Serialize for FeatureSpace {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let columns = coordinate_columns(&self.kinds);
        let rows: Vec<FeatureRowColumns<'_>> = self
            .rows
            .iter()
            .map(|row| FeatureRowColumns {
                row,
                kinds: &self.kinds,
                columns: &columns,
            })
            .collect();
        rows.serialize(serializer)
    }
}

struct FeatureRowColumns<'a> {
    row: &'a FeatureRow,
    kinds: &'a [EmbeddingKind],
    columns: &'a [(String, String)],
}

impl Serialize for FeatureRowColumns<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let row = self.row;
        let mut map = serializer.serialize_map(Some(4 + self.columns.len() * 2))?;
        map.serialize_entry("text_id", &row.text_id)?;
        map.serialize_entry("year", &row.year)?;
        map.serialize_entry("author", &row.author)?;
        map.serialize_entry("title", &row.title)?;
        let values = coordinate_values(row, self.kinds);
        for ((x_col, y_col), xy) in self.columns.iter().zip(values) {
            map.serialize_entry(x_col, &xy.map(|(x, _)| x))?;
            map.serialize_entry(y_col, &xy.map(|(_, y)| y))?;
        }
        map.end()
    }
}

fn push_csv_line(out: &mut String, fields: &[String]) {
    let escaped: Vec<String> = fields.iter().map(|f| csv_field(f)).collect();
    out.push_str(&escaped.join(","));
    out.push_str("\r\n");
}

fn csv_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
