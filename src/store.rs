//! On-disk table store.
//!
//! Each table is a JSON Lines file: one row per line, columns in struct
//! field order. Writing the same rows always produces the same bytes, so
//! two builds over unchanged input can be compared with [`file_digest`].
//!
//! | Table | File |
//! |-------|------|
//! | author | `author.jsonl` |
//! | text | `text.jsonl` |
//! | paragraph | `paragraph.jsonl` |
//! | paragraph embeddings | `<kind>.paragraph.jsonl` |
//! | text embeddings | `<kind>.text.jsonl` |

use anyhow::{bail, Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use speech_eda_core::models::EmbeddingKind;

pub const AUTHOR_TABLE: &str = "author.jsonl";
pub const TEXT_TABLE: &str = "text.jsonl";
pub const PARAGRAPH_TABLE: &str = "paragraph.jsonl";

/// A directory holding the pipeline's tables.
#[derive(Debug, Clone)]
pub struct TableDir {
    root: PathBuf,
}

impl TableDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, table: &str) -> PathBuf {
        self.root.join(table)
    }

    /// Create the directory (and parents) if it does not exist.
    pub fn ensure(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root)
            .with_context(|| format!("Failed to create table directory: {}", self.root.display()))
    }

    pub fn write<T: Serialize>(&self, table: &str, rows: &[T]) -> Result<()> {
        write_table(&self.path(table), rows)
    }

    pub fn read<T: DeserializeOwned>(&self, table: &str) -> Result<Vec<T>> {
        read_table(&self.path(table))
    }

    /// Embedding kinds with a text embedding table in this directory.
    pub fn available_kinds(&self) -> Vec<EmbeddingKind> {
        EmbeddingKind::ALL
            .iter()
            .copied()
            .filter(|k| self.path(&k.text_table()).is_file())
            .collect()
    }
}

/// Write rows as JSON Lines, replacing any existing file.
pub fn write_table<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create table: {}", path.display()))?;
    let mut out = BufWriter::new(file);
    for row in rows {
        serde_json::to_writer(&mut out, row)?;
        out.write_all(b"\n")?;
    }
    out.flush()
        .with_context(|| format!("Failed to write table: {}", path.display()))?;
    Ok(())
}

/// Read a JSON Lines table. A missing file is a precondition error.
pub fn read_table<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.is_file() {
        bail!("Required table does not exist: {}", path.display());
    }

    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open table: {}", path.display()))?;
    let mut rows = Vec::new();
    for (i, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let row = serde_json::from_str(&line)
            .with_context(|| format!("Invalid row at {}:{}", path.display(), i + 1))?;
        rows.push(row);
    }
    Ok(rows)
}

/// SHA-256 of a file's bytes, hex-encoded.
pub fn file_digest(path: &Path) -> Result<String> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use speech_eda_core::models::{ParagraphRow, TextEmbedding};

    fn paragraphs() -> Vec<ParagraphRow> {
        vec![
            ParagraphRow {
                text_id: 0,
                paragraph_id: 0,
                paragraph_text: "Fellow citizens.".to_string(),
                paragraph_length: 16,
            },
            ParagraphRow {
                text_id: 0,
                paragraph_id: 1,
                paragraph_text: "With \"quotes\"\tand tabs.".to_string(),
                paragraph_length: 22,
            },
        ]
    }

    #[test]
    fn test_write_read_preserves_rows() {
        let tmp = tempfile::TempDir::new().unwrap();
        let dir = TableDir::new(tmp.path());
        dir.write(PARAGRAPH_TABLE, &paragraphs()).unwrap();
        let back: Vec<ParagraphRow> = dir.read(PARAGRAPH_TABLE).unwrap();
        assert_eq!(back, paragraphs());
    }

    #[test]
    fn test_one_line_per_row_in_column_order() {
        let tmp = tempfile::TempDir::new().unwrap();
        let dir = TableDir::new(tmp.path());
        dir.write(PARAGRAPH_TABLE, &paragraphs()).unwrap();
        let raw = std::fs::read_to_string(dir.path(PARAGRAPH_TABLE)).unwrap();
        let lines: Vec<&str> = raw.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("{\"text_id\":0,\"paragraph_id\":0,"));
    }

    #[test]
    fn test_rewrite_is_byte_identical() {
        let tmp = tempfile::TempDir::new().unwrap();
        let a = tmp.path().join("a.jsonl");
        let b = tmp.path().join("b.jsonl");
        let rows = vec![TextEmbedding {
            text_id: 3,
            embedding: vec![0.1, -0.25, 1.0 / 3.0],
        }];
        write_table(&a, &rows).unwrap();
        write_table(&b, &rows).unwrap();
        assert_eq!(file_digest(&a).unwrap(), file_digest(&b).unwrap());

        let back: Vec<TextEmbedding> = read_table(&a).unwrap();
        assert_eq!(back, rows);
    }

    #[test]
    fn test_missing_table_is_precondition_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let err = read_table::<ParagraphRow>(&tmp.path().join(PARAGRAPH_TABLE)).unwrap_err();
        assert!(err.to_string().contains("Required table does not exist"));
    }

    #[test]
    fn test_invalid_row_reports_line() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("t.jsonl");
        std::fs::write(&path, "{\"text_id\":0,\"embedding\":[]}\nnot json\n").unwrap();
        let err = read_table::<TextEmbedding>(&path).unwrap_err();
        assert!(err.to_string().contains(":2"), "{}", err);
    }

    #[test]
    fn test_available_kinds() {
        let tmp = tempfile::TempDir::new().unwrap();
        let dir = TableDir::new(tmp.path());
        assert!(dir.available_kinds().is_empty());
        let rows: Vec<TextEmbedding> = Vec::new();
        dir.write(&EmbeddingKind::OpenAi3Small.text_table(), &rows)
            .unwrap();
        assert_eq!(dir.available_kinds(), vec![EmbeddingKind::OpenAi3Small]);
    }
}
