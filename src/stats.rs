//! Table directory statistics.
//!
//! Provides a quick summary of what has been built: row counts per table,
//! author coverage, paragraph length spread, which embedding kinds exist,
//! and a SHA-256 digest of every table file. Two builds over the same input
//! must print the same digests.

use anyhow::{bail, Result};
use std::collections::BTreeSet;
use std::path::Path;

use speech_eda_core::models::{AuthorRow, ParagraphRow, TextEmbedding, TextRow};

use crate::store::{file_digest, TableDir, AUTHOR_TABLE, PARAGRAPH_TABLE, TEXT_TABLE};

/// Min, mean and max of a set of lengths.
#[derive(Debug, Clone, PartialEq)]
pub struct LengthSummary {
    pub min: usize,
    pub mean: f64,
    pub max: usize,
}

pub fn summarize_lengths(lengths: impl IntoIterator<Item = usize>) -> Option<LengthSummary> {
    let mut count = 0usize;
    let mut total = 0usize;
    let mut min = usize::MAX;
    let mut max = 0usize;
    for len in lengths {
        count += 1;
        total += len;
        min = min.min(len);
        max = max.max(len);
    }
    if count == 0 {
        return None;
    }
    Some(LengthSummary {
        min,
        mean: total as f64 / count as f64,
        max,
    })
}

/// Run the stats command: read the tables in `dir` and print a summary.
pub fn run_stats(dir: &Path) -> Result<()> {
    if !dir.is_dir() {
        bail!("Table directory does not exist: {}", dir.display());
    }
    let tables = TableDir::new(dir);

    println!("Speech EDA — Table Stats");
    println!("========================");
    println!();
    println!("  Directory:   {}", dir.display());
    println!();

    if tables.path(AUTHOR_TABLE).is_file() {
        let authors: Vec<AuthorRow> = tables.read(AUTHOR_TABLE)?;
        let distinct: BTreeSet<u32> = authors.iter().map(|a| a.author_id).collect();
        println!("  Authors:     {} ({} aliases)", distinct.len(), authors.len());
    }

    if tables.path(TEXT_TABLE).is_file() {
        let texts: Vec<TextRow> = tables.read(TEXT_TABLE)?;
        let covered: BTreeSet<u32> = texts.iter().map(|t| t.author_id).collect();
        println!(
            "  Texts:       {} ({} authors)",
            texts.len(),
            covered.len()
        );
        if let (Some(first), Some(last)) = (texts.first(), texts.last()) {
            println!("  Years:       {}–{}", first.year, last.year);
        }
    }

    if tables.path(PARAGRAPH_TABLE).is_file() {
        let paragraphs: Vec<ParagraphRow> = tables.read(PARAGRAPH_TABLE)?;
        println!("  Paragraphs:  {}", paragraphs.len());
        if let Some(s) = summarize_lengths(paragraphs.iter().map(|p| p.paragraph_length)) {
            println!(
                "  Length:      min {}  mean {:.1}  max {}",
                s.min, s.mean, s.max
            );
        }
    }

    let kinds = tables.available_kinds();
    println!();
    if kinds.is_empty() {
        println!("  Embeddings:  none");
    } else {
        println!("  Embeddings:");
        println!("  {:<18} {:>10} {:>6}", "KIND", "DOCUMENTS", "DIMS");
        println!("  {}", "-".repeat(36));
        for kind in &kinds {
            let rows: Vec<TextEmbedding> = tables.read(&kind.text_table())?;
            let dims = rows.first().map(|r| r.embedding.len()).unwrap_or(0);
            println!("  {:<18} {:>10} {:>6}", kind.as_str(), rows.len(), dims);
        }
    }

    let mut files: Vec<String> = vec![
        AUTHOR_TABLE.to_string(),
        TEXT_TABLE.to_string(),
        PARAGRAPH_TABLE.to_string(),
    ];
    for kind in &kinds {
        files.push(kind.paragraph_table());
        files.push(kind.text_table());
    }

    println!();
    println!("  Digests (sha256):");
    for file in &files {
        let path = tables.path(file);
        if path.is_file() {
            println!("  {:<30} {}", file, file_digest(&path)?);
        }
    }
    println!();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summarize_lengths() {
        let s = summarize_lengths(vec![3, 9, 6]).unwrap();
        assert_eq!(s.min, 3);
        assert_eq!(s.max, 9);
        assert!((s.mean - 6.0).abs() < 1e-9);
        assert!(summarize_lengths(Vec::new()).is_none());
    }

    #[test]
    fn test_stats_missing_dir() {
        let tmp = tempfile::TempDir::new().unwrap();
        assert!(run_stats(&tmp.path().join("absent")).is_err());
    }

    #[test]
    fn test_stats_partial_tables() {
        let tmp = tempfile::TempDir::new().unwrap();
        let tables = TableDir::new(tmp.path());
        tables
            .write(
                AUTHOR_TABLE,
                &[AuthorRow {
                    author_id: 0,
                    author: "John Adams".to_string(),
                    alias: "Adams".to_string(),
                }],
            )
            .unwrap();
        run_stats(tmp.path()).unwrap();
    }
}
