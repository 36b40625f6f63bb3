//! Table rows and shared types.
//!
//! Each row struct is one line of its persisted table; field order is the
//! column order written to disk and must stay stable.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One speech as produced by the scraper, after field validation.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub author: String,
    pub year: i32,
    pub title: String,
    pub text: String,
}

/// A raw record paired with where it came from (usually a file name).
///
/// The source name is only used in error messages.
#[derive(Debug, Clone)]
pub struct SourcedRecord {
    pub source_name: String,
    pub record: RawRecord,
}

/// Row of the author table: one row per alias.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorRow {
    pub author_id: u32,
    pub author: String,
    pub alias: String,
}

/// Row of the text table: one row per speech.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRow {
    pub year: i32,
    pub author_id: u32,
    pub author: String,
    pub title: String,
    pub text_id: u32,
    pub text: String,
    pub text_length: usize,
}

/// Row of the paragraph table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParagraphRow {
    pub text_id: u32,
    pub paragraph_id: u32,
    pub paragraph_text: String,
    pub paragraph_length: usize,
}

/// One paragraph's vector for a single embedding kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParagraphEmbedding {
    pub text_id: u32,
    pub paragraph_id: u32,
    pub paragraph_length: usize,
    pub embedding: Vec<f32>,
}

/// One document's aggregated, unit-norm vector for a single embedding kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextEmbedding {
    pub text_id: u32,
    pub embedding: Vec<f32>,
}

/// A ranked neighbor of a query document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Neighbor {
    /// 1-based position in the ranking.
    pub rank: usize,
    pub text_id: u32,
    pub year: i32,
    pub author: String,
    pub title: String,
    /// Cosine distance (`1 - cos`) to the query document.
    pub distance: f64,
}

/// The method used to produce a vector representation of text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EmbeddingKind {
    #[serde(rename = "tfidf")]
    Tfidf,
    #[serde(rename = "openai-ada-002")]
    OpenAiAda002,
    #[serde(rename = "openai-3-small")]
    OpenAi3Small,
}

impl EmbeddingKind {
    /// All kinds, in the order they appear in exported artifacts.
    pub const ALL: [EmbeddingKind; 3] = [
        EmbeddingKind::Tfidf,
        EmbeddingKind::OpenAiAda002,
        EmbeddingKind::OpenAi3Small,
    ];

    /// Stable identifier used in file names and column prefixes.
    pub fn as_str(&self) -> &'static str {
        match self {
            EmbeddingKind::Tfidf => "tfidf",
            EmbeddingKind::OpenAiAda002 => "openai-ada-002",
            EmbeddingKind::OpenAi3Small => "openai-3-small",
        }
    }

    /// Identifier with underscores, used in feature-space column names
    /// (`x_pca_openai_3_small`).
    pub fn column_key(&self) -> &'static str {
        match self {
            EmbeddingKind::Tfidf => "tfidf",
            EmbeddingKind::OpenAiAda002 => "openai_ada_002",
            EmbeddingKind::OpenAi3Small => "openai_3_small",
        }
    }

    /// Remote model name, or `None` for locally computed kinds.
    pub fn remote_model(&self) -> Option<&'static str> {
        match self {
            EmbeddingKind::Tfidf => None,
            EmbeddingKind::OpenAiAda002 => Some("text-embedding-ada-002"),
            EmbeddingKind::OpenAi3Small => Some("text-embedding-3-small"),
        }
    }

    /// File name of the per-paragraph embedding table.
    pub fn paragraph_table(&self) -> String {
        format!("{}.paragraph.jsonl", self.as_str())
    }

    /// File name of the per-document embedding table.
    pub fn text_table(&self) -> String {
        format!("{}.text.jsonl", self.as_str())
    }
}

impl fmt::Display for EmbeddingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmbeddingKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        EmbeddingKind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| {
                format!(
                    "unknown embedding kind '{}'. Must be tfidf, openai-ada-002, or openai-3-small",
                    s
                )
            })
    }
}
