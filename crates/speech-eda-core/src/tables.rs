//! Text and paragraph table builders.
//!
//! Turns validated raw records into the text table (one row per speech)
//! and the text table into the paragraph table (one row per non-empty
//! paragraph).
//!
//! # Ordering
//!
//! Records are stable-sorted by `year` ascending and `text_id` is the
//! resulting position. Records sharing a year keep the order they were
//! handed in, so callers must supply a reproducible order (the CLI sorts
//! by file name).
//!
//! # Normalization
//!
//! - Text: every `" \n"` (a fixed-width line-wrap artifact) becomes `" "`
//!   before `text_length` is measured.
//! - Paragraphs: split on `\n`, trim, collapse each `"  "` to `" "` in one
//!   left-to-right pass, drop empties, number survivors from 0.
//!
//! Lengths count Unicode scalar values, not bytes.

use serde_json::Value;

use crate::author::AuthorResolver;
use crate::error::{Error, Result};
use crate::models::{ParagraphRow, RawRecord, SourcedRecord, TextRow};

/// Parse and validate one raw record.
///
/// All four fields (`author`, `year`, `title`, `text`) are required and
/// must have the right JSON type. Extra fields are ignored.
pub fn parse_record(source_name: &str, json: &str) -> Result<RawRecord> {
    let malformed = |reason: String| Error::MalformedRecord {
        source_name: source_name.to_string(),
        reason,
    };

    let value: Value = serde_json::from_str(json).map_err(|e| malformed(e.to_string()))?;
    let obj = value
        .as_object()
        .ok_or_else(|| malformed("expected a JSON object".to_string()))?;

    let string_field = |name: &str| -> Result<String> {
        match obj.get(name) {
            Some(Value::String(s)) => Ok(s.clone()),
            Some(_) => Err(malformed(format!("field '{}' must be a string", name))),
            None => Err(malformed(format!("missing field '{}'", name))),
        }
    };

    let year = match obj.get("year") {
        Some(v) => v
            .as_i64()
            .and_then(|y| i32::try_from(y).ok())
            .ok_or_else(|| malformed("field 'year' must be an integer".to_string()))?,
        None => return Err(malformed("missing field 'year'".to_string())),
    };

    Ok(RawRecord {
        author: string_field("author")?,
        year,
        title: string_field("title")?,
        text: string_field("text")?,
    })
}

/// Collapse the fixed-width line-wrap artifact.
pub fn normalize_text(text: &str) -> String {
    text.replace(" \n", " ")
}

/// Build the text table.
///
/// Fails on the first record whose author does not resolve.
pub fn build_text_table(
    mut records: Vec<SourcedRecord>,
    resolver: &AuthorResolver,
) -> Result<Vec<TextRow>> {
    // Stable: equal years keep input order.
    records.sort_by_key(|r| r.record.year);

    records
        .into_iter()
        .enumerate()
        .map(|(i, sourced)| -> Result<TextRow> {
            let SourcedRecord {
                source_name,
                record,
            } = sourced;
            let (author_id, author) =
                resolver
                    .resolve(&record.author)
                    .ok_or_else(|| Error::UnknownAuthor {
                        author: record.author.clone(),
                        source_name,
                    })?;

            let text = normalize_text(&record.text);
            let text_length = text.chars().count();

            Ok(TextRow {
                year: record.year,
                author_id,
                author: author.to_string(),
                title: record.title,
                text_id: i as u32,
                text,
                text_length,
            })
        })
        .collect()
}

/// Split a document into cleaned, non-empty paragraphs in document order.
pub fn split_paragraphs(text: &str) -> Vec<String> {
    text.split('\n')
        .map(|p| p.trim().replace("  ", " "))
        .filter(|p| !p.is_empty())
        .collect()
}

/// Build the paragraph table from the text table.
pub fn build_paragraph_table(texts: &[TextRow]) -> Vec<ParagraphRow> {
    texts
        .iter()
        .flat_map(|t| {
            split_paragraphs(&t.text)
                .into_iter()
                .enumerate()
                .map(move |(i, paragraph_text)| ParagraphRow {
                    text_id: t.text_id,
                    paragraph_id: i as u32,
                    paragraph_length: paragraph_text.chars().count(),
                    paragraph_text,
                })
        })
        .collect()
}
