use anyhow::{Context, Result};
use std::path::Path;

use speech_eda_core::author::AuthorResolver;
use speech_eda_core::tables::{build_paragraph_table, build_text_table};

use crate::config::Config;
use crate::records::scan_records;
use crate::store::{TableDir, AUTHOR_TABLE, PARAGRAPH_TABLE, TEXT_TABLE};

/// Build the author, text and paragraph tables from a record directory
/// and an alias file, writing them into `output`.
///
/// Nothing is written unless every record parses and resolves.
pub fn run_tables(config: &Config, input: &Path, authors: &Path, output: &Path) -> Result<()> {
    let alias_json = std::fs::read_to_string(authors)
        .with_context(|| format!("Failed to read alias file: {}", authors.display()))?;
    let resolver = AuthorResolver::from_json_str(&alias_json)
        .with_context(|| format!("Invalid alias file: {}", authors.display()))?;

    let records = scan_records(input, &config.records)?;
    tracing::info!(records = records.len(), "loaded raw records");

    let texts = build_text_table(records, &resolver)?;
    let paragraphs = build_paragraph_table(&texts);

    let tables = TableDir::new(output);
    tables.ensure()?;
    tables.write(AUTHOR_TABLE, resolver.rows())?;
    tables.write(TEXT_TABLE, &texts)?;
    tables.write(PARAGRAPH_TABLE, &paragraphs)?;

    println!("tables {}", output.display());
    println!("  authors: {}", resolver.author_count());
    println!("  aliases: {}", resolver.rows().len());
    println!("  texts: {}", texts.len());
    println!("  paragraphs: {}", paragraphs.len());

    Ok(())
}
