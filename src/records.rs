//! Raw speech record discovery.
//!
//! Reads every file directly inside the record directory whose name matches
//! `records.include_globs`, in file-name order. That order is what breaks
//! year ties in the text table, so it must not depend on the platform's
//! directory listing order.

use anyhow::{bail, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::Path;
use walkdir::WalkDir;

use speech_eda_core::models::SourcedRecord;
use speech_eda_core::tables::parse_record;

use crate::config::RecordsConfig;

/// Load and validate all raw records in `dir`.
///
/// Any unreadable or malformed record aborts the scan.
pub fn scan_records(dir: &Path, config: &RecordsConfig) -> Result<Vec<SourcedRecord>> {
    if !dir.is_dir() {
        bail!("Record directory does not exist: {}", dir.display());
    }

    let include_set = build_globset(&config.include_globs)?;
    let mut records = Vec::new();

    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name();
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let name = entry.file_name().to_string_lossy().to_string();
        if !include_set.is_match(&name) {
            continue;
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read record: {}", path.display()))?;
        let record = parse_record(&name, &content)?;
        records.push(SourcedRecord {
            source_name: name,
            record,
        });
    }

    tracing::debug!(dir = %dir.display(), count = records.len(), "scanned records");
    Ok(records)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn record_json(author: &str, year: i32) -> String {
        serde_json::json!({
            "author": author,
            "year": year,
            "title": format!("Address {}", year),
            "text": "Fellow citizens.",
        })
        .to_string()
    }

    #[test]
    fn test_scan_sorted_by_file_name() {
        let tmp = tempfile::TempDir::new().unwrap();
        fs::write(tmp.path().join("b.json"), record_json("B", 1800)).unwrap();
        fs::write(tmp.path().join("a.json"), record_json("A", 1801)).unwrap();
        fs::write(tmp.path().join("c.json"), record_json("C", 1799)).unwrap();

        let records = scan_records(tmp.path(), &RecordsConfig::default()).unwrap();
        let names: Vec<&str> = records.iter().map(|r| r.source_name.as_str()).collect();
        assert_eq!(names, vec!["a.json", "b.json", "c.json"]);
    }

    #[test]
    fn test_scan_skips_non_matching_and_nested() {
        let tmp = tempfile::TempDir::new().unwrap();
        fs::write(tmp.path().join("a.json"), record_json("A", 1801)).unwrap();
        fs::write(tmp.path().join("notes.txt"), "not a record").unwrap();
        fs::create_dir(tmp.path().join("nested")).unwrap();
        fs::write(tmp.path().join("nested/x.json"), record_json("X", 1)).unwrap();

        let records = scan_records(tmp.path(), &RecordsConfig::default()).unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_scan_malformed_record_fails() {
        let tmp = tempfile::TempDir::new().unwrap();
        fs::write(
            tmp.path().join("bad.json"),
            r#"{"author": "A", "title": "T", "text": "x"}"#,
        )
        .unwrap();

        let err = scan_records(tmp.path(), &RecordsConfig::default()).unwrap_err();
        let msg = format!("{:#}", err);
        assert!(msg.contains("bad.json"), "{}", msg);
        assert!(msg.contains("year"), "{}", msg);
    }

    #[test]
    fn test_scan_missing_dir_fails() {
        let tmp = tempfile::TempDir::new().unwrap();
        assert!(scan_records(&tmp.path().join("nope"), &RecordsConfig::default()).is_err());
    }
}
