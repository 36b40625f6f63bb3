//! Author alias resolution.
//!
//! The alias file is a JSON array of single-key objects, each mapping a
//! canonical author name to the name variants seen in raw records:
//!
//! ```json
//! [
//!   {"George Washington": ["George Washington", "Geo. Washington"]},
//!   {"John Adams": ["John Adams"]}
//! ]
//! ```
//!
//! An author's id is its position in that array. The alias index is built
//! once and every lookup afterwards is a single hash probe.
//!
//! # Example
//!
//! ```rust
//! use speech_eda_core::author::AuthorResolver;
//!
//! let resolver = AuthorResolver::from_json_str(
//!     r#"[{"George Washington": ["Geo. Washington", "George Washington"]}]"#,
//! ).unwrap();
//! let (id, name) = resolver.resolve("Geo. Washington").unwrap();
//! assert_eq!(id, 0);
//! assert_eq!(name, "George Washington");
//! ```

use std::collections::{BTreeMap, HashMap};

use crate::error::{Error, Result};
use crate::models::AuthorRow;

/// Strict partial function from alias string to author identity.
#[derive(Debug, Clone)]
pub struct AuthorResolver {
    names: Vec<String>,
    index: HashMap<String, u32>,
    rows: Vec<AuthorRow>,
}

impl AuthorResolver {
    /// Parse the alias file contents and build the index.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let entries: Vec<BTreeMap<String, Vec<String>>> = serde_json::from_str(json)
            .map_err(|e| Error::MalformedAliases(e.to_string()))?;

        let mut authors = Vec::with_capacity(entries.len());
        for (i, entry) in entries.into_iter().enumerate() {
            if entry.len() != 1 {
                return Err(Error::MalformedAliases(format!(
                    "entry {} has {} keys, expected exactly one",
                    i,
                    entry.len()
                )));
            }
            if let Some(pair) = entry.into_iter().next() {
                authors.push(pair);
            }
        }

        Self::new(authors)
    }

    /// Build from `(canonical name, aliases)` pairs in id order.
    ///
    /// Fails if any alias appears under two different authors.
    pub fn new(authors: Vec<(String, Vec<String>)>) -> Result<Self> {
        let mut names: Vec<String> = Vec::with_capacity(authors.len());
        let mut index: HashMap<String, u32> = HashMap::new();
        let mut rows = Vec::new();

        for (author_id, (name, aliases)) in authors.into_iter().enumerate() {
            let author_id = author_id as u32;
            for alias in aliases {
                if let Some(&existing) = index.get(&alias) {
                    if existing == author_id {
                        continue;
                    }
                    return Err(Error::DuplicateAlias {
                        alias,
                        first: names[existing as usize].clone(),
                        second: name,
                    });
                }
                index.insert(alias.clone(), author_id);
                rows.push(AuthorRow {
                    author_id,
                    author: name.clone(),
                    alias,
                });
            }
            names.push(name);
        }

        Ok(Self { names, index, rows })
    }

    /// Look up an alias. Returns the author id and canonical name.
    pub fn resolve(&self, alias: &str) -> Option<(u32, &str)> {
        self.index
            .get(alias)
            .map(|&id| (id, self.names[id as usize].as_str()))
    }

    /// The author table: one row per alias, in file order.
    pub fn rows(&self) -> &[AuthorRow] {
        &self.rows
    }

    /// Number of distinct authors.
    pub fn author_count(&self) -> usize {
        self.names.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALIASES: &str = r#"[
        {"George Washington": ["George Washington", "Geo. Washington"]},
        {"John Adams": ["John Adams"]},
        {"Thomas Jefferson": ["Thomas Jefferson", "Th. Jefferson"]}
    ]"#;

    #[test]
    fn ids_follow_file_order() {
        let r = AuthorResolver::from_json_str(ALIASES).unwrap();
        assert_eq!(r.author_count(), 3);
        assert_eq!(r.resolve("John Adams"), Some((1, "John Adams")));
        assert_eq!(r.resolve("Th. Jefferson"), Some((2, "Thomas Jefferson")));
    }

    #[test]
    fn aliases_share_an_id() {
        let r = AuthorResolver::from_json_str(ALIASES).unwrap();
        let a = r.resolve("George Washington").unwrap();
        let b = r.resolve("Geo. Washington").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn unknown_alias_is_none() {
        let r = AuthorResolver::from_json_str(ALIASES).unwrap();
        assert!(r.resolve("george washington").is_none());
    }

    #[test]
    fn one_row_per_alias() {
        let r = AuthorResolver::from_json_str(ALIASES).unwrap();
        assert_eq!(r.rows().len(), 5);
        assert_eq!(r.rows()[1].alias, "Geo. Washington");
        assert_eq!(r.rows()[1].author, "George Washington");
        assert_eq!(r.rows()[1].author_id, 0);
    }

    #[test]
    fn duplicate_alias_across_authors_rejected() {
        let err = AuthorResolver::from_json_str(
            r#"[{"A": ["Smith"]}, {"B": ["Smith"]}]"#,
        )
        .unwrap_err();
        match err {
            Error::DuplicateAlias { alias, first, second } => {
                assert_eq!(alias, "Smith");
                assert_eq!(first, "A");
                assert_eq!(second, "B");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn repeated_alias_within_author_collapses() {
        let r = AuthorResolver::from_json_str(r#"[{"A": ["A", "A"]}]"#).unwrap();
        assert_eq!(r.rows().len(), 1);
    }

    #[test]
    fn multi_key_entry_rejected() {
        let err = AuthorResolver::from_json_str(r#"[{"A": ["A"], "B": ["B"]}]"#).unwrap_err();
        assert!(matches!(err, Error::MalformedAliases(_)));
    }

    #[test]
    fn non_array_rejected() {
        let err = AuthorResolver::from_json_str(r#"{"A": ["A"]}"#).unwrap_err();
        assert!(matches!(err, Error::MalformedAliases(_)));
    }
}
