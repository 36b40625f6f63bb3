//! Error types for the core pipeline.

use thiserror::Error;

/// Result type alias using the core [`Error`] type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the pure pipeline stages.
///
/// Every variant carries enough context (record source, `text_id`, alias)
/// to locate the offending input without re-running the stage.
#[derive(Error, Debug)]
pub enum Error {
    /// A raw record is missing a field or holds the wrong JSON type.
    #[error("Malformed record {source_name}: {reason}")]
    MalformedRecord { source_name: String, reason: String },

    /// The alias file is not an array of single-key objects.
    #[error("Malformed alias table: {0}")]
    MalformedAliases(String),

    /// The same alias string is listed under two authors.
    #[error("Alias '{alias}' is listed for both '{first}' and '{second}'")]
    DuplicateAlias {
        alias: String,
        first: String,
        second: String,
    },

    /// A record's author string matches no alias.
    #[error("Unknown author '{author}' in record {source_name}")]
    UnknownAuthor { author: String, source_name: String },

    /// Aggregation was asked to combine zero paragraphs.
    #[error("No paragraph embeddings for text_id {0}")]
    EmptyDocument(u32),

    /// The paragraph lengths of a document sum to zero.
    #[error("Total paragraph length is zero for text_id {0}")]
    ZeroWeight(u32),

    /// The weighted sum of a document's vectors is the zero vector.
    #[error("Aggregated embedding has zero norm for text_id {0}")]
    ZeroNorm(u32),

    /// Vectors that must share a length do not.
    #[error("Dimension mismatch: expected {expected}, got {actual} ({context})")]
    DimensionMismatch {
        expected: usize,
        actual: usize,
        context: String,
    },

    /// An embedding refers to a `text_id` absent from the text table.
    #[error("No text row for text_id {0}")]
    MissingText(u32),

    /// A corpus-wide fit was asked to run over no input.
    #[error("Empty corpus: {0}")]
    EmptyCorpus(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
