//! TOML configuration.
//!
//! Every section is optional. A missing config file means "all defaults";
//! a config file that exists but does not parse or validate is an error.
//!
//! ```toml
//! [records]
//! include_globs = ["*.json"]
//!
//! [embedding]
//! base_url = "https://api.openai.com/v1"
//! max_batch_items = 2048
//! max_input_chars = 32764
//! max_retries = 5
//! timeout_secs = 30
//!
//! [tfidf]
//! max_features = 1536
//!
//! [neighbors]
//! k = 20
//!
//! [projection]
//! perplexity = 30.0
//! tsne_iterations = 1000
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use speech_eda_core::tsne::TsneParams;

/// Approximate characters-per-token ratio used to turn the embedding API's
/// token limit into a character limit.
pub const CHARS_PER_TOKEN: usize = 4;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub records: RecordsConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub tfidf: TfidfConfig,
    #[serde(default)]
    pub neighbors: NeighborsConfig,
    #[serde(default)]
    pub projection: ProjectionConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RecordsConfig {
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
}

impl Default for RecordsConfig {
    fn default() -> Self {
        Self {
            include_globs: default_include_globs(),
        }
    }
}

fn default_include_globs() -> Vec<String> {
    vec!["*.json".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_max_batch_items")]
    pub max_batch_items: usize,
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            max_batch_items: default_max_batch_items(),
            max_input_chars: default_max_input_chars(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_max_batch_items() -> usize {
    2048
}
fn default_max_input_chars() -> usize {
    8191 * CHARS_PER_TOKEN
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct TfidfConfig {
    /// Vocabulary cap. Matches the neural embedding dimension so vectors
    /// of different kinds are comparable in size.
    #[serde(default = "default_max_features")]
    pub max_features: usize,
}

impl Default for TfidfConfig {
    fn default() -> Self {
        Self {
            max_features: default_max_features(),
        }
    }
}

fn default_max_features() -> usize {
    1536
}

#[derive(Debug, Deserialize, Clone)]
pub struct NeighborsConfig {
    #[serde(default = "default_k")]
    pub k: usize,
}

impl Default for NeighborsConfig {
    fn default() -> Self {
        Self { k: default_k() }
    }
}

fn default_k() -> usize {
    speech_eda_core::rank::DEFAULT_K
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProjectionConfig {
    /// t-SNE perplexity; small corpora cap it at `(n - 1) / 3`.
    #[serde(default = "default_perplexity")]
    pub perplexity: f64,
    #[serde(default = "default_tsne_iterations")]
    pub tsne_iterations: usize,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            perplexity: default_perplexity(),
            tsne_iterations: default_tsne_iterations(),
        }
    }
}

impl ProjectionConfig {
    pub fn tsne_params(&self) -> TsneParams {
        TsneParams {
            perplexity: self.perplexity,
            iterations: self.tsne_iterations,
        }
    }
}

fn default_perplexity() -> f64 {
    speech_eda_core::tsne::DEFAULT_PERPLEXITY
}
fn default_tsne_iterations() -> usize {
    speech_eda_core::tsne::DEFAULT_ITERATIONS
}

impl Config {
    /// All-defaults configuration, used when no config file exists.
    pub fn minimal() -> Self {
        Self::default()
    }
}

/// Parse and validate a config file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Load `path` if it exists, otherwise fall back to [`Config::minimal`].
pub fn load_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        Ok(Config::minimal())
    }
}

fn validate(config: &Config) -> Result<()> {
    if config.records.include_globs.is_empty() {
        anyhow::bail!("records.include_globs must not be empty");
    }

    if config.embedding.max_batch_items == 0 {
        anyhow::bail!("embedding.max_batch_items must be > 0");
    }
    if config.embedding.max_input_chars == 0 {
        anyhow::bail!("embedding.max_input_chars must be > 0");
    }
    if config.embedding.timeout_secs == 0 {
        anyhow::bail!("embedding.timeout_secs must be > 0");
    }

    if config.tfidf.max_features == 0 {
        anyhow::bail!("tfidf.max_features must be > 0");
    }

    if config.neighbors.k == 0 {
        anyhow::bail!("neighbors.k must be >= 1");
    }

    if !config.projection.perplexity.is_finite() || config.projection.perplexity < 1.0 {
        anyhow::bail!("projection.perplexity must be >= 1");
    }
    if config.projection.tsne_iterations == 0 {
        anyhow::bail!("projection.tsne_iterations must be > 0");
    }

    Ok(())
}
