//! Neural embedding client abstraction and the OpenAI implementation.
//!
//! The [`EmbeddingClient`] trait is the seam between the pipeline and any
//! remote text-to-vector service. [`OpenAIClient`] calls
//! `POST {base_url}/embeddings`; tests substitute their own clients.
//!
//! # Batching
//!
//! [`embed_document`] sends one document's paragraphs, in paragraph order,
//! as consecutive requests of at most `max_batch_items` inputs, each input
//! truncated to `max_input_chars` characters. Vectors are matched to inputs
//! by the response's `index` field, never by position alone.
//!
//! # Retry Strategy
//!
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use speech_eda_core::models::{EmbeddingKind, ParagraphRow};

use crate::config::EmbeddingConfig;

/// A remote text-to-vector service.
///
/// Implementations must return exactly one vector per input, in input
/// order.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;

    /// Embed one request's worth of inputs.
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>>;
}

// ============ OpenAI Client ============

/// Embedding client for the OpenAI embeddings API.
///
/// Requires the `OPENAI_API_KEY` environment variable.
pub struct OpenAIClient {
    model: String,
    api_key: String,
    base_url: String,
    max_retries: u32,
    http: reqwest::Client,
}

impl OpenAIClient {
    /// Create a client for a remote embedding kind.
    ///
    /// # Errors
    ///
    /// Returns an error for kinds with no remote model (e.g. `tfidf`) or
    /// when `OPENAI_API_KEY` is not set.
    pub fn new(kind: EmbeddingKind, config: &EmbeddingConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;
        Self::with_api_key(kind, config, api_key)
    }

    /// Like [`OpenAIClient::new`] with an explicit key.
    pub fn with_api_key(
        kind: EmbeddingKind,
        config: &EmbeddingConfig,
        api_key: String,
    ) -> Result<Self> {
        let model = kind
            .remote_model()
            .ok_or_else(|| anyhow::anyhow!("{} is not a remote embedding kind", kind))?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model: model.to_string(),
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_retries: config.max_retries,
            http,
        })
    }
}

#[async_trait]
impl EmbeddingClient for OpenAIClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": inputs,
        });
        let url = format!("{}/embeddings", self.base_url);

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s, 8s, ...
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tracing::debug!(attempt, ?delay, "retrying embedding request");
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .http
                .post(&url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let parsed: EmbeddingResponse = response.json().await?;
                        return order_by_index(parsed, inputs.len());
                    }

                    // Rate limited or server error: retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        tracing::warn!(%status, attempt, "embedding request failed, will retry");
                        last_err = Some(anyhow::anyhow!(
                            "OpenAI API error {}: {}",
                            status,
                            body_text
                        ));
                        continue;
                    }

                    // Client error (not 429): no retry
                    let body_text = response.text().await.unwrap_or_default();
                    bail!("OpenAI API error {}: {}", status, body_text);
                }
                Err(e) => {
                    tracing::warn!(error = %e, attempt, "embedding request failed, will retry");
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Embedding failed after retries")))
    }
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    index: usize,
    embedding: Vec<f32>,
}

/// Place each returned vector at its `index`, checking that every input
/// got exactly one vector.
fn order_by_index(resp: EmbeddingResponse, expected: usize) -> Result<Vec<Vec<f32>>> {
    if resp.data.len() != expected {
        bail!(
            "Invalid OpenAI response: {} embeddings for {} inputs",
            resp.data.len(),
            expected
        );
    }

    let mut slots: Vec<Option<Vec<f32>>> = vec![None; expected];
    for datum in resp.data {
        let slot = slots.get_mut(datum.index).ok_or_else(|| {
            anyhow::anyhow!("Invalid OpenAI response: index {} out of range", datum.index)
        })?;
        if slot.is_some() {
            bail!("Invalid OpenAI response: duplicate index {}", datum.index);
        }
        *slot = Some(datum.embedding);
    }

    slots
        .into_iter()
        .enumerate()
        .map(|(i, s)| s.ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing index {}", i)))
        .collect()
}

// ============ Document batching ============

/// Cut `text` to at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// Embed one document's paragraphs, in the order given.
///
/// Returns one vector per paragraph. All vectors must share a dimension.
pub async fn embed_document(
    client: &dyn EmbeddingClient,
    config: &EmbeddingConfig,
    paragraphs: &[&ParagraphRow],
) -> Result<Vec<Vec<f32>>> {
    let inputs: Vec<String> = paragraphs
        .iter()
        .map(|p| truncate_chars(&p.paragraph_text, config.max_input_chars).to_string())
        .collect();

    let mut vectors = Vec::with_capacity(inputs.len());
    for batch in inputs.chunks(config.max_batch_items) {
        let out = client.embed(batch).await?;
        if out.len() != batch.len() {
            bail!(
                "Embedding client returned {} vectors for {} inputs",
                out.len(),
                batch.len()
            );
        }
        vectors.extend(out);
    }

    if let Some(first) = vectors.first() {
        let dims = first.len();
        if let Some(bad) = vectors.iter().find(|v| v.len() != dims) {
            bail!(
                "Embedding client returned mixed dimensions ({} and {})",
                dims,
                bad.len()
            );
        }
    }

    Ok(vectors)
}
