use anyhow::{bail, Result};
use std::collections::BTreeMap;
use std::path::Path;

use speech_eda_core::aggregate::aggregate_by_document;
use speech_eda_core::models::{EmbeddingKind, ParagraphEmbedding, ParagraphRow, TextEmbedding};
use speech_eda_core::tfidf::TfidfVectorizer;

use crate::config::Config;
use crate::embedding::{self, EmbeddingClient, OpenAIClient};
use crate::progress::{EmbedProgressEvent, EmbedProgressReporter};
use crate::store::{TableDir, PARAGRAPH_TABLE};

/// Paragraph and document embeddings for one kind, plus the documents
/// that could not be embedded.
#[derive(Debug, Default)]
pub struct EmbedOutcome {
    pub paragraphs: Vec<ParagraphEmbedding>,
    pub texts: Vec<TextEmbedding>,
    pub failed: Vec<(u32, String)>,
}

/// Build `<kind>.paragraph.jsonl` and `<kind>.text.jsonl` from the
/// paragraph table in `dir`.
///
/// Successful documents are always written. If any document failed, the
/// command returns an error listing their `text_id`s afterwards.
pub async fn run_embed(
    config: &Config,
    dir: &Path,
    kind: EmbeddingKind,
    reporter: &dyn EmbedProgressReporter,
) -> Result<()> {
    let tables = TableDir::new(dir);
    let paragraphs: Vec<ParagraphRow> = tables.read(PARAGRAPH_TABLE)?;

    let outcome = match kind {
        EmbeddingKind::Tfidf => embed_lexical(config, &paragraphs)?,
        EmbeddingKind::OpenAiAda002 | EmbeddingKind::OpenAi3Small => {
            let client = OpenAIClient::new(kind, &config.embedding)?;
            tracing::info!(model = client.model_name(), "embedding paragraphs");
            embed_neural(&client, config, kind, &paragraphs, reporter).await
        }
    };

    tables.write(&kind.paragraph_table(), &outcome.paragraphs)?;
    tables.write(&kind.text_table(), &outcome.texts)?;

    println!("embed {}", kind);
    println!("  paragraphs: {}", outcome.paragraphs.len());
    println!("  documents: {}", outcome.texts.len());
    println!("  failed: {}", outcome.failed.len());

    if !outcome.failed.is_empty() {
        let ids: Vec<String> = outcome
            .failed
            .iter()
            .map(|(id, _)| id.to_string())
            .collect();
        bail!(
            "{} document(s) failed to embed: {}",
            outcome.failed.len(),
            ids.join(", ")
        );
    }

    Ok(())
}

/// Fit TF-IDF over every paragraph in the corpus, then aggregate per
/// document.
pub fn embed_lexical(config: &Config, paragraphs: &[ParagraphRow]) -> Result<EmbedOutcome> {
    let mut vectorizer = TfidfVectorizer::new(config.tfidf.max_features);
    let corpus: Vec<&str> = paragraphs
        .iter()
        .map(|p| p.paragraph_text.as_str())
        .collect();
    let vectors = vectorizer.fit_transform(&corpus)?;
    tracing::info!(
        vocabulary = vectorizer.vocabulary().len(),
        paragraphs = paragraphs.len(),
        "fitted tf-idf"
    );

    let rows = paragraphs
        .iter()
        .zip(vectors)
        .map(|(p, embedding)| to_embedding_row(p, embedding))
        .collect();

    Ok(aggregate_documents(rows, Vec::new()))
}

/// Embed each document's paragraphs through `client`, one document at a
/// time. A document whose request fails is recorded and skipped.
pub async fn embed_neural(
    client: &dyn EmbeddingClient,
    config: &Config,
    kind: EmbeddingKind,
    paragraphs: &[ParagraphRow],
    reporter: &dyn EmbedProgressReporter,
) -> EmbedOutcome {
    let mut documents: BTreeMap<u32, Vec<&ParagraphRow>> = BTreeMap::new();
    for p in paragraphs {
        documents.entry(p.text_id).or_default().push(p);
    }
    for group in documents.values_mut() {
        group.sort_by_key(|p| p.paragraph_id);
    }

    let total = documents.len() as u64;
    reporter.report(EmbedProgressEvent::Started {
        kind: kind.to_string(),
        total,
    });

    let mut rows = Vec::with_capacity(paragraphs.len());
    let mut failed = Vec::new();

    for (n, (text_id, group)) in documents.into_iter().enumerate() {
        let ok = match embedding::embed_document(client, &config.embedding, &group).await {
            Ok(vectors) => {
                rows.extend(
                    group
                        .iter()
                        .zip(vectors)
                        .map(|(p, embedding)| to_embedding_row(p, embedding)),
                );
                true
            }
            Err(e) => {
                tracing::warn!(text_id, error = %e, "document embedding failed");
                failed.push((text_id, e.to_string()));
                false
            }
        };

        reporter.report(EmbedProgressEvent::Document {
            kind: kind.to_string(),
            text_id,
            n: n as u64 + 1,
            total,
            ok,
        });
    }

    aggregate_documents(rows, failed)
}

fn to_embedding_row(p: &ParagraphRow, embedding: Vec<f32>) -> ParagraphEmbedding {
    ParagraphEmbedding {
        text_id: p.text_id,
        paragraph_id: p.paragraph_id,
        paragraph_length: p.paragraph_length,
        embedding,
    }
}

/// Aggregate paragraph rows into document rows. Documents that cannot be
/// aggregated join `failed` and their paragraph rows are still kept.
fn aggregate_documents(
    paragraphs: Vec<ParagraphEmbedding>,
    mut failed: Vec<(u32, String)>,
) -> EmbedOutcome {
    let mut texts = Vec::new();
    for (text_id, result) in aggregate_by_document(&paragraphs) {
        match result {
            Ok(t) => texts.push(t),
            Err(e) => {
                tracing::warn!(text_id, error = %e, "document aggregation failed");
                failed.push((text_id, e.to_string()));
            }
        }
    }
    failed.sort_by_key(|(id, _)| *id);

    EmbedOutcome {
        paragraphs,
        texts,
        failed,
    }
}
