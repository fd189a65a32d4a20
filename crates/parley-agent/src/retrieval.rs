//! Embedding retrieval.
//!
//! Scores a document corpus against the user's query by cosine similarity,
//! keeps the documents at or above a threshold, and formats the best `top_k`
//! as a numbered citation block. The block becomes a single-turn
//! RetrievedKnowledge packet.

use std::fmt::Write as _;

use async_trait::async_trait;
use parley_context::ContextPacket;
use parley_settings::PacketPolicy;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{AgentError, Result};

/// Source tag on retrieval packets.
pub const RETRIEVER_SOURCE: &str = "retriever";

/// Instructions placed above the numbered sources.
pub const CITATION_HEADER: &str = "You are answering using the sources below.\n\
Cite facts using bracketed numbers like [1], [2].\n\
If the sources do not contain the answer, say so.\n\n\
SOURCES:\n";

/// A retrievable document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Text that is embedded and cited.
    pub content: String,
}

impl Document {
    /// Wrap a piece of text.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

/// Text embedding backend.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed every text, returning one vector per input in the same order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Cosine similarity. Zero-length or zero-norm inputs score `0.0`; extra
/// dimensions on the longer vector are ignored.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Keep documents scoring at least `threshold`, best first, at most `top_k`.
///
/// Ties keep corpus order.
pub fn select_top<'a>(
    documents: &'a [Document],
    scores: &[f32],
    top_k: usize,
    threshold: f32,
) -> Vec<(f32, &'a Document)> {
    let mut scored: Vec<(f32, &Document)> = scores
        .iter()
        .copied()
        .zip(documents)
        .filter(|(score, _)| *score >= threshold)
        .collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored.truncate(top_k);
    scored
}

/// Render scored documents as a numbered citation block.
pub fn format_citations(scored: &[(f32, &Document)]) -> String {
    let mut context = CITATION_HEADER.to_owned();
    for (i, (score, doc)) in scored.iter().enumerate() {
        let _ = writeln!(context, "[{}] (score: {score:.2}) {}", i + 1, doc.content);
    }
    context
}

/// Build the citation block for `query`, or `None` when nothing is relevant.
pub async fn build_retrieval_context(
    query: &str,
    documents: &[Document],
    embedder: &dyn Embedder,
    top_k: usize,
    threshold: f32,
) -> Result<Option<String>> {
    if documents.is_empty() {
        return Ok(None);
    }

    let query_embedding = embedder
        .embed(&[query.to_owned()])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| AgentError::Embedding("no embedding returned for query".into()))?;

    let texts: Vec<String> = documents.iter().map(|d| d.content.clone()).collect();
    let doc_embeddings = embedder.embed(&texts).await?;
    if doc_embeddings.len() != documents.len() {
        return Err(AgentError::Embedding(format!(
            "expected {} document embeddings, got {}",
            documents.len(),
            doc_embeddings.len()
        )));
    }

    let scores: Vec<f32> = doc_embeddings
        .iter()
        .map(|emb| cosine_similarity(&query_embedding, emb))
        .collect();
    let selected = select_top(documents, &scores, top_k, threshold);
    debug!(
        candidates = documents.len(),
        selected = selected.len(),
        threshold,
        "retrieval scored corpus"
    );

    if selected.is_empty() {
        return Ok(None);
    }
    Ok(Some(format_citations(&selected)))
}

/// Wrap a citation block as a RetrievedKnowledge packet.
#[must_use]
pub fn to_packet(context: impl Into<String>, policy: PacketPolicy) -> ContextPacket {
    ContextPacket::retrieved_knowledge(context, RETRIEVER_SOURCE, policy.ttl)
        .with_priority(policy.priority)
}
