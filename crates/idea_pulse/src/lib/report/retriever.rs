use std::{
    cmp::Ordering,
    fmt::{Debug, Display},
    future::Future,
};

use crate::{pipeline::Classify, Embedder};

/// Maximum chunk length, in characters, of indexed reference text
pub const CHUNK_SIZE: usize = 1000;

/// Number of chunks handed to the model per section
pub const DEFAULT_TOP_K: usize = 4;

/// Chunks sent to the embedder per request
const EMBED_BATCH_SIZE: usize = 64;

pub trait Retriever {
    type Error: Classify + Debug + Display + Send;

    /// Returns up to `k` reference passages relevant to `query`, best first
    fn retrieve(
        &self,
        query: &str,
        k: usize,
    ) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send;
}

#[derive(Debug, Clone)]
struct IndexedChunk {
    text: String,
    embedding: Vec<f32>,
}

/// In-memory vector index over reference documents
#[derive(Debug)]
pub struct EmbeddingIndex<E> {
    embedder: E,
    chunks: Vec<IndexedChunk>,
}

impl<E> EmbeddingIndex<E>
where
    E: Embedder + Send + Sync,
{
    /// An index without reference material; retrieval always comes back empty
    pub fn empty(embedder: E) -> Self {
        Self {
            embedder,
            chunks: Vec::new(),
        }
    }

    #[tracing::instrument(skip_all, fields(documents = documents.len()))]
    pub async fn build(embedder: E, documents: &[String]) -> Result<Self, E::Error> {
        let texts = documents
            .iter()
            .flat_map(|doc| split_text(doc, CHUNK_SIZE))
            .collect::<Vec<_>>();

        let mut chunks = Vec::with_capacity(texts.len());
        for batch in texts.chunks(EMBED_BATCH_SIZE) {
            let embeddings = embedder
                .embed(batch)
                .await
                .inspect_err(|e| tracing::error!(error = %e, "Failed to embed reference chunks"))?;

            chunks.extend(
                batch
                    .iter()
                    .cloned()
                    .zip(embeddings)
                    .map(|(text, embedding)| IndexedChunk { text, embedding }),
            );
        }

        tracing::info!(chunks = chunks.len(), "Built reference index");
        Ok(Self { embedder, chunks })
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

impl<E> Retriever for EmbeddingIndex<E>
where
    E: Embedder + Send + Sync,
{
    type Error = E::Error;

    #[tracing::instrument(skip(self))]
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<String>, Self::Error> {
        if self.chunks.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let query_embedding = self
            .embedder
            .embed(&[query.to_string()])
            .await?
            .into_iter()
            .next()
            .unwrap_or_default();

        let mut scored = self
            .chunks
            .iter()
            .map(|chunk| (cosine_similarity(&query_embedding, &chunk.embedding), chunk))
            .collect::<Vec<_>>();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(_, chunk)| chunk.text.clone())
            .collect())
    }
}

/// Splits `text` on blank lines and packs the pieces into chunks of at most
/// `chunk_size` characters. A single piece longer than that is kept whole.
pub fn split_text(text: &str, chunk_size: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for piece in text.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
        let separator_len = if current.is_empty() { 0 } else { 2 };
        let fits = current.chars().count() + separator_len + piece.chars().count() <= chunk_size;

        if !fits && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push_str("\n\n");
        }
        current.push_str(piece);
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

/// Cosine similarity; 0 when either vector has no magnitude
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot = a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
