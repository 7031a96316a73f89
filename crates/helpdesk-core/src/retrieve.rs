//! Vector retrieval with exact cosine rerank.
//!
//! The store's nearest-neighbour search may be approximate, so every
//! candidate is rescored against the query using its stored vector
//! before the threshold and the `keep` cut are applied.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::debug;

use crate::embedding::{cosine_similarity, Embedder};
use crate::settings::RetrievalParams;
use crate::store::VectorStore;

/// A chunk that survived reranking.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk {
    pub chunk_id: String,
    pub document_id: String,
    pub text: String,
    pub score: f32,
}

pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    params: RetrievalParams,
}

impl Retriever {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        params: RetrievalParams,
    ) -> Self {
        Self {
            embedder,
            store,
            params,
        }
    }

    pub fn params(&self) -> &RetrievalParams {
        &self.params
    }

    /// Retrieve with the configured `top_k`.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<RetrievedChunk>> {
        self.retrieve_k(query, self.params.top_k).await
    }

    /// Best-first chunks scoring at least `threshold`, at most `keep` of them.
    ///
    /// Empty queries and empty stores return an empty list without
    /// calling the embedder.
    pub async fn retrieve_k(&self, query: &str, k: usize) -> Result<Vec<RetrievedChunk>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let total = self.store.count().await.context("vector store count failed")?;
        if total == 0 {
            return Ok(Vec::new());
        }
        let k = k.min(total);
        if k == 0 {
            return Ok(Vec::new());
        }

        let query_vec = self
            .embedder
            .embed_one(query)
            .await
            .context("failed to embed retrieval query")?;
        let candidates = self
            .store
            .query(&query_vec, k)
            .await
            .context("vector store query failed")?;
        let fetched = candidates.len();

        let mut scored: Vec<RetrievedChunk> = candidates
            .into_iter()
            .map(|c| RetrievedChunk {
                score: cosine_similarity(&query_vec, &c.embedding),
                chunk_id: c.chunk_id,
                document_id: c.document_id,
                text: c.text,
            })
            .filter(|c| c.score >= self.params.threshold)
            .collect();
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(self.params.keep);

        debug!(k, fetched, kept = scored.len(), "retrieval reranked");
        Ok(scored)
    }
}
