//! Persistence seams for the pipeline.
//!
//! Four narrow traits instead of one wide store: the orchestrator only
//! needs vector search, the FAQ table, the question log and document
//! titles, and each of those can be backed independently. The in-memory
//! implementations in [`memory`] back the unit tests; the application
//! crate provides SQLite implementations of all four.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Chunk, FaqEntry, NewFaqEntry, QuestionCount, QuestionLogEntry};

/// A chunk ready for indexing, with its vector and parent title.
#[derive(Debug, Clone)]
pub struct ChunkRecord {
    pub chunk: Chunk,
    pub title: String,
    pub embedding: Vec<f32>,
}

/// A nearest-neighbour hit from [`VectorStore::query`].
///
/// Carries the stored full-precision vector so the retriever can rerank
/// without embedding the text again.
#[derive(Debug, Clone)]
pub struct ChunkCandidate {
    pub chunk_id: String,
    pub document_id: String,
    pub text: String,
    pub embedding: Vec<f32>,
    /// Backend similarity (may be approximate).
    pub score: f32,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or replace chunks by id.
    async fn upsert(&self, records: &[ChunkRecord]) -> Result<()>;

    /// Up to `k` candidates ordered best-first.
    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ChunkCandidate>>;

    /// Remove every chunk of a document; returns how many were removed.
    async fn delete_document(&self, document_id: &str) -> Result<usize>;

    /// Swap a document's chunks for `records` in one step. Readers see
    /// either the old set or the new one.
    async fn replace_document(&self, document_id: &str, records: &[ChunkRecord])
        -> Result<usize>;

    async fn count(&self) -> Result<usize>;
}

#[async_trait]
pub trait FaqStore: Send + Sync {
    async fn all(&self) -> Result<Vec<FaqEntry>>;

    async fn find_by_question(&self, question: &str) -> Result<Option<FaqEntry>>;

    /// Insert with hit count 1. Returns `false` if the question already exists.
    async fn insert(&self, entry: &NewFaqEntry) -> Result<bool>;

    /// Increment the hit count and touch `last_used_at`.
    async fn record_hit(&self, id: i64) -> Result<()>;

    /// Entries ordered by hits, most used first.
    async fn top(&self, limit: usize) -> Result<Vec<FaqEntry>>;
}

/// Append-only record of every routed question.
#[async_trait]
pub trait QuestionLog: Send + Sync {
    async fn append(&self, entry: &QuestionLogEntry) -> Result<()>;

    /// Number of logged rows whose text equals `question` exactly.
    async fn count_exact(&self, question: &str) -> Result<usize>;

    /// Distinct questions ordered by count, most asked first.
    async fn popular(&self, limit: usize) -> Result<Vec<QuestionCount>>;
}

#[async_trait]
pub trait DocumentCatalog: Send + Sync {
    /// Titles of all documents, in creation order.
    async fn list_titles(&self) -> Result<Vec<String>>;
}
