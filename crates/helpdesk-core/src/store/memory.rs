//! In-memory store implementations for tests and embedding in other hosts.
//!
//! Everything lives behind `std::sync::RwLock`. Vector search is a
//! brute-force cosine scan.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::models::{FaqEntry, NewFaqEntry, QuestionCount, QuestionLogEntry};

use super::{ChunkCandidate, ChunkRecord, DocumentCatalog, FaqStore, QuestionLog, VectorStore};

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>> {
    lock.read().map_err(|_| anyhow!("in-memory store lock poisoned"))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>> {
    lock.write().map_err(|_| anyhow!("in-memory store lock poisoned"))
}

fn now_ts() -> i64 {
    chrono::Utc::now().timestamp()
}

#[derive(Default)]
pub struct InMemoryVectorStore {
    records: RwLock<Vec<ChunkRecord>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn upsert(&self, records: &[ChunkRecord]) -> Result<()> {
        let mut stored = write(&self.records)?;
        for r in records {
            stored.retain(|s| s.chunk.id != r.chunk.id);
            stored.push(r.clone());
        }
        Ok(())
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ChunkCandidate>> {
        let stored = read(&self.records)?;
        let mut candidates: Vec<ChunkCandidate> = stored
            .iter()
            .map(|r| ChunkCandidate {
                chunk_id: r.chunk.id.clone(),
                document_id: r.chunk.document_id.clone(),
                text: r.chunk.text.clone(),
                embedding: r.embedding.clone(),
                score: cosine_similarity(vector, &r.embedding),
            })
            .collect();
        candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
        candidates.truncate(k);
        Ok(candidates)
    }

    async fn delete_document(&self, document_id: &str) -> Result<usize> {
        let mut stored = write(&self.records)?;
        let before = stored.len();
        stored.retain(|r| r.chunk.document_id != document_id);
        Ok(before - stored.len())
    }

    async fn replace_document(
        &self,
        document_id: &str,
        records: &[ChunkRecord],
    ) -> Result<usize> {
        let mut stored = write(&self.records)?;
        stored.retain(|r| r.chunk.document_id != document_id);
        stored.extend(records.iter().cloned());
        Ok(records.len())
    }

    async fn count(&self) -> Result<usize> {
        Ok(read(&self.records)?.len())
    }
}

#[derive(Default)]
pub struct InMemoryFaqStore {
    entries: RwLock<Vec<FaqEntry>>,
}

impl InMemoryFaqStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FaqStore for InMemoryFaqStore {
    async fn all(&self) -> Result<Vec<FaqEntry>> {
        Ok(read(&self.entries)?.clone())
    }

    async fn find_by_question(&self, question: &str) -> Result<Option<FaqEntry>> {
        Ok(read(&self.entries)?
            .iter()
            .find(|e| e.question == question)
            .cloned())
    }

    async fn insert(&self, entry: &NewFaqEntry) -> Result<bool> {
        let mut entries = write(&self.entries)?;
        if entries.iter().any(|e| e.question == entry.question) {
            return Ok(false);
        }
        let id = entries.iter().map(|e| e.id).max().unwrap_or(0) + 1;
        let now = now_ts();
        entries.push(FaqEntry {
            id,
            question: entry.question.clone(),
            answer: entry.answer.clone(),
            embedding: entry.embedding.clone(),
            hits: 1,
            created_at: now,
            last_used_at: now,
        });
        Ok(true)
    }

    async fn record_hit(&self, id: i64) -> Result<()> {
        let mut entries = write(&self.entries)?;
        let entry = entries
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| anyhow!("FAQ entry {} not found", id))?;
        entry.hits += 1;
        entry.last_used_at = now_ts();
        Ok(())
    }

    async fn top(&self, limit: usize) -> Result<Vec<FaqEntry>> {
        let mut entries = read(&self.entries)?.clone();
        entries.sort_by(|a, b| b.hits.cmp(&a.hits).then(a.id.cmp(&b.id)));
        entries.truncate(limit);
        Ok(entries)
    }
}

#[derive(Default)]
pub struct InMemoryQuestionLog {
    rows: RwLock<Vec<QuestionLogEntry>>,
}

impl InMemoryQuestionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// All rows in append order.
    pub fn entries(&self) -> Result<Vec<QuestionLogEntry>> {
        Ok(read(&self.rows)?.clone())
    }
}

#[async_trait]
impl QuestionLog for InMemoryQuestionLog {
    async fn append(&self, entry: &QuestionLogEntry) -> Result<()> {
        write(&self.rows)?.push(entry.clone());
        Ok(())
    }

    async fn count_exact(&self, question: &str) -> Result<usize> {
        Ok(read(&self.rows)?
            .iter()
            .filter(|r| r.question == question)
            .count())
    }

    async fn popular(&self, limit: usize) -> Result<Vec<QuestionCount>> {
        let rows = read(&self.rows)?;
        let mut counts: HashMap<&str, i64> = HashMap::new();
        for r in rows.iter() {
            *counts.entry(r.question.as_str()).or_default() += 1;
        }
        let mut popular: Vec<QuestionCount> = counts
            .into_iter()
            .map(|(q, count)| QuestionCount {
                question: q.to_string(),
                count,
            })
            .collect();
        popular.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.question.cmp(&b.question)));
        popular.truncate(limit);
        Ok(popular)
    }
}

/// Fixed list of document titles.
#[derive(Default)]
pub struct InMemoryCatalog {
    titles: RwLock<Vec<String>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_titles<I, S>(titles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            titles: RwLock::new(titles.into_iter().map(Into::into).collect()),
        }
    }
}

#[async_trait]
impl DocumentCatalog for InMemoryCatalog {
    async fn list_titles(&self) -> Result<Vec<String>> {
        Ok(read(&self.titles)?.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{chunk_id, Chunk, Intent, Route};

    fn record(doc: &str, idx: i64, text: &str, embedding: Vec<f32>) -> ChunkRecord {
        ChunkRecord {
            chunk: Chunk {
                id: chunk_id(doc, idx),
                document_id: doc.to_string(),
                chunk_index: idx,
                text: text.to_string(),
                hash: String::new(),
            },
            title: format!("doc {doc}"),
            embedding,
        }
    }

    fn log_entry(q: &str) -> QuestionLogEntry {
        QuestionLogEntry {
            question: q.to_string(),
            intent: Intent::Dorm,
            route: Route::Rag,
            confidence: 0.9,
            request_id: "req".to_string(),
        }
    }

    #[tokio::test]
    async fn test_vector_upsert_replaces_by_id() {
        let store = InMemoryVectorStore::new();
        store.upsert(&[record("1", 0, "old", vec![1.0, 0.0])]).await.unwrap();
        store.upsert(&[record("1", 0, "new", vec![1.0, 0.0])]).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
        let hits = store.query(&[1.0, 0.0], 5).await.unwrap();
        assert_eq!(hits[0].text, "new");
    }

    #[tokio::test]
    async fn test_replace_document_swaps_only_that_document() {
        let store = InMemoryVectorStore::new();
        store
            .upsert(&[
                record("1", 0, "a", vec![1.0, 0.0]),
                record("1", 1, "b", vec![1.0, 0.0]),
                record("2", 0, "c", vec![0.0, 1.0]),
            ])
            .await
            .unwrap();

        let n = store
            .replace_document("1", &[record("1", 0, "a2", vec![1.0, 0.0])])
            .await
            .unwrap();
        assert_eq!(n, 1);
        assert_eq!(store.count().await.unwrap(), 2);
        let texts: Vec<String> = store
            .query(&[1.0, 0.0], 5)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.text)
            .collect();
        assert_eq!(texts, vec!["a2", "c"]);
    }

    #[tokio::test]
    async fn test_vector_query_orders_and_deletes_by_document() {
        let store = InMemoryVectorStore::new();
        store
            .upsert(&[
                record("1", 0, "far", vec![0.0, 1.0]),
                record("1", 1, "near", vec![1.0, 0.1]),
                record("2", 0, "other", vec![1.0, 0.5]),
            ])
            .await
            .unwrap();
        let hits = store.query(&[1.0, 0.0], 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].text, "near");
        assert_eq!(store.delete_document("1").await.unwrap(), 2);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_faq_insert_is_unique_and_hits_increment() {
        let faqs = InMemoryFaqStore::new();
        let entry = NewFaqEntry {
            question: "ค่าหอพักเท่าไร".to_string(),
            answer: "5,000 บาท".to_string(),
            embedding: vec![1.0],
        };
        assert!(faqs.insert(&entry).await.unwrap());
        assert!(!faqs.insert(&entry).await.unwrap());

        let stored = faqs.find_by_question("ค่าหอพักเท่าไร").await.unwrap().unwrap();
        assert_eq!(stored.hits, 1);
        faqs.record_hit(stored.id).await.unwrap();
        assert_eq!(faqs.top(1).await.unwrap()[0].hits, 2);
        assert!(faqs.record_hit(999).await.is_err());
    }

    #[tokio::test]
    async fn test_question_log_counts() {
        let log = InMemoryQuestionLog::new();
        for q in ["a", "b", "a", "c", "a", "b"] {
            log.append(&log_entry(q)).await.unwrap();
        }
        assert_eq!(log.count_exact("a").await.unwrap(), 3);
        assert_eq!(log.count_exact("z").await.unwrap(), 0);
        let popular = log.popular(2).await.unwrap();
        assert_eq!(popular[0].question, "a");
        assert_eq!(popular[0].count, 3);
        assert_eq!(popular[1].question, "b");
    }
}
