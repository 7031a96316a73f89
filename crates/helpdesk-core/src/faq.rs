//! Semantic FAQ cache.
//!
//! Questions answered often enough are stored with their answer and
//! question embedding. A new question whose embedding is close enough to
//! a stored one is answered from the cache without retrieval or
//! generation.

use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info};

use crate::embedding::{cosine_similarity, Embedder};
use crate::models::{FaqEntry, NewFaqEntry};
use crate::sentinel;
use crate::settings::FaqParams;
use crate::store::FaqStore;

/// A cache hit together with its similarity score.
#[derive(Debug, Clone)]
pub struct FaqMatch {
    pub entry: FaqEntry,
    pub score: f32,
}

pub struct FaqCache {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn FaqStore>,
    params: FaqParams,
}

impl FaqCache {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn FaqStore>, params: FaqParams) -> Self {
        Self {
            embedder,
            store,
            params,
        }
    }

    /// Most similar entry scoring at least `threshold`, if any.
    ///
    /// Scans every entry. Entries without a stored embedding are skipped;
    /// ties keep the earliest entry.
    pub async fn find_best(&self, question: &str) -> Result<Option<FaqMatch>> {
        let entries = self.store.all().await?;
        if entries.is_empty() {
            return Ok(None);
        }

        let query = self.embedder.embed_one(question).await?;
        let mut best: Option<FaqMatch> = None;
        let mut best_score = 0.0f32;
        for entry in entries {
            if entry.embedding.is_empty() {
                continue;
            }
            let score = cosine_similarity(&query, &entry.embedding);
            if score > best_score {
                best_score = score;
                best = Some(FaqMatch { entry, score });
            }
        }

        Ok(best.filter(|m| {
            debug!(faq_id = m.entry.id, score = m.score, "best FAQ candidate");
            m.score >= self.params.threshold
        }))
    }

    /// Store a question/answer pair. Returns `true` when a row was inserted.
    ///
    /// Skipped for short questions, not-found or failure answers, and
    /// questions already cached.
    pub async fn register(&self, question: &str, answer: &str) -> Result<bool> {
        if question.chars().count() < self.params.min_question_chars {
            return Ok(false);
        }
        if sentinel::is_sentinel(answer) {
            return Ok(false);
        }
        if self.store.find_by_question(question).await?.is_some() {
            return Ok(false);
        }

        let embedding = self.embedder.embed_one(question).await?;
        let inserted = self
            .store
            .insert(&NewFaqEntry {
                question: question.to_string(),
                answer: answer.to_string(),
                embedding,
            })
            .await?;
        if inserted {
            info!(question, "FAQ entry created");
        }
        Ok(inserted)
    }

    /// Record that an entry answered a question.
    pub async fn update_hit(&self, entry: &FaqEntry) -> Result<()> {
        self.store.record_hit(entry.id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::TableEmbedder;
    use crate::store::memory::InMemoryFaqStore;

    const STORED: &str = "ค่าหอพักต่อเทอมเท่าไหร่";

    /// Unit vector at the given cosine from `[1, 0]`.
    fn at_cosine(c: f32) -> Vec<f32> {
        vec![c, (1.0 - c * c).sqrt()]
    }

    async fn cache_with_entry(query: &str, query_vec: Vec<f32>) -> (FaqCache, Arc<InMemoryFaqStore>) {
        let embedder = Arc::new(
            TableEmbedder::new(vec![0.0, 1.0])
                .with(STORED, vec![1.0, 0.0])
                .with(query, query_vec),
        );
        let store = Arc::new(InMemoryFaqStore::new());
        let cache = FaqCache::new(embedder, store.clone(), FaqParams::default());
        assert!(cache.register(STORED, "4,500 บาทต่อภาคการศึกษา").await.unwrap());
        (cache, store)
    }

    #[tokio::test]
    async fn test_below_threshold_is_miss() {
        let q = "หอพักราคาเท่าไร";
        let (cache, _) = cache_with_entry(q, at_cosine(0.84)).await;
        assert!(cache.find_best(q).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_at_or_above_threshold_is_hit() {
        let q = "หอพักราคาเท่าไร";
        let (cache, _) = cache_with_entry(q, at_cosine(0.86)).await;
        let hit = cache.find_best(q).await.unwrap().unwrap();
        assert_eq!(hit.entry.question, STORED);

        let exact = cache.find_best(STORED).await.unwrap().unwrap();
        assert!((exact.score - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_score_exactly_at_threshold_is_hit() {
        // 17/20 with every intermediate exact in f32: |q|² = 289 + 111 = 400.
        let q = "หอพักราคาเท่าไร";
        let embedder = Arc::new(
            TableEmbedder::new(vec![0.0, 0.0, 0.0, 0.0, 1.0])
                .with(STORED, vec![1.0, 0.0, 0.0, 0.0, 0.0])
                .with(q, vec![17.0, 7.0, 6.0, 5.0, 1.0]),
        );
        let store = Arc::new(InMemoryFaqStore::new());
        let params = FaqParams::default();
        assert_eq!(params.threshold, 0.85);
        let cache = FaqCache::new(embedder, store, params);
        assert!(cache.register(STORED, "4,500 บาทต่อภาคการศึกษา").await.unwrap());

        let hit = cache.find_best(q).await.unwrap().unwrap();
        assert_eq!(hit.score, 0.85);
        assert_eq!(hit.entry.question, STORED);
    }

    #[tokio::test]
    async fn test_empty_cache_skips_embedding() {
        let embedder = Arc::new(TableEmbedder::new(vec![1.0]));
        let cache = FaqCache::new(
            embedder.clone(),
            Arc::new(InMemoryFaqStore::new()),
            FaqParams::default(),
        );
        assert!(cache.find_best("anything at all").await.unwrap().is_none());
        assert_eq!(embedder.calls(), 0);
    }

    #[tokio::test]
    async fn test_register_filters() {
        let (cache, store) = cache_with_entry("unused", vec![1.0, 0.0]).await;
        assert!(!cache.register("สั้นไป", "คำตอบ").await.unwrap());
        assert!(!cache
            .register("ทุนการศึกษามีอะไรบ้าง", sentinel::NOT_FOUND)
            .await
            .unwrap());
        assert!(!cache
            .register("ทุนการศึกษามีอะไรบ้าง", sentinel::GENERATION_FAILED)
            .await
            .unwrap());
        assert!(!cache.register(STORED, "อีกคำตอบ").await.unwrap());
        assert_eq!(store.all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_hit_increments() {
        let (cache, store) = cache_with_entry("unused", vec![1.0, 0.0]).await;
        let entry = store.find_by_question(STORED).await.unwrap().unwrap();
        assert_eq!(entry.hits, 1);
        cache.update_hit(&entry).await.unwrap();
        cache.update_hit(&entry).await.unwrap();
        let entry = store.find_by_question(STORED).await.unwrap().unwrap();
        assert_eq!(entry.hits, 3);
    }
}
