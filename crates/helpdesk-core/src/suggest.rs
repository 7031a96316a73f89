//! Next-question suggestions drawn from what other students asked.

use std::sync::Arc;

use anyhow::{bail, Result};

use crate::embedding::{cosine_similarity, Embedder};
use crate::settings::SuggestParams;
use crate::store::QuestionLog;

pub struct TopicSuggester {
    embedder: Arc<dyn Embedder>,
    log: Arc<dyn QuestionLog>,
    params: SuggestParams,
}

impl TopicSuggester {
    pub fn new(embedder: Arc<dyn Embedder>, log: Arc<dyn QuestionLog>, params: SuggestParams) -> Self {
        Self {
            embedder,
            log,
            params,
        }
    }

    /// Suggest with the configured limit.
    pub async fn suggest(&self, question: &str) -> Result<Vec<String>> {
        self.suggest_n(question, self.params.limit).await
    }

    /// Up to `limit` popular logged questions most similar to `question`,
    /// excluding the question itself.
    pub async fn suggest_n(&self, question: &str, limit: usize) -> Result<Vec<String>> {
        let question = question.trim();
        if question.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let pool: Vec<String> = self
            .log
            .popular(self.params.pool_size)
            .await?
            .into_iter()
            .map(|q| q.question.trim().to_string())
            .filter(|q| !q.is_empty())
            .collect();
        if pool.is_empty() {
            return Ok(Vec::new());
        }

        let query = self.embedder.embed_one(question).await?;
        let vectors = self.embedder.embed(&pool).await?;
        if vectors.len() != pool.len() {
            bail!(
                "embedder returned {} vectors for {} questions",
                vectors.len(),
                pool.len()
            );
        }

        let mut scored: Vec<(f32, String)> = vectors
            .iter()
            .map(|v| cosine_similarity(&query, v))
            .zip(pool)
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));

        let mut out: Vec<String> = Vec::with_capacity(limit);
        for (_, text) in scored {
            if text == question || out.contains(&text) {
                continue;
            }
            out.push(text);
            if out.len() >= limit {
                break;
            }
        }
        Ok(out)
    }
}
