//! SQLite implementations of the core store traits.
//!
//! One [`SqliteStore`] wraps the pool and serves as vector store, FAQ
//! table, question log and document catalog. Vector search is a
//! brute-force cosine scan over `chunk_vectors`, which is plenty for a
//! helpdesk-sized corpus.

use anyhow::{bail, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use helpdesk_core::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use helpdesk_core::models::{FaqEntry, NewFaqEntry, QuestionCount, QuestionLogEntry};
use helpdesk_core::store::{
    ChunkCandidate, ChunkRecord, DocumentCatalog, FaqStore, QuestionLog, VectorStore,
};

pub struct SqliteStore {
    pool: SqlitePool,
    model: String,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            model: "unknown".to_string(),
        }
    }

    /// Record `model` as the embedding model on upserted vectors.
    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    async fn write_records(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        records: &[ChunkRecord],
    ) -> Result<()> {
        let now = now_ts();
        for r in records {
            let metadata = serde_json::json!({
                "title": r.title,
                "source": "document",
                "doc_id": r.chunk.document_id,
                "chunk_index": r.chunk.chunk_index,
            });
            sqlx::query(
                r#"
                INSERT INTO chunk_vectors (chunk_id, document_id, chunk_index, text, hash,
                                           metadata_json, embedding, dims, model, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(chunk_id) DO UPDATE SET
                    document_id = excluded.document_id,
                    chunk_index = excluded.chunk_index,
                    text = excluded.text,
                    hash = excluded.hash,
                    metadata_json = excluded.metadata_json,
                    embedding = excluded.embedding,
                    dims = excluded.dims,
                    model = excluded.model,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(&r.chunk.id)
            .bind(&r.chunk.document_id)
            .bind(r.chunk.chunk_index)
            .bind(&r.chunk.text)
            .bind(&r.chunk.hash)
            .bind(metadata.to_string())
            .bind(vec_to_blob(&r.embedding))
            .bind(r.embedding.len() as i64)
            .bind(&self.model)
            .bind(now)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }
}

fn now_ts() -> i64 {
    chrono::Utc::now().timestamp()
}

fn faq_from_row(row: &sqlx::sqlite::SqliteRow) -> FaqEntry {
    let blob: Option<Vec<u8>> = row.get("question_embedding");
    FaqEntry {
        id: row.get("id"),
        question: row.get("question"),
        answer: row.get("answer"),
        embedding: blob.map(|b| blob_to_vec(&b)).unwrap_or_default(),
        hits: row.get("hits"),
        created_at: row.get("created_at"),
        last_used_at: row.get("last_used_at"),
    }
}

#[async_trait]
impl VectorStore for SqliteStore {
    async fn upsert(&self, records: &[ChunkRecord]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        self.write_records(&mut tx, records).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ChunkCandidate>> {
        let rows = sqlx::query("SELECT chunk_id, document_id, text, embedding FROM chunk_vectors")
            .fetch_all(&self.pool)
            .await?;

        let mut candidates: Vec<ChunkCandidate> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let embedding = blob_to_vec(&blob);
                ChunkCandidate {
                    chunk_id: row.get("chunk_id"),
                    document_id: row.get("document_id"),
                    text: row.get("text"),
                    score: cosine_similarity(vector, &embedding),
                    embedding,
                }
            })
            .collect();
        candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
        candidates.truncate(k);
        Ok(candidates)
    }

    async fn delete_document(&self, document_id: &str) -> Result<usize> {
        let result = sqlx::query("DELETE FROM chunk_vectors WHERE document_id = ?")
            .bind(document_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() as usize)
    }

    async fn replace_document(
        &self,
        document_id: &str,
        records: &[ChunkRecord],
    ) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM chunk_vectors WHERE document_id = ?")
            .bind(document_id)
            .execute(&mut *tx)
            .await?;
        self.write_records(&mut tx, records).await?;
        tx.commit().await?;
        Ok(records.len())
    }

    async fn count(&self) -> Result<usize> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunk_vectors")
            .fetch_one(&self.pool)
            .await?;
        Ok(n as usize)
    }
}

#[async_trait]
impl FaqStore for SqliteStore {
    async fn all(&self) -> Result<Vec<FaqEntry>> {
        let rows = sqlx::query(
            "SELECT id, question, answer, question_embedding, hits, created_at, last_used_at
             FROM faq_entries ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(faq_from_row).collect())
    }

    async fn find_by_question(&self, question: &str) -> Result<Option<FaqEntry>> {
        let row = sqlx::query(
            "SELECT id, question, answer, question_embedding, hits, created_at, last_used_at
             FROM faq_entries WHERE question = ?",
        )
        .bind(question)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(faq_from_row))
    }

    async fn insert(&self, entry: &NewFaqEntry) -> Result<bool> {
        let now = now_ts();
        let result = sqlx::query(
            r#"
            INSERT INTO faq_entries (question, answer, question_embedding, hits, created_at, last_used_at)
            VALUES (?, ?, ?, 1, ?, ?)
            ON CONFLICT(question) DO NOTHING
            "#,
        )
        .bind(&entry.question)
        .bind(&entry.answer)
        .bind(vec_to_blob(&entry.embedding))
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn record_hit(&self, id: i64) -> Result<()> {
        let result =
            sqlx::query("UPDATE faq_entries SET hits = hits + 1, last_used_at = ? WHERE id = ?")
                .bind(now_ts())
                .bind(id)
                .execute(&self.pool)
                .await?;
        if result.rows_affected() == 0 {
            bail!("FAQ entry {} not found", id);
        }
        Ok(())
    }

    async fn top(&self, limit: usize) -> Result<Vec<FaqEntry>> {
        let rows = sqlx::query(
            "SELECT id, question, answer, question_embedding, hits, created_at, last_used_at
             FROM faq_entries ORDER BY hits DESC, id ASC LIMIT ?",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(faq_from_row).collect())
    }
}

#[async_trait]
impl QuestionLog for SqliteStore {
    async fn append(&self, entry: &QuestionLogEntry) -> Result<()> {
        sqlx::query(
            "INSERT INTO question_logs (question, intent, route, confidence, request_id, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&entry.question)
        .bind(entry.intent.as_str())
        .bind(entry.route.as_str())
        .bind(entry.confidence)
        .bind(&entry.request_id)
        .bind(now_ts())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn count_exact(&self, question: &str) -> Result<usize> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM question_logs WHERE question = ?")
            .bind(question)
            .fetch_one(&self.pool)
            .await?;
        Ok(n as usize)
    }

    async fn popular(&self, limit: usize) -> Result<Vec<QuestionCount>> {
        let rows = sqlx::query(
            "SELECT question, COUNT(*) AS cnt FROM question_logs
             GROUP BY question ORDER BY cnt DESC, question ASC LIMIT ?",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .iter()
            .map(|row| QuestionCount {
                question: row.get("question"),
                count: row.get("cnt"),
            })
            .collect())
    }
}

#[async_trait]
impl DocumentCatalog for SqliteStore {
    async fn list_titles(&self) -> Result<Vec<String>> {
        let titles: Vec<String> = sqlx::query_scalar("SELECT title FROM documents ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(titles)
    }
}
