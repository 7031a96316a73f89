//! Document management and indexing.
//!
//! Every create or update chunks and embeds the body first, then writes
//! the `documents` row and a `document_revisions` row in one short
//! transaction, then replaces the document's vectors as a set. No write
//! lock is held while the embedder is called, and a failing embedder
//! leaves the database untouched.

use anyhow::{bail, Context, Result};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use helpdesk_core::chunk::{content_hash, into_chunks, split};
use helpdesk_core::embedding::Embedder;
use helpdesk_core::models::Document;
use helpdesk_core::settings::ChunkParams;
use helpdesk_core::store::{ChunkRecord, VectorStore};

use crate::config::Config;
use crate::db;
use crate::embedding::create_embedder;
use crate::sqlite_store::SqliteStore;

/// A row of `doc list`.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSummary {
    pub id: i64,
    pub title: String,
    pub chunks: i64,
    pub revisions: i64,
    pub updated_at: i64,
}

/// Outcome of a full reindex.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ReindexReport {
    pub documents: usize,
    pub chunks: usize,
    pub failed: Vec<(i64, String)>,
}

/// Chunk texts paired with their vectors, not yet tied to a document id.
type Embedded = Vec<(String, Vec<f32>)>;

pub struct DocumentIndexer {
    pool: SqlitePool,
    vectors: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    params: ChunkParams,
}

fn now_ts() -> i64 {
    chrono::Utc::now().timestamp()
}

impl DocumentIndexer {
    pub fn new(
        pool: SqlitePool,
        vectors: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        params: ChunkParams,
    ) -> Self {
        Self {
            pool,
            vectors,
            embedder,
            params,
        }
    }

    /// Create a document and index it. Returns the new id.
    pub async fn add_document(
        &self,
        title: &str,
        content: &str,
        updated_by: Option<&str>,
    ) -> Result<i64> {
        let title = title.trim();
        if title.is_empty() {
            bail!("Document title must not be empty");
        }
        if content.trim().is_empty() {
            bail!("Document content must not be empty");
        }

        let embedded = self.embed_content(title, content).await?;

        let now = now_ts();
        let mut tx = self.pool.begin().await?;
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO documents (title, content, content_hash, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(title)
        .bind(content)
        .bind(content_hash(content))
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;
        insert_revision(&mut tx, id, content, updated_by, now).await?;
        tx.commit().await?;

        let count = self.replace_vectors(id, title, embedded).await?;
        info!(document_id = id, chunks = count, "document added");
        Ok(id)
    }

    /// Replace a document's content (and optionally its title), then
    /// re-index it.
    pub async fn update_document(
        &self,
        id: i64,
        title: Option<&str>,
        content: &str,
        updated_by: Option<&str>,
    ) -> Result<()> {
        if content.trim().is_empty() {
            bail!("Document content must not be empty");
        }
        let existing = self
            .get_document(id)
            .await?
            .with_context(|| format!("Document {} not found", id))?;
        let title = title
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(existing.title.as_str())
            .to_string();

        let embedded = self.embed_content(&title, content).await?;

        let now = now_ts();
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "UPDATE documents SET title = ?, content = ?, content_hash = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(&title)
        .bind(content)
        .bind(content_hash(content))
        .bind(now)
        .bind(id)
        .execute(&mut *tx)
        .await?;
        insert_revision(&mut tx, id, content, updated_by, now).await?;
        tx.commit().await?;

        let count = self.replace_vectors(id, &title, embedded).await?;
        info!(document_id = id, chunks = count, "document updated");
        Ok(())
    }

    /// Delete a document with its revisions and vectors. Returns `false`
    /// if no such document exists.
    pub async fn delete_document(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Ok(false);
        }
        let removed = self.vectors.delete_document(&id.to_string()).await?;
        info!(document_id = id, vectors = removed, "document deleted");
        Ok(true)
    }

    pub async fn get_document(&self, id: i64) -> Result<Option<Document>> {
        let row = sqlx::query(
            "SELECT id, title, content, created_at, updated_at FROM documents WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| Document {
            id: r.get("id"),
            title: r.get("title"),
            content: r.get("content"),
            created_at: r.get("created_at"),
            updated_at: r.get("updated_at"),
        }))
    }

    pub async fn list_documents(&self) -> Result<Vec<DocumentSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT
                d.id, d.title, d.updated_at,
                (SELECT COUNT(*) FROM chunk_vectors cv
                  WHERE cv.document_id = CAST(d.id AS TEXT)) AS chunks,
                (SELECT COUNT(*) FROM document_revisions r
                  WHERE r.document_id = d.id) AS revisions
            FROM documents d
            ORDER BY d.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .iter()
            .map(|r| DocumentSummary {
                id: r.get("id"),
                title: r.get("title"),
                chunks: r.get("chunks"),
                revisions: r.get("revisions"),
                updated_at: r.get("updated_at"),
            })
            .collect())
    }

    /// Rebuild the vectors of every document. A document that fails to
    /// embed keeps its previous vectors and is reported.
    pub async fn reindex_all(&self) -> Result<ReindexReport> {
        let rows = sqlx::query("SELECT id, title, content FROM documents ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        let mut report = ReindexReport::default();
        for row in &rows {
            let id: i64 = row.get("id");
            let title: String = row.get("title");
            let content: String = row.get("content");

            match self.embed_content(&title, &content).await {
                Ok(embedded) => {
                    report.chunks += self.replace_vectors(id, &title, embedded).await?;
                    report.documents += 1;
                }
                Err(e) => {
                    warn!(document_id = id, error = %e, "reindex failed");
                    report.failed.push((id, format!("{:#}", e)));
                }
            }
        }
        Ok(report)
    }

    async fn embed_content(&self, title: &str, content: &str) -> Result<Embedded> {
        let texts = split(content, &self.params);
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let vectors = self
            .embedder
            .embed(&texts)
            .await
            .with_context(|| format!("Failed to embed document '{}'", title))?;
        if vectors.len() != texts.len() {
            bail!(
                "Embedder returned {} vectors for {} chunks",
                vectors.len(),
                texts.len()
            );
        }
        Ok(texts.into_iter().zip(vectors).collect())
    }

    async fn replace_vectors(&self, id: i64, title: &str, embedded: Embedded) -> Result<usize> {
        let doc_id = id.to_string();
        if embedded.is_empty() {
            warn!(document_id = id, "document produced no chunks; vectors cleared");
        }
        let (texts, vectors): (Vec<String>, Vec<Vec<f32>>) = embedded.into_iter().unzip();
        let records: Vec<ChunkRecord> = into_chunks(&doc_id, texts)
            .into_iter()
            .zip(vectors)
            .map(|(chunk, embedding)| ChunkRecord {
                chunk,
                title: title.to_string(),
                embedding,
            })
            .collect();
        self.vectors.replace_document(&doc_id, &records).await
    }
}

async fn insert_revision(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    document_id: i64,
    content: &str,
    updated_by: Option<&str>,
    now: i64,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO document_revisions (document_id, content, updated_by, updated_at)
         VALUES (?, ?, ?, ?)",
    )
    .bind(document_id)
    .bind(content)
    .bind(updated_by)
    .bind(now)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════
// CLI commands
// ═══════════════════════════════════════════════════════════════════════

async fn open_indexer(config: &Config) -> Result<DocumentIndexer> {
    let pool = db::connect(config).await?;
    let embedder = create_embedder(&config.embedding)?;
    let store = SqliteStore::new(pool.clone()).with_model(embedder.model_name());
    Ok(DocumentIndexer::new(
        pool,
        Arc::new(store),
        embedder,
        config.chunk_params(),
    ))
}

/// Read document content from `--file` or `--text`.
pub fn read_content(file: Option<&Path>, text: Option<&str>) -> Result<String> {
    match (file, text) {
        (Some(path), None) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display())),
        (None, Some(text)) => Ok(text.to_string()),
        (Some(_), Some(_)) => bail!("Pass either --file or --text, not both"),
        (None, None) => bail!("Document content required: pass --file or --text"),
    }
}

pub async fn run_add(config: &Config, title: &str, content: &str, by: Option<&str>) -> Result<()> {
    let indexer = open_indexer(config).await?;
    let id = indexer.add_document(title, content, by).await?;
    println!("Added document {} ({})", id, title.trim());
    Ok(())
}

pub async fn run_update(
    config: &Config,
    id: i64,
    title: Option<&str>,
    content: &str,
    by: Option<&str>,
) -> Result<()> {
    let indexer = open_indexer(config).await?;
    indexer.update_document(id, title, content, by).await?;
    println!("Updated document {}", id);
    Ok(())
}

pub async fn run_delete(config: &Config, id: i64) -> Result<()> {
    let indexer = open_indexer(config).await?;
    if !indexer.delete_document(id).await? {
        bail!("Document {} not found", id);
    }
    println!("Deleted document {}", id);
    Ok(())
}

pub async fn run_list(config: &Config) -> Result<()> {
    let indexer = open_indexer(config).await?;
    let docs = indexer.list_documents().await?;
    if docs.is_empty() {
        println!("No documents.");
        return Ok(());
    }

    println!(
        "{:>5}  {:<40} {:>7} {:>5}  UPDATED",
        "ID", "TITLE", "CHUNKS", "REVS"
    );
    println!("{}", "-".repeat(76));
    for d in &docs {
        println!(
            "{:>5}  {:<40} {:>7} {:>5}  {}",
            d.id,
            truncate_title(&d.title, 40),
            d.chunks,
            d.revisions,
            format_ts(d.updated_at)
        );
    }
    Ok(())
}

pub async fn run_show(config: &Config, id: i64) -> Result<()> {
    let indexer = open_indexer(config).await?;
    let doc = indexer
        .get_document(id)
        .await?
        .with_context(|| format!("Document {} not found", id))?;

    println!("id:       {}", doc.id);
    println!("title:    {}", doc.title);
    println!("created:  {}", format_ts(doc.created_at));
    println!("updated:  {}", format_ts(doc.updated_at));
    println!("--- content ---");
    println!("{}", doc.content);
    Ok(())
}

pub async fn run_reindex(config: &Config) -> Result<()> {
    let indexer = open_indexer(config).await?;
    let report = indexer.reindex_all().await?;
    println!(
        "Reindexed {} document(s), {} chunk(s).",
        report.documents, report.chunks
    );
    for (id, err) in &report.failed {
        println!("  document {} failed: {}", id, err);
    }
    if !report.failed.is_empty() {
        bail!("{} document(s) failed to reindex", report.failed.len());
    }
    Ok(())
}

fn truncate_title(title: &str, max: usize) -> String {
    if title.chars().count() <= max {
        title.to_string()
    } else {
        let cut: String = title.chars().take(max - 1).collect();
        format!("{}…", cut)
    }
}

pub(crate) fn format_ts(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}
