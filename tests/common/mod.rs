//! Shared helpers for the SQLite-backed integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use sqlx::SqlitePool;
use tempfile::TempDir;
use tokio::sync::Notify;

use helpdesk_core::embedding::Embedder;
use helpdesk_core::llm::{GenerationOptions, LlmCaller};
use helpdesk_core::{Orchestrator, PipelineSettings, Services};
use uni_helpdesk::documents::DocumentIndexer;
use uni_helpdesk::sqlite_store::SqliteStore;
use uni_helpdesk::{db, migrate};

const KEYWORDS: [&str; 4] = ["dorm", "fee", "library", "exam"];

/// One dimension per keyword plus a small bias, so related texts score
/// close to 1.0 and unrelated ones close to 0.
pub struct KeywordEmbedder;

impl KeywordEmbedder {
    pub fn vector(text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        let mut v: Vec<f32> = KEYWORDS
            .iter()
            .map(|k| if lower.contains(k) { 1.0 } else { 0.0 })
            .collect();
        v.push(0.1);
        v
    }
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    fn model_name(&self) -> &str {
        "keyword-test"
    }

    fn dims(&self) -> usize {
        KEYWORDS.len() + 1
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }
}

pub struct BrokenEmbedder;

#[async_trait]
impl Embedder for BrokenEmbedder {
    fn model_name(&self) -> &str {
        "broken"
    }

    fn dims(&self) -> usize {
        0
    }

    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        bail!("embedding service unreachable")
    }
}

/// [`KeywordEmbedder`] behind a delay. Signals `started` on entry and
/// sets `finished` just before returning.
pub struct SlowEmbedder {
    pub delay: Duration,
    pub started: Notify,
    pub finished: AtomicBool,
}

impl SlowEmbedder {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            started: Notify::new(),
            finished: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl Embedder for SlowEmbedder {
    fn model_name(&self) -> &str {
        "keyword-test"
    }

    fn dims(&self) -> usize {
        KEYWORDS.len() + 1
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.started.notify_one();
        tokio::time::sleep(self.delay).await;
        self.finished.store(true, Ordering::SeqCst);
        Ok(texts.iter().map(|t| KeywordEmbedder::vector(t)).collect())
    }
}

/// Answers by prompt kind: router prompts get `route`, follow-up prompts
/// a bullet list, everything else `answer`.
pub struct PromptLlm {
    pub route: String,
    pub answer: String,
    calls: AtomicUsize,
}

impl PromptLlm {
    pub fn new(route: &str, answer: &str) -> Self {
        Self {
            route: route.to_string(),
            answer: answer.to_string(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmCaller for PromptLlm {
    fn model_name(&self) -> &str {
        "prompt-test"
    }

    async fn generate(&self, prompt: &str, _opts: &GenerationOptions) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if prompt.contains("ให้เลือก intent") {
            Ok(self.route.clone())
        } else if prompt.contains("[คำถามถัดไป]") {
            Ok("- How do I pay dormitory fees?\n- When is the payment deadline?".to_string())
        } else {
            Ok(self.answer.clone())
        }
    }
}

pub struct TestDb {
    pub _tmp: TempDir,
    pub pool: SqlitePool,
    pub store: Arc<SqliteStore>,
}

pub async fn test_db() -> TestDb {
    let tmp = TempDir::new().unwrap();
    let pool = db::connect_path(&tmp.path().join("data/helpdesk.sqlite"))
        .await
        .unwrap();
    migrate::apply(&pool).await.unwrap();
    let store = Arc::new(SqliteStore::new(pool.clone()).with_model("keyword-test"));
    TestDb {
        _tmp: tmp,
        pool,
        store,
    }
}

pub fn indexer(db: &TestDb, embedder: Arc<dyn Embedder>) -> DocumentIndexer {
    DocumentIndexer::new(
        db.pool.clone(),
        db.store.clone(),
        embedder,
        PipelineSettings::default().chunking,
    )
}

pub fn orchestrator(db: &TestDb, llm: Arc<dyn LlmCaller>) -> Orchestrator {
    let services = Services {
        embedder: Arc::new(KeywordEmbedder),
        llm,
        vectors: db.store.clone(),
        faqs: db.store.clone(),
        log: db.store.clone(),
        catalog: db.store.clone(),
    };
    Orchestrator::new(services, PipelineSettings::default())
}
