//! Usage statistics for administrators.
//!
//! Backs `helpdesk stats`, `helpdesk questions top`, `helpdesk intents`
//! and `helpdesk faq list`.

use anyhow::Result;
use sqlx::{Row, SqlitePool};

use helpdesk_core::models::{FaqEntry, QuestionCount};
use helpdesk_core::store::{FaqStore, QuestionLog};

use crate::config::Config;
use crate::db;
use crate::documents::format_ts;
use crate::sqlite_store::SqliteStore;

/// Headline totals.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Summary {
    pub questions: i64,
    pub documents: i64,
    pub chunks: i64,
    pub faq_entries: i64,
    pub feedback: i64,
    pub helpful: i64,
}

impl Summary {
    /// Share of feedback marked helpful, as a whole percentage.
    pub fn helpful_rate(&self) -> Option<i64> {
        if self.feedback > 0 {
            Some((self.helpful * 100) / self.feedback)
        } else {
            None
        }
    }
}

pub async fn summary(pool: &SqlitePool) -> Result<Summary> {
    let row = sqlx::query(
        r#"
        SELECT
            (SELECT COUNT(*) FROM question_logs) AS questions,
            (SELECT COUNT(*) FROM documents) AS documents,
            (SELECT COUNT(*) FROM chunk_vectors) AS chunks,
            (SELECT COUNT(*) FROM faq_entries) AS faq_entries,
            (SELECT COUNT(*) FROM answer_feedback) AS feedback,
            (SELECT COUNT(*) FROM answer_feedback WHERE is_helpful = 1) AS helpful
        "#,
    )
    .fetch_one(pool)
    .await?;

    Ok(Summary {
        questions: row.get("questions"),
        documents: row.get("documents"),
        chunks: row.get("chunks"),
        faq_entries: row.get("faq_entries"),
        feedback: row.get("feedback"),
        helpful: row.get("helpful"),
    })
}

/// Question counts per routed intent, most frequent first.
pub async fn intent_counts(pool: &SqlitePool) -> Result<Vec<(String, i64)>> {
    let rows = sqlx::query(
        "SELECT intent, COUNT(*) AS cnt FROM question_logs
         GROUP BY intent ORDER BY cnt DESC, intent ASC",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows
        .iter()
        .map(|r| (r.get("intent"), r.get("cnt")))
        .collect())
}

pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    let totals = summary(&pool).await?;
    let store = SqliteStore::new(pool.clone());
    let top_questions = store.popular(5).await?;
    let top_faq = store.top(5).await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Helpdesk Stats");
    println!("==============");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    println!("  Questions:   {}", totals.questions);
    println!("  Documents:   {}", totals.documents);
    println!("  Chunks:      {}", totals.chunks);
    println!("  FAQ entries: {}", totals.faq_entries);
    println!(
        "  Feedback:    {} ({} helpful{})",
        totals.feedback,
        totals.helpful,
        totals
            .helpful_rate()
            .map(|r| format!(", {}%", r))
            .unwrap_or_default()
    );

    if !top_questions.is_empty() {
        println!();
        println!("  Top questions:");
        print_questions(&top_questions);
    }
    if !top_faq.is_empty() {
        println!();
        println!("  Top FAQ:");
        print_faq(&top_faq);
    }
    println!();

    pool.close().await;
    Ok(())
}

pub async fn run_top_questions(config: &Config, limit: usize) -> Result<()> {
    let pool = db::connect(config).await?;
    let questions = SqliteStore::new(pool.clone()).popular(limit).await?;
    if questions.is_empty() {
        println!("No questions logged yet.");
    } else {
        print_questions(&questions);
    }
    pool.close().await;
    Ok(())
}

pub async fn run_intents(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    let counts = intent_counts(&pool).await?;
    if counts.is_empty() {
        println!("No questions logged yet.");
    } else {
        println!("  {:<16} {:>8}", "INTENT", "COUNT");
        println!("  {}", "-".repeat(25));
        for (intent, count) in &counts {
            println!("  {:<16} {:>8}", intent, count);
        }
    }
    pool.close().await;
    Ok(())
}

pub async fn run_faq_list(config: &Config, limit: usize) -> Result<()> {
    let pool = db::connect(config).await?;
    let entries = SqliteStore::new(pool.clone()).top(limit).await?;
    if entries.is_empty() {
        println!("FAQ cache is empty.");
    } else {
        print_faq(&entries);
    }
    pool.close().await;
    Ok(())
}

fn print_questions(questions: &[QuestionCount]) {
    println!("  {:>6}  QUESTION", "COUNT");
    for q in questions {
        println!("  {:>6}  {}", q.count, q.question);
    }
}

fn print_faq(entries: &[FaqEntry]) {
    println!("  {:>5} {:>6}  {:<16} QUESTION", "ID", "HITS", "LAST USED");
    for e in entries {
        println!(
            "  {:>5} {:>6}  {:<16} {}",
            e.id,
            e.hits,
            format_ts(e.last_used_at),
            e.question
        );
    }
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
