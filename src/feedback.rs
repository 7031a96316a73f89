//! Helpful / not-helpful votes on answers.

use anyhow::{bail, Result};
use sqlx::{Row, SqlitePool};

use crate::config::Config;
use crate::db;
use crate::documents::format_ts;

/// A stored vote, as shown by `feedback list`.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedbackRow {
    pub id: i64,
    pub question: String,
    pub answer: String,
    pub is_helpful: bool,
    pub comment: Option<String>,
    pub created_at: i64,
}

pub async fn record(
    pool: &SqlitePool,
    question: &str,
    answer: &str,
    helpful: bool,
    comment: Option<&str>,
) -> Result<i64> {
    if question.trim().is_empty() {
        bail!("Feedback needs the question it refers to");
    }
    let comment = comment.map(str::trim).filter(|c| !c.is_empty());
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO answer_feedback (question, answer, is_helpful, comment, created_at)
         VALUES (?, ?, ?, ?, ?) RETURNING id",
    )
    .bind(question.trim())
    .bind(answer)
    .bind(helpful)
    .bind(comment)
    .bind(chrono::Utc::now().timestamp())
    .fetch_one(pool)
    .await?;
    Ok(id)
}

/// Most recent votes first.
pub async fn list(pool: &SqlitePool, limit: usize) -> Result<Vec<FeedbackRow>> {
    let rows = sqlx::query(
        "SELECT id, question, answer, is_helpful, comment, created_at
         FROM answer_feedback
         ORDER BY created_at DESC, id DESC
         LIMIT ?",
    )
    .bind(limit as i64)
    .fetch_all(pool)
    .await?;
    Ok(rows
        .iter()
        .map(|r| FeedbackRow {
            id: r.get("id"),
            question: r.get("question"),
            answer: r.get("answer"),
            is_helpful: r.get("is_helpful"),
            comment: r.get("comment"),
            created_at: r.get("created_at"),
        })
        .collect())
}

pub async fn run_feedback(
    config: &Config,
    question: &str,
    answer: &str,
    helpful: bool,
    comment: Option<&str>,
) -> Result<()> {
    let pool = db::connect(config).await?;
    record(&pool, question, answer, helpful, comment).await?;
    println!(
        "Recorded {} feedback.",
        if helpful { "helpful" } else { "not helpful" }
    );
    pool.close().await;
    Ok(())
}

pub async fn run_feedback_list(config: &Config, limit: usize) -> Result<()> {
    let pool = db::connect(config).await?;
    let rows = list(&pool, limit).await?;
    pool.close().await;

    if rows.is_empty() {
        println!("No feedback recorded.");
        return Ok(());
    }
    for row in &rows {
        println!(
            "#{} {} {}",
            row.id,
            format_ts(row.created_at),
            if row.is_helpful { "helpful" } else { "not helpful" }
        );
        println!("  question: {}", one_line(&row.question, 200));
        if !row.answer.is_empty() {
            println!("  answer:   {}", one_line(&row.answer, 200));
        }
        if let Some(comment) = &row.comment {
            println!("  comment:  {}", one_line(comment, 200));
        }
    }
    Ok(())
}

/// Collapse whitespace and cap at `max` characters.
fn one_line(text: &str, max: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max {
        flat
    } else {
        let cut: String = flat.chars().take(max).collect();
        format!("{}...", cut)
    }
}
