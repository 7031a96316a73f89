//! `helpdesk ask`: wire SQLite stores and HTTP providers into the
//! pipeline and answer one question.

use anyhow::Result;
use std::sync::Arc;

use helpdesk_core::router::Router;
use helpdesk_core::{Orchestrator, Services};

use crate::config::Config;
use crate::db;
use crate::embedding::create_embedder;
use crate::llm::create_llm;
use crate::sqlite_store::SqliteStore;

/// Build an orchestrator backed by the configured database and providers.
pub async fn build_orchestrator(config: &Config) -> Result<Orchestrator> {
    let pool = db::connect(config).await?;
    let embedder = create_embedder(&config.embedding)?;
    let llm = create_llm(&config.llm, None)?;
    let store = Arc::new(SqliteStore::new(pool).with_model(embedder.model_name()));

    let services = Services {
        embedder,
        llm: llm.clone(),
        vectors: store.clone(),
        faqs: store.clone(),
        log: store.clone(),
        catalog: store,
    };
    let settings = config.pipeline_settings();

    let router_llm = match config.router.model.as_deref() {
        Some(model) => create_llm(&config.llm, Some(model))?,
        None => llm,
    };
    let router = Router::new(router_llm, settings.router.clone());
    Ok(Orchestrator::with_router(services, settings, router))
}

pub async fn run_ask(config: &Config, question: &str, json: bool, verbose: bool) -> Result<()> {
    let orchestrator = build_orchestrator(config).await?;
    let result = orchestrator.route_and_answer(question).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    let meta = &result.meta;
    println!("{}", result.answer);
    println!();
    println!(
        "intent: {} ({}, confidence {:.2})",
        meta.intent, meta.route, meta.confidence
    );
    if let Some(source) = meta.source {
        println!(
            "source: {}{}",
            source.as_str(),
            if meta.faq_auto_created {
                " (added to FAQ)"
            } else {
                ""
            }
        );
    }
    if !meta.next_topics.is_empty() {
        println!("related questions:");
        for topic in &meta.next_topics {
            println!("  - {}", topic);
        }
    }
    if !meta.rag_next_topics.is_empty() {
        println!("you might also ask:");
        for topic in &meta.rag_next_topics {
            println!("  - {}", topic);
        }
    }
    if verbose {
        for (stage, err) in &meta.errors {
            println!("warning [{}]: {}", stage, err);
        }
        for (key, value) in &meta.debug {
            println!("debug [{}]: {}", key, value);
        }
        println!("request: {}", meta.request_id);
    }
    Ok(())
}
