//! # Helpdesk Core
//!
//! Runtime-agnostic logic for the university helpdesk: data models,
//! paragraph chunking, embedding and LLM call traits, store traits with
//! in-memory backends, retrieval, intent routing, the FAQ cache, topic
//! suggestions and the orchestrator that sequences them per question.
//!
//! This crate contains no tokio, sqlx, HTTP clients or filesystem I/O.
//! The `uni-helpdesk` application crate supplies concrete providers and
//! SQLite-backed stores.
//!
//! ```text
//! question ─▶ Router ─▶ FAQ cache ──hit──────────────────────┐
//!                          │ miss                            │
//!                          ▼                                 ▼
//!                   intent agent ─▶ Retriever ─▶ LLM ─▶ promotion ─▶ suggestions ─▶ style
//! ```

pub mod agents;
pub mod chunk;
pub mod embedding;
pub mod error;
pub mod faq;
pub mod llm;
pub mod models;
pub mod orchestrator;
pub mod retrieve;
pub mod router;
pub mod sentinel;
pub mod settings;
pub mod store;
pub mod style;
pub mod suggest;

#[cfg(test)]
pub(crate) mod fakes;

pub use orchestrator::{Orchestrator, Services};
pub use settings::PipelineSettings;
