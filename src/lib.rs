//! # University Helpdesk
//!
//! A question-answering assistant for university staff and students.
//! Questions are classified into an intent, answered from a cache of
//! frequent questions when possible, and otherwise answered by an LLM
//! grounded in chunks retrieved from admin-managed documents.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌──────────────┐   ┌───────────┐
//! │ doc add /  │──▶│ Chunk+Embed  │──▶│  SQLite    │
//! │ update     │   │              │   │  vectors   │
//! └────────────┘   └──────────────┘   └─────┬─────┘
//!                                           │
//!   question ─▶ Router ─▶ FAQ ─▶ Agent ─▶ Retriever ─▶ LLM
//! ```
//!
//! The pipeline itself lives in the `helpdesk-core` crate; this crate
//! supplies configuration, the SQLite stores, HTTP embedding and LLM
//! providers and the `helpdesk` CLI.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite vector store, FAQ table, question log |
//! | [`embedding`] | OpenAI / Ollama embedding providers |
//! | [`llm`] | Gemini / OpenAI-compatible LLM callers |
//! | [`documents`] | Document management and indexing |
//! | [`ask`] | Pipeline wiring for `helpdesk ask` |
//! | [`stats`] | Usage statistics |
//! | [`feedback`] | Answer feedback |

pub mod ask;
pub mod config;
pub mod db;
pub mod documents;
pub mod embedding;
pub mod feedback;
pub mod llm;
pub mod migrate;
pub mod sqlite_store;
pub mod stats;
