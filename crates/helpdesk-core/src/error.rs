//! Typed failures for the pipeline stages that need to distinguish them.
//!
//! Most core code returns `anyhow::Result`; these enums exist where the
//! caller branches on the kind of failure.

use thiserror::Error;

/// Why the router could not produce a decision from the LLM reply.
#[derive(Error, Debug)]
pub enum ClassificationError {
    #[error("router LLM call failed: {0}")]
    Llm(#[source] anyhow::Error),

    #[error("router reply contained no JSON object")]
    NoJson,

    #[error("router reply is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub type ClassificationResult<T> = std::result::Result<T, ClassificationError>;
