//! Text-generation call interface.

use anyhow::Result;
use async_trait::async_trait;

/// Per-call generation limits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationOptions {
    pub max_tokens: u32,
    pub temperature: f32,
}

/// A remote (or fake) LLM that turns a prompt into text.
///
/// The pipeline makes at most three calls per question (router, answer,
/// follow-ups) and never retries; callers decide what an error means.
#[async_trait]
pub trait LlmCaller: Send + Sync {
    fn model_name(&self) -> &str;

    async fn generate(&self, prompt: &str, opts: &GenerationOptions) -> Result<String>;
}
