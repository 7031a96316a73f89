//! HTTP LLM callers.
//!
//! | Provider | Endpoint |
//! |----------|----------|
//! | `gemini` | `POST {url}/v1/models/{model}:generateContent` |
//! | `openai` | `POST {url}/v1/chat/completions` (any OpenAI-compatible server) |
//! | `disabled` | no network; every call fails |
//!
//! Calls are never retried. The pipeline maps failures onto its own
//! fallback answers.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use helpdesk_core::llm::{GenerationOptions, LlmCaller};

use crate::config::LlmConfig;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM provider is disabled")]
    Disabled,

    #[error("{0} environment variable not set")]
    MissingApiKey(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("LLM service error (HTTP {status}): {body}")]
    Status { status: u16, body: String },

    #[error("LLM response contained no text")]
    EmptyResponse,

    #[error("prompt blocked by provider: {0}")]
    Blocked(String),
}

/// Build the configured caller. `model_override` replaces `llm.model`
/// (used for a dedicated router model).
pub fn create_llm(config: &LlmConfig, model_override: Option<&str>) -> Result<Arc<dyn LlmCaller>> {
    let model = model_override.unwrap_or(&config.model).to_string();
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledLlm)),
        "gemini" => Ok(Arc::new(GeminiLlm::new(config, model)?)),
        "openai" => Ok(Arc::new(OpenAiChatLlm::new(config, model)?)),
        other => anyhow::bail!("Unknown llm provider: {}", other),
    }
}

fn api_key(config: &LlmConfig) -> Result<String, LlmError> {
    let var = config.key_env();
    std::env::var(var).map_err(|_| LlmError::MissingApiKey(var.to_string()))
}

fn http_client(config: &LlmConfig) -> Result<reqwest::Client, LlmError> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?)
}

async fn read_json<T: for<'de> Deserialize<'de>>(response: reqwest::Response) -> Result<T, LlmError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(LlmError::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response.json().await?)
}

pub struct DisabledLlm;

#[async_trait]
impl LlmCaller for DisabledLlm {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn generate(&self, _prompt: &str, _opts: &GenerationOptions) -> Result<String> {
        Err(LlmError::Disabled.into())
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Gemini
// ═══════════════════════════════════════════════════════════════════════

pub struct GeminiLlm {
    client: reqwest::Client,
    url: String,
    model: String,
    api_key: String,
}

impl GeminiLlm {
    pub fn new(config: &LlmConfig, model: String) -> Result<Self> {
        Ok(Self {
            client: http_client(config)?,
            url: config
                .url
                .clone()
                .unwrap_or_else(|| "https://generativelanguage.googleapis.com".to_string())
                .trim_end_matches('/')
                .to_string(),
            model,
            api_key: api_key(config)?,
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Serialize)]
struct GeminiContent<'a> {
    role: &'static str,
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    prompt_feedback: Option<GeminiPromptFeedback>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiCandidateContent>,
}

#[derive(Deserialize)]
struct GeminiCandidateContent {
    #[serde(default)]
    parts: Vec<GeminiCandidatePart>,
}

#[derive(Deserialize)]
struct GeminiCandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

impl GeminiResponse {
    fn into_text(self) -> Result<String, LlmError> {
        if let Some(reason) = self.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(LlmError::Blocked(reason));
        }
        let text: String = self
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();
        if text.trim().is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        Ok(text.trim().to_string())
    }
}

#[async_trait]
impl LlmCaller for GeminiLlm {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str, opts: &GenerationOptions) -> Result<String> {
        let request = GeminiRequest {
            contents: vec![GeminiContent {
                role: "user",
                parts: vec![GeminiPart { text: prompt }],
            }],
            generation_config: GeminiGenerationConfig {
                temperature: opts.temperature,
                max_output_tokens: opts.max_tokens,
            },
        };
        let url = format!("{}/v1/models/{}:generateContent", self.url, self.model);
        debug!(model = %self.model, max_tokens = opts.max_tokens, "calling Gemini");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(LlmError::from)?;
        let body: GeminiResponse = read_json(response).await?;
        Ok(body.into_text()?)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// OpenAI-compatible chat completions
// ═══════════════════════════════════════════════════════════════════════

pub struct OpenAiChatLlm {
    client: reqwest::Client,
    url: String,
    model: String,
    api_key: Option<String>,
}

impl OpenAiChatLlm {
    /// The API key is optional so local OpenAI-compatible servers work.
    pub fn new(config: &LlmConfig, model: String) -> Result<Self> {
        Ok(Self {
            client: http_client(config)?,
            url: config
                .url
                .clone()
                .unwrap_or_else(|| "https://api.openai.com".to_string())
                .trim_end_matches('/')
                .to_string(),
            model,
            api_key: api_key(config).ok(),
        })
    }
}

#[derive(Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[async_trait]
impl LlmCaller for OpenAiChatLlm {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str, opts: &GenerationOptions) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            temperature: opts.temperature,
            max_tokens: opts.max_tokens,
        };
        debug!(model = %self.model, max_tokens = opts.max_tokens, "calling chat completions");

        let mut req = self
            .client
            .post(format!("{}/v1/chat/completions", self.url))
            .json(&request);
        if let Some(ref key) = self.api_key {
            req = req.bearer_auth(key);
        }
        let response = req.send().await.map_err(LlmError::from)?;
        let body: ChatResponse = read_json(response).await?;

        let content = body
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();
        if content.trim().is_empty() {
            return Err(LlmError::EmptyResponse.into());
        }
        Ok(content.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gemini_response_text() {
        let body: GeminiResponse = serde_json::from_value(serde_json::json!({
            "candidates": [{"content": {"parts": [{"text": "ค่าหอ "}, {"text": "4,500 บาท\n"}]}}]
        }))
        .unwrap();
        assert_eq!(body.into_text().unwrap(), "ค่าหอ 4,500 บาท");
    }

    #[test]
    fn test_gemini_blocked_and_empty() {
        let blocked: GeminiResponse = serde_json::from_value(serde_json::json!({
            "promptFeedback": {"blockReason": "SAFETY"}
        }))
        .unwrap();
        assert!(matches!(blocked.into_text(), Err(LlmError::Blocked(r)) if r == "SAFETY"));

        let empty = GeminiResponse::default();
        assert!(matches!(empty.into_text(), Err(LlmError::EmptyResponse)));
    }

    #[test]
    fn test_gemini_request_shape() {
        let request = GeminiRequest {
            contents: vec![GeminiContent {
                role: "user",
                parts: vec![GeminiPart { text: "hi" }],
            }],
            generation_config: GeminiGenerationConfig {
                temperature: 0.0,
                max_output_tokens: 128,
            },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 128);
        assert_eq!(json["contents"][0]["parts"][0]["text"], "hi");
    }

    #[tokio::test]
    async fn test_disabled_llm_fails() {
        let llm = create_llm(&LlmConfig::default(), None).unwrap();
        let opts = GenerationOptions {
            max_tokens: 10,
            temperature: 0.0,
        };
        let err = llm.generate("hello", &opts).await.unwrap_err();
        assert!(matches!(err.downcast_ref::<LlmError>(), Some(LlmError::Disabled)));
    }
}
