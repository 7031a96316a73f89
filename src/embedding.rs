//! HTTP embedding providers.
//!
//! - **[`DisabledEmbedder`]** fails every call; used when `embedding.provider = "disabled"`.
//! - **[`OpenAiEmbedder`]** calls `POST {url}/v1/embeddings` (OpenAI or a compatible gateway).
//! - **[`OllamaEmbedder`]** calls `POST {url}/api/embed` on an Ollama host.
//!
//! Texts are sent in batches of `embedding.batch_size`.
//!
//! # Retry Strategy
//!
//! `embedding.max_retries` defaults to 0 (a single attempt). When raised:
//! - HTTP 429 and 5xx → retry
//! - other HTTP 4xx → fail immediately
//! - network errors → retry
//! - backoff 1s, 2s, 4s, … capped at 32s

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use helpdesk_core::embedding::Embedder;

use crate::config::EmbeddingConfig;

/// Build the configured embedder.
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledEmbedder)),
        "openai" => Ok(Arc::new(OpenAiEmbedder::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaEmbedder::new(config)?)),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

pub struct DisabledEmbedder;

#[async_trait]
impl Embedder for DisabledEmbedder {
    fn model_name(&self) -> &str {
        "disabled"
    }

    fn dims(&self) -> usize {
        0
    }

    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        bail!("Embedding provider is disabled")
    }
}

/// Shared HTTP settings for both providers.
struct HttpSettings {
    client: reqwest::Client,
    model: String,
    dims: usize,
    batch_size: usize,
    max_retries: u32,
}

impl HttpSettings {
    fn new(config: &EmbeddingConfig, provider: &str) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow!("embedding.model required for {} provider", provider))?;
        let dims = config
            .dims
            .ok_or_else(|| anyhow!("embedding.dims required for {} provider", provider))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            model,
            dims,
            batch_size: config.batch_size.max(1),
            max_retries: config.max_retries,
        })
    }
}

pub struct OpenAiEmbedder {
    http: HttpSettings,
    url: String,
    api_key: String,
}

impl OpenAiEmbedder {
    /// Fails if `model`/`dims` are unset or the API key variable is missing.
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let http = HttpSettings::new(config, "OpenAI")?;
        let api_key = std::env::var(&config.api_key_env)
            .map_err(|_| anyhow!("{} environment variable not set", config.api_key_env))?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| "https://api.openai.com".to_string());
        Ok(Self {
            http,
            url: url.trim_end_matches('/').to_string(),
            api_key,
        })
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn model_name(&self) -> &str {
        &self.http.model
    }

    fn dims(&self) -> usize {
        self.http.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.http.batch_size) {
            let body = serde_json::json!({ "model": self.http.model, "input": batch });
            let request = self
                .http
                .client
                .post(format!("{}/v1/embeddings", self.url))
                .bearer_auth(&self.api_key)
                .json(&body);
            let json = send_with_retry(request, self.http.max_retries, "OpenAI").await?;
            out.extend(parse_openai_response(&json, batch.len())?);
        }
        Ok(out)
    }
}

pub struct OllamaEmbedder {
    http: HttpSettings,
    url: String,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let http = HttpSettings::new(config, "Ollama")?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| "http://localhost:11434".to_string());
        Ok(Self {
            http,
            url: url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.http.model
    }

    fn dims(&self) -> usize {
        self.http.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.http.batch_size) {
            let body = serde_json::json!({ "model": self.http.model, "input": batch });
            let request = self
                .http
                .client
                .post(format!("{}/api/embed", self.url))
                .json(&body);
            let json = send_with_retry(request, self.http.max_retries, "Ollama")
                .await
                .with_context(|| format!("is Ollama running at {}?", self.url))?;
            out.extend(parse_ollama_response(&json, batch.len())?);
        }
        Ok(out)
    }
}

async fn send_with_retry(
    request: reqwest::RequestBuilder,
    max_retries: u32,
    provider: &str,
) -> Result<serde_json::Value> {
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            debug!(provider, attempt, ?delay, "retrying embedding request");
            tokio::time::sleep(delay).await;
        }

        let Some(req) = request.try_clone() else {
            bail!("{} embedding request body is not cloneable", provider);
        };

        match req.send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    return Ok(response.json().await?);
                }

                let body_text = response.text().await.unwrap_or_default();
                if status.as_u16() == 429 || status.is_server_error() {
                    warn!(provider, %status, "embedding request failed");
                    last_err = Some(anyhow!("{} API error {}: {}", provider, status, body_text));
                    continue;
                }
                bail!("{} API error {}: {}", provider, status, body_text);
            }
            Err(e) => {
                warn!(provider, error = %e, "embedding request failed");
                last_err = Some(anyhow!("{} connection error: {}", provider, e));
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow!("{} embedding failed after retries", provider)))
}

fn parse_float_array(value: &serde_json::Value) -> Option<Vec<f32>> {
    value
        .as_array()
        .map(|arr| arr.iter().map(|v| v.as_f64().unwrap_or(0.0) as f32).collect())
}

/// Extract `data[].embedding`, ordered by each item's `index`.
fn parse_openai_response(json: &serde_json::Value, expected: usize) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow!("Invalid OpenAI response: missing data array"))?;

    let mut indexed: Vec<(u64, Vec<f32>)> = Vec::with_capacity(data.len());
    for (pos, item) in data.iter().enumerate() {
        let embedding = item
            .get("embedding")
            .and_then(parse_float_array)
            .ok_or_else(|| anyhow!("Invalid OpenAI response: missing embedding"))?;
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .unwrap_or(pos as u64);
        indexed.push((index, embedding));
    }
    indexed.sort_by_key(|(i, _)| *i);

    if indexed.len() != expected {
        bail!(
            "OpenAI returned {} embeddings for {} inputs",
            indexed.len(),
            expected
        );
    }
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

fn parse_ollama_response(json: &serde_json::Value, expected: usize) -> Result<Vec<Vec<f32>>> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| anyhow!("Invalid Ollama response: missing embeddings array"))?;

    let result = embeddings
        .iter()
        .map(|e| {
            parse_float_array(e)
                .ok_or_else(|| anyhow!("Invalid Ollama response: embedding is not an array"))
        })
        .collect::<Result<Vec<_>>>()?;

    if result.len() != expected {
        bail!(
            "Ollama returned {} embeddings for {} inputs",
            result.len(),
            expected
        );
    }
    Ok(result)
}
