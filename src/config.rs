//! TOML configuration.
//!
//! Only `[db]` is required; every other section falls back to defaults
//! that match the pipeline's built-in tuning. See
//! `config/helpdesk.example.toml` for a full example.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use helpdesk_core::settings::{
    ChunkParams, FaqParams, GenerationParams, PipelineSettings, RetrievalParams, RouterParams,
    SuggestParams,
};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub faq: FaqConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub router: RouterConfig,
    #[serde(default)]
    pub suggestions: SuggestionsConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_max_doc_chars")]
    pub max_doc_chars: usize,
    #[serde(default = "default_max_chunks_per_doc")]
    pub max_chunks_per_doc: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            max_doc_chars: default_max_doc_chars(),
            max_chunks_per_doc: default_max_chunks_per_doc(),
        }
    }
}

fn default_chunk_size() -> usize {
    600
}
fn default_max_doc_chars() -> usize {
    200_000
}
fn default_max_chunks_per_doc() -> usize {
    2000
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_keep")]
    pub keep: usize,
    #[serde(default = "default_sim_threshold")]
    pub threshold: f32,
    #[serde(default)]
    pub keyword_boost: bool,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            keep: default_keep(),
            threshold: default_sim_threshold(),
            keyword_boost: false,
        }
    }
}

fn default_top_k() -> usize {
    10
}
fn default_keep() -> usize {
    4
}
fn default_sim_threshold() -> f32 {
    0.32
}

#[derive(Debug, Deserialize, Clone)]
pub struct FaqConfig {
    #[serde(default = "default_faq_threshold")]
    pub threshold: f32,
    #[serde(default = "default_min_question_chars")]
    pub min_question_chars: usize,
    #[serde(default = "default_promote_after")]
    pub promote_after: usize,
}

impl Default for FaqConfig {
    fn default() -> Self {
        Self {
            threshold: default_faq_threshold(),
            min_question_chars: default_min_question_chars(),
            promote_after: default_promote_after(),
        }
    }
}

fn default_faq_threshold() -> f32 {
    0.85
}
fn default_min_question_chars() -> usize {
    8
}
fn default_promote_after() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_true")]
    pub followups: bool,
    #[serde(default = "default_followup_max_tokens")]
    pub followup_max_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            followups: true,
            followup_max_tokens: default_followup_max_tokens(),
        }
    }
}

fn default_max_tokens() -> u32 {
    220
}
fn default_temperature() -> f32 {
    0.2
}
fn default_true() -> bool {
    true
}
fn default_followup_max_tokens() -> u32 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct RouterConfig {
    #[serde(default = "default_router_max_tokens")]
    pub max_tokens: u32,
    /// Model override for classification; defaults to `llm.model`.
    #[serde(default)]
    pub model: Option<String>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_router_max_tokens(),
            model: None,
        }
    }
}

fn default_router_max_tokens() -> u32 {
    128
}

#[derive(Debug, Deserialize, Clone)]
pub struct SuggestionsConfig {
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    #[serde(default = "default_suggest_limit")]
    pub limit: usize,
}

impl Default for SuggestionsConfig {
    fn default() -> Self {
        Self {
            pool_size: default_pool_size(),
            limit: default_suggest_limit(),
        }
    }
}

fn default_pool_size() -> usize {
    200
}
fn default_suggest_limit() -> usize {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_disabled")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL override (OpenAI-compatible gateway or Ollama host).
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_openai_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default = "default_embed_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_disabled(),
            model: None,
            dims: None,
            url: None,
            api_key_env: default_openai_key_env(),
            batch_size: default_batch_size(),
            max_retries: 0,
            timeout_secs: default_embed_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_disabled() -> String {
    "disabled".to_string()
}
fn default_openai_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_embed_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_disabled")]
    pub provider: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default)]
    pub url: Option<String>,
    /// Environment variable holding the API key. Defaults per provider.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_disabled(),
            model: default_llm_model(),
            url: None,
            api_key_env: None,
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

impl LlmConfig {
    pub fn key_env(&self) -> &str {
        match (&self.api_key_env, self.provider.as_str()) {
            (Some(name), _) => name,
            (None, "gemini") => "GEMINI_API_KEY",
            (None, _) => "OPENAI_API_KEY",
        }
    }
}

fn default_llm_model() -> String {
    "gemini-2.0-flash".to_string()
}
fn default_llm_timeout_secs() -> u64 {
    60
}

impl Config {
    /// Defaults with a database under `./data`. Every CLI command reads
    /// a config file; this is the base for tests that change one field.
    #[cfg(test)]
    pub fn minimal() -> Self {
        Self {
            db: DbConfig {
                path: PathBuf::from("./data/helpdesk.sqlite"),
            },
            chunking: ChunkingConfig::default(),
            retrieval: RetrievalConfig::default(),
            faq: FaqConfig::default(),
            generation: GenerationConfig::default(),
            router: RouterConfig::default(),
            suggestions: SuggestionsConfig::default(),
            embedding: EmbeddingConfig::default(),
            llm: LlmConfig::default(),
        }
    }

    pub fn chunk_params(&self) -> ChunkParams {
        ChunkParams {
            chunk_size: self.chunking.chunk_size,
            max_doc_chars: self.chunking.max_doc_chars,
            max_chunks_per_doc: self.chunking.max_chunks_per_doc,
        }
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            chunking: self.chunk_params(),
            retrieval: RetrievalParams {
                top_k: self.retrieval.top_k,
                keep: self.retrieval.keep,
                threshold: self.retrieval.threshold,
                keyword_boost: self.retrieval.keyword_boost,
            },
            faq: FaqParams {
                threshold: self.faq.threshold,
                min_question_chars: self.faq.min_question_chars,
                promote_after: self.faq.promote_after,
            },
            generation: GenerationParams {
                max_tokens: self.generation.max_tokens,
                temperature: self.generation.temperature,
                followups: self.generation.followups,
                followup_max_tokens: self.generation.followup_max_tokens,
            },
            router: RouterParams {
                max_tokens: self.router.max_tokens,
            },
            suggestions: SuggestParams {
                pool_size: self.suggestions.pool_size,
                limit: self.suggestions.limit,
            },
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.chunking.chunk_size == 0 {
        bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.max_doc_chars == 0 || config.chunking.max_chunks_per_doc == 0 {
        bail!("chunking.max_doc_chars and chunking.max_chunks_per_doc must be > 0");
    }

    if config.retrieval.top_k < 1 || config.retrieval.keep < 1 {
        bail!("retrieval.top_k and retrieval.keep must be >= 1");
    }
    if !(0.0..=1.0).contains(&config.retrieval.threshold) {
        bail!("retrieval.threshold must be in [0.0, 1.0]");
    }

    if !(0.0..=1.0).contains(&config.faq.threshold) {
        bail!("faq.threshold must be in [0.0, 1.0]");
    }
    if config.faq.promote_after == 0 {
        bail!("faq.promote_after must be >= 1");
    }

    if config.generation.max_tokens == 0 || config.router.max_tokens == 0 {
        bail!("generation.max_tokens and router.max_tokens must be > 0");
    }
    if !(0.0..=2.0).contains(&config.generation.temperature) {
        bail!("generation.temperature must be in [0.0, 2.0]");
    }

    if config.embedding.is_enabled() {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.batch_size == 0 {
            bail!("embedding.batch_size must be > 0");
        }
    }
    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "ollama" => {}
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, or ollama.",
            other
        ),
    }

    match config.llm.provider.as_str() {
        "disabled" | "gemini" | "openai" => {}
        other => bail!(
            "Unknown llm provider: '{}'. Must be disabled, gemini, or openai.",
            other
        ),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_section_uses_defaults() {
        let config: Config = toml::from_str("[db]\npath = \"/tmp/h.sqlite\"\n").unwrap();
        validate(&config).unwrap();
        let settings = config.pipeline_settings();
        assert_eq!(settings, PipelineSettings::default());
        assert_eq!(config.embedding.max_retries, 0);
        assert_eq!(config.llm.model, "gemini-2.0-flash");
    }

    #[test]
    fn test_overrides_flow_into_settings() {
        let config: Config = toml::from_str(
            r#"
            [db]
            path = "h.sqlite"

            [retrieval]
            keep = 2
            keyword_boost = true

            [faq]
            promote_after = 3
            "#,
        )
        .unwrap();
        let settings = config.pipeline_settings();
        assert_eq!(settings.retrieval.keep, 2);
        assert!(settings.retrieval.keyword_boost);
        assert_eq!(settings.retrieval.top_k, 10);
        assert_eq!(settings.faq.promote_after, 3);
    }

    #[test]
    fn test_rejects_bad_values() {
        let mut config = Config::minimal();
        config.retrieval.threshold = 1.5;
        assert!(validate(&config).is_err());

        let mut config = Config::minimal();
        config.embedding.provider = "openai".into();
        assert!(validate(&config).is_err());

        let mut config = Config::minimal();
        config.llm.provider = "claude-desktop".into();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_llm_key_env_defaults() {
        let mut llm = LlmConfig {
            provider: "gemini".into(),
            ..LlmConfig::default()
        };
        assert_eq!(llm.key_env(), "GEMINI_API_KEY");
        llm.provider = "openai".into();
        assert_eq!(llm.key_env(), "OPENAI_API_KEY");
        llm.api_key_env = Some("CAMPUS_LLM_KEY".into());
        assert_eq!(llm.key_env(), "CAMPUS_LLM_KEY");
    }
}
