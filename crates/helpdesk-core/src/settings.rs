//! Tunables for every pipeline stage.
//!
//! The application builds a [`PipelineSettings`] from its TOML config;
//! tests usually start from [`PipelineSettings::default`].

/// Chunker limits, all counted in Unicode scalar values.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkParams {
    pub chunk_size: usize,
    pub max_doc_chars: usize,
    pub max_chunks_per_doc: usize,
}

impl Default for ChunkParams {
    fn default() -> Self {
        Self {
            chunk_size: 600,
            max_doc_chars: 200_000,
            max_chunks_per_doc: 2000,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalParams {
    /// Candidates requested from the vector store.
    pub top_k: usize,
    /// Results kept after reranking.
    pub keep: usize,
    /// Minimum cosine similarity for a candidate to survive.
    pub threshold: f32,
    /// Append intent keywords to the retrieval query.
    pub keyword_boost: bool,
}

impl Default for RetrievalParams {
    fn default() -> Self {
        Self {
            top_k: 10,
            keep: 4,
            threshold: 0.32,
            keyword_boost: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FaqParams {
    pub threshold: f32,
    pub min_question_chars: usize,
    /// Logged occurrences of the exact question before auto-promotion.
    pub promote_after: usize,
}

impl Default for FaqParams {
    fn default() -> Self {
        Self {
            threshold: 0.85,
            min_question_chars: 8,
            promote_after: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    pub max_tokens: u32,
    pub temperature: f32,
    pub followups: bool,
    pub followup_max_tokens: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_tokens: 220,
            temperature: 0.2,
            followups: true,
            followup_max_tokens: 120,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RouterParams {
    pub max_tokens: u32,
}

impl Default for RouterParams {
    fn default() -> Self {
        Self { max_tokens: 128 }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SuggestParams {
    /// Distinct logged questions considered as candidates.
    pub pool_size: usize,
    pub limit: usize,
}

impl Default for SuggestParams {
    fn default() -> Self {
        Self {
            pool_size: 200,
            limit: 3,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineSettings {
    pub chunking: ChunkParams,
    pub retrieval: RetrievalParams,
    pub faq: FaqParams,
    pub generation: GenerationParams,
    pub router: RouterParams,
    pub suggestions: SuggestParams,
}
