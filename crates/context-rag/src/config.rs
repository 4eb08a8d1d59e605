//! Configuration for the retrieval pipeline

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};

/// Main pipeline configuration
///
/// One immutable instance is built at startup and passed by reference into
/// each component constructor. Per-call overrides go through
/// [`crate::retrieval::RetrieveOptions`] instead of mutating this.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RagConfig {
    /// Chunking configuration
    #[serde(default)]
    pub chunking: ChunkingConfig,
    /// Context generation configuration
    #[serde(default)]
    pub context: ContextConfig,
    /// Embedding configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    /// Retrieval configuration
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    /// LLM provider configuration
    #[serde(default)]
    pub llm: LlmConfig,
}

impl RagConfig {
    /// Load configuration from a TOML file, filling absent sections with defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&raw)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate cross-field invariants
    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            return Err(Error::config("chunk_size must be greater than zero"));
        }
        if self.chunking.chars_per_token == 0 {
            return Err(Error::config("chars_per_token must be greater than zero"));
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(Error::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunking.chunk_overlap, self.chunking.chunk_size
            )));
        }
        if self.context.batch_size == 0 {
            return Err(Error::config("context batch_size must be greater than zero"));
        }
        if self.embedding.batch_size == 0 {
            return Err(Error::config("embedding batch_size must be greater than zero"));
        }
        if self.embedding.max_retries == 0 {
            return Err(Error::config("max_retries must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.retrieval.vector_weight) {
            return Err(Error::Config(format!(
                "vector_weight ({}) must be in [0, 1]",
                self.retrieval.vector_weight
            )));
        }
        if !(0.0..=1.0).contains(&self.retrieval.threshold) {
            return Err(Error::Config(format!(
                "threshold ({}) must be in [0, 1]",
                self.retrieval.threshold
            )));
        }
        if self.retrieval.top_k == 0 {
            return Err(Error::config("top_k must be greater than zero"));
        }
        Ok(())
    }
}

/// Text chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Target chunk size in estimated tokens
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Overlap between consecutive chunks in estimated tokens
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    /// Minimum chunk size in estimated tokens (smaller trailing chunks are merged)
    #[serde(default = "default_min_chunk_size")]
    pub min_chunk_size: usize,
    /// Characters per token for the cheap token estimate
    #[serde(default = "default_chars_per_token")]
    pub chars_per_token: usize,
}

fn default_chunk_size() -> usize { 400 }
fn default_chunk_overlap() -> usize { 50 }
fn default_min_chunk_size() -> usize { 50 }
fn default_chars_per_token() -> usize { 4 }

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 400,
            chunk_overlap: 50,
            min_chunk_size: 50,
            chars_per_token: 4,
        }
    }
}

/// Context generation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Chunks per generation batch
    #[serde(default = "default_context_batch_size")]
    pub batch_size: usize,
    /// Maximum tokens for the generated situating description
    #[serde(default = "default_max_context_tokens")]
    pub max_context_tokens: usize,
    /// Delay between batches in milliseconds (provider rate limits)
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,
    /// Temperature for context generation
    #[serde(default = "default_context_temperature")]
    pub temperature: f32,
    /// Maximum document characters supplied in full-document mode
    #[serde(default = "default_max_document_chars")]
    pub max_document_chars: usize,
}

fn default_context_batch_size() -> usize { 5 }
fn default_max_context_tokens() -> usize { 100 }
fn default_batch_delay_ms() -> u64 { 500 }
fn default_context_temperature() -> f32 { 0.3 }
fn default_max_document_chars() -> usize { 8000 }

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            batch_size: 5,
            max_context_tokens: 100,
            batch_delay_ms: 500,
            temperature: 0.3,
            max_document_chars: 8000,
        }
    }
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Embedding dimensions
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,
    /// Texts per embedding-provider call
    #[serde(default = "default_embedding_batch_size")]
    pub batch_size: usize,
    /// Attempts per provider call before the error propagates
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_dimensions() -> usize { 1536 }
fn default_embedding_batch_size() -> usize { 20 }
fn default_max_retries() -> u32 { 3 }

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            dimensions: 1536,
            batch_size: 20,
            max_retries: 3,
        }
    }
}

/// Hybrid retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Number of chunks to return (default: 5)
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Minimum fused score (0.0-1.0, applied after normalization)
    #[serde(default = "default_threshold")]
    pub threshold: f32,
    /// Weight of the vector list in rank fusion; FTS weight is the complement
    #[serde(default = "default_vector_weight")]
    pub vector_weight: f32,
    /// Run full-text search alongside vector search
    #[serde(default = "default_use_hybrid_search")]
    pub use_hybrid_search: bool,
    /// Character budget for returned chunk content
    #[serde(default = "default_max_content_length")]
    pub max_content_length: usize,
    /// Candidates fetched per source = top_k * candidate_multiplier
    #[serde(default = "default_candidate_multiplier")]
    pub candidate_multiplier: usize,
    /// Rank-fusion constant K in 1/(K + rank)
    #[serde(default = "default_rrf_k")]
    pub rrf_k: f32,
}

fn default_top_k() -> usize { 5 }
fn default_threshold() -> f32 { 0.15 }
fn default_vector_weight() -> f32 { 0.7 }
fn default_use_hybrid_search() -> bool { true }
fn default_max_content_length() -> usize { 8000 }
fn default_candidate_multiplier() -> usize { 5 }
fn default_rrf_k() -> f32 { 60.0 }

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            threshold: 0.15,
            vector_weight: 0.7,
            use_hybrid_search: true,
            max_content_length: 8000,
            candidate_multiplier: 5,
            rrf_k: 60.0,
        }
    }
}

/// LLM provider (Ollama-compatible) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Embedding model name
    #[serde(default = "default_embed_model")]
    pub embed_model: String,
    /// Generation model name (context descriptions)
    #[serde(default = "default_generate_model")]
    pub generate_model: String,
    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String { "http://localhost:11434".to_string() }
fn default_embed_model() -> String { "nomic-embed-text".to_string() }
fn default_generate_model() -> String { "phi3".to_string() }
fn default_timeout_secs() -> u64 { 120 }

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            embed_model: default_embed_model(),
            generate_model: default_generate_model(),
            timeout_secs: 120,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = RagConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.chunking.chunk_size, 400);
        assert_eq!(config.retrieval.top_k, 5);
        assert_eq!(config.embedding.batch_size, 20);
    }

    #[test]
    fn test_overlap_larger_than_chunk_size_rejected() {
        let mut config = RagConfig::default();
        config.chunking.chunk_overlap = 400;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_weight_out_of_range_rejected() {
        let mut config = RagConfig::default();
        config.retrieval.vector_weight = 1.5;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: RagConfig = toml::from_str(
            r#"
            [chunking]
            chunk_size = 200

            [retrieval]
            vector_weight = 0.5
            "#,
        )
        .unwrap();

        assert_eq!(config.chunking.chunk_size, 200);
        assert_eq!(config.chunking.chunk_overlap, 50);
        assert_eq!(config.retrieval.vector_weight, 0.5);
        assert_eq!(config.retrieval.threshold, 0.15);
        assert!(config.validate().is_ok());
    }
}
