//! Retrieval result types

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// A search hit with its provenance and scores
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedChunk {
    /// Chunk identifier in the backing store
    pub id: Uuid,
    /// Identifier of the source document
    pub source_id: Uuid,
    /// Display name of the source document
    pub source_name: String,
    /// Chunk text
    pub content: String,
    /// Situating description stored alongside the chunk, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    /// Provider-native vector similarity in [0,1]; 0 when the vector path did not return this chunk
    pub vector_score: f32,
    /// Provider-native full-text score in [0,1]; 0 when the FTS path did not return this chunk
    pub fts_score: f32,
    /// Fused, normalized relevance used for ranking and thresholding
    pub combined_score: f32,
    /// Additional metadata from the store
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl RetrievedChunk {
    /// Combined score expressed as a whole percentage
    pub fn relevance_percent(&self) -> u32 {
        (self.combined_score * 100.0).round() as u32
    }
}

/// Which retrieval paths contributed to a result set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchType {
    /// Vector and full-text results were fused
    Hybrid,
    /// Vector results only (hybrid disabled, or FTS degraded to empty)
    Vector,
    /// Full-text results only
    Fts,
}

/// Result of one retrieval call
///
/// Constructed fresh per query, never cached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagResult {
    /// Ranked, truncated chunks
    pub chunks: Vec<RetrievedChunk>,
    /// The query text as given
    pub query: String,
    /// Number of candidates that cleared the score threshold
    pub total_found: usize,
    /// Which paths produced this result
    pub search_type: SearchType,
    /// Wall-clock time of the whole call
    pub processing_time_ms: u64,
    /// Observability snapshot
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<RetrievalMetrics>,
}

/// Observability snapshot for one retrieval call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalMetrics {
    /// Pre-fusion candidate union size
    pub candidate_count: usize,
    /// Post-fusion size
    pub fused_count: usize,
    /// Size after threshold, top-k, and content-budget truncation
    pub filtered_count: usize,
    /// Mean combined score of the final set
    pub avg_score: f32,
    /// Vector-search wall-clock time
    pub vector_search_ms: u64,
}

/// A deduplicated source reference extracted from a result set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRef {
    /// Source document identifier
    pub source_id: Uuid,
    /// Source display name
    pub source_name: String,
    /// Highest relevance percentage seen for this source
    pub relevance_percent: u32,
}
