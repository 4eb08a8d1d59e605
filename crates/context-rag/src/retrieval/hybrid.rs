//! Hybrid retrieval with Reciprocal Rank Fusion
//!
//! Runs vector-similarity and full-text search concurrently, fuses the two
//! ranked lists with weighted RRF, then applies threshold, top-k, and a
//! content-length budget. The vector path is the primary signal: its failures
//! propagate, while full-text failures degrade the call to vector-only.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use uuid::Uuid;

use crate::config::{RagConfig, RetrievalConfig};
use crate::error::Result;
use crate::ingestion::ChunkEmbedder;
use crate::providers::{EmbeddingProvider, IndexHit, TextIndex, VectorIndex};
use crate::types::{RagResult, RetrievalMetrics, RetrievedChunk, SearchType};

use super::prepare_fts_query;

/// Per-call overrides for retrieval configuration
#[derive(Debug, Clone, Default)]
pub struct RetrieveOptions {
    /// Override the number of chunks to return
    pub top_k: Option<usize>,
    /// Override the fused score threshold
    pub threshold: Option<f32>,
    /// Override the vector weight in fusion
    pub vector_weight: Option<f32>,
    /// Override whether full-text search runs
    pub use_hybrid_search: Option<bool>,
    /// Override the content character budget
    pub max_content_length: Option<usize>,
}

impl RetrieveOptions {
    /// Create empty options (all values from configuration)
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of chunks to return
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }

    /// Set the fused score threshold
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = Some(threshold);
        self
    }

    /// Set the vector weight (FTS weight is the complement)
    pub fn with_vector_weight(mut self, weight: f32) -> Self {
        self.vector_weight = Some(weight);
        self
    }

    /// Enable or disable the full-text path
    pub fn with_hybrid_search(mut self, enabled: bool) -> Self {
        self.use_hybrid_search = Some(enabled);
        self
    }

    /// Set the content character budget
    pub fn with_max_content_length(mut self, length: usize) -> Self {
        self.max_content_length = Some(length);
        self
    }
}

struct Resolved {
    top_k: usize,
    threshold: f32,
    vector_weight: f32,
    use_hybrid_search: bool,
    max_content_length: usize,
}

/// Retrieves the most relevant chunks for a query via hybrid search
pub struct HybridRetriever {
    embedder: ChunkEmbedder,
    vector_index: Arc<dyn VectorIndex>,
    text_index: Arc<dyn TextIndex>,
    config: RetrievalConfig,
}

impl HybridRetriever {
    /// Create a retriever from configuration and providers
    pub fn new(
        config: &RagConfig,
        embedding: Arc<dyn EmbeddingProvider>,
        vector_index: Arc<dyn VectorIndex>,
        text_index: Arc<dyn TextIndex>,
    ) -> Self {
        Self {
            embedder: ChunkEmbedder::new(embedding, &config.embedding),
            vector_index,
            text_index,
            config: config.retrieval.clone(),
        }
    }

    /// Retrieve ranked, truncated chunks for `query` within a tenant
    pub async fn retrieve(
        &self,
        tenant_id: Uuid,
        query: &str,
        options: Option<RetrieveOptions>,
    ) -> Result<RagResult> {
        let started = Instant::now();
        let opts = self.resolve(options);

        let query_vector = self.embedder.embed_query(query).await?;
        let limit = opts.top_k * self.config.candidate_multiplier.max(1);

        let (mut ranked, candidate_count, search_type, vector_search_ms) = if opts.use_hybrid_search
        {
            self.fetch_and_fuse(tenant_id, query, &query_vector, limit, &opts).await?
        } else {
            self.fetch_vector_only(tenant_id, &query_vector, limit).await?
        };

        let fused_count = ranked.len();
        ranked.retain(|c| c.combined_score >= opts.threshold);
        let total_found = ranked.len();
        ranked.truncate(opts.top_k);

        let chunks = truncate_to_budget(ranked, opts.max_content_length);
        let filtered_count = chunks.len();
        let avg_score = if chunks.is_empty() {
            0.0
        } else {
            chunks.iter().map(|c| c.combined_score).sum::<f32>() / chunks.len() as f32
        };

        let processing_time_ms = started.elapsed().as_millis() as u64;
        tracing::debug!(
            "Retrieved {}/{} chunks for \"{}\" in {}ms ({:?})",
            filtered_count,
            candidate_count,
            query,
            processing_time_ms,
            search_type
        );

        Ok(RagResult {
            chunks,
            query: query.to_string(),
            total_found,
            search_type,
            processing_time_ms,
            metrics: Some(RetrievalMetrics {
                candidate_count,
                fused_count,
                filtered_count,
                avg_score,
                vector_search_ms,
            }),
        })
    }

    fn resolve(&self, options: Option<RetrieveOptions>) -> Resolved {
        let options = options.unwrap_or_default();
        Resolved {
            top_k: options.top_k.unwrap_or(self.config.top_k),
            threshold: options.threshold.unwrap_or(self.config.threshold),
            vector_weight: options.vector_weight.unwrap_or(self.config.vector_weight),
            use_hybrid_search: options
                .use_hybrid_search
                .unwrap_or(self.config.use_hybrid_search),
            max_content_length: options
                .max_content_length
                .unwrap_or(self.config.max_content_length),
        }
    }

    /// Run both searches concurrently and fuse the ranked lists
    async fn fetch_and_fuse(
        &self,
        tenant_id: Uuid,
        query: &str,
        query_vector: &[f32],
        limit: usize,
        opts: &Resolved,
    ) -> Result<(Vec<RetrievedChunk>, usize, SearchType, u64)> {
        let fts_query = prepare_fts_query(query);

        let vector_search = async {
            let vector_started = Instant::now();
            let result = self.vector_index.search(tenant_id, query_vector, limit).await;
            (result, vector_started.elapsed().as_millis() as u64)
        };
        let text_search = async {
            if fts_query.is_empty() {
                Ok(Vec::new())
            } else {
                self.text_index.search(tenant_id, &fts_query, limit).await
            }
        };

        let ((vector_result, vector_search_ms), text_result) =
            tokio::join!(vector_search, text_search);

        let vector_hits = vector_result?;
        let fts_hits = match text_result {
            Ok(hits) => hits,
            Err(e) => {
                tracing::warn!("Full-text search failed, degrading to vector-only: {}", e);
                Vec::new()
            }
        };

        let search_type = match (vector_hits.is_empty(), fts_hits.is_empty()) {
            (false, false) => SearchType::Hybrid,
            (true, false) => SearchType::Fts,
            _ => SearchType::Vector,
        };
        let candidate_count = vector_hits.len() + fts_hits.len();

        let fused = fuse_rrf(vector_hits, fts_hits, opts.vector_weight, self.config.rrf_k);
        Ok((fused, candidate_count, search_type, vector_search_ms))
    }

    /// Vector-only path: rank by raw vector score
    async fn fetch_vector_only(
        &self,
        tenant_id: Uuid,
        query_vector: &[f32],
        limit: usize,
    ) -> Result<(Vec<RetrievedChunk>, usize, SearchType, u64)> {
        let vector_started = Instant::now();
        let hits = self.vector_index.search(tenant_id, query_vector, limit).await?;
        let vector_search_ms = vector_started.elapsed().as_millis() as u64;

        let candidate_count = hits.len();
        let mut chunks: Vec<RetrievedChunk> = hits
            .into_iter()
            .map(|hit| {
                let mut chunk = to_retrieved(hit, true);
                chunk.combined_score = chunk.vector_score;
                chunk
            })
            .collect();
        chunks.sort_by(|a, b| {
            b.combined_score
                .partial_cmp(&a.combined_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        Ok((chunks, candidate_count, SearchType::Vector, vector_search_ms))
    }
}

fn to_retrieved(hit: IndexHit, from_vector: bool) -> RetrievedChunk {
    RetrievedChunk {
        id: hit.id,
        source_id: hit.source_id,
        source_name: hit.source_name,
        content: hit.content,
        context: hit.context,
        vector_score: if from_vector { hit.score } else { 0.0 },
        fts_score: if from_vector { 0.0 } else { hit.score },
        combined_score: 0.0,
        metadata: hit.metadata,
    }
}

/// Weighted Reciprocal Rank Fusion over the two ranked candidate lists
///
/// A chunk at 1-based rank `r` contributes `weight / (k + r)`; a chunk in
/// both lists sums both contributions and keeps both raw scores. Accumulated
/// scores are normalized by the maximum so the result lies in [0,1], then
/// sorted descending (stable, so equal scores keep candidate order).
fn fuse_rrf(
    vector_hits: Vec<IndexHit>,
    fts_hits: Vec<IndexHit>,
    vector_weight: f32,
    rrf_k: f32,
) -> Vec<RetrievedChunk> {
    let fts_weight = 1.0 - vector_weight;

    let mut order: Vec<(RetrievedChunk, f32)> = Vec::new();
    let mut by_id: HashMap<Uuid, usize> = HashMap::new();

    for (rank, hit) in vector_hits.into_iter().enumerate() {
        let contribution = vector_weight / (rrf_k + (rank + 1) as f32);
        match by_id.get(&hit.id) {
            Some(&i) => order[i].1 += contribution,
            None => {
                by_id.insert(hit.id, order.len());
                order.push((to_retrieved(hit, true), contribution));
            }
        }
    }

    for (rank, hit) in fts_hits.into_iter().enumerate() {
        let contribution = fts_weight / (rrf_k + (rank + 1) as f32);
        match by_id.get(&hit.id) {
            Some(&i) => {
                order[i].1 += contribution;
                order[i].0.fts_score = hit.score;
            }
            None => {
                by_id.insert(hit.id, order.len());
                order.push((to_retrieved(hit, false), contribution));
            }
        }
    }

    let max_rrf = order
        .iter()
        .map(|(_, rrf)| *rrf)
        .fold(0.0f32, f32::max)
        .max(0.001);

    let mut fused: Vec<RetrievedChunk> = order
        .into_iter()
        .map(|(mut chunk, rrf)| {
            chunk.combined_score = rrf / max_rrf;
            chunk
        })
        .collect();
    fused.sort_by(|a, b| {
        b.combined_score
            .partial_cmp(&a.combined_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    fused
}

/// Walk the ranked list, keeping chunks until the character budget is spent
///
/// A chunk that would overflow is included as a truncated tail only when more
/// than 200 characters of budget remain; the budget is never exceeded.
fn truncate_to_budget(ranked: Vec<RetrievedChunk>, max_content_length: usize) -> Vec<RetrievedChunk> {
    let mut used = 0usize;
    let mut out = Vec::new();

    for mut chunk in ranked {
        let len = chunk.content.chars().count();
        if used + len <= max_content_length {
            used += len;
            out.push(chunk);
            continue;
        }

        let remaining = max_content_length - used;
        if remaining > 200 {
            let keep: String = chunk.content.chars().take(remaining.saturating_sub(3)).collect();
            chunk.content = format!("{}...", keep);
            out.push(chunk);
        }
        break;
    }

    out
}
