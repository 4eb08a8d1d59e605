//! Search index traits for the two storage calls retrieval depends on

use async_trait::async_trait;
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::Result;

/// A raw candidate from a vector or full-text index
#[derive(Debug, Clone)]
pub struct IndexHit {
    /// Chunk identifier
    pub id: Uuid,
    /// Source document identifier
    pub source_id: Uuid,
    /// Source display name
    pub source_name: String,
    /// Chunk content
    pub content: String,
    /// Stored situating description, if any
    pub context: Option<String>,
    /// Provider-native score in [0,1], higher is better
    pub score: f32,
    /// Additional metadata
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Trait for top-N-by-vector-distance search, scoped to a tenant
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Return up to `limit` chunks ranked by similarity to `query_vector`
    async fn search(
        &self,
        tenant_id: Uuid,
        query_vector: &[f32],
        limit: usize,
    ) -> Result<Vec<IndexHit>>;

    /// Index name for logging
    fn name(&self) -> &str;
}

/// Trait for top-N-by-text-match search, scoped to a tenant
#[async_trait]
pub trait TextIndex: Send + Sync {
    /// Return up to `limit` chunks ranked by match score for the prepared
    /// query string (lower-cased, OR-joined terms)
    async fn search(&self, tenant_id: Uuid, query: &str, limit: usize) -> Result<Vec<IndexHit>>;

    /// Index name for logging
    fn name(&self) -> &str;
}
