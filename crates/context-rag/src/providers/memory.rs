//! In-memory index implementing both search traits
//!
//! Brute-force cosine similarity for the vector path and term-overlap scoring
//! for the text path, tenant-scoped. Used by tests and by hosts that embed
//! the pipeline without an external store.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::Result;
use crate::retrieval::fts_terms;
use crate::types::ProcessedChunk;

use super::index::{IndexHit, TextIndex, VectorIndex};

struct StoredEntry {
    id: Uuid,
    source_id: Uuid,
    source_name: String,
    content: String,
    context: Option<String>,
    embedding: Vec<f32>,
    tokens: Vec<String>,
    metadata: HashMap<String, serde_json::Value>,
}

/// In-memory vector + full-text index
#[derive(Default)]
pub struct InMemoryIndex {
    entries: RwLock<HashMap<Uuid, Vec<StoredEntry>>>,
}

impl InMemoryIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a processed chunk under a tenant, returning its assigned id
    pub fn insert(
        &self,
        tenant_id: Uuid,
        source_id: Uuid,
        source_name: &str,
        chunk: &ProcessedChunk,
    ) -> Uuid {
        let id = Uuid::new_v4();
        let tokens = chunk
            .fts_tokens
            .clone()
            .unwrap_or_else(|| fts_terms(chunk.content()));

        let entry = StoredEntry {
            id,
            source_id,
            source_name: source_name.to_string(),
            content: chunk.content().to_string(),
            context: Some(chunk.contextual.context.clone()),
            embedding: chunk.embedding.clone(),
            tokens,
            metadata: chunk.contextual.chunk.metadata.clone(),
        };

        self.entries.write().entry(tenant_id).or_default().push(entry);
        id
    }

    /// Number of chunks stored for a tenant
    pub fn len(&self, tenant_id: Uuid) -> usize {
        self.entries
            .read()
            .get(&tenant_id)
            .map(|e| e.len())
            .unwrap_or(0)
    }

    /// Check whether a tenant has no chunks
    pub fn is_empty(&self, tenant_id: Uuid) -> bool {
        self.len(tenant_id) == 0
    }
}

fn cosine_sim(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a < f32::EPSILON || mag_b < f32::EPSILON {
        0.0
    } else {
        dot / (mag_a * mag_b)
    }
}

fn to_hit(entry: &StoredEntry, score: f32) -> IndexHit {
    IndexHit {
        id: entry.id,
        source_id: entry.source_id,
        source_name: entry.source_name.clone(),
        content: entry.content.clone(),
        context: entry.context.clone(),
        score,
        metadata: entry.metadata.clone(),
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn search(
        &self,
        tenant_id: Uuid,
        query_vector: &[f32],
        limit: usize,
    ) -> Result<Vec<IndexHit>> {
        let entries = self.entries.read();
        let mut hits: Vec<IndexHit> = entries
            .get(&tenant_id)
            .map(|stored| {
                stored
                    .iter()
                    .map(|e| to_hit(e, cosine_sim(query_vector, &e.embedding).max(0.0)))
                    .collect()
            })
            .unwrap_or_default();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);
        Ok(hits)
    }

    fn name(&self) -> &str {
        "memory-vector"
    }
}

#[async_trait]
impl TextIndex for InMemoryIndex {
    async fn search(&self, tenant_id: Uuid, query: &str, limit: usize) -> Result<Vec<IndexHit>> {
        let terms: Vec<&str> = query.split_whitespace().filter(|t| *t != "OR").collect();
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let entries = self.entries.read();
        let mut hits: Vec<IndexHit> = entries
            .get(&tenant_id)
            .map(|stored| {
                stored
                    .iter()
                    .filter_map(|e| {
                        let matched = terms
                            .iter()
                            .filter(|t| e.tokens.iter().any(|tok| tok == *t))
                            .count();
                        if matched > 0 {
                            Some(to_hit(e, matched as f32 / terms.len() as f32))
                        } else {
                            None
                        }
                    })
                    .collect()
            })
            .unwrap_or_default();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);
        Ok(hits)
    }

    fn name(&self) -> &str {
        "memory-fts"
    }
}
