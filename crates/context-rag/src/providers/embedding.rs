//! Embedding provider trait

use async_trait::async_trait;

use crate::error::Result;

/// One embedding from a batch call, tagged with the input position it belongs to
#[derive(Debug, Clone)]
pub struct IndexedEmbedding {
    /// Position of the input text this embedding belongs to
    pub index: usize,
    /// The embedding vector
    pub embedding: Vec<f32>,
}

/// Trait for generating text embeddings
///
/// Batch results may arrive in any order; callers must re-sort by `index`
/// before zipping back to their inputs.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts
    ///
    /// Default implementation calls `embed` sequentially, preserving order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<IndexedEmbedding>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for (index, text) in texts.iter().enumerate() {
            embeddings.push(IndexedEmbedding {
                index,
                embedding: self.embed(text).await?,
            });
        }
        Ok(embeddings)
    }

    /// Embedding dimensions (e.g. 1536)
    fn dimensions(&self) -> usize;

    /// Check if the provider is healthy and available
    async fn health_check(&self) -> Result<bool>;

    /// Provider name for logging
    fn name(&self) -> &str;
}
