//! Embedding generation with batching and retry
//!
//! Unlike context generation, embedding is not best effort: a chunk without
//! an embedding cannot be searched, so exhausted retries fail the whole
//! batch and propagate to the caller.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;

use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};
use crate::providers::EmbeddingProvider;
use crate::retrieval::fts_terms;
use crate::types::{ContextualChunk, ProcessedChunk};

/// Batched embedder over an embedding provider
pub struct ChunkEmbedder {
    provider: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
    max_retries: u32,
}

impl ChunkEmbedder {
    /// Create an embedder from configuration
    pub fn new(provider: Arc<dyn EmbeddingProvider>, config: &EmbeddingConfig) -> Self {
        Self {
            provider,
            batch_size: config.batch_size.max(1),
            max_retries: config.max_retries.max(1),
        }
    }

    /// Retry an operation with exponential backoff
    ///
    /// Attempt `n` sleeps `2^(n-1)` seconds before the next try; after
    /// `max_retries` attempts the last error propagates.
    async fn retry<F, Fut, T>(&self, what: &str, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut last_error = None;

        for attempt in 1..=self.max_retries {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    last_error = Some(e);
                    if attempt < self.max_retries {
                        let delay = Duration::from_secs(2u64.pow(attempt - 1));
                        tracing::warn!(
                            "{} failed (attempt {}/{}), retrying in {:?}",
                            what,
                            attempt,
                            self.max_retries,
                            delay
                        );
                        sleep(delay).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| Error::embedding("no attempts made")))
    }

    /// Embed a single contextual chunk
    pub async fn embed_chunk(&self, chunk: ContextualChunk) -> Result<ProcessedChunk> {
        let embedding = self
            .retry("embedding", || self.provider.embed(&chunk.contextual_content))
            .await?;
        self.check_dimensions(&embedding)?;

        let mut processed = ProcessedChunk::new(chunk, embedding);
        processed.fts_tokens = Some(fts_terms(processed.content()));
        Ok(processed)
    }

    /// Embed all chunks of a document in provider-sized batches
    ///
    /// The provider may return batch results out of input order; results are
    /// re-sorted by their returned index before being zipped back to chunks.
    /// `on_progress(completed, total)` fires after each batch.
    pub async fn embed_chunks(
        &self,
        chunks: Vec<ContextualChunk>,
        on_progress: Option<&(dyn Fn(usize, usize) + Send + Sync)>,
    ) -> Result<Vec<ProcessedChunk>> {
        let total = chunks.len();
        let mut out: Vec<ProcessedChunk> = Vec::with_capacity(total);
        let mut iter = chunks.into_iter();

        loop {
            let batch: Vec<ContextualChunk> = iter.by_ref().take(self.batch_size).collect();
            if batch.is_empty() {
                break;
            }

            let texts: Vec<String> = batch.iter().map(|c| c.contextual_content.clone()).collect();
            let mut results = self
                .retry("embedding batch", || self.provider.embed_batch(&texts))
                .await?;

            if results.len() != batch.len() {
                return Err(Error::Embedding(format!(
                    "provider returned {} embeddings for {} inputs",
                    results.len(),
                    batch.len()
                )));
            }
            results.sort_by_key(|r| r.index);

            for (chunk, result) in batch.into_iter().zip(results) {
                self.check_dimensions(&result.embedding)?;
                let mut processed = ProcessedChunk::new(chunk, result.embedding);
                processed.fts_tokens = Some(fts_terms(processed.content()));
                out.push(processed);
            }

            if let Some(progress) = on_progress {
                progress(out.len(), total);
            }
        }

        Ok(out)
    }

    /// Embed a search query
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let embedding = self.retry("query embedding", || self.provider.embed(text)).await?;
        self.check_dimensions(&embedding)?;
        Ok(embedding)
    }

    fn check_dimensions(&self, embedding: &[f32]) -> Result<()> {
        let expected = self.provider.dimensions();
        if embedding.len() != expected {
            return Err(Error::Embedding(format!(
                "expected {} dimensions, provider returned {}",
                expected,
                embedding.len()
            )));
        }
        Ok(())
    }
}
