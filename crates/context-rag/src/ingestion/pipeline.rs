//! Ingestion pipeline: chunk, contextualize, embed

use std::sync::Arc;

use crate::config::RagConfig;
use crate::error::Result;
use crate::ingestion::{ChunkEmbedder, ContextGenerator, SemanticChunker};
use crate::providers::{CompletionProvider, EmbeddingProvider};
use crate::types::{ContextualChunk, DocumentMetadata, ProcessedChunk};

/// Ingestion stage, reported through the progress callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStage {
    /// Splitting the document into chunks
    Chunking,
    /// Generating per-chunk context
    Context,
    /// Generating embeddings
    Embedding,
}

/// Stage-tagged progress callback: `(stage, completed, total)`
pub type ProgressCallback = dyn Fn(ProcessingStage, usize, usize) + Send + Sync;

/// Orchestrates one document through chunking, context generation, and
/// embedding
pub struct ProcessingPipeline {
    chunker: SemanticChunker,
    context: ContextGenerator,
    embedder: ChunkEmbedder,
    skip_context: bool,
}

impl ProcessingPipeline {
    /// Create a pipeline from configuration and providers
    pub fn new(
        config: &RagConfig,
        completion: Arc<dyn CompletionProvider>,
        embedding: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self {
            chunker: SemanticChunker::new(&config.chunking),
            context: ContextGenerator::new(completion, &config.context),
            embedder: ChunkEmbedder::new(embedding, &config.embedding),
            skip_context: false,
        }
    }

    /// Skip LLM context generation; chunks get the fallback template instead
    pub fn with_context_skipped(mut self) -> Self {
        self.skip_context = true;
        self
    }

    /// Process one document into embedded chunks
    ///
    /// A document that chunks to zero pieces short-circuits to an empty
    /// result without touching the providers. Embedding failures propagate;
    /// context generation is best effort.
    pub async fn process(
        &self,
        text: &str,
        metadata: &DocumentMetadata,
        on_progress: Option<&ProgressCallback>,
    ) -> Result<Vec<ProcessedChunk>> {
        let chunks = self.chunker.chunk(text);
        let total = chunks.len();
        if let Some(progress) = on_progress {
            progress(ProcessingStage::Chunking, total, total);
        }
        if chunks.is_empty() {
            tracing::debug!("'{}' produced no chunks, skipping", metadata.name);
            return Ok(Vec::new());
        }
        tracing::info!("'{}': {} chunks, generating context...", metadata.name, total);

        let contextual: Vec<ContextualChunk> = if self.skip_context {
            let with_fallback: Vec<ContextualChunk> = chunks
                .into_iter()
                .map(|c| ContextualChunk::with_fallback(c, metadata))
                .collect();
            if let Some(progress) = on_progress {
                progress(ProcessingStage::Context, total, total);
            }
            with_fallback
        } else {
            let forward;
            let callback: Option<&(dyn Fn(usize, usize) + Send + Sync)> = match on_progress {
                Some(progress) => {
                    forward = move |done: usize, total: usize| {
                        progress(ProcessingStage::Context, done, total)
                    };
                    Some(&forward)
                }
                None => None,
            };
            self.context.generate_for_chunks(chunks, metadata, callback).await
        };

        tracing::info!("'{}': embedding {} chunks...", metadata.name, total);
        let forward;
        let callback: Option<&(dyn Fn(usize, usize) + Send + Sync)> = match on_progress {
            Some(progress) => {
                forward = move |done: usize, total: usize| {
                    progress(ProcessingStage::Embedding, done, total)
                };
                Some(&forward)
            }
            None => None,
        };
        let processed = self.embedder.embed_chunks(contextual, callback).await?;

        tracing::info!("'{}': {} chunks processed", metadata.name, processed.len());
        Ok(processed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::providers::IndexedEmbedding;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct StubCompleter;

    #[async_trait]
    impl CompletionProvider for StubCompleter {
        async fn complete(&self, _prompt: &str, _max_tokens: usize, _temperature: f32) -> Result<String> {
            Ok("Situates the chunk.".to_string())
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &str {
            "stub"
        }
    }

    struct StubEmbedder {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingProvider for StubEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![text.len() as f32, 1.0])
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<IndexedEmbedding>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts
                .iter()
                .enumerate()
                .map(|(index, text)| IndexedEmbedding {
                    index,
                    embedding: vec![text.len() as f32, 1.0],
                })
                .collect())
        }

        fn dimensions(&self) -> usize {
            2
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &str {
            "stub"
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl EmbeddingProvider for FailingEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Err(Error::embedding("down"))
        }

        fn dimensions(&self) -> usize {
            2
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(false)
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    fn test_config() -> RagConfig {
        let mut config = RagConfig::default();
        config.chunking.chunk_size = 50;
        config.chunking.chunk_overlap = 10;
        config.chunking.min_chunk_size = 5;
        config.embedding.dimensions = 2;
        config.embedding.max_retries = 1;
        config
    }

    fn document() -> String {
        let sentence = "Chunk packing keeps going nicely.";
        let para: Vec<&str> = std::iter::repeat(sentence).take(15).collect();
        format!("{}\n\n{}", para.join(" "), para.join(" "))
    }

    #[tokio::test(start_paused = true)]
    async fn test_process_runs_all_stages_in_order() {
        let pipeline = ProcessingPipeline::new(
            &test_config(),
            Arc::new(StubCompleter),
            Arc::new(StubEmbedder { calls: AtomicUsize::new(0) }),
        );
        let meta = DocumentMetadata::new("doc.txt", "text");

        let stages: Mutex<Vec<ProcessingStage>> = Mutex::new(Vec::new());
        let record = |stage: ProcessingStage, _done: usize, _total: usize| {
            let mut seen = stages.lock().unwrap();
            if seen.last() != Some(&stage) {
                seen.push(stage);
            }
        };

        let processed = pipeline.process(&document(), &meta, Some(&record)).await.unwrap();

        assert!(!processed.is_empty());
        assert_eq!(
            *stages.lock().unwrap(),
            vec![ProcessingStage::Chunking, ProcessingStage::Context, ProcessingStage::Embedding]
        );
        for chunk in &processed {
            assert!(chunk.contextual.contextual_content.starts_with("Situates the chunk.\n\n"));
            assert_eq!(chunk.embedding.len(), 2);
            assert!(chunk.fts_tokens.is_some());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_document_short_circuits() {
        let embedder = Arc::new(StubEmbedder { calls: AtomicUsize::new(0) });
        let pipeline = ProcessingPipeline::new(&test_config(), Arc::new(StubCompleter), embedder.clone());
        let meta = DocumentMetadata::new("empty.txt", "text");

        let processed = pipeline.process("   \n\n  ", &meta, None).await.unwrap();

        assert!(processed.is_empty());
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_skip_context_uses_fallback_template() {
        let pipeline = ProcessingPipeline::new(
            &test_config(),
            Arc::new(StubCompleter),
            Arc::new(StubEmbedder { calls: AtomicUsize::new(0) }),
        )
        .with_context_skipped();
        let meta = DocumentMetadata::new("doc.txt", "text");

        let processed = pipeline.process(&document(), &meta, None).await.unwrap();

        assert!(!processed.is_empty());
        for chunk in &processed {
            assert_eq!(chunk.contextual.context, "From doc.txt (text).");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_embedding_failure_fails_the_document() {
        let pipeline = ProcessingPipeline::new(
            &test_config(),
            Arc::new(StubCompleter),
            Arc::new(FailingEmbedder),
        );
        let meta = DocumentMetadata::new("doc.txt", "text");

        let result = pipeline.process(&document(), &meta, None).await;
        assert!(matches!(result, Err(Error::Embedding(_))));
    }
}
