//! Per-chunk situating context generation ("contextual retrieval")
//!
//! Each chunk is prefixed with a short model-generated description of what it
//! is about within its source document before embedding. Generation is best
//! effort per chunk: a failure never aborts the batch or the document.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::time::sleep;

use crate::config::ContextConfig;
use crate::error::{Error, Result};
use crate::providers::CompletionProvider;
use crate::types::{ContextualChunk, DocumentMetadata, TextChunk};

/// Generates situating descriptions for chunks via an LLM
pub struct ContextGenerator {
    provider: Arc<dyn CompletionProvider>,
    config: ContextConfig,
}

impl ContextGenerator {
    /// Create a generator from configuration
    pub fn new(provider: Arc<dyn CompletionProvider>, config: &ContextConfig) -> Self {
        Self {
            provider,
            config: config.clone(),
        }
    }

    /// Generate context for a single chunk
    ///
    /// Falls back to the deterministic template on any provider failure, so
    /// this always yields a usable chunk.
    pub async fn generate_for_chunk(
        &self,
        chunk: TextChunk,
        metadata: &DocumentMetadata,
    ) -> ContextualChunk {
        let prompt = build_chunk_prompt(&chunk, metadata, None);
        match self.request_context(&prompt).await {
            Ok(context) => ContextualChunk::new(chunk, context),
            Err(e) => {
                tracing::warn!(
                    "Context generation failed for chunk {} of '{}', using fallback: {}",
                    chunk.index,
                    metadata.name,
                    e
                );
                ContextualChunk::with_fallback(chunk, metadata)
            }
        }
    }

    /// Generate context for all chunks of a document
    ///
    /// Processes fixed-size batches sequentially with an inter-batch delay to
    /// respect provider rate limits; chunks within a batch run concurrently.
    /// `on_progress(completed, total)` fires after each batch.
    pub async fn generate_for_chunks(
        &self,
        chunks: Vec<TextChunk>,
        metadata: &DocumentMetadata,
        on_progress: Option<&(dyn Fn(usize, usize) + Send + Sync)>,
    ) -> Vec<ContextualChunk> {
        let total = chunks.len();
        let mut out: Vec<ContextualChunk> = Vec::with_capacity(total);
        let mut iter = chunks.into_iter();

        loop {
            let batch: Vec<TextChunk> = iter.by_ref().take(self.config.batch_size).collect();
            if batch.is_empty() {
                break;
            }

            let futures: Vec<_> = batch
                .into_iter()
                .map(|chunk| self.generate_for_chunk(chunk, metadata))
                .collect();
            out.extend(join_all(futures).await);

            if let Some(progress) = on_progress {
                progress(out.len(), total);
            }
            if out.len() < total {
                sleep(Duration::from_millis(self.config.batch_delay_ms)).await;
            }
        }

        out
    }

    /// Generate context with the (truncated) full document in the prompt
    ///
    /// Higher quality, higher cost. Falls back to the metadata-only path on
    /// failure.
    pub async fn generate_with_full_document(
        &self,
        chunk: TextChunk,
        metadata: &DocumentMetadata,
        document_text: &str,
    ) -> ContextualChunk {
        let truncated = truncate_chars(document_text, self.config.max_document_chars);
        let prompt = build_chunk_prompt(&chunk, metadata, Some(truncated));
        match self.request_context(&prompt).await {
            Ok(context) => ContextualChunk::new(chunk, context),
            Err(e) => {
                tracing::warn!(
                    "Full-document context generation failed for chunk {} of '{}': {}",
                    chunk.index,
                    metadata.name,
                    e
                );
                self.generate_for_chunk(chunk, metadata).await
            }
        }
    }

    async fn request_context(&self, prompt: &str) -> Result<String> {
        let text = self
            .provider
            .complete(prompt, self.config.max_context_tokens, self.config.temperature)
            .await?;
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(Error::ContextGeneration("empty completion".to_string()));
        }
        Ok(trimmed.to_string())
    }
}

/// Build the situating-context prompt for one chunk
fn build_chunk_prompt(
    chunk: &TextChunk,
    metadata: &DocumentMetadata,
    document_text: Option<&str>,
) -> String {
    let document_section = match document_text {
        Some(text) => format!("FULL DOCUMENT (may be truncated):\n{}\n\n", text),
        None => String::new(),
    };

    format!(
        r#"You are indexing a document titled "{name}" ({doc_type}) for search.

{document_section}CHUNK:
{content}

Write 2-3 short sentences situating this chunk within the document: what it is
about and how it relates to the document as a whole. Respond with the
description only, no preamble."#,
        name = metadata.name,
        doc_type = metadata.doc_type,
        document_section = document_section,
        content = chunk.content,
    )
}

/// Truncate to at most `max_chars` characters on a char boundary
fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Completion fake that fails for prompts containing a marker
    struct ScriptedCompleter {
        calls: AtomicUsize,
        fail_on: Option<String>,
    }

    impl ScriptedCompleter {
        fn new(fail_on: Option<&str>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail_on: fail_on.map(|s| s.to_string()),
            })
        }
    }

    #[async_trait]
    impl CompletionProvider for ScriptedCompleter {
        async fn complete(&self, prompt: &str, _max_tokens: usize, _temperature: f32) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(marker) = &self.fail_on {
                if prompt.contains(marker) {
                    return Err(Error::llm("provider unavailable"));
                }
            }
            Ok("This chunk covers the topic.".to_string())
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn chunk(content: &str, index: u32) -> TextChunk {
        TextChunk::new(content.to_string(), index, 0, content.len())
    }

    #[tokio::test(start_paused = true)]
    async fn test_generated_context_prefixes_content() {
        let provider = ScriptedCompleter::new(None);
        let generator = ContextGenerator::new(provider, &ContextConfig::default());
        let meta = DocumentMetadata::new("guide.md", "markdown");

        let result = generator.generate_for_chunk(chunk("Body text.", 0), &meta).await;
        assert_eq!(result.context, "This chunk covers the topic.");
        assert!(result.contextual_content.starts_with("This chunk covers the topic.\n\n"));
        assert!(result.contextual_content.ends_with("Body text."));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_substitutes_fallback_template() {
        let provider = ScriptedCompleter::new(Some("poison"));
        let generator = ContextGenerator::new(provider, &ContextConfig::default());
        let meta = DocumentMetadata::new("guide.md", "markdown");

        let result = generator.generate_for_chunk(chunk("poison pill", 0), &meta).await;
        assert_eq!(result.context, "From guide.md (markdown).");
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_failure_does_not_abort_the_batch() {
        let provider = ScriptedCompleter::new(Some("poison"));
        let generator = ContextGenerator::new(provider, &ContextConfig::default());
        let meta = DocumentMetadata::new("guide.md", "markdown");

        let chunks = vec![chunk("fine one", 0), chunk("poison pill", 1), chunk("fine two", 2)];
        let results = generator.generate_for_chunks(chunks, &meta, None).await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].context, "This chunk covers the topic.");
        assert_eq!(results[1].context, "From guide.md (markdown).");
        assert_eq!(results[2].context, "This chunk covers the topic.");
        // original order preserved
        assert_eq!(results[1].chunk.index, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_fires_per_batch() {
        let provider = ScriptedCompleter::new(None);
        let mut config = ContextConfig::default();
        config.batch_size = 2;
        let generator = ContextGenerator::new(provider, &config);
        let meta = DocumentMetadata::new("guide.md", "markdown");

        let chunks: Vec<TextChunk> = (0..5).map(|i| chunk("text", i)).collect();
        let seen: Mutex<Vec<(usize, usize)>> = Mutex::new(Vec::new());
        let record = |done: usize, total: usize| seen.lock().unwrap().push((done, total));

        let results = generator.generate_for_chunks(chunks, &meta, Some(&record)).await;

        assert_eq!(results.len(), 5);
        assert_eq!(*seen.lock().unwrap(), vec![(2, 5), (4, 5), (5, 5)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_document_mode_falls_back_to_metadata_path() {
        // Full-document prompt contains the poisoned document text, the
        // metadata-only retry does not.
        let provider = ScriptedCompleter::new(Some("poisoned-document"));
        let generator = ContextGenerator::new(provider.clone(), &ContextConfig::default());
        let meta = DocumentMetadata::new("guide.md", "markdown");

        let result = generator
            .generate_with_full_document(chunk("Body.", 0), &meta, "poisoned-document body")
            .await;

        assert_eq!(result.context, "This chunk covers the topic.");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_document_truncation_respects_char_boundaries() {
        let text = "héllo wörld";
        let truncated = truncate_chars(text, 4);
        assert_eq!(truncated, "héll");
        assert_eq!(truncate_chars("short", 100), "short");
    }

    #[test]
    fn test_prompt_names_the_document() {
        let meta = DocumentMetadata::new("handbook.pdf", "pdf");
        let prompt = build_chunk_prompt(&chunk("The content.", 0), &meta, None);
        assert!(prompt.contains("handbook.pdf"));
        assert!(prompt.contains("The content."));
        assert!(!prompt.contains("FULL DOCUMENT"));

        let with_doc = build_chunk_prompt(&chunk("The content.", 0), &meta, Some("Doc body"));
        assert!(with_doc.contains("FULL DOCUMENT"));
        assert!(with_doc.contains("Doc body"));
    }
}
