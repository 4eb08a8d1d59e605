//! Chunk types produced by the ingestion pipeline

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A contiguous passage of a source document
///
/// Chunks for one document are contiguous and ordered by `index`. Offsets
/// refer to the normalized source text handed to the chunker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextChunk {
    /// Chunk text
    pub content: String,
    /// 0-based position within the document, insertion order
    pub index: u32,
    /// Start offset into the source text
    pub start_char: usize,
    /// End offset into the source text (exclusive)
    pub end_char: usize,
    /// Additional metadata (token estimates, overlap info)
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl TextChunk {
    /// Create a new chunk
    pub fn new(content: String, index: u32, start_char: usize, end_char: usize) -> Self {
        Self {
            content,
            index,
            start_char,
            end_char,
            metadata: HashMap::new(),
        }
    }

    /// Token estimate recorded by the chunker, if present
    pub fn estimated_tokens(&self) -> Option<u64> {
        self.metadata.get("estimated_tokens").and_then(|v| v.as_u64())
    }
}

/// Metadata describing the document a chunk came from
///
/// Passed through unchanged to context generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Document name (filename, page title, ...)
    pub name: String,
    /// Document type ("pdf", "webpage", "note", ...)
    #[serde(rename = "type")]
    pub doc_type: String,
    /// Open fields forwarded untouched
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl DocumentMetadata {
    /// Create metadata with name and type
    pub fn new(name: impl Into<String>, doc_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            doc_type: doc_type.into(),
            extra: HashMap::new(),
        }
    }

    /// Deterministic context used when generation fails or is skipped
    pub fn fallback_context(&self) -> String {
        format!("From {} ({}).", self.name, self.doc_type)
    }
}

/// A chunk with its model-generated situating description
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextualChunk {
    /// The underlying chunk
    pub chunk: TextChunk,
    /// Short situating description of the chunk within its document
    pub context: String,
    /// Embedding input: `context + "\n\n" + content`
    pub contextual_content: String,
}

impl ContextualChunk {
    /// Combine a chunk with its generated context
    pub fn new(chunk: TextChunk, context: String) -> Self {
        let contextual_content = if context.is_empty() {
            chunk.content.clone()
        } else {
            format!("{}\n\n{}", context, chunk.content)
        };
        Self {
            chunk,
            context,
            contextual_content,
        }
    }

    /// Combine a chunk with the fallback context template
    pub fn with_fallback(chunk: TextChunk, metadata: &DocumentMetadata) -> Self {
        Self::new(chunk, metadata.fallback_context())
    }
}

/// A fully processed chunk, ready to hand to the caller for persistence
///
/// Created once per chunk and immutable thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedChunk {
    /// The contextual chunk
    pub contextual: ContextualChunk,
    /// Dense vector over `contextual_content`, length equals the model dimensionality
    pub embedding: Vec<f32>,
    /// Normalized tokens for full-text indexing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fts_tokens: Option<Vec<String>>,
    /// Processing timestamp
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl ProcessedChunk {
    /// Create a processed chunk
    pub fn new(contextual: ContextualChunk, embedding: Vec<f32>) -> Self {
        Self {
            contextual,
            embedding,
            fts_tokens: None,
            created_at: chrono::Utc::now(),
        }
    }

    /// The raw chunk content
    pub fn content(&self) -> &str {
        &self.contextual.chunk.content
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contextual_content_starts_with_context() {
        let chunk = TextChunk::new("The payload.".to_string(), 0, 0, 12);
        let contextual = ContextualChunk::new(chunk, "About payloads.".to_string());

        assert!(contextual.contextual_content.starts_with("About payloads."));
        assert!(contextual.contextual_content.ends_with("The payload."));
        assert!(contextual.contextual_content.contains("\n\n"));
    }

    #[test]
    fn test_empty_context_falls_through_to_content() {
        let chunk = TextChunk::new("Just text.".to_string(), 0, 0, 10);
        let contextual = ContextualChunk::new(chunk, String::new());

        assert_eq!(contextual.contextual_content, "Just text.");
    }

    #[test]
    fn test_fallback_template() {
        let meta = DocumentMetadata::new("handbook.pdf", "pdf");
        assert_eq!(meta.fallback_context(), "From handbook.pdf (pdf).");

        let chunk = TextChunk::new("Body.".to_string(), 3, 10, 15);
        let contextual = ContextualChunk::with_fallback(chunk, &meta);
        assert!(contextual.contextual_content.starts_with("From handbook.pdf (pdf)."));
    }
}
