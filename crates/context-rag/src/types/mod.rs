//! Value objects shared across the ingestion and retrieval pipelines

pub mod chunk;
pub mod retrieval;

pub use chunk::{ContextualChunk, DocumentMetadata, ProcessedChunk, TextChunk};
pub use retrieval::{RagResult, RetrievalMetrics, RetrievedChunk, SearchType, SourceRef};
