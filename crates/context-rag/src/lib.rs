//! context-rag: contextual retrieval pipeline for knowledge-base search
//!
//! This crate covers the ingestion and query paths of a retrieval-augmented
//! system: boundary-aware semantic chunking, per-chunk LLM-generated context
//! ("contextual retrieval"), batched embedding generation with retry, and
//! hybrid vector + full-text search fused with Reciprocal Rank Fusion.
//!
//! External services sit behind narrow capability traits
//! ([`providers::EmbeddingProvider`], [`providers::CompletionProvider`],
//! [`providers::VectorIndex`], [`providers::TextIndex`]) so alternate
//! backends or in-memory fakes can be substituted.

pub mod config;
pub mod error;
pub mod ingestion;
pub mod providers;
pub mod retrieval;
pub mod types;

pub use config::RagConfig;
pub use error::{Error, Result};
pub use ingestion::{
    ChunkEmbedder, ContextGenerator, ProcessingPipeline, ProcessingStage, SemanticChunker,
};
pub use retrieval::{extract_sources, format_as_context, HybridRetriever, RetrieveOptions};
pub use types::{
    ContextualChunk, DocumentMetadata, ProcessedChunk, RagResult, RetrievalMetrics,
    RetrievedChunk, SearchType, SourceRef, TextChunk,
};
