//! Document ingestion: chunking, context generation, embedding

mod chunker;
mod context;
mod embedder;
mod pipeline;

pub use chunker::SemanticChunker;
pub use context::ContextGenerator;
pub use embedder::ChunkEmbedder;
pub use pipeline::{ProcessingPipeline, ProcessingStage, ProgressCallback};
