//! Provider abstractions for embeddings, completions, and search indexes
//!
//! Narrow capability traits keep the external services behind seams so that
//! alternate providers or in-memory fakes can be substituted in tests.

pub mod completion;
pub mod embedding;
pub mod index;
pub mod memory;
pub mod ollama;

pub use completion::CompletionProvider;
pub use embedding::{EmbeddingProvider, IndexedEmbedding};
pub use index::{IndexHit, TextIndex, VectorIndex};
pub use memory::InMemoryIndex;
pub use ollama::OllamaClient;
