//! Ingest a document and query it, using a local Ollama server for
//! embeddings and context generation and the in-memory index for storage.
//!
//! Run with: `cargo run --example ingest_and_query`

use std::sync::Arc;

use uuid::Uuid;

use context_rag::providers::{InMemoryIndex, OllamaClient};
use context_rag::{DocumentMetadata, HybridRetriever, ProcessingPipeline, RagConfig};

const DOCUMENT: &str = "Contextual retrieval prefixes every chunk with a short \
    model-generated description before embedding. This keeps pronouns and \
    references resolvable once the chunk is separated from its document. \
    Retrieval quality improves most on corpora with many similar documents.\n\n\
    Hybrid search combines vector similarity with full-text matching. \
    Reciprocal rank fusion merges the two ranked lists. A tunable weight \
    controls how much each list contributes to the final order.";

#[tokio::main]
async fn main() -> context_rag::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = RagConfig::default();
    config.validate()?;

    let ollama = Arc::new(OllamaClient::new(&config.llm, config.embedding.dimensions));
    let index = Arc::new(InMemoryIndex::new());
    let tenant = Uuid::new_v4();
    let source = Uuid::new_v4();

    let pipeline = ProcessingPipeline::new(&config, ollama.clone(), ollama.clone());
    let metadata = DocumentMetadata::new("retrieval-notes.md", "markdown");

    let processed = pipeline
        .process(DOCUMENT, &metadata, Some(&|stage, done, total| {
            println!("  {:?}: {}/{}", stage, done, total);
        }))
        .await?;
    println!("Ingested {} chunks", processed.len());

    for chunk in &processed {
        index.insert(tenant, source, "retrieval-notes.md", chunk);
    }

    let retriever = HybridRetriever::new(&config, ollama, index.clone(), index);
    let result = retriever
        .retrieve(tenant, "how does rank fusion weigh the two lists?", None)
        .await?;

    println!(
        "\n{} chunks in {}ms ({:?} search)",
        result.chunks.len(),
        result.processing_time_ms,
        result.search_type
    );
    println!("{}", context_rag::format_as_context(&result.chunks));

    Ok(())
}
