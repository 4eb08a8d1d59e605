//! Rendering retrieved chunks for downstream prompting

use std::collections::HashMap;
use uuid::Uuid;

use crate::types::{RetrievedChunk, SourceRef};

/// Render chunks as a numbered, source-labeled context block
pub fn format_as_context(chunks: &[RetrievedChunk]) -> String {
    let mut context = String::new();

    for (i, chunk) in chunks.iter().enumerate() {
        context.push_str(&format!(
            "[{}] {} ({}% relevant)\n\n{}\n\n---\n\n",
            i + 1,
            chunk.source_name,
            chunk.relevance_percent(),
            chunk.content
        ));
    }

    context
}

/// Deduplicate sources, keeping the highest relevance seen per source
pub fn extract_sources(chunks: &[RetrievedChunk]) -> Vec<SourceRef> {
    let mut best: HashMap<Uuid, SourceRef> = HashMap::new();

    for chunk in chunks {
        let percent = chunk.relevance_percent();
        best.entry(chunk.source_id)
            .and_modify(|source| {
                if percent > source.relevance_percent {
                    source.relevance_percent = percent;
                }
            })
            .or_insert_with(|| SourceRef {
                source_id: chunk.source_id,
                source_name: chunk.source_name.clone(),
                relevance_percent: percent,
            });
    }

    let mut sources: Vec<SourceRef> = best.into_values().collect();
    sources.sort_by(|a, b| b.relevance_percent.cmp(&a.relevance_percent));
    sources
}
