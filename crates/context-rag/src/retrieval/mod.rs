//! Query-time retrieval: hybrid search, score fusion, result formatting

mod format;
mod hybrid;

pub use format::{extract_sources, format_as_context};
pub use hybrid::{HybridRetriever, RetrieveOptions};

/// Normalize text into full-text search terms
///
/// Lower-cases, strips punctuation, and discards tokens shorter than three
/// characters.
pub fn fts_terms(text: &str) -> Vec<String> {
    text.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .filter(|t| t.chars().count() >= 3)
        .map(|t| t.to_string())
        .collect()
}

/// Build the OR-joined full-text query for broad recall
///
/// Returns an empty string when no usable terms remain.
pub fn prepare_fts_query(query: &str) -> String {
    fts_terms(query).join(" OR ")
}
