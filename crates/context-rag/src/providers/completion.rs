//! Completion provider trait

use async_trait::async_trait;

use crate::error::Result;

/// Trait for LLM text completion, used by the context generator
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Complete a prompt, capped at `max_tokens` output tokens
    async fn complete(&self, prompt: &str, max_tokens: usize, temperature: f32) -> Result<String>;

    /// Check if the provider is healthy and available
    async fn health_check(&self) -> Result<bool>;

    /// Provider name for logging
    fn name(&self) -> &str;
}
