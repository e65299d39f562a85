use async_trait::async_trait;

use crate::error::Result;
use crate::types::PageText;

/// Maps text to fixed-dimensionality vectors.
///
/// `embed` must return exactly one vector per input, in input order: callers zip
/// the output back onto units by position.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Stable identifier for the provider/model (e.g. `openai:text-embedding-3-large:d3072`).
    fn id(&self) -> &str;
    /// Embedding dimensionality (D).
    fn dim(&self) -> usize;
    /// Largest unit, in characters, the provider accepts without silent truncation.
    fn max_input_chars(&self) -> usize;
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
    /// Embed a search query. Providers may add an instruction prefix here.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>>;
}

/// Produces ordered page text from raw document bytes.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, bytes: &[u8]) -> Result<Vec<PageText>>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Generates text for a composed prompt.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}
