use std::sync::Arc;

use docqa_core::error::{Error, Result};
use docqa_core::retry::{retry, RetryPolicy};
use docqa_core::traits::Embedder;
use docqa_core::types::RetrievalResult;
use docqa_vector::VectorIndex;

/// Question in, scored units out. Each call is independent; nothing is cached.
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<VectorIndex>,
    retry: RetryPolicy,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<VectorIndex>) -> Self {
        Self { embedder, index, retry: RetryPolicy::default() }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub async fn retrieve(&self, question: &str, k: usize) -> Result<Vec<RetrievalResult>> {
        if k == 0 {
            return Err(Error::InvalidConfig("k must be at least 1".into()));
        }
        let query = retry(&self.retry, "embed query", || self.embedder.embed_query(question)).await?;
        let results = self.index.search(&query, k)?;
        for r in &results {
            tracing::debug!(part = r.unit.sequence_index, page = r.unit.offset.page, score = r.score, "retrieved");
        }
        Ok(results)
    }
}
