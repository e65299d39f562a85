//! Ordered, bounded-concurrency embedding of text units.

use futures::stream::{self, StreamExt, TryStreamExt};

use docqa_core::config::EmbeddingSettings;
use docqa_core::error::{Error, Result};
use docqa_core::retry::{retry, RetryPolicy};
use docqa_core::traits::Embedder;
use docqa_core::types::{EmbeddingVector, TextUnit};

#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub batch_size: usize,
    /// Batches in flight at once.
    pub concurrency: usize,
    pub retry: RetryPolicy,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self { batch_size: 64, concurrency: 4, retry: RetryPolicy::default() }
    }
}

impl BatchOptions {
    pub fn from_settings(settings: &EmbeddingSettings, retry: &RetryPolicy) -> Self {
        Self { batch_size: settings.batch_size, concurrency: settings.concurrency, retry: retry.clone() }
    }
}

/// Embed every unit, returning vectors in unit order.
///
/// Batches run concurrently, but `buffered` yields them in submission order, so
/// output index `i` always belongs to `units[i]`. Units longer than the
/// provider's input cap are rejected up front instead of being truncated.
pub async fn embed_units(embedder: &dyn Embedder, units: &[TextUnit], opts: &BatchOptions) -> Result<Vec<EmbeddingVector>> {
    if units.is_empty() {
        return Ok(Vec::new());
    }
    let cap = embedder.max_input_chars();
    if let Some(u) = units.iter().find(|u| u.text.chars().count() > cap) {
        return Err(Error::InvalidConfig(format!(
            "unit {} has {} chars, above the {} char cap of {}",
            u.sequence_index,
            u.text.chars().count(),
            cap,
            embedder.id()
        )));
    }

    let texts: Vec<String> = units.iter().map(|u| u.text.clone()).collect();
    let batch_size = opts.batch_size.max(1);
    let dim = embedder.dim();
    tracing::debug!(units = units.len(), batch_size, concurrency = opts.concurrency, "embedding units");

    let batches: Vec<Vec<Vec<f32>>> = stream::iter(texts.chunks(batch_size))
        .map(|batch| async move {
            let vectors = retry(&opts.retry, "embed batch", move || embedder.embed(batch)).await?;
            if vectors.len() != batch.len() {
                return Err(Error::embedding(
                    format!("provider returned {} vectors for {} inputs", vectors.len(), batch.len()),
                    false,
                ));
            }
            if let Some(v) = vectors.iter().find(|v| v.len() != dim) {
                return Err(Error::DimensionMismatch { expected: dim, actual: v.len() });
            }
            Ok(vectors)
        })
        .buffered(opts.concurrency.max(1))
        .try_collect()
        .await?;

    Ok(units
        .iter()
        .zip(batches.into_iter().flatten())
        .map(|(unit, vector)| EmbeddingVector { unit_id: Some(unit.id.clone()), vector })
        .collect())
}
