use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use docqa_core::error::{Error, Result};
use docqa_core::retry::RetryPolicy;
use docqa_core::traits::Embedder;
use docqa_core::types::{SourceOffset, TextUnit};
use docqa_embed::{embed_units, BatchOptions};

fn units(n: usize) -> Vec<TextUnit> {
    (0..n)
        .map(|i| TextUnit {
            id: format!("u{i}"),
            text: format!("{i}"),
            offset: SourceOffset { page: 1, start: i, end: i + 1 },
            sequence_index: i,
        })
        .collect()
}

/// Encodes the parsed number as the vector; earlier batches finish last.
struct SlowFirst;

#[async_trait]
impl Embedder for SlowFirst {
    fn id(&self) -> &str { "slow-first" }
    fn dim(&self) -> usize { 1 }
    fn max_input_chars(&self) -> usize { 8 }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let first: u64 = texts[0].parse().unwrap_or(0);
        tokio::time::sleep(Duration::from_millis(40u64.saturating_sub(first * 5))).await;
        Ok(texts.iter().map(|t| vec![t.parse::<f32>().unwrap_or(-1.0)]).collect())
    }
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        Ok(vec![text.parse::<f32>().unwrap_or(-1.0)])
    }
}

/// Fails transiently on its first call.
struct FlakyOnce { calls: AtomicUsize }

#[async_trait]
impl Embedder for FlakyOnce {
    fn id(&self) -> &str { "flaky" }
    fn dim(&self) -> usize { 2 }
    fn max_input_chars(&self) -> usize { 100 }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            return Err(Error::embedding("503", true));
        }
        Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
    }
    async fn embed_query(&self, _text: &str) -> Result<Vec<f32>> { Ok(vec![1.0, 0.0]) }
}

/// Drops the last vector of every batch.
struct ShortChanged;

#[async_trait]
impl Embedder for ShortChanged {
    fn id(&self) -> &str { "short" }
    fn dim(&self) -> usize { 1 }
    fn max_input_chars(&self) -> usize { 100 }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().skip(1).map(|_| vec![1.0]).collect())
    }
    async fn embed_query(&self, _text: &str) -> Result<Vec<f32>> { Ok(vec![1.0]) }
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy { max_attempts: 3, initial_backoff_ms: 1, max_backoff_ms: 2 }
}

#[tokio::test]
async fn concurrent_batches_are_reassembled_in_order() {
    let input = units(8);
    let opts = BatchOptions { batch_size: 1, concurrency: 8, retry: fast_retry() };
    let out = embed_units(&SlowFirst, &input, &opts).await.expect("embed");
    assert_eq!(out.len(), 8);
    for (i, e) in out.iter().enumerate() {
        assert_eq!(e.unit_id.as_deref(), Some(format!("u{i}").as_str()));
        assert_eq!(e.vector, vec![i as f32]);
    }
}

#[tokio::test]
async fn transient_failures_are_retried() {
    let embedder = FlakyOnce { calls: AtomicUsize::new(0) };
    let opts = BatchOptions { batch_size: 4, concurrency: 1, retry: fast_retry() };
    let out = embed_units(&embedder, &units(3), &opts).await.expect("embed");
    assert_eq!(out.len(), 3);
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn transient_failures_surface_without_retry_budget() {
    let embedder = FlakyOnce { calls: AtomicUsize::new(0) };
    let opts = BatchOptions { batch_size: 4, concurrency: 1, retry: RetryPolicy::none() };
    let res = embed_units(&embedder, &units(3), &opts).await;
    assert!(matches!(res, Err(Error::Embedding { transient: true, .. })));
}

#[tokio::test]
async fn wrong_vector_count_is_an_error() {
    let opts = BatchOptions { batch_size: 2, concurrency: 2, retry: fast_retry() };
    let res = embed_units(&ShortChanged, &units(4), &opts).await;
    assert!(matches!(res, Err(Error::Embedding { transient: false, .. })));
}

#[tokio::test]
async fn oversized_units_are_rejected_before_any_call() {
    let mut input = units(2);
    input[1].text = "123456789".into();
    let opts = BatchOptions::default();
    let res = embed_units(&SlowFirst, &input, &opts).await;
    assert!(matches!(res, Err(Error::InvalidConfig(_))));
}

#[tokio::test]
async fn no_units_means_no_calls() {
    let out = embed_units(&ShortChanged, &[], &BatchOptions::default()).await.expect("embed");
    assert!(out.is_empty());
}
