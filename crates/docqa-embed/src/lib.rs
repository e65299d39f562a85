//! docqa-embed
//!
//! Embedding providers behind the `docqa_core::traits::Embedder` capability set:
//! a local candle model, an OpenAI-compatible HTTP provider and a deterministic
//! hashing provider. `build_embedder` picks one from configuration.

pub mod batch;
pub mod device;
pub mod local;
pub mod pool;
pub mod remote;
pub mod tokenize;

use async_trait::async_trait;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use twox_hash::XxHash64;

use docqa_core::config::{api_key_from_env, EmbeddingProviderKind, EmbeddingSettings};
use docqa_core::error::{Error, Result};
use docqa_core::traits::Embedder;

pub use batch::{embed_units, BatchOptions};
pub use local::LocalEmbedder;
pub use pool::masked_mean_l2;
pub use remote::OpenAiEmbedder;

pub const HASH_DEFAULT_DIM: usize = 1024;

/// Feature-hashing bag of words. Deterministic and offline; useful for development and tests.
pub struct HashEmbedder {
    dim: usize,
    id: String,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim, id: format!("hash:xxh64:d{dim}") }
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        for (i, token) in text.split_whitespace().enumerate() {
            let mut hasher = XxHash64::with_seed(0);
            token.to_lowercase().hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += val + (i as f32 % 3.0) * 0.01;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 { for x in &mut v { *x /= norm; } }
        v
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn id(&self) -> &str { &self.id }
    fn dim(&self) -> usize { self.dim }
    fn max_input_chars(&self) -> usize { usize::MAX }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_text(text))
    }
}

/// Provider input cap, further limited by `embedding.max_unit_chars` when set.
pub fn effective_unit_cap(embedder: &dyn Embedder, settings: &EmbeddingSettings) -> usize {
    settings.max_unit_chars.map_or(embedder.max_input_chars(), |cap| cap.min(embedder.max_input_chars()))
}

pub fn build_embedder(settings: &EmbeddingSettings) -> Result<Arc<dyn Embedder>> {
    let embedder: Arc<dyn Embedder> = match settings.provider {
        EmbeddingProviderKind::Hash => {
            let dim = settings.dimension.unwrap_or(HASH_DEFAULT_DIM);
            if dim == 0 {
                return Err(Error::InvalidConfig("embedding.dimension must be greater than zero".into()));
            }
            Arc::new(HashEmbedder::new(dim))
        }
        EmbeddingProviderKind::OpenAi => {
            let api_key = api_key_from_env(&settings.api_key_env)?;
            Arc::new(OpenAiEmbedder::new(
                api_key,
                settings.model.clone(),
                settings.endpoint.clone(),
                settings.dimension,
                settings.query_prefix.clone(),
            )?)
        }
        EmbeddingProviderKind::Local => {
            if settings.dimension.is_some_and(|d| d != local::LOCAL_DIM) {
                return Err(Error::InvalidConfig(format!("local provider is fixed at {} dimensions", local::LOCAL_DIM)));
            }
            let model = LocalEmbedder::new(settings.model_dir.as_deref(), settings.query_prefix.clone())
                .map_err(|e| Error::InvalidConfig(format!("loading local model: {e:#}")))?;
            Arc::new(model)
        }
    };
    tracing::info!(provider = embedder.id(), dim = embedder.dim(), "embedding provider ready");
    Ok(embedder)
}
