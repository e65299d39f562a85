//! Local BGE-M3 embeddings via candle.
//!
//! Expects `tokenizer.json`, `config.json` and `pytorch_model.bin` in the model
//! directory. Vectors are masked-mean pooled and L2-normalised.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::xlm_roberta::{Config as XLMRobertaConfig, XLMRobertaModel};
use tokenizers::Tokenizer;

use docqa_core::config::expand_path;
use docqa_core::error::Error;
use docqa_core::traits::Embedder;

use crate::device::select_device;
use crate::pool::masked_mean_l2;
use crate::tokenize::tokenize_on_device;

pub const LOCAL_DIM: usize = 1024;
/// Token window per input.
const MAX_TOKENS: usize = 512;
/// Roughly four characters per token keeps units inside the token window.
const MAX_INPUT_CHARS: usize = MAX_TOKENS * 4;

struct LocalModel {
    model: XLMRobertaModel,
    tokenizer: Tokenizer,
    device: Device,
}

/// Forward passes run on tokio's blocking pool, so concurrent batches from
/// `embed_units` overlap instead of stalling a runtime worker.
pub struct LocalEmbedder {
    inner: Arc<LocalModel>,
    id: String,
    query_prefix: String,
}

impl LocalEmbedder {
    pub fn new(model_dir: Option<&str>, query_prefix: Option<String>) -> Result<Self> {
        let device = select_device();
        let model_dir = resolve_model_dir(model_dir)?;
        tracing::info!(dir = %model_dir.display(), "loading BGE-M3 model");
        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;
        let config_path = model_dir.join("config.json");
        let config: XLMRobertaConfig = serde_json::from_str(&std::fs::read_to_string(&config_path)?)?;
        let weights_path = model_dir.join("pytorch_model.bin");
        let weights = candle_core::pickle::read_all(&weights_path)?;
        let weights_map: std::collections::HashMap<String, Tensor> = weights.into_iter().collect();
        let vb = VarBuilder::from_tensors(weights_map, DType::F32, &device);
        let model = XLMRobertaModel::new(&config, vb)?;
        tracing::info!("BGE-M3 model loaded");
        Ok(Self {
            inner: Arc::new(LocalModel { model, tokenizer, device }),
            id: format!("local:bge-m3:d{LOCAL_DIM}"),
            query_prefix: query_prefix.unwrap_or_default(),
        })
    }
}

impl LocalModel {
    fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let start = Instant::now();
        let (input_ids, attention_mask) = tokenize_on_device(&self.tokenizer, text, MAX_TOKENS, &self.device)?;
        let token_type_ids = Tensor::zeros((1, MAX_TOKENS), DType::I64, &self.device)?;
        let hidden = self.model.forward(&input_ids, &attention_mask, &token_type_ids, None, None, None)?;
        let pooled = masked_mean_l2(&hidden, &attention_mask)?;
        let v: Vec<f32> = pooled.to_device(&Device::Cpu)?.squeeze(0)?.to_vec1()?;
        if v.len() != LOCAL_DIM {
            return Err(anyhow!("model produced {}-d vector, expected {}", v.len(), LOCAL_DIM));
        }
        if start.elapsed().as_millis() > 100 { tracing::debug!(ms = start.elapsed().as_millis() as u64, "slow embedding"); }
        Ok(v)
    }
}

/// Run CPU-bound model work off the async workers.
async fn run_blocking<T, F>(work: F) -> docqa_core::Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| Error::embedding(format!("local model task failed: {e}"), false))?
        .map_err(|e| Error::embedding(format!("local model: {e:#}"), false))
}

#[async_trait]
impl Embedder for LocalEmbedder {
    fn id(&self) -> &str { &self.id }
    fn dim(&self) -> usize { LOCAL_DIM }
    fn max_input_chars(&self) -> usize { MAX_INPUT_CHARS }

    async fn embed(&self, texts: &[String]) -> docqa_core::Result<Vec<Vec<f32>>> {
        let model = self.inner.clone();
        let texts = texts.to_vec();
        run_blocking(move || texts.iter().map(|t| model.embed_one(t)).collect()).await
    }

    async fn embed_query(&self, text: &str) -> docqa_core::Result<Vec<f32>> {
        let model = self.inner.clone();
        let query = format!("{}{}", self.query_prefix, text);
        run_blocking(move || model.embed_one(&query)).await
    }
}

fn resolve_model_dir(configured: Option<&str>) -> Result<PathBuf> {
    if let Some(dir) = configured { let p = expand_path(dir); if p.exists() { return Ok(p); } return Err(anyhow!("Configured model dir {} does not exist", p.display())); }
    if let Ok(dir) = std::env::var("APP_MODEL_DIR") { let p = PathBuf::from(&dir); if p.exists() { return Ok(p); } }
    if let Ok(dir) = std::env::var("MODEL_DIR") { let p = PathBuf::from(&dir); if p.exists() { return Ok(p); } }
    let root = Path::new("../models/bge-m3"); if root.exists() { return Ok(root.to_path_buf()); }
    let legacy = Path::new("models/bge-m3"); if legacy.exists() { return Ok(legacy.to_path_buf()); }
    Err(anyhow!("Could not locate BGE-M3 model directory"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn blocking_work_does_not_serialize_on_the_worker() {
        let started = Instant::now();
        let slow = || {
            run_blocking(|| {
                std::thread::sleep(Duration::from_millis(200));
                Ok(1usize)
            })
        };
        let (a, b, c) = futures::join!(slow(), slow(), slow());
        assert_eq!(a.unwrap() + b.unwrap() + c.unwrap(), 3);
        assert!(started.elapsed() < Duration::from_millis(550), "took {:?}", started.elapsed());
    }

    #[tokio::test]
    async fn model_failures_become_embedding_errors() {
        let err = run_blocking::<(), _>(|| Err(anyhow!("weights missing"))).await.unwrap_err();
        assert!(matches!(err, Error::Embedding { transient: false, .. }));
        assert!(err.to_string().contains("weights missing"));
    }
}
