//! OpenAI-compatible `/embeddings` provider.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use docqa_core::error::{is_transient_status, Error, Result};
use docqa_core::traits::Embedder;

pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "text-embedding-3-large";
/// ~8k token request limit at a conservative three characters per token.
const MAX_INPUT_CHARS: usize = 24_000;

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

/// Native output size of the well-known OpenAI embedding models.
pub fn native_dimension(model: &str) -> Option<usize> {
    match model {
        "text-embedding-3-large" => Some(3072),
        "text-embedding-3-small" | "text-embedding-ada-002" => Some(1536),
        _ => None,
    }
}

pub struct OpenAiEmbedder {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    dims: usize,
    /// Sent only when it differs from the model's native size.
    requested_dims: Option<usize>,
    query_prefix: String,
    id: String,
}

impl OpenAiEmbedder {
    /// `dims` overrides the model's native dimension; it is required for models this crate does not know.
    pub fn new(
        api_key: String,
        model: Option<String>,
        endpoint: Option<String>,
        dims: Option<usize>,
        query_prefix: Option<String>,
    ) -> Result<Self> {
        let model = model.unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let native = native_dimension(&model);
        let dims = dims.or(native).ok_or_else(|| {
            Error::InvalidConfig(format!("embedding.dimension is required for model '{model}'"))
        })?;
        if dims == 0 {
            return Err(Error::InvalidConfig("embedding.dimension must be greater than zero".into()));
        }
        let requested_dims = if native == Some(dims) { None } else { Some(dims) };
        let endpoint = endpoint.unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()).trim_end_matches('/').to_string();
        let id = format!("openai:{model}:d{dims}");
        Ok(Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key,
            model,
            dims,
            requested_dims,
            query_prefix: query_prefix.unwrap_or_default(),
            id,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Put response items back in request order and check shape.
    fn order_response(&self, expected: usize, mut data: Vec<EmbeddingData>) -> Result<Vec<Vec<f32>>> {
        if data.len() != expected {
            return Err(Error::embedding(format!("provider returned {} embeddings for {} inputs", data.len(), expected), false));
        }
        data.sort_by_key(|d| d.index);
        for (i, d) in data.iter().enumerate() {
            if d.index != i {
                return Err(Error::embedding(format!("response indices are not 0..{expected}"), false));
            }
            if d.embedding.len() != self.dims {
                return Err(Error::DimensionMismatch { expected: self.dims, actual: d.embedding.len() });
            }
        }
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn id(&self) -> &str {
        &self.id
    }

    fn dim(&self) -> usize {
        self.dims
    }

    fn max_input_chars(&self) -> usize {
        MAX_INPUT_CHARS
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("{}/embeddings", self.endpoint);
        let request = EmbeddingRequest { model: &self.model, input: texts, dimensions: self.requested_dims };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::embedding(format!("request to {url} failed: {e}"), e.is_timeout() || e.is_connect()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::embedding(
                format!("OpenAI API error {status}: {body}"),
                is_transient_status(status.as_u16()),
            ));
        }

        let result: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| Error::embedding(format!("malformed embedding response: {e}"), false))?;
        tracing::debug!(inputs = texts.len(), model = %self.model, "embedded batch");
        self.order_response(texts.len(), result.data)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let input = vec![format!("{}{}", self.query_prefix, text)];
        self.embed(&input)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::embedding("Empty response from OpenAI", false))
    }
}
