use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

use serde::Serialize;

use docqa_complete::OpenAiChatClient;
use docqa_core::config::Settings;
use docqa_core::error::{Error, Result};
use docqa_core::retry::{retry, RetryPolicy};
use docqa_core::traits::{CompletionClient, CompletionRequest, Embedder, TextExtractor};
use docqa_core::types::{IndexEntry, PageText, RetrievalResult, UnitId};
use docqa_core::Chunker;
use docqa_embed::{build_embedder, effective_unit_cap, embed_units, BatchOptions};
use docqa_vector::VectorIndex;

use crate::assemble::ContextAssembler;
use crate::prompt::{build_prompt, INSUFFICIENT_INFORMATION, SYSTEM_PROMPT};
use crate::retriever::Retriever;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PipelineState {
    Uninitialized,
    Indexed,
    /// At least one query has been answered against the current document.
    Ready,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub source_id: String,
    pub pages: usize,
    pub units: usize,
    pub dimension: usize,
}

/// Where a passage used for an answer sits in the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Citation {
    pub unit_id: UnitId,
    pub page: usize,
    /// The unit's `sequence_index`, shown to readers as the part number.
    pub part: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Answer {
    pub text: String,
    /// Passages the answer was grounded on, in document order.
    pub sources: Vec<Citation>,
    pub num_contexts: usize,
    /// False when nothing fit the context and the model was not consulted.
    pub grounded: bool,
}

#[derive(Debug)]
struct Current {
    state: PipelineState,
    source_id: Option<String>,
}

/// One document, one index, one embedding provider.
///
/// `query` and `search` may run concurrently with each other. Running
/// `ingest` concurrently with them is not supported: callers serialize it.
/// The index still takes its write lock for the swap, so a reader sees either
/// the old document or the new one.
pub struct AnswerPipeline {
    chunker: Chunker,
    embedder: Arc<dyn Embedder>,
    index: Arc<VectorIndex>,
    retriever: Retriever,
    assembler: ContextAssembler,
    completion: Option<Arc<dyn CompletionClient>>,
    batch: BatchOptions,
    top_k: usize,
    temperature: f32,
    max_tokens: u32,
    retry: RetryPolicy,
    current: RwLock<Current>,
}

impl AnswerPipeline {
    /// Pipeline without a completion client: `ingest` and `search` work, `query` does not.
    pub fn new(settings: &Settings, embedder: Arc<dyn Embedder>) -> Result<Self> {
        settings.validate()?;
        let cap = effective_unit_cap(embedder.as_ref(), &settings.embedding);
        if settings.chunking.chunk_size > cap {
            return Err(Error::InvalidConfig(format!(
                "chunking.chunk_size ({}) exceeds the {cap} char input cap of {}",
                settings.chunking.chunk_size,
                embedder.id()
            )));
        }
        let index = Arc::new(VectorIndex::new());
        let retriever = Retriever::new(embedder.clone(), index.clone()).with_retry(settings.retry.clone());
        Ok(Self {
            chunker: Chunker::new(settings.chunking.clone())?,
            embedder,
            index,
            retriever,
            assembler: ContextAssembler::new(settings.retrieval.context_budget)?,
            completion: None,
            batch: BatchOptions::from_settings(&settings.embedding, &settings.retry),
            top_k: settings.retrieval.top_k,
            temperature: settings.completion.temperature,
            max_tokens: settings.completion.max_tokens,
            retry: settings.retry.clone(),
            current: RwLock::new(Current { state: PipelineState::Uninitialized, source_id: None }),
        })
    }

    /// Embedding provider and chat client both taken from configuration.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let embedder = build_embedder(&settings.embedding)?;
        let client = OpenAiChatClient::from_settings(&settings.completion)?;
        Ok(Self::new(settings, embedder)?.with_completion(Arc::new(client)))
    }

    pub fn with_completion(mut self, client: Arc<dyn CompletionClient>) -> Self {
        self.completion = Some(client);
        self
    }

    pub fn state(&self) -> PipelineState {
        self.current.read().unwrap_or_else(PoisonError::into_inner).state
    }

    pub fn source_id(&self) -> Option<String> {
        self.current.read().unwrap_or_else(PoisonError::into_inner).source_id.clone()
    }

    pub fn unit_count(&self) -> usize {
        self.index.len()
    }

    pub fn embedder_id(&self) -> &str {
        self.embedder.id()
    }

    pub fn chunker(&self) -> &Chunker {
        &self.chunker
    }

    /// Replace the current document with `pages`.
    ///
    /// Everything is embedded before the index is touched. On any failure the
    /// previous document (or the empty index) stays in place.
    pub async fn ingest(&self, source_id: &str, pages: &[PageText]) -> Result<IngestReport> {
        let started = Instant::now();
        let units = self.chunker.chunk_pages(source_id, pages);
        if units.is_empty() {
            return Err(Error::Extraction("document contains no extractable text".into()));
        }
        let vectors = embed_units(self.embedder.as_ref(), &units, &self.batch).await?;
        let entries: Vec<IndexEntry> =
            units.iter().zip(vectors).map(|(unit, v)| IndexEntry::new(unit, v.vector)).collect();
        self.replace_index(entries)?;

        {
            let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
            current.state = PipelineState::Indexed;
            current.source_id = Some(source_id.to_string());
        }
        let report = IngestReport {
            source_id: source_id.to_string(),
            pages: pages.iter().filter(|p| !p.text.trim().is_empty()).count(),
            units: units.len(),
            dimension: self.embedder.dim(),
        };
        tracing::info!(
            source_id,
            pages = report.pages,
            units = report.units,
            dim = report.dimension,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "document indexed"
        );
        Ok(report)
    }

    pub async fn ingest_bytes(&self, source_id: &str, bytes: &[u8], extractor: &dyn TextExtractor) -> Result<IngestReport> {
        let pages = extractor.extract(bytes)?;
        self.ingest(source_id, &pages).await
    }

    /// Ingest a file, using its file name as the source id.
    pub async fn ingest_file(&self, path: &Path, extractor: &dyn TextExtractor) -> Result<IngestReport> {
        let bytes = std::fs::read(path)?;
        let source_id = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_else(|| path.display().to_string());
        self.ingest_bytes(&source_id, &bytes, extractor).await
    }

    /// Retrieval only; no model call.
    pub async fn search(&self, question: &str, k: usize) -> Result<Vec<RetrievalResult>> {
        check_question(question)?;
        self.ensure_indexed()?;
        self.retriever.retrieve(question, k).await
    }

    /// Answer `question` from the current document using the configured `top_k`.
    pub async fn query(&self, question: &str) -> Result<Answer> {
        self.query_with_k(question, self.top_k).await
    }

    /// Answer `question` from the `k` best units. The model's output is returned as-is.
    pub async fn query_with_k(&self, question: &str, k: usize) -> Result<Answer> {
        check_question(question)?;
        self.ensure_indexed()?;
        let client = self
            .completion
            .as_ref()
            .ok_or_else(|| Error::InvalidConfig("no completion client configured".into()))?;

        let started = Instant::now();
        let results = self.retriever.retrieve(question, k).await?;
        let context = match self.assembler.assemble(&results) {
            Ok(context) => context,
            Err(Error::EmptyContext) => {
                tracing::warn!(retrieved = results.len(), "no context for question, answering without the model");
                self.mark_ready();
                return Ok(Answer {
                    text: INSUFFICIENT_INFORMATION.to_string(),
                    sources: Vec::new(),
                    num_contexts: 0,
                    grounded: false,
                });
            }
            Err(e) => return Err(e),
        };

        let request = CompletionRequest {
            system: SYSTEM_PROMPT.to_string(),
            prompt: build_prompt(&context.text, question),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };
        let text = retry(&self.retry, "completion", || client.complete(&request)).await?;
        self.mark_ready();
        tracing::info!(
            contexts = context.source_units.len(),
            context_chars = context.text.chars().count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "question answered"
        );
        let sources = context
            .source_units
            .iter()
            .filter_map(|id| results.iter().find(|r| &r.unit.id == id))
            .map(|r| Citation { unit_id: r.unit.id.clone(), page: r.unit.offset.page, part: r.unit.sequence_index })
            .collect();
        Ok(Answer { text, num_contexts: context.source_units.len(), sources, grounded: true })
    }

    fn replace_index(&self, entries: Vec<IndexEntry>) -> Result<()> {
        let mut rebuild = self.index.begin_rebuild();
        rebuild.insert(entries)?;
        rebuild.commit();
        Ok(())
    }

    fn ensure_indexed(&self) -> Result<()> {
        match self.state() {
            PipelineState::Uninitialized => Err(Error::NotReady),
            PipelineState::Indexed | PipelineState::Ready => Ok(()),
        }
    }

    fn mark_ready(&self) {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        if current.state == PipelineState::Indexed {
            current.state = PipelineState::Ready;
        }
    }
}

fn check_question(question: &str) -> Result<()> {
    if question.trim().is_empty() {
        return Err(Error::InvalidConfig("question is empty".into()));
    }
    Ok(())
}
