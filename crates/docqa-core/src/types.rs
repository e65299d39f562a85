//! Domain types shared by the chunker, embedders, vector index and pipeline.

use serde::{Deserialize, Serialize};

pub type UnitId = String;

/// Where a unit came from: 1-based page number and a byte range into that page's text.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceOffset {
    pub page: usize,
    pub start: usize,
    pub end: usize,
}

/// One page (or the whole document, when the extractor has no notion of pages).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageText {
    pub page: usize,
    pub text: String,
}

/// A bounded contiguous span of document text, retrievable on its own.
///
/// - `id`: opaque, unique within a document
/// - `text`: the span itself, never padded
/// - `offset`: provenance within the source page
/// - `sequence_index`: position in document order, strictly increasing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextUnit {
    pub id: UnitId,
    pub text: String,
    pub offset: SourceOffset,
    pub sequence_index: usize,
}

/// An embedding paired with the unit it came from; `unit_id` is `None` for query vectors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingVector {
    pub unit_id: Option<UnitId>,
    pub vector: Vec<f32>,
}

impl EmbeddingVector {
    pub fn dimension(&self) -> usize {
        self.vector.len()
    }
}

/// The record a vector index keeps per unit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexEntry {
    pub unit_id: UnitId,
    pub vector: Vec<f32>,
    pub text: String,
    pub offset: SourceOffset,
    pub sequence_index: usize,
}

impl IndexEntry {
    pub fn new(unit: &TextUnit, vector: Vec<f32>) -> Self {
        Self {
            unit_id: unit.id.clone(),
            vector,
            text: unit.text.clone(),
            offset: unit.offset,
            sequence_index: unit.sequence_index,
        }
    }

    pub fn to_unit(&self) -> TextUnit {
        TextUnit {
            id: self.unit_id.clone(),
            text: self.text.clone(),
            offset: self.offset,
            sequence_index: self.sequence_index,
        }
    }
}

/// A unit scored against a query. `score` is cosine similarity in `[-1, 1]`, higher is better.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievalResult {
    pub unit: TextUnit,
    pub score: f32,
}

/// Retrieved text merged into a single grounding block, in document order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AssembledContext {
    pub text: String,
    pub source_units: Vec<UnitId>,
}
