use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{PageText, SourceOffset, TextUnit, UnitId};

const PARAGRAPH_BREAKS: &[&str] = &["\n\n"];
const SENTENCE_BREAKS: &[&str] = &[". ", "! ", "? ", "\n"];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Window length in characters.
    pub chunk_size: usize,
    /// Characters shared by consecutive windows.
    pub overlap: usize,
    /// How far back from a hard cut to look for a paragraph or sentence break.
    pub boundary_lookback: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { chunk_size: 1000, overlap: 200, boundary_lookback: 200 }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::InvalidConfig("chunk_size must be greater than zero".into()));
        }
        if self.overlap >= self.chunk_size {
            return Err(Error::InvalidConfig(format!(
                "overlap ({}) must be smaller than chunk_size ({})",
                self.overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// Sliding-window splitter producing overlapping, order-preserving text units.
///
/// Consecutive units of a page always share exactly `overlap` characters, so
/// dropping that prefix from every unit but the first reconstructs the page.
#[derive(Debug, Clone)]
pub struct Chunker {
    config: ChunkingConfig,
}

impl Chunker {
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    /// Chunk untagged text; every unit is attributed to page 1.
    pub fn chunk(&self, source_id: &str, full_text: &str) -> Vec<TextUnit> {
        self.chunk_pages(source_id, &[PageText { page: 1, text: full_text.to_string() }])
    }

    /// Chunk page-tagged text. Windows never cross a page; `sequence_index` keeps counting across pages.
    pub fn chunk_pages(&self, source_id: &str, pages: &[PageText]) -> Vec<TextUnit> {
        let mut units = Vec::new();
        for page in pages {
            if page.text.trim().is_empty() {
                continue;
            }
            for (start, end) in self.windows(&page.text) {
                let sequence_index = units.len();
                units.push(TextUnit {
                    id: unit_id(source_id, sequence_index),
                    text: page.text[start..end].to_string(),
                    offset: SourceOffset { page: page.page, start, end },
                    sequence_index,
                });
            }
        }
        tracing::debug!(source_id, pages = pages.len(), units = units.len(), "chunked document");
        units
    }

    /// Byte ranges of each window over `text`.
    fn windows(&self, text: &str) -> Vec<(usize, usize)> {
        // bounds[c] is the byte offset of char c; the last element is text.len().
        let bounds: Vec<usize> = text.char_indices().map(|(i, _)| i).chain(std::iter::once(text.len())).collect();
        let total = bounds.len() - 1;
        let mut out = Vec::new();
        if total == 0 {
            return out;
        }
        let mut start = 0usize;
        loop {
            let hard_end = (start + self.config.chunk_size).min(total);
            let end = if hard_end == total { total } else { self.soft_end(text, &bounds, start, hard_end) };
            out.push((bounds[start], bounds[end]));
            if end == total {
                break;
            }
            start = end - self.config.overlap;
        }
        out
    }

    /// Latest paragraph break, else latest sentence break, within the lookback window; else `hard_end`.
    fn soft_end(&self, text: &str, bounds: &[usize], start: usize, hard_end: usize) -> usize {
        // The next window starts at `end - overlap`, which must stay past `start`.
        let earliest = hard_end.saturating_sub(self.config.boundary_lookback).max(start + self.config.overlap + 1);
        for breaks in [PARAGRAPH_BREAKS, SENTENCE_BREAKS] {
            let found = (earliest..=hard_end).rev().find(|&c| {
                let head = &text[..bounds[c]];
                breaks.iter().any(|b| head.ends_with(b))
            });
            if let Some(c) = found {
                return c;
            }
        }
        hard_end
    }
}

/// Chunk `full_text` with the default boundary lookback.
pub fn chunk(full_text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<TextUnit>> {
    let chunker = Chunker::new(ChunkingConfig { chunk_size, overlap, ..ChunkingConfig::default() })?;
    Ok(chunker.chunk("document", full_text))
}

fn unit_id(source_id: &str, sequence_index: usize) -> UnitId {
    blake3::hash(format!("{source_id}:{sequence_index}").as_bytes()).to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn soft_end_prefers_paragraph_over_sentence() {
        let chunker = Chunker::new(ChunkingConfig { chunk_size: 20, overlap: 2, boundary_lookback: 15 }).unwrap();
        let text = "aaaa\n\nbbbb. cccccccccccccccccc";
        let units = chunker.chunk("doc", text);
        assert_eq!(units[0].text, "aaaa\n\n");
        assert_eq!(units[1].offset.start, 4);
    }

    #[test]
    fn soft_end_never_stalls_progress() {
        // A break right after the overlap region would make the next window start where this one did.
        let chunker = Chunker::new(ChunkingConfig { chunk_size: 10, overlap: 5, boundary_lookback: 10 }).unwrap();
        let text = "abcd. efghijklmnopqrstuvwxyz";
        let units = chunker.chunk("doc", text);
        for pair in units.windows(2) {
            assert!(pair[1].offset.start > pair[0].offset.start);
        }
        assert_eq!(units.last().unwrap().offset.end, text.len());
    }
}
