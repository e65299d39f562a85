//! Plain-text extraction. Byte-level PDF parsing lives outside this crate.

use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::traits::TextExtractor;
use crate::types::PageText;

const PAGE_BREAK: char = '\x0c';
const PDF_MAGIC: &[u8] = b"%PDF-";

/// Reads UTF-8 text (lossy for invalid bytes) and splits pages on form feeds.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextExtractor;

impl PlainTextExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn extract_file(&self, path: &Path) -> Result<Vec<PageText>> {
        let bytes = fs::read(path)?;
        self.extract(&bytes)
    }
}

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<Vec<PageText>> {
        if bytes.starts_with(PDF_MAGIC) {
            return Err(Error::Extraction("PDF input needs an external extractor; supply plain text".into()));
        }
        let text = match std::str::from_utf8(bytes) {
            Ok(s) => s.to_string(),
            Err(_) => String::from_utf8_lossy(bytes).to_string(),
        };
        let pages: Vec<PageText> = text
            .split(PAGE_BREAK)
            .enumerate()
            .map(|(i, t)| PageText { page: i + 1, text: t.to_string() })
            .collect();
        if pages.iter().all(|p| p.text.trim().is_empty()) {
            return Err(Error::Extraction("document contains no extractable text".into()));
        }
        Ok(pages)
    }
}
