use std::ops::Range;
use std::path::Path;

use lopdf::Document;
use tracing::{info, warn};

use crate::error::{ExtractionError, Result};
use crate::reader::PagedSource;

/// A PDF loaded once; page ranges are decoded from the in-memory document.
pub struct PdfSource {
    doc: Document,
    pages: Vec<u32>,
}

impl PdfSource {
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let doc = Document::load_mem(&bytes).map_err(|e| ExtractionError::Codec(e.to_string()))?;
        let pages: Vec<u32> = doc.get_pages().keys().copied().collect();
        info!(path = %path.display(), pages = pages.len(), "pdf loaded");
        Ok(Self { doc, pages })
    }
}

impl PagedSource for PdfSource {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn text_for_pages(&mut self, range: Range<usize>) -> Result<String> {
        let end = range.end.min(self.pages.len());
        let start = range.start.min(end);
        let numbers = &self.pages[start..end];
        if numbers.is_empty() {
            return Ok(String::new());
        }
        match self.doc.extract_text(numbers) {
            Ok(text) => Ok(text),
            Err(e) => {
                // Undecodable pages still count towards the chunk layout.
                warn!(%e, first = start + 1, last = end, "page text not decodable");
                Ok(String::new())
            }
        }
    }
}
