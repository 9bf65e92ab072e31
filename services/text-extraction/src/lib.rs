//! Turns a stored document into text for classification: a single unit for
//! short documents, ordered page-range chunks for long paginated ones.

use std::ops::Range;
use std::sync::Arc;

use shared::config::ExtractionLimits;
use tracing::{info, warn};

pub mod docx;
pub mod error;
pub mod pdf;
pub mod reader;
pub mod txt;

pub use error::ExtractionError;
pub use reader::{DocumentReader, FileReader, OpenedDocument, PagedSource};

use error::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextUnit {
    Single(String),
    Chunks(Vec<String>),
}

impl TextUnit {
    /// Number of units sent for classification, blank ones included.
    pub fn unit_count(&self) -> usize {
        match self {
            TextUnit::Single(_) => 1,
            TextUnit::Chunks(c) => c.len(),
        }
    }

    /// True when no unit carries any non-whitespace text.
    pub fn has_no_text(&self) -> bool {
        match self {
            TextUnit::Single(s) => s.trim().is_empty(),
            TextUnit::Chunks(c) => c.iter().all(|s| s.trim().is_empty()),
        }
    }

    pub fn into_chunks(self) -> Vec<String> {
        match self {
            TextUnit::Single(s) => vec![s],
            TextUnit::Chunks(c) => c,
        }
    }
}

#[derive(Clone)]
pub struct Extractor {
    reader: Arc<dyn DocumentReader>,
    limits: ExtractionLimits,
}

impl Extractor {
    pub fn new(reader: Arc<dyn DocumentReader>, limits: ExtractionLimits) -> Self {
        Self { reader, limits }
    }

    /// Codec work is blocking, so it runs on the blocking pool.
    pub async fn extract(&self, storage_ref: &str) -> Result<TextUnit> {
        let reader = Arc::clone(&self.reader);
        let limits = self.limits;
        let storage_ref = storage_ref.to_string();
        tokio::task::spawn_blocking(move || extract_blocking(reader.as_ref(), &storage_ref, limits))
            .await
            .map_err(|e| ExtractionError::Internal(e.to_string()))?
    }
}

fn extract_blocking(
    reader: &dyn DocumentReader,
    storage_ref: &str,
    limits: ExtractionLimits,
) -> Result<TextUnit> {
    match reader.open(storage_ref)? {
        OpenedDocument::Flat(text) => Ok(TextUnit::Single(truncate(text, limits.max_text_chars))),
        OpenedDocument::Paginated(mut source) => {
            let pages = source.page_count();
            if pages > limits.max_pages {
                return Err(ExtractionError::TooManyPages {
                    pages,
                    max: limits.max_pages,
                });
            }
            if pages <= limits.pages_per_chunk {
                return Ok(TextUnit::Single(source.text_for_pages(0..pages)?));
            }
            let plan = plan_chunks(pages, limits.pages_per_chunk);
            if plan.len() > limits.max_chunks {
                return Err(ExtractionError::TooManyChunks {
                    chunks: plan.len(),
                    max: limits.max_chunks,
                });
            }
            info!(pages, chunks = plan.len(), "splitting document into chunks");
            let chunks = plan
                .into_iter()
                .map(|range| source.text_for_pages(range))
                .collect::<Result<Vec<_>>>()?;
            Ok(TextUnit::Chunks(chunks))
        }
    }
}

/// Zero-based page ranges of at most `per_chunk` pages covering `pages`.
pub fn plan_chunks(pages: usize, per_chunk: usize) -> Vec<Range<usize>> {
    let per_chunk = per_chunk.max(1);
    (0..pages)
        .step_by(per_chunk)
        .map(|start| start..(start + per_chunk).min(pages))
        .collect()
}

fn truncate(mut text: String, max_chars: usize) -> String {
    if let Some((cut, _)) = text.char_indices().nth(max_chars) {
        warn!(
            max_chars,
            total_chars = text.chars().count(),
            "text exceeds limit, truncating"
        );
        text.truncate(cut);
    }
    text
}
