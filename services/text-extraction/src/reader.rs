//! The "open a stored document" capability the extractor is written against,
//! plus the file-system implementation that picks a codec by extension.

use std::ops::Range;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{ExtractionError, Result};
use crate::{docx, pdf, txt};

/// A document opened once; text is pulled from it by page range.
pub trait PagedSource: Send {
    fn page_count(&self) -> usize;

    /// Text of the zero-based, half-open page range `pages`.
    fn text_for_pages(&mut self, pages: Range<usize>) -> Result<String>;
}

pub enum OpenedDocument {
    Paginated(Box<dyn PagedSource>),
    /// Formats without pages are decoded in one go.
    Flat(String),
}

pub trait DocumentReader: Send + Sync {
    fn open(&self, storage_ref: &str) -> Result<OpenedDocument>;
}

/// Resolves storage references against a root directory (absolute references
/// are used as-is) and dispatches on the file extension.
#[derive(Debug, Clone)]
pub struct FileReader {
    root: PathBuf,
}

impl FileReader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, storage_ref: &str) -> PathBuf {
        self.root.join(storage_ref)
    }
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default()
}

impl DocumentReader for FileReader {
    fn open(&self, storage_ref: &str) -> Result<OpenedDocument> {
        let path = self.resolve(storage_ref);
        let ext = extension(&path);
        debug!(path = %path.display(), %ext, "opening document");
        match ext.as_str() {
            "pdf" => Ok(OpenedDocument::Paginated(Box::new(pdf::PdfSource::load(&path)?))),
            "docx" => Ok(OpenedDocument::Flat(docx::read_text(&path)?)),
            "txt" => Ok(OpenedDocument::Flat(txt::read_text(&path)?)),
            "" => Err(ExtractionError::UnsupportedFormat("(none)".into())),
            other => Err(ExtractionError::UnsupportedFormat(format!(".{other}"))),
        }
    }
}
