use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Document has {pages} pages; the maximum is {max}.")]
    TooManyPages { pages: usize, max: usize },
    #[error("Document would be split into {chunks} chunks; the maximum is {max}.")]
    TooManyChunks { chunks: usize, max: usize },
    #[error("Unsupported file type: {0}")]
    UnsupportedFormat(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Decode error: {0}")]
    Codec(String),
    #[error("Extraction task failed: {0}")]
    Internal(String),
}

impl ExtractionError {
    /// Errors caused by the uploaded file itself. Their message is safe to
    /// show to the uploader and retrying will not change the outcome.
    pub fn is_guardrail(&self) -> bool {
        matches!(
            self,
            ExtractionError::TooManyPages { .. }
                | ExtractionError::TooManyChunks { .. }
                | ExtractionError::UnsupportedFormat(_)
        )
    }
}

impl From<std::io::Error> for ExtractionError {
    fn from(e: std::io::Error) -> Self {
        ExtractionError::Io(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ExtractionError>;
