use classifier::{ClassifyError, ServiceError};
use shared::dto::ClassificationStatus;
use shared::error::AppError;
use text_extraction::ExtractionError;
use thiserror::Error;

pub const NO_TEXT_MESSAGE: &str =
    "No extractable text found in document. The file may be scanned or image-only.";
pub const AUTH_MESSAGE: &str =
    "Classification service rejected the configured credentials. Contact an administrator.";
pub const TIMEOUT_MESSAGE: &str =
    "Classification timed out or the service was busy. Retry to reclassify.";
pub const UNAVAILABLE_MESSAGE: &str =
    "Classification service unavailable. Retry to reclassify.";
pub const MALFORMED_MESSAGE: &str =
    "Document could not be processed. The file may be corrupt or in an unexpected format.";
pub const INTERNAL_MESSAGE: &str = "Classification failed due to an internal error. Retry to reclassify.";
pub const CANCELLED_MESSAGE: &str = "Processing interrupted. Retry to reclassify.";
pub const LOW_CONFIDENCE_NOTE: &str = "Low confidence. Manual review recommended.";

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("extraction failed: {0}")]
    Extraction(#[from] ExtractionError),
    #[error("no extractable text")]
    NoText,
    #[error("classification failed: {0}")]
    Classify(#[from] ClassifyError),
    #[error("status store error: {0}")]
    Store(#[from] AppError),
    #[error("record left {expected} before the run finished")]
    Superseded { expected: &'static str },
    #[error("run cancelled")]
    Cancelled,
}

/// User-safe buckets every failure is reported through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCategory {
    InputGuardrail,
    Auth,
    Unavailable,
    MalformedInput,
    Internal,
}

impl PipelineError {
    pub fn superseded(expected: ClassificationStatus) -> Self {
        PipelineError::Superseded {
            expected: expected.as_str(),
        }
    }

    pub fn category(&self) -> FailureCategory {
        match self {
            PipelineError::Extraction(e) if e.is_guardrail() => FailureCategory::InputGuardrail,
            PipelineError::Extraction(ExtractionError::Codec(_)) => FailureCategory::MalformedInput,
            PipelineError::Extraction(_) => FailureCategory::Internal,
            PipelineError::NoText => FailureCategory::InputGuardrail,
            PipelineError::Classify(ClassifyError::Auth(_)) => FailureCategory::Auth,
            PipelineError::Classify(ClassifyError::Rejected(_)) => FailureCategory::MalformedInput,
            PipelineError::Classify(ClassifyError::Exhausted { .. }) => FailureCategory::Unavailable,
            PipelineError::Classify(ClassifyError::LimiterClosed) => FailureCategory::Internal,
            PipelineError::Store(_) | PipelineError::Superseded { .. } => FailureCategory::Internal,
            PipelineError::Cancelled => FailureCategory::Internal,
        }
    }

    /// The message persisted on the `failed` record. Guardrail messages carry
    /// only computed numbers or the file extension; everything else is fixed.
    pub fn user_message(&self) -> String {
        match self {
            PipelineError::Extraction(e) if e.is_guardrail() => e.to_string(),
            PipelineError::NoText => NO_TEXT_MESSAGE.to_string(),
            PipelineError::Cancelled => CANCELLED_MESSAGE.to_string(),
            PipelineError::Classify(ClassifyError::Exhausted {
                last: ServiceError::Timeout | ServiceError::Quota(_),
                ..
            }) => TIMEOUT_MESSAGE.to_string(),
            other => match other.category() {
                FailureCategory::Auth => AUTH_MESSAGE,
                FailureCategory::Unavailable => UNAVAILABLE_MESSAGE,
                FailureCategory::MalformedInput => MALFORMED_MESSAGE,
                FailureCategory::InputGuardrail | FailureCategory::Internal => INTERNAL_MESSAGE,
            }
            .to_string(),
        }
    }
}
