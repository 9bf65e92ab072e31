use thiserror::Error;

/// Outcome of one failed call to the classification service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("request timed out")]
    Timeout,
    #[error("quota exhausted: {0}")]
    Quota(String),
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("request rejected: {0}")]
    Rejected(String),
    #[error("transient failure: {0}")]
    Transient(String),
    #[error("empty answer")]
    Empty,
}

/// What the classifier client hands back to its caller once retrying is over.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClassifyError {
    #[error("classification service rejected the credentials: {0}")]
    Auth(String),
    #[error("classification service rejected the request: {0}")]
    Rejected(String),
    #[error("classification failed after {attempts} attempts, last error: {last}")]
    Exhausted { attempts: u32, last: ServiceError },
    #[error("concurrency limiter closed")]
    LimiterClosed,
}

impl ClassifyError {
    pub fn last_service_error(&self) -> Option<&ServiceError> {
        match self {
            ClassifyError::Exhausted { last, .. } => Some(last),
            _ => None,
        }
    }
}
