use std::sync::Arc;

use shared::config::ClassifierConfig;
use shared::dto::Label;
use tokio::time::{sleep, timeout};
use tracing::{info, warn};

use crate::error::{ClassifyError, ServiceError};
use crate::limiter::ConcurrencyLimiter;
use crate::prompt;
use crate::response::{self, ServiceReply};
use crate::service::ClassificationService;

/// Classifies one chunk of text: bounded concurrency, per-attempt timeout,
/// retries for transient failures and thresholding of the verdict.
#[derive(Clone)]
pub struct ClassifierClient {
    service: Arc<dyn ClassificationService>,
    limiter: ConcurrencyLimiter,
    config: ClassifierConfig,
}

impl ClassifierClient {
    pub fn new(
        service: Arc<dyn ClassificationService>,
        limiter: ConcurrencyLimiter,
        config: ClassifierConfig,
    ) -> Self {
        Self {
            service,
            limiter,
            config,
        }
    }

    /// Returns `(Unclassified, _)` for blank text, unparseable answers and
    /// verdicts below the confidence threshold. Only retry exhaustion and
    /// permanent service failures are errors.
    pub async fn classify(&self, text: &str) -> Result<(Label, f64), ClassifyError> {
        if text.trim().is_empty() {
            return Ok((Label::Unclassified, 0.0));
        }
        let prompt = prompt::build(text);
        // The permit covers the whole retry sequence, backoff included.
        let _permit = self
            .limiter
            .acquire()
            .await
            .map_err(|_| ClassifyError::LimiterClosed)?;

        let max_attempts = self.config.max_attempts.max(1);
        let mut last = ServiceError::Empty;
        for attempt in 1..=max_attempts {
            let outcome = match timeout(self.config.request_timeout, self.service.complete(&prompt)).await {
                Ok(outcome) => outcome,
                Err(_) => Err(ServiceError::Timeout),
            };
            match outcome {
                Ok(answer) if answer.trim().is_empty() => {
                    warn!(attempt, "empty answer from classification service");
                    last = ServiceError::Empty;
                }
                Ok(answer) => return Ok(self.threshold(response::decode(&answer))),
                Err(ServiceError::Auth(detail)) => {
                    warn!(attempt, %detail, "classification service rejected credentials");
                    return Err(ClassifyError::Auth(detail));
                }
                Err(ServiceError::Rejected(detail)) => {
                    warn!(attempt, %detail, "classification service rejected request");
                    return Err(ClassifyError::Rejected(detail));
                }
                Err(err @ ServiceError::Quota(_)) => {
                    warn!(attempt, %err, "quota exhausted");
                    last = err;
                    if attempt < max_attempts {
                        sleep(self.config.quota_backoff_base * 2u32.saturating_pow(attempt)).await;
                    }
                }
                Err(err) => {
                    warn!(attempt, %err, "retryable classification failure");
                    last = err;
                }
            }
        }
        warn!(attempts = max_attempts, %last, "classification attempts exhausted");
        Err(ClassifyError::Exhausted {
            attempts: max_attempts,
            last,
        })
    }

    fn threshold(&self, reply: ServiceReply) -> (Label, f64) {
        match reply {
            ServiceReply::Malformed(why) => {
                warn!(%why, "unusable classification answer");
                (Label::Unclassified, 0.0)
            }
            ServiceReply::Verdict {
                label, confidence, ..
            } if confidence < self.config.confidence_threshold => {
                info!(
                    %label,
                    confidence,
                    threshold = self.config.confidence_threshold,
                    "confidence below threshold, marking unclassified"
                );
                (Label::Unclassified, confidence)
            }
            ServiceReply::Verdict {
                label,
                confidence,
                reason,
            } => {
                info!(%label, confidence, %reason, "chunk classified");
                (label, confidence)
            }
        }
    }
}
