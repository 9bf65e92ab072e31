//! One classification run per document: claim, extract, classify every
//! chunk, aggregate, record the outcome.

use std::sync::Arc;

use classifier::ClassifierClient;
use futures::future::try_join_all;
use shared::dto::{ClassificationStatus, Label, StatusUpdate};
use shared::status_store::StatusStore;
use text_extraction::Extractor;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::aggregator::aggregate;
use crate::error::{PipelineError, LOW_CONFIDENCE_NOTE};

#[derive(Clone)]
pub struct Orchestrator {
    store: Arc<dyn StatusStore>,
    extractor: Extractor,
    classifier: ClassifierClient,
    cancel: CancellationToken,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn StatusStore>,
        extractor: Extractor,
        classifier: ClassifierClient,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            store,
            extractor,
            classifier,
            cancel,
        }
    }

    /// Runs the pipeline for a queued document. The outcome is recorded in
    /// the status store; `Err` is only returned when the run was cancelled or
    /// the store itself failed. A document another run already claimed is
    /// skipped silently.
    pub async fn run(&self, id: i32, storage_ref: &str) -> Result<(), PipelineError> {
        if !self.store.claim(id).await? {
            info!(doc_id = id, "document not queued, skipping run");
            return Ok(());
        }
        info!(doc_id = id, step = "extracting", %storage_ref, "run started");

        let mut stage = ClassificationStatus::Extracting;
        let outcome = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(PipelineError::Cancelled),
            res = self.process(id, storage_ref, &mut stage) => res,
        };

        match outcome {
            Ok(label) => {
                let note = (label == Label::Unclassified).then(|| LOW_CONFIDENCE_NOTE.to_string());
                let update = StatusUpdate::Completed { label, note };
                if self.store.set_status(id, stage, update).await? {
                    info!(doc_id = id, step = "completed", %label, "run finished");
                    Ok(())
                } else {
                    warn!(doc_id = id, "record changed under the run, result dropped");
                    Ok(())
                }
            }
            Err(PipelineError::Cancelled) => {
                warn!(doc_id = id, stage = stage.as_str(), "run cancelled");
                // Best effort: the recovery scan covers a write lost on exit.
                if let Err(e) = self.fail(id, stage, &PipelineError::Cancelled).await {
                    warn!(doc_id = id, %e, "could not record interruption");
                }
                Err(PipelineError::Cancelled)
            }
            Err(PipelineError::Superseded { expected }) => {
                warn!(doc_id = id, expected, "record changed under the run, stopping");
                Ok(())
            }
            Err(err) => {
                error!(doc_id = id, stage = stage.as_str(), category = ?err.category(), %err, "run failed");
                self.fail(id, stage, &err).await?;
                match err {
                    PipelineError::Store(e) => Err(PipelineError::Store(e)),
                    _ => Ok(()),
                }
            }
        }
    }

    /// Re-enters a failed document into the queue and runs it. Returns
    /// `false` without running when the document was not `failed`, which
    /// also covers a concurrent retry having won the requeue.
    pub async fn retry(&self, id: i32, storage_ref: &str) -> Result<bool, PipelineError> {
        if !self.store.requeue(id).await? {
            info!(doc_id = id, "retry ignored, document not failed");
            return Ok(false);
        }
        info!(doc_id = id, "document requeued");
        self.run(id, storage_ref).await?;
        Ok(true)
    }

    async fn process(
        &self,
        id: i32,
        storage_ref: &str,
        stage: &mut ClassificationStatus,
    ) -> Result<Label, PipelineError> {
        let unit = self.extractor.extract(storage_ref).await?;
        if unit.has_no_text() {
            return Err(PipelineError::NoText);
        }

        if !self
            .store
            .set_status(id, ClassificationStatus::Extracting, StatusUpdate::Classifying)
            .await?
        {
            return Err(PipelineError::superseded(ClassificationStatus::Extracting));
        }
        *stage = ClassificationStatus::Classifying;

        let total = unit.unit_count();
        let chunks = unit.into_chunks();
        info!(doc_id = id, step = "classifying", chunks = total, "classifying chunks");

        let results = try_join_all(chunks.iter().enumerate().map(|(n, text)| async move {
            let (label, confidence) = self.classifier.classify(text).await?;
            info!(doc_id = id, chunk = n + 1, of = total, %label, confidence, "chunk result");
            Ok::<_, PipelineError>((label, confidence))
        }))
        .await?;

        Ok(aggregate(&results))
    }

    async fn fail(
        &self,
        id: i32,
        stage: ClassificationStatus,
        err: &PipelineError,
    ) -> Result<(), PipelineError> {
        let update = StatusUpdate::Failed {
            message: err.user_message(),
        };
        if !self.store.set_status(id, stage, update).await? {
            warn!(doc_id = id, stage = stage.as_str(), "failure not recorded, record moved on");
        }
        Ok(())
    }
}
