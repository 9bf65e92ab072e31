use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use classifier::{ClassifierClient, ConcurrencyLimiter, OpenAiService};
use pipeline_runner::{recover_stale, Orchestrator, PipelineError};
use rdkafka::consumer::{CommitMode, Consumer};
use rdkafka::Message;
use shared::config::Settings;
use shared::db::{self, PgStatusStore};
use shared::dto::{DocumentUploaded, RetryRequested};
use shared::kafka::{self, TOPIC_CLASSIFICATION_RETRY, TOPIC_DOCUMENT_UPLOADED, TRIGGER_TOPICS};
use shared::status_store::StatusStore;
use text_extraction::{Extractor, FileReader};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn log_finished(res: Result<Result<(), PipelineError>, tokio::task::JoinError>) {
    match res {
        Ok(Ok(())) | Ok(Err(PipelineError::Cancelled)) => {}
        Ok(Err(e)) => error!(%e, "run aborted"),
        Err(e) => error!(%e, "run task panicked"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let settings = Settings::new().context("reading settings")?;
    let classifier_cfg = settings.classifier();
    info!(
        pages_per_chunk = settings.pages_per_chunk,
        max_pages = settings.max_pages,
        max_chunks = settings.max_chunks,
        max_concurrent_calls = classifier_cfg.max_concurrent_calls,
        max_attempts = classifier_cfg.max_attempts,
        confidence_threshold = classifier_cfg.confidence_threshold,
        "settings loaded"
    );

    let service = OpenAiService::shared(&classifier_cfg).context("building classification service")?;
    if !service.has_credentials() {
        // Runs still start; each fails with the auth message until a key is set.
        error!("CLASSIFIER_API_KEY is not set; every classification will fail until it is configured");
    }

    let pool = db::connect(&settings).context("connecting to postgres")?;
    let pg = PgStatusStore::new(pool);
    pg.migrate().await.context("creating status table")?;
    let store: Arc<dyn StatusStore> = Arc::new(pg);

    recover_stale(store.as_ref(), settings.recovery(), Utc::now())
        .await
        .context("recovering stale documents")?;

    let cancel = CancellationToken::new();
    let limiter = ConcurrencyLimiter::new(classifier_cfg.max_concurrent_calls);
    let orchestrator = Orchestrator::new(
        store,
        Extractor::new(
            Arc::new(FileReader::new(&settings.storage_root)),
            settings.extraction(),
        ),
        ClassifierClient::new(service, limiter.clone(), classifier_cfg),
        cancel.clone(),
    );

    match kafka::ensure_topics(&settings.message_broker_url, &TRIGGER_TOPICS).await {
        Ok(created) if !created.is_empty() => info!(?created, "trigger topics provisioned"),
        Ok(_) => {}
        Err(e) => warn!(%e, "could not provision trigger topics (continuing)"),
    }
    let consumer = kafka::subscribe(
        &settings.message_broker_url,
        &settings.consumer_group,
        &TRIGGER_TOPICS,
    )
        .context("subscribing to trigger topics")?;

    let mut runs: JoinSet<Result<(), PipelineError>> = JoinSet::new();
    info!("waiting for classification triggers");
    loop {
        let msg = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown requested");
                break;
            }
            msg = consumer.recv() => msg,
        };
        while let Some(res) = runs.try_join_next() {
            log_finished(res);
        }

        let m = match msg {
            Ok(m) => m,
            Err(e) => {
                warn!(%e, "kafka error");
                continue;
            }
        };
        let Some(payload) = m.payload() else {
            warn!(topic = m.topic(), "message without payload");
            continue;
        };

        match m.topic() {
            TOPIC_DOCUMENT_UPLOADED => match serde_json::from_slice::<DocumentUploaded>(payload) {
                Ok(ev) => {
                    info!(doc_id = ev.document_id, "upload trigger received");
                    let orch = orchestrator.clone();
                    runs.spawn(async move { orch.run(ev.document_id, &ev.storage_ref).await });
                }
                Err(e) => error!(%e, "invalid upload event"),
            },
            TOPIC_CLASSIFICATION_RETRY => match serde_json::from_slice::<RetryRequested>(payload) {
                Ok(ev) => {
                    info!(doc_id = ev.document_id, "retry trigger received");
                    let orch = orchestrator.clone();
                    runs.spawn(async move {
                        orch.retry(ev.document_id, &ev.storage_ref).await.map(|_| ())
                    });
                }
                Err(e) => error!(%e, "invalid retry event"),
            },
            other => warn!(topic = other, "unexpected topic"),
        }

        if let Err(e) = consumer.commit_message(&m, CommitMode::Async) {
            warn!(%e, "failed to commit kafka offset");
        }
    }

    cancel.cancel();
    limiter.close();
    info!(in_flight = runs.len(), "waiting for runs to record their interruption");
    while let Some(res) = runs.join_next().await {
        log_finished(res);
    }
    info!("stopped");
    Ok(())
}
