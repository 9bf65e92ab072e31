//! The durable per-document status record and the transitions the pipeline
//! is allowed to perform on it.
//!
//! Every transition that hands out ownership of a run (`claim`, `requeue`) is
//! a single conditional write. Every other write names the status the writer
//! expects to find, so a run that lost its record to the recovery scan cannot
//! overwrite the recovered state.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::debug;

use crate::dto::{ClassificationStatus, StatusRecord, StatusUpdate};
use crate::error::{AppError, Result};

pub const INTERRUPTED_MESSAGE: &str =
    "Classification interrupted (server restart). Retry to reclassify.";
pub const ORPHANED_MESSAGE: &str =
    "Document was queued too long without processing. Retry to reclassify.";

/// Counts of records forced to `failed` by [`StatusStore::recover_stale`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    pub interrupted: u64,
    pub orphaned: u64,
}

#[async_trait]
pub trait StatusStore: Send + Sync {
    /// Inserts a `queued` record. Existing records are left untouched.
    async fn create(&self, id: i32) -> Result<()>;

    /// `queued → extracting`, refreshing `queued_at`. Returns `false` when the
    /// record is not (or no longer) queued.
    async fn claim(&self, id: i32) -> Result<bool>;

    /// Applies `update` only if the record is currently in `expected`.
    async fn set_status(
        &self,
        id: i32,
        expected: ClassificationStatus,
        update: StatusUpdate,
    ) -> Result<bool>;

    /// `failed → queued`, clearing label and error.
    async fn requeue(&self, id: i32) -> Result<bool>;

    async fn get(&self, id: i32) -> Result<Option<StatusRecord>>;

    /// Fails active records queued before `active_cutoff` and queued records
    /// queued before `backlog_cutoff`.
    async fn recover_stale(
        &self,
        active_cutoff: DateTime<Utc>,
        backlog_cutoff: DateTime<Utc>,
    ) -> Result<RecoveryReport>;
}

/// Forward-only transitions a run may write once it owns the record.
pub fn transition_allowed(expected: ClassificationStatus, update: &StatusUpdate) -> bool {
    use ClassificationStatus::*;
    matches!(
        (expected, update),
        (Extracting, StatusUpdate::Classifying)
            | (Classifying, StatusUpdate::Completed { .. })
            | (Extracting, StatusUpdate::Failed { .. })
            | (Classifying, StatusUpdate::Failed { .. })
    )
}

pub(crate) fn check_transition(
    id: i32,
    expected: ClassificationStatus,
    update: &StatusUpdate,
) -> Result<()> {
    if transition_allowed(expected, update) {
        Ok(())
    } else {
        Err(AppError::InvalidTransition {
            id,
            from: expected.as_str(),
            to: update.status().as_str(),
        })
    }
}

/// In-process store used by tests and single-node local runs.
#[derive(Debug, Default)]
pub struct MemoryStatusStore {
    records: Mutex<HashMap<i32, StatusRecord>>,
}

impl MemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a record as-is, e.g. one left behind by a crashed process.
    pub fn insert(&self, record: StatusRecord) {
        self.records.lock().insert(record.id, record);
    }
}

#[async_trait]
impl StatusStore for MemoryStatusStore {
    async fn create(&self, id: i32) -> Result<()> {
        self.records
            .lock()
            .entry(id)
            .or_insert_with(|| StatusRecord::queued(id, Utc::now()));
        Ok(())
    }

    async fn claim(&self, id: i32) -> Result<bool> {
        let mut records = self.records.lock();
        match records.get_mut(&id) {
            Some(r) if r.status == ClassificationStatus::Queued => {
                r.status = ClassificationStatus::Extracting;
                r.queued_at = Utc::now();
                r.label = None;
                r.error = None;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn set_status(
        &self,
        id: i32,
        expected: ClassificationStatus,
        update: StatusUpdate,
    ) -> Result<bool> {
        check_transition(id, expected, &update)?;
        let mut records = self.records.lock();
        match records.get_mut(&id) {
            Some(r) if r.status == expected => {
                r.status = update.status();
                r.label = update.label();
                r.error = update.error().map(str::to_string);
                Ok(true)
            }
            Some(r) => {
                debug!(doc_id = id, found = r.status.as_str(), expected = expected.as_str(), "status write skipped");
                Ok(false)
            }
            None => Ok(false),
        }
    }

    async fn requeue(&self, id: i32) -> Result<bool> {
        let mut records = self.records.lock();
        match records.get_mut(&id) {
            Some(r) if r.status == ClassificationStatus::Failed => {
                r.status = ClassificationStatus::Queued;
                r.queued_at = Utc::now();
                r.label = None;
                r.error = None;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn get(&self, id: i32) -> Result<Option<StatusRecord>> {
        Ok(self.records.lock().get(&id).cloned())
    }

    async fn recover_stale(
        &self,
        active_cutoff: DateTime<Utc>,
        backlog_cutoff: DateTime<Utc>,
    ) -> Result<RecoveryReport> {
        let mut report = RecoveryReport::default();
        for r in self.records.lock().values_mut() {
            let message = match r.status {
                ClassificationStatus::Extracting | ClassificationStatus::Classifying
                    if r.queued_at < active_cutoff =>
                {
                    report.interrupted += 1;
                    INTERRUPTED_MESSAGE
                }
                ClassificationStatus::Queued if r.queued_at < backlog_cutoff => {
                    report.orphaned += 1;
                    ORPHANED_MESSAGE
                }
                _ => continue,
            };
            r.status = ClassificationStatus::Failed;
            r.label = None;
            r.error = Some(message.to_string());
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RecoveryConfig;
    use crate::dto::Label;
    use chrono::Duration;
    use std::sync::Arc;

    async fn recover_with_defaults(store: &MemoryStatusStore) -> RecoveryReport {
        let cfg = RecoveryConfig::default();
        let now = Utc::now();
        store
            .recover_stale(
                now - Duration::from_std(cfg.active_stale).unwrap(),
                now - Duration::from_std(cfg.backlog_stale).unwrap(),
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn claim_only_succeeds_from_queued() {
        let store = MemoryStatusStore::new();
        store.create(1).await.unwrap();
        assert!(store.claim(1).await.unwrap());
        let before = store.get(1).await.unwrap().unwrap();
        assert!(!store.claim(1).await.unwrap());
        assert_eq!(store.get(1).await.unwrap().unwrap(), before);
        assert!(!store.claim(99).await.unwrap());
    }

    #[tokio::test]
    async fn concurrent_claims_have_one_winner() {
        let store = Arc::new(MemoryStatusStore::new());
        store.create(5).await.unwrap();
        let claims = (0..32).map(|_| {
            let store = store.clone();
            tokio::spawn(async move { store.claim(5).await.unwrap() })
        });
        let won = futures::future::join_all(claims)
            .await
            .into_iter()
            .filter(|r| *r.as_ref().unwrap())
            .count();
        assert_eq!(won, 1);
    }

    #[tokio::test]
    async fn writes_require_the_expected_status() {
        let store = MemoryStatusStore::new();
        store.create(2).await.unwrap();
        store.claim(2).await.unwrap();
        let done = StatusUpdate::Completed {
            label: Label::Public,
            note: None,
        };
        assert!(store
            .set_status(2, ClassificationStatus::Extracting, StatusUpdate::Classifying)
            .await
            .unwrap());
        assert!(!store
            .set_status(2, ClassificationStatus::Extracting, StatusUpdate::Classifying)
            .await
            .unwrap());
        assert!(store
            .set_status(2, ClassificationStatus::Classifying, done)
            .await
            .unwrap());
        let r = store.get(2).await.unwrap().unwrap();
        assert_eq!(r.status, ClassificationStatus::Completed);
        assert_eq!(r.label, Some(Label::Public));
        assert_eq!(r.error, None);
    }

    #[tokio::test]
    async fn backward_transitions_are_rejected() {
        let store = MemoryStatusStore::new();
        store.create(3).await.unwrap();
        let err = store
            .set_status(
                3,
                ClassificationStatus::Queued,
                StatusUpdate::Completed {
                    label: Label::Public,
                    note: None,
                },
            )
            .await;
        assert!(matches!(err, Err(AppError::InvalidTransition { .. })));
    }

    #[tokio::test]
    async fn requeue_only_from_failed_and_clears_error() {
        let store = MemoryStatusStore::new();
        store.create(4).await.unwrap();
        assert!(!store.requeue(4).await.unwrap());
        store.claim(4).await.unwrap();
        store
            .set_status(
                4,
                ClassificationStatus::Extracting,
                StatusUpdate::Failed {
                    message: "boom".into(),
                },
            )
            .await
            .unwrap();
        assert!(store.requeue(4).await.unwrap());
        assert!(!store.requeue(4).await.unwrap());
        let r = store.get(4).await.unwrap().unwrap();
        assert_eq!(r.status, ClassificationStatus::Queued);
        assert_eq!(r.error, None);
    }

    #[tokio::test]
    async fn recovery_uses_separate_cutoffs() {
        let store = MemoryStatusStore::new();
        let now = Utc::now();
        let mut stuck = StatusRecord::queued(10, now - Duration::minutes(15));
        stuck.status = ClassificationStatus::Classifying;
        store.insert(stuck);
        store.insert(StatusRecord::queued(11, now - Duration::minutes(15)));
        store.insert(StatusRecord::queued(12, now - Duration::minutes(45)));

        let report = store
            .recover_stale(now - Duration::minutes(10), now - Duration::minutes(30))
            .await
            .unwrap();
        assert_eq!(report, RecoveryReport { interrupted: 1, orphaned: 1 });

        let r10 = store.get(10).await.unwrap().unwrap();
        assert_eq!(r10.status, ClassificationStatus::Failed);
        assert_eq!(r10.error.as_deref(), Some(INTERRUPTED_MESSAGE));
        assert_eq!(
            store.get(11).await.unwrap().unwrap().status,
            ClassificationStatus::Queued
        );
        assert_eq!(
            store.get(12).await.unwrap().unwrap().error.as_deref(),
            Some(ORPHANED_MESSAGE)
        );
    }

    #[tokio::test]
    async fn claim_restarts_the_clock_for_a_long_backlog_wait() {
        let store = MemoryStatusStore::new();
        let waited_since = Utc::now() - Duration::minutes(20);
        store.insert(StatusRecord::queued(20, waited_since));

        assert!(store.claim(20).await.unwrap());
        let claimed = store.get(20).await.unwrap().unwrap();
        assert_eq!(claimed.status, ClassificationStatus::Extracting);
        assert!(claimed.queued_at > waited_since + Duration::minutes(19));

        assert_eq!(recover_with_defaults(&store).await, RecoveryReport::default());
        assert_eq!(
            store.get(20).await.unwrap().unwrap().status,
            ClassificationStatus::Extracting
        );
    }

    #[tokio::test]
    async fn requeue_restarts_the_clock_for_an_old_failure() {
        let store = MemoryStatusStore::new();
        let failed_since = Utc::now() - Duration::hours(2);
        let mut old = StatusRecord::queued(21, failed_since);
        old.status = ClassificationStatus::Failed;
        old.error = Some("boom".into());
        store.insert(old);

        assert!(store.requeue(21).await.unwrap());
        let requeued = store.get(21).await.unwrap().unwrap();
        assert_eq!(requeued.status, ClassificationStatus::Queued);
        assert!(requeued.queued_at > failed_since + Duration::minutes(119));

        assert_eq!(recover_with_defaults(&store).await, RecoveryReport::default());
        assert_eq!(
            store.get(21).await.unwrap().unwrap().status,
            ClassificationStatus::Queued
        );
    }
}
