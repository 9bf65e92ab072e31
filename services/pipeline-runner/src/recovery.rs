use std::time::Duration;

use chrono::{DateTime, Utc};
use shared::config::RecoveryConfig;
use shared::error::Result;
use shared::status_store::{RecoveryReport, StatusStore};
use tracing::{info, warn};

fn cutoff(now: DateTime<Utc>, age: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(age)
        .ok()
        .and_then(|age| now.checked_sub_signed(age))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Start-up scan: fails runs interrupted by a restart and documents that sat
/// in the queue longer than any backlog could explain.
pub async fn recover_stale(
    store: &dyn StatusStore,
    config: RecoveryConfig,
    now: DateTime<Utc>,
) -> Result<RecoveryReport> {
    let report = store
        .recover_stale(cutoff(now, config.active_stale), cutoff(now, config.backlog_stale))
        .await?;
    if report.interrupted > 0 || report.orphaned > 0 {
        warn!(
            interrupted = report.interrupted,
            orphaned = report.orphaned,
            "recovered stale documents"
        );
    } else {
        info!("no stale documents");
    }
    Ok(report)
}
