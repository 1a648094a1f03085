// crates/server/src/jobs/reaper.rs
//! Stuck-job reaper: a best-effort liveness backstop for executor tasks
//! that died (process kill, panic before the catch-all) without finalizing
//! their record. Invoked on demand from the cleanup endpoint; an external
//! scheduler may call it periodically.

use adscope_db::Database;
use chrono::{Duration, Utc};
use serde::Serialize;

use crate::error::ApiResult;

/// Running jobs older than this many minutes are force-failed.
pub const DEFAULT_CUTOFF_MINUTES: i64 = 30;

/// Reason stamped on reaped jobs.
const REAP_REASON: &str = "Job was stuck and automatically cleaned up";

/// Result of one reaper sweep.
#[derive(Debug, Clone, Serialize)]
pub struct CleanupReport {
    pub cleaned: usize,
    pub job_ids: Vec<String>,
}

/// Force-fail the user's `running` jobs whose execution started more than
/// `cutoff_minutes` ago. Safe to run concurrently with a live executor:
/// the store's conditional update lets exactly one writer win.
pub async fn cleanup_stuck(
    db: &Database,
    user_id: &str,
    cutoff_minutes: i64,
) -> ApiResult<CleanupReport> {
    let cutoff = (Utc::now() - Duration::minutes(cutoff_minutes)).to_rfc3339();
    let job_ids = db.reap_stuck_jobs(user_id, &cutoff, REAP_REASON).await?;

    if !job_ids.is_empty() {
        tracing::warn!(user_id, cleaned = job_ids.len(), jobs = ?job_ids, "reaped stuck jobs");
    }

    Ok(CleanupReport {
        cleaned: job_ids.len(),
        job_ids,
    })
}
