// crates/server/src/jobs/executor.rs
//! Drives one job from `pending` to a terminal state on its own tokio task,
//! detached from the request that created it.
//!
//! The task's only side channel is the job store. Every fault — adapter
//! failure, timeout, bookkeeping error — is absorbed into the record's
//! terminal state; a job is never left `running` by a bug in this module.

use std::sync::Arc;
use std::time::Duration;

use adscope_db::{Database, DbError, JobFinalize, JobStatus};
use chrono::Utc;
use tokio::task::JoinHandle;

use super::fetcher::{AdsFetcher, FetchOutcome};
use super::progress::parse_timestamp;

/// Stored logs are capped at this many characters.
const MAX_LOG_CHARS: usize = 10_000;

/// Marker appended when logs are truncated.
const TRUNCATION_MARKER: &str = "\n...[truncated]";

/// Failed jobs keep this much of the log as `error_message`.
const ERROR_EXCERPT_CHARS: usize = 500;

/// Launch the execution task for an admitted job. Returns the join handle;
/// callers on the request path drop it — the task outlives the request.
pub fn spawn(
    db: Database,
    fetcher: Arc<dyn AdsFetcher>,
    fetch_timeout: Duration,
    job_id: String,
    user_id: String,
    platform: String,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = run(&db, fetcher.as_ref(), fetch_timeout, &job_id, &user_id, &platform).await
        {
            // Bookkeeping itself failed. Force the record to failed so the
            // job cannot sit in `running` forever; if even that write fails
            // the reaper is the backstop.
            tracing::error!(job_id = %job_id, error = %e, "executor bookkeeping failed");
            let reason = truncate_chars(&e.to_string(), ERROR_EXCERPT_CHARS);
            if let Err(e2) = db.force_fail_job(&job_id, &reason).await {
                tracing::error!(job_id = %job_id, error = %e2, "failed to record executor failure");
            }
        }
    })
}

async fn run(
    db: &Database,
    fetcher: &dyn AdsFetcher,
    fetch_timeout: Duration,
    job_id: &str,
    user_id: &str,
    platform: &str,
) -> Result<(), DbError> {
    // Claim the job. Losing the claim means it was cancelled (or reaped)
    // between admission and dispatch; do not fetch.
    let started_at = Utc::now().to_rfc3339();
    if !db.mark_job_running(job_id, &started_at).await? {
        tracing::info!(job_id, "job no longer pending at dispatch; skipping fetch");
        return Ok(());
    }

    tracing::info!(job_id, user_id, platform, "starting background fetch");

    let outcome = match tokio::time::timeout(fetch_timeout, fetcher.run_for_user(user_id, platform))
        .await
    {
        Ok(outcome) => outcome,
        Err(_) => FetchOutcome {
            success: false,
            log: format!(
                "Fetch timed out after {}s and was abandoned",
                fetch_timeout.as_secs()
            ),
            ads_count: 0,
        },
    };

    let ended_at = Utc::now();

    let logs = (!outcome.log.is_empty()).then(|| truncate_log(&outcome.log));
    let error_message = (!outcome.success && !outcome.log.is_empty())
        .then(|| truncate_chars(&outcome.log, ERROR_EXCERPT_CHARS));

    // Re-read the stored start timestamp rather than trusting our local
    // copy; an unparseable value omits the duration instead of failing the
    // whole finalization.
    let duration_seconds = db
        .get_job_started_at(job_id)
        .await?
        .as_deref()
        .and_then(parse_timestamp)
        .map(|start| (ended_at - start).num_seconds().max(0));

    let finalize = JobFinalize {
        status: if outcome.success {
            JobStatus::Completed
        } else {
            JobStatus::Failed
        },
        ads_fetched: outcome.ads_count,
        ended_at: ended_at.to_rfc3339(),
        duration_seconds,
        logs,
        error_message,
    };

    if db.finalize_job(job_id, &finalize).await? {
        tracing::info!(
            job_id,
            success = outcome.success,
            ads_fetched = outcome.ads_count,
            "background fetch finished"
        );
    } else {
        // Someone force-failed the job while the fetch was in flight; its
        // terminal state stands and this result is dropped.
        tracing::warn!(job_id, "job was cancelled or reaped mid-fetch; result dropped");
    }

    Ok(())
}

/// Cap the log at `MAX_LOG_CHARS` characters, appending the marker.
fn truncate_log(log: &str) -> String {
    if log.chars().count() <= MAX_LOG_CHARS {
        log.to_string()
    } else {
        let mut truncated: String = log.chars().take(MAX_LOG_CHARS).collect();
        truncated.push_str(TRUNCATION_MARKER);
        truncated
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
