// crates/server/src/jobs/progress.rs
//! Read-only job snapshots for the polling endpoints: fractional progress,
//! stuck detection, and human-readable durations. Never mutates the job;
//! safe to call arbitrarily often.

use adscope_db::{JobRow, JobStatus};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;

use super::admission::estimate_seconds;

/// A running job older than this is flagged stuck (advisory only).
const STUCK_AFTER_SECONDS: i64 = 600;

/// Nominal progress for jobs that have not produced a measurement yet, so
/// clients show motion.
const NOMINAL_PROGRESS: f64 = 5.0;

/// Running jobs never report above this; 100 is reserved for `completed`.
const RUNNING_PROGRESS_CAP: f64 = 95.0;

/// User-facing view of one job, computed from the stored row.
#[derive(Debug, Clone, Serialize)]
pub struct JobSnapshot {
    pub job_id: String,
    pub user_id: String,
    pub status: JobStatus,
    pub platform: String,
    pub total_competitors: i64,
    pub ads_fetched: i64,
    /// 0.0–100.0, one decimal.
    pub progress: f64,
    pub stuck: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_formatted: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl JobSnapshot {
    /// Build a snapshot of `job` as of `now`.
    pub fn from_row(job: &JobRow, now: DateTime<Utc>) -> Self {
        // Execution clock origin: started_at when the executor stamped it,
        // created_at for rows where it never got that far.
        let clock_origin = job
            .started_at
            .as_deref()
            .and_then(parse_timestamp)
            .or_else(|| parse_timestamp(&job.created_at));

        let elapsed = clock_origin.map(|start| (now - start).num_seconds().max(0));

        let progress = compute_progress(job, elapsed);

        let stuck = job.status == JobStatus::Running
            && elapsed.is_some_and(|e| e > STUCK_AFTER_SECONDS);
        let warning = stuck.then(|| "Job has been running for over 10 minutes".to_string());

        // Backfill duration from timestamps when the executor omitted it.
        let duration_seconds = job.duration_seconds.or_else(|| {
            let start = job.started_at.as_deref().and_then(parse_timestamp)?;
            let end = job.ended_at.as_deref().and_then(parse_timestamp)?;
            Some((end - start).num_seconds().max(0))
        });

        Self {
            job_id: job.job_id.clone(),
            user_id: job.user_id.clone(),
            status: job.status,
            platform: job.platform.clone(),
            total_competitors: job.total_competitors,
            ads_fetched: job.ads_fetched,
            progress,
            stuck,
            warning,
            created_at: job.created_at.clone(),
            started_at: job.started_at.clone(),
            ended_at: job.ended_at.clone(),
            duration_seconds,
            duration_formatted: duration_seconds.map(format_duration),
            error_message: job.error_message.clone(),
        }
    }
}

fn compute_progress(job: &JobRow, elapsed: Option<i64>) -> f64 {
    match job.status {
        JobStatus::Completed => 100.0,
        JobStatus::Failed => 0.0,
        JobStatus::Pending => NOMINAL_PROGRESS,
        JobStatus::Running => {
            // Same formula as admission, recomputed from the frozen
            // competitor snapshot.
            let estimated_total = estimate_seconds(job.total_competitors, &job.platform);
            match elapsed {
                Some(elapsed) if estimated_total > 0 => {
                    let fraction = elapsed as f64 / estimated_total as f64;
                    round1((fraction * 100.0).min(RUNNING_PROGRESS_CAP))
                }
                _ => NOMINAL_PROGRESS,
            }
        }
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Parse a stored timestamp, normalizing to UTC.
///
/// Tolerates RFC 3339 with an offset or `Z` suffix, and offset-naive
/// strings (assumed UTC) with either `T` or space separators. Returns
/// `None` for anything else; callers treat that as an absent timestamp.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(naive.and_utc());
        }
    }

    None
}

/// Render integer seconds as `"{s}s"`, `"{m}m {s}s"`, or `"{h}h {m}m"`.
pub fn format_duration(seconds: i64) -> String {
    if seconds < 60 {
        format!("{}s", seconds)
    } else if seconds < 3600 {
        format!("{}m {}s", seconds / 60, seconds % 60)
    } else {
        format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60)
    }
}
