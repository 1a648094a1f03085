// crates/server/src/routes/status.rs
//! Polling surface for the job subsystem: single and batch snapshots, job
//! logs, the stuck-job cleanup endpoint, and dashboard aggregates.
//!
//! Snapshot reads are idempotent and never mutate a job; clients may poll
//! as often as they like.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use adscope_db::{JobFilter, JobRow};

use crate::auth::{AuthUser, MaybeAuthUser};
use crate::error::{ApiError, ApiResult};
use crate::jobs::{reaper, JobSnapshot};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct BatchStatusRequest {
    #[serde(default)]
    pub job_ids: Vec<String>,
}

#[derive(Debug, Default, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
}

#[derive(Debug, Serialize)]
pub struct BatchStatusResponse {
    pub jobs: Vec<JobSnapshot>,
    pub summary: BatchSummary,
    pub count: usize,
}

#[derive(Debug, Deserialize, Default)]
pub struct CleanupRequest {
    #[serde(default)]
    pub cutoff_minutes: Option<i64>,
}

/// One parsed log line with a detected severity level.
#[derive(Debug, Serialize)]
pub struct LogLine {
    pub message: String,
    pub level: &'static str,
}

fn summarize(jobs: &[JobSnapshot]) -> BatchSummary {
    use adscope_db::JobStatus::*;
    let mut summary = BatchSummary {
        total: jobs.len(),
        ..Default::default()
    };
    for job in jobs {
        match job.status {
            Pending => summary.pending += 1,
            Running => summary.running += 1,
            Completed => summary.completed += 1,
            Failed => summary.failed += 1,
        }
    }
    summary
}

/// Detect a coarse severity for a raw log line.
fn log_level(line: &str) -> &'static str {
    let lower = line.to_lowercase();
    if lower.contains("error") {
        "error"
    } else if lower.contains("warning") {
        "warning"
    } else if lower.contains("success") {
        "success"
    } else if line.contains("DEBUG") {
        "debug"
    } else {
        "info"
    }
}

fn parse_log_lines(logs: &str) -> Vec<LogLine> {
    logs.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| LogLine {
            message: line.to_string(),
            level: log_level(line),
        })
        .collect()
}

/// GET /api/ads-status/{job_id} - Poll one job.
///
/// Authentication is optional: job ids are unguessable, so an anonymous
/// poll with the id is allowed, but a token naming a different user is
/// rejected.
async fn ads_status(
    State(state): State<Arc<AppState>>,
    MaybeAuthUser(user): MaybeAuthUser,
    Path(job_id): Path<String>,
) -> ApiResult<Json<JobSnapshot>> {
    let job = state
        .db
        .get_job(&job_id)
        .await?
        .ok_or_else(|| ApiError::JobNotFound(job_id.clone()))?;

    if let Some(user) = user {
        if job.user_id != user.user_id {
            return Err(ApiError::Forbidden(
                "Unauthorized to view this job".to_string(),
            ));
        }
    }

    Ok(Json(JobSnapshot::from_row(&job, Utc::now())))
}

/// POST /api/batch-status - Poll many jobs in one query.
async fn batch_status(
    State(state): State<Arc<AppState>>,
    MaybeAuthUser(user): MaybeAuthUser,
    Json(req): Json<BatchStatusRequest>,
) -> ApiResult<Json<BatchStatusResponse>> {
    let rows = state.db.jobs_by_ids(&req.job_ids).await?;

    // With a token, silently drop other users' jobs from the answer.
    let rows: Vec<JobRow> = match &user {
        Some(user) => rows
            .into_iter()
            .filter(|row| row.user_id == user.user_id)
            .collect(),
        None => rows,
    };

    let now = Utc::now();
    let jobs: Vec<JobSnapshot> = rows.iter().map(|row| JobSnapshot::from_row(row, now)).collect();

    Ok(Json(BatchStatusResponse {
        summary: summarize(&jobs),
        count: jobs.len(),
        jobs,
    }))
}

/// GET /api/job-logs/{job_id} - Raw logs plus per-line severity.
async fn job_logs(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(job_id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let job = state
        .db
        .get_job(&job_id)
        .await?
        .ok_or_else(|| ApiError::JobNotFound(job_id.clone()))?;

    if job.user_id != user.user_id {
        return Err(ApiError::Forbidden(
            "Unauthorized to view this job".to_string(),
        ));
    }

    let parsed_logs = job.logs.as_deref().map(parse_log_lines).unwrap_or_default();
    let has_logs = job.logs.is_some();
    Ok(Json(serde_json::json!({
        "job_id": job.job_id,
        "logs": job.logs,
        "has_logs": has_logs,
        "log_line_count": parsed_logs.len(),
        "parsed_logs": parsed_logs,
        "status": job.status,
        "platform": job.platform,
        "created_at": job.created_at,
    })))
}

/// POST /api/cleanup-stuck-jobs - Reap the caller's stuck running jobs.
async fn cleanup_stuck_jobs(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    body: Result<Json<CleanupRequest>, JsonRejection>,
) -> ApiResult<Json<serde_json::Value>> {
    let req = body.map(|Json(r)| r).unwrap_or_default();
    let cutoff_minutes = req
        .cutoff_minutes
        .unwrap_or(reaper::DEFAULT_CUTOFF_MINUTES)
        .clamp(1, 24 * 60);

    let report = reaper::cleanup_stuck(&state.db, &user.user_id, cutoff_minutes).await?;
    let message = if report.cleaned == 0 {
        "No stuck jobs found".to_string()
    } else {
        format!("Cleaned up {} stuck jobs", report.cleaned)
    };

    Ok(Json(serde_json::json!({
        "message": message,
        "cleaned": report.cleaned,
        "job_ids": report.job_ids,
    })))
}

/// GET /api/dashboard-stats - Job and ads aggregates for the caller.
async fn dashboard_stats(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> ApiResult<Json<serde_json::Value>> {
    let job_stats = state.db.job_stats(&user.user_id).await?;
    let today_start = Utc::now()
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().to_rfc3339())
        .unwrap_or_else(|| Utc::now().to_rfc3339());
    let today = state.db.count_jobs_since(&user.user_id, &today_start).await?;

    let totals = state.db.metric_totals(&user.user_id).await?;
    let competitors = state.db.count_active_competitors(&user.user_id).await?;
    let platforms: serde_json::Map<String, serde_json::Value> = state
        .db
        .platform_distribution(&user.user_id)
        .await?
        .into_iter()
        .map(|(platform, count)| (platform, serde_json::json!(count)))
        .collect();

    let now = Utc::now();
    let recent_activity: Vec<JobSnapshot> = state
        .db
        .list_jobs(
            &user.user_id,
            &JobFilter {
                limit: Some(5),
                ..Default::default()
            },
        )
        .await?
        .iter()
        .map(|row| JobSnapshot::from_row(row, now))
        .collect();

    let success_rate = if job_stats.total > 0 {
        job_stats.completed as f64 / job_stats.total as f64 * 100.0
    } else {
        0.0
    };
    let average_per_job = if job_stats.completed > 0 {
        job_stats.total_ads_fetched as f64 / job_stats.completed as f64
    } else {
        0.0
    };

    Ok(Json(serde_json::json!({
        "jobs": {
            "total": job_stats.total,
            "today": today,
            "pending": job_stats.pending,
            "running": job_stats.running,
            "completed": job_stats.completed,
            "failed": job_stats.failed,
            "success_rate": success_rate,
        },
        "ads": {
            "total_in_database": totals.total_ads,
            "total_spend": totals.total_spend,
            "total_impressions": totals.total_impressions,
            "total_fetched": job_stats.total_ads_fetched,
            "average_per_job": average_per_job,
        },
        "competitors": { "total": competitors },
        "platforms": platforms,
        "recent_activity": recent_activity,
    })))
}

/// Create the status routes router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ads-status/{job_id}", get(ads_status))
        .route("/batch-status", post(batch_status))
        .route("/job-logs/{job_id}", get(job_logs))
        .route("/cleanup-stuck-jobs", post(cleanup_stuck_jobs))
        .route("/dashboard-stats", get(dashboard_stats))
}
