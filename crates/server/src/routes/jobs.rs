// crates/server/src/routes/jobs.rs
//! The ads-refresh surface: start a fetch job, list own jobs, estimate
//! duration, cancel, and report fetcher configuration.
//!
//! Starting a job returns 202 immediately; the executor task outlives the
//! request and clients observe the outcome by polling the status routes.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

use adscope_db::{JobFilter, JobStats, JobStatus};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::jobs::{admission, executor, is_supported_platform, JobSnapshot, SUPPORTED_PLATFORMS};
use crate::state::AppState;

#[derive(Debug, Deserialize, Default)]
pub struct RefreshRequest {
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub status: String,
    pub job_id: String,
    pub message: String,
    pub estimated_time: i64,
    pub competitors_count: i64,
    pub platform: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct UserJobsQuery {
    pub status: Option<String>,
    pub platform: Option<String>,
    pub days: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct UserJobsResponse {
    pub jobs: Vec<JobSnapshot>,
    pub stats: JobStats,
    pub count: usize,
    pub has_active_jobs: bool,
}

#[derive(Debug, Deserialize, Default)]
pub struct EstimateRequest {
    #[serde(default)]
    pub platform: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EstimateResponse {
    pub estimated_seconds: i64,
    pub estimated_minutes: f64,
    pub competitors_count: i64,
    pub platform: String,
    pub platforms_count: i64,
}

fn validated_platform(platform: Option<String>) -> ApiResult<String> {
    let platform = platform.unwrap_or_else(|| "all".to_string());
    if !is_supported_platform(&platform) {
        return Err(ApiError::BadRequest(format!(
            "Unsupported platform: {} (expected one of {})",
            platform,
            SUPPORTED_PLATFORMS.join(", ")
        )));
    }
    Ok(platform)
}

/// POST /api/ads-refresh - Admit and launch a fetch job.
async fn refresh_ads(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    body: Result<Json<RefreshRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<RefreshResponse>)> {
    // A missing or empty body means "all platforms, no force".
    let req = body.map(|Json(r)| r).unwrap_or_default();

    // Dependency-presence gate, decided once at startup.
    if !state.fetcher.available() {
        return Err(ApiError::FetcherUnavailable);
    }

    let platform = validated_platform(req.platform)?;
    let admitted = admission::admit(&state.db, &user.user_id, &platform, req.force).await?;

    // Fire and forget: the handler never waits on the task.
    executor::spawn(
        state.db.clone(),
        state.fetcher.clone(),
        state.config.fetch_timeout,
        admitted.job_id.clone(),
        user.user_id.clone(),
        platform.clone(),
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(RefreshResponse {
            status: "started".to_string(),
            message: format!(
                "Started fetching ads from {} for {} competitors",
                platform, admitted.competitors_count
            ),
            job_id: admitted.job_id,
            estimated_time: admitted.estimated_seconds,
            competitors_count: admitted.competitors_count,
            platform,
        }),
    ))
}

/// GET /api/user-jobs - The caller's jobs, newest first, with filters.
async fn user_jobs(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(query): Query<UserJobsQuery>,
) -> ApiResult<Json<UserJobsResponse>> {
    let status = match query.status.as_deref() {
        None => None,
        Some(s) => {
            let status = JobStatus::from_db_str(s);
            if status.as_str() != s {
                return Err(ApiError::BadRequest(format!("Unknown status filter: {}", s)));
            }
            Some(status)
        }
    };

    let days = query.days.unwrap_or(30).clamp(1, 365);
    let filter = JobFilter {
        status,
        // `all` means no platform filter, as in the scope parameter.
        platform: query.platform.filter(|p| p != "all"),
        created_after: Some((Utc::now() - Duration::days(days)).to_rfc3339()),
        limit: query.limit,
    };

    let now = Utc::now();
    let jobs: Vec<JobSnapshot> = state
        .db
        .list_jobs(&user.user_id, &filter)
        .await?
        .iter()
        .map(|row| JobSnapshot::from_row(row, now))
        .collect();
    let stats = state.db.job_stats(&user.user_id).await?;
    let has_active_jobs = jobs.iter().any(|j| j.status == JobStatus::Running);

    Ok(Json(UserJobsResponse {
        count: jobs.len(),
        has_active_jobs,
        jobs,
        stats,
    }))
}

/// POST /api/estimate-time - Duration estimate without creating a job.
async fn estimate_time(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    body: Result<Json<EstimateRequest>, JsonRejection>,
) -> ApiResult<Json<EstimateResponse>> {
    let req = body.map(|Json(r)| r).unwrap_or_default();
    let platform = validated_platform(req.platform)?;
    let competitors_count = state.db.count_active_competitors(&user.user_id).await?;
    let estimated_seconds = admission::estimate_seconds(competitors_count, &platform);

    Ok(Json(EstimateResponse {
        estimated_seconds,
        estimated_minutes: (estimated_seconds as f64 / 60.0 * 10.0).round() / 10.0,
        competitors_count,
        platforms_count: if platform == "all" { 4 } else { 1 },
        platform,
    }))
}

/// POST /api/cancel-job/{job_id} - Force-fail a live job.
///
/// Cancellation is cooperative-by-proxy: only the stored status flips. An
/// in-flight fetch runs to completion, but its late result is dropped by
/// the store's conditional finalize.
async fn cancel_job(
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
            "Unauthorized to cancel this job".to_string(),
        ));
    }
    if job.status.is_terminal() {
        return Err(ApiError::InvalidState {
            current_status: job.status.as_str().to_string(),
        });
    }

    if !state.db.force_fail_job(&job_id, "Cancelled by user").await? {
        // The executor finalized between our read and the write.
        let current = state
            .db
            .get_job(&job_id)
            .await?
            .map(|j| j.status.as_str().to_string())
            .unwrap_or_else(|| "unknown".to_string());
        return Err(ApiError::InvalidState {
            current_status: current,
        });
    }

    tracing::info!(job_id = %job_id, user_id = %user.user_id, "job cancelled");
    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Job cancelled successfully",
        "job_id": job_id,
    })))
}

/// GET /api/ads-fetch-config - Fetcher availability and limits.
async fn fetch_config(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "fetcher_available": state.fetcher.available(),
        "timeout_seconds": state.config.fetch_timeout.as_secs(),
        "supported_platforms": SUPPORTED_PLATFORMS,
        "max_estimated_time": 300,
    }))
}

/// Create the jobs routes router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ads-refresh", post(refresh_ads))
        .route("/user-jobs", get(user_jobs))
        .route("/estimate-time", post(estimate_time))
        .route("/cancel-job/{job_id}", post(cancel_job))
        .route("/ads-fetch-config", get(fetch_config))
}
