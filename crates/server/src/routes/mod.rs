// crates/server/src/routes/mod.rs
//! API route handlers for the adscope server.

pub mod analytics;
pub mod auth;
pub mod competitors;
pub mod health;
pub mod jobs;
pub mod status;

use std::sync::Arc;

use axum::Router;

use crate::state::AppState;

/// Create the combined API router with all routes under /api prefix.
///
/// Routes:
/// - GET  /api/health                  - Health check
/// - POST /api/auth/signup             - Register, returns token
/// - POST /api/auth/login              - Login, returns token
/// - POST /api/auth/verify             - Verify a token, returns the user
/// - POST /api/auth/complete-onboarding - Mark onboarding done
/// - GET/POST /api/competitors         - List / create competitors
/// - PUT/DELETE /api/competitors/{id}  - Update / soft-delete a competitor
/// - GET  /api/competitors/stats       - Competitor aggregates
/// - POST /api/ads-refresh             - Start an ads-fetch job (202)
/// - GET  /api/user-jobs               - List own jobs with filters
/// - POST /api/estimate-time           - Fetch-duration estimate
/// - POST /api/cancel-job/{job_id}     - Cancel a live job
/// - GET  /api/ads-fetch-config        - Fetcher availability and limits
/// - GET  /api/ads-status/{job_id}     - Poll one job's snapshot
/// - POST /api/batch-status            - Poll many jobs at once
/// - GET  /api/job-logs/{job_id}       - Raw + parsed job logs
/// - POST /api/cleanup-stuck-jobs      - Reap stuck running jobs
/// - GET  /api/dashboard-stats         - Job/ads dashboard aggregates
/// - GET  /api/recent-ads-updates      - Recently fetched ads
/// - GET  /api/analytics/summary       - Per-competitor spend/CTR summary
pub fn api_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api", health::router())
        .nest("/api", auth::router())
        .nest("/api", competitors::router())
        .nest("/api", jobs::router())
        .nest("/api", status::router())
        .nest("/api", analytics::router())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_api_routes_creation() {
        let state = AppState::for_tests().await;
        let _router = api_routes(state);
    }
}
