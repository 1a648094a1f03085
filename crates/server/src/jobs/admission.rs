// crates/server/src/jobs/admission.rs
//! Job admission: decides whether a fetch request may create a new job.
//!
//! Policy: at most one `running` job per user unless `force` is set. The
//! check and the insert are two statements, so two simultaneous non-force
//! requests can both pass the check; given the write pattern (one human
//! clicking a refresh button) the window is accepted.

use adscope_db::{Database, NewJob};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};

/// Cap on the duration estimate, seconds.
const MAX_ESTIMATED_SECONDS: i64 = 300;

/// Per-competitor, per-platform fetch cost used by the estimate.
const SECONDS_PER_COMPETITOR: i64 = 30;

/// A successfully admitted job.
#[derive(Debug, Clone)]
pub struct Admitted {
    pub job_id: String,
    pub competitors_count: i64,
    pub estimated_seconds: i64,
}

/// Estimated fetch duration: `min(300, competitors * 30 * platforms)` where
/// `platforms = 4` for the `all` scope. The progress estimator recomputes
/// this exact formula, so the two never disagree.
pub fn estimate_seconds(competitors_count: i64, platform: &str) -> i64 {
    let multiplier = if platform == "all" { 4 } else { 1 };
    (competitors_count * SECONDS_PER_COMPETITOR * multiplier).min(MAX_ESTIMATED_SECONDS)
}

/// Admit a fetch request: reject on a running-job conflict (unless forced),
/// otherwise create a `pending` record with a snapshot of the user's active
/// competitor count.
pub async fn admit(
    db: &Database,
    user_id: &str,
    platform: &str,
    force: bool,
) -> ApiResult<Admitted> {
    if !force {
        let running = db.running_job_ids(user_id).await?;
        if !running.is_empty() {
            return Err(ApiError::JobConflict {
                existing_jobs: running,
            });
        }
    }

    let competitors_count = db.count_active_competitors(user_id).await?;
    let job_id = Uuid::new_v4().to_string();

    db.insert_job(&NewJob {
        job_id: job_id.clone(),
        user_id: user_id.to_string(),
        platform: platform.to_string(),
        total_competitors: competitors_count,
    })
    .await?;

    tracing::info!(job_id = %job_id, user_id, platform, competitors_count, "job admitted");

    Ok(Admitted {
        job_id,
        competitors_count,
        estimated_seconds: estimate_seconds(competitors_count, platform),
    })
}
