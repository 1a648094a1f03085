// crates/db/src/queries/jobs.rs
// Job Store: persistence and lifecycle updates for ads-fetch jobs.
//
// Lifecycle writes are conditional on the current status, so concurrent
// writers (executor, cancellation, reaper) resolve to exactly one winner
// instead of last-writer-wins. Updates are partial merges: each statement
// touches only the fields of its lifecycle step.

use crate::queries::row_types::{JobRow, JobStatus};
use crate::{Database, DbResult};
use chrono::Utc;
use serde::Serialize;

/// Fields required to create a new `pending` job record.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub job_id: String,
    pub user_id: String,
    pub platform: String,
    pub total_competitors: i64,
}

/// Filters for listing a user's jobs. `created_after` compares against the
/// RFC 3339 `created_at` column (lexicographic order matches chronological
/// order for normalized UTC timestamps).
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub platform: Option<String>,
    pub created_after: Option<String>,
    pub limit: Option<i64>,
}

/// Terminal outcome persisted by the executor in a single merge.
#[derive(Debug, Clone)]
pub struct JobFinalize {
    pub status: JobStatus,
    pub ads_fetched: i64,
    pub ended_at: String,
    pub duration_seconds: Option<i64>,
    pub logs: Option<String>,
    pub error_message: Option<String>,
}

/// Per-user job aggregates for the dashboard and list endpoints.
#[derive(Debug, Clone, Default, Serialize)]
pub struct JobStats {
    pub total: i64,
    pub pending: i64,
    pub running: i64,
    pub completed: i64,
    pub failed: i64,
    pub total_ads_fetched: i64,
}

impl Database {
    /// Insert a freshly admitted job with `status = pending`.
    pub async fn insert_job(&self, job: &NewJob) -> DbResult<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            INSERT INTO fetch_jobs (
                job_id, user_id, status, platform, total_competitors,
                ads_fetched, created_at, updated_at
            ) VALUES (?1, ?2, 'pending', ?3, ?4, 0, ?5, ?5)
            "#,
        )
        .bind(&job.job_id)
        .bind(&job.user_id)
        .bind(&job.platform)
        .bind(job.total_competitors)
        .bind(&now)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Fetch a single job by id.
    pub async fn get_job(&self, job_id: &str) -> DbResult<Option<JobRow>> {
        let row = sqlx::query_as::<_, JobRow>("SELECT * FROM fetch_jobs WHERE job_id = ?1")
            .bind(job_id)
            .fetch_optional(self.pool())
            .await?;
        Ok(row)
    }

    /// Ids of the user's currently `running` jobs (admission check).
    pub async fn running_job_ids(&self, user_id: &str) -> DbResult<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT job_id FROM fetch_jobs WHERE user_id = ?1 AND status = 'running'",
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// List a user's jobs, newest first, with optional filters.
    pub async fn list_jobs(&self, user_id: &str, filter: &JobFilter) -> DbResult<Vec<JobRow>> {
        let limit = filter.limit.unwrap_or(20).clamp(1, 500);
        let rows = sqlx::query_as::<_, JobRow>(
            r#"
            SELECT * FROM fetch_jobs
            WHERE user_id = ?1
              AND (?2 IS NULL OR status = ?2)
              AND (?3 IS NULL OR platform = ?3)
              AND (?4 IS NULL OR created_at >= ?4)
            ORDER BY created_at DESC
            LIMIT ?5
            "#,
        )
        .bind(user_id)
        .bind(filter.status.map(|s| s.as_str()))
        .bind(&filter.platform)
        .bind(&filter.created_after)
        .bind(limit)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    /// Fetch multiple jobs by id in one query (batch status endpoint).
    pub async fn jobs_by_ids(&self, job_ids: &[String]) -> DbResult<Vec<JobRow>> {
        if job_ids.is_empty() {
            return Ok(Vec::new());
        }
        // sqlx's sqlite driver has no array binds; build the placeholder list.
        let placeholders = (1..=job_ids.len())
            .map(|i| format!("?{}", i))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT * FROM fetch_jobs WHERE job_id IN ({}) ORDER BY created_at DESC",
            placeholders
        );
        let mut query = sqlx::query_as::<_, JobRow>(&sql);
        for id in job_ids {
            query = query.bind(id);
        }
        Ok(query.fetch_all(self.pool()).await?)
    }

    /// Claim a `pending` job for execution, stamping `started_at`.
    ///
    /// Returns false if the job was already claimed, cancelled, or reaped —
    /// the caller must not fetch in that case.
    pub async fn mark_job_running(&self, job_id: &str, started_at: &str) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE fetch_jobs
            SET status = 'running', started_at = ?2, updated_at = ?3
            WHERE job_id = ?1 AND status = 'pending'
            "#,
        )
        .bind(job_id)
        .bind(started_at)
        .bind(Utc::now().to_rfc3339())
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Re-read the execution start timestamp (duration computation tolerates
    /// drift between the executor's clock and what actually got stored).
    pub async fn get_job_started_at(&self, job_id: &str) -> DbResult<Option<String>> {
        let row: Option<(Option<String>,)> =
            sqlx::query_as("SELECT started_at FROM fetch_jobs WHERE job_id = ?1")
                .bind(job_id)
                .fetch_optional(self.pool())
                .await?;
        Ok(row.and_then(|(ts,)| ts))
    }

    /// Persist the executor's terminal outcome as a single merge.
    ///
    /// Conditional on `status = 'running'`: a job cancelled or reaped while
    /// the fetch was in flight is not overwritten. Returns whether the write
    /// won.
    pub async fn finalize_job(&self, job_id: &str, outcome: &JobFinalize) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE fetch_jobs
            SET status = ?2,
                ads_fetched = ?3,
                ended_at = ?4,
                duration_seconds = ?5,
                logs = ?6,
                error_message = ?7,
                updated_at = ?8
            WHERE job_id = ?1 AND status = 'running'
            "#,
        )
        .bind(job_id)
        .bind(outcome.status.as_str())
        .bind(outcome.ads_fetched)
        .bind(&outcome.ended_at)
        .bind(outcome.duration_seconds)
        .bind(&outcome.logs)
        .bind(&outcome.error_message)
        .bind(Utc::now().to_rfc3339())
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Force-fail a live (`pending` or `running`) job with the given reason.
    ///
    /// Returns false when the job is already terminal; the caller maps that
    /// to an invalid-state rejection rather than a silent success.
    pub async fn force_fail_job(&self, job_id: &str, reason: &str) -> DbResult<bool> {
        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            r#"
            UPDATE fetch_jobs
            SET status = 'failed', error_message = ?2, ended_at = ?3, updated_at = ?3
            WHERE job_id = ?1 AND status IN ('pending', 'running')
            "#,
        )
        .bind(job_id)
        .bind(reason)
        .bind(&now)
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Force-fail the user's `running` jobs whose execution started before
    /// `cutoff` (RFC 3339). Rows that never recorded `started_at` fall back
    /// to `created_at`. Returns the ids of the reaped jobs.
    pub async fn reap_stuck_jobs(
        &self,
        user_id: &str,
        cutoff: &str,
        reason: &str,
    ) -> DbResult<Vec<String>> {
        let stuck: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT job_id FROM fetch_jobs
            WHERE user_id = ?1 AND status = 'running'
              AND COALESCE(started_at, created_at) < ?2
            "#,
        )
        .bind(user_id)
        .bind(cutoff)
        .fetch_all(self.pool())
        .await?;

        let mut reaped = Vec::with_capacity(stuck.len());
        for (job_id,) in stuck {
            // Re-check status per row: an executor may finalize between the
            // select and this update, and its result then stands.
            if self.force_fail_job(&job_id, reason).await? {
                reaped.push(job_id);
            }
        }
        Ok(reaped)
    }

    /// Per-user aggregates across all of the user's jobs.
    pub async fn job_stats(&self, user_id: &str) -> DbResult<JobStats> {
        let (total, pending, running, completed, failed, total_ads_fetched): (
            i64,
            i64,
            i64,
            i64,
            i64,
            i64,
        ) = sqlx::query_as(
            r#"
            SELECT
              COUNT(*),
              COALESCE(SUM(status = 'pending'), 0),
              COALESCE(SUM(status = 'running'), 0),
              COALESCE(SUM(status = 'completed'), 0),
              COALESCE(SUM(status = 'failed'), 0),
              COALESCE(SUM(CASE WHEN status = 'completed' THEN ads_fetched ELSE 0 END), 0)
            FROM fetch_jobs WHERE user_id = ?1
            "#,
        )
        .bind(user_id)
        .fetch_one(self.pool())
        .await?;

        Ok(JobStats {
            total,
            pending,
            running,
            completed,
            failed,
            total_ads_fetched,
        })
    }

    /// Number of the user's jobs created at or after `since` (RFC 3339).
    pub async fn count_jobs_since(&self, user_id: &str, since: &str) -> DbResult<i64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM fetch_jobs WHERE user_id = ?1 AND created_at >= ?2",
        )
        .bind(user_id)
        .bind(since)
        .fetch_one(self.pool())
        .await?;
        Ok(count)
    }

    /// Job count per platform for the user (dashboard distribution).
    pub async fn platform_distribution(&self, user_id: &str) -> DbResult<Vec<(String, i64)>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT platform, COUNT(*) FROM fetch_jobs WHERE user_id = ?1 GROUP BY platform",
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    async fn db_with_job(job_id: &str, user_id: &str) -> Database {
        let db = Database::new_in_memory().await.expect("in-memory DB");
        db.insert_job(&NewJob {
            job_id: job_id.to_string(),
            user_id: user_id.to_string(),
            platform: "all".to_string(),
            total_competitors: 3,
        })
        .await
        .expect("insert job");
        db
    }

    fn finalize_ok(ads: i64) -> JobFinalize {
        JobFinalize {
            status: JobStatus::Completed,
            ads_fetched: ads,
            ended_at: Utc::now().to_rfc3339(),
            duration_seconds: Some(12),
            logs: Some("ok".to_string()),
            error_message: None,
        }
    }

    #[tokio::test]
    async fn test_insert_and_get_job() {
        let db = db_with_job("job-1", "user-1").await;
        let job = db.get_job("job-1").await.unwrap().expect("job exists");
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.platform, "all");
        assert_eq!(job.total_competitors, 3);
        assert_eq!(job.ads_fetched, 0);
        assert!(job.started_at.is_none());
    }

    #[tokio::test]
    async fn test_get_job_missing() {
        let db = Database::new_in_memory().await.unwrap();
        assert!(db.get_job("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_mark_job_running_claims_once() {
        let db = db_with_job("job-1", "user-1").await;
        let now = Utc::now().to_rfc3339();

        assert!(db.mark_job_running("job-1", &now).await.unwrap());
        // Second claim loses: the job is no longer pending.
        assert!(!db.mark_job_running("job-1", &now).await.unwrap());

        let job = db.get_job("job-1").await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Running);
        assert_eq!(job.started_at.as_deref(), Some(now.as_str()));
    }

    #[tokio::test]
    async fn test_finalize_requires_running() {
        let db = db_with_job("job-1", "user-1").await;

        // Still pending: finalize refuses.
        assert!(!db.finalize_job("job-1", &finalize_ok(5)).await.unwrap());

        let now = Utc::now().to_rfc3339();
        db.mark_job_running("job-1", &now).await.unwrap();
        assert!(db.finalize_job("job-1", &finalize_ok(5)).await.unwrap());

        let job = db.get_job("job-1").await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.ads_fetched, 5);
        assert_eq!(job.duration_seconds, Some(12));
        assert!(job.ended_at.is_some());
    }

    #[tokio::test]
    async fn test_cancel_beats_late_finalize() {
        let db = db_with_job("job-1", "user-1").await;
        let now = Utc::now().to_rfc3339();
        db.mark_job_running("job-1", &now).await.unwrap();

        assert!(db.force_fail_job("job-1", "Cancelled by user").await.unwrap());

        // The executor's result arrives after the cancel and is dropped.
        assert!(!db.finalize_job("job-1", &finalize_ok(99)).await.unwrap());

        let job = db.get_job("job-1").await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error_message.as_deref(), Some("Cancelled by user"));
        assert_eq!(job.ads_fetched, 0);
    }

    #[tokio::test]
    async fn test_cancel_terminal_job_rejected() {
        let db = db_with_job("job-1", "user-1").await;
        let now = Utc::now().to_rfc3339();
        db.mark_job_running("job-1", &now).await.unwrap();
        db.finalize_job("job-1", &finalize_ok(1)).await.unwrap();

        assert!(!db.force_fail_job("job-1", "Cancelled by user").await.unwrap());
        let job = db.get_job("job-1").await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn test_running_job_ids() {
        let db = db_with_job("job-1", "user-1").await;
        db.insert_job(&NewJob {
            job_id: "job-2".to_string(),
            user_id: "user-1".to_string(),
            platform: "meta".to_string(),
            total_competitors: 1,
        })
        .await
        .unwrap();

        assert!(db.running_job_ids("user-1").await.unwrap().is_empty());

        let now = Utc::now().to_rfc3339();
        db.mark_job_running("job-1", &now).await.unwrap();
        assert_eq!(db.running_job_ids("user-1").await.unwrap(), vec!["job-1"]);
        assert!(db.running_job_ids("user-2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_jobs_filters() {
        let db = db_with_job("job-1", "user-1").await;
        db.insert_job(&NewJob {
            job_id: "job-2".to_string(),
            user_id: "user-1".to_string(),
            platform: "meta".to_string(),
            total_competitors: 1,
        })
        .await
        .unwrap();

        let all = db.list_jobs("user-1", &JobFilter::default()).await.unwrap();
        assert_eq!(all.len(), 2);

        let meta_only = db
            .list_jobs(
                "user-1",
                &JobFilter {
                    platform: Some("meta".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(meta_only.len(), 1);
        assert_eq!(meta_only[0].job_id, "job-2");

        let pending = db
            .list_jobs(
                "user-1",
                &JobFilter {
                    status: Some(JobStatus::Pending),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(pending.len(), 2);

        let none = db
            .list_jobs(
                "user-1",
                &JobFilter {
                    created_after: Some(
                        (Utc::now() + Duration::hours(1)).to_rfc3339(),
                    ),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_jobs_by_ids() {
        let db = db_with_job("job-1", "user-1").await;
        db.insert_job(&NewJob {
            job_id: "job-2".to_string(),
            user_id: "user-2".to_string(),
            platform: "google".to_string(),
            total_competitors: 2,
        })
        .await
        .unwrap();

        let jobs = db
            .jobs_by_ids(&[
                "job-1".to_string(),
                "job-2".to_string(),
                "missing".to_string(),
            ])
            .await
            .unwrap();
        assert_eq!(jobs.len(), 2);

        assert!(db.jobs_by_ids(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reap_stuck_jobs_respects_cutoff() {
        let db = db_with_job("old-job", "user-1").await;
        db.insert_job(&NewJob {
            job_id: "fresh-job".to_string(),
            user_id: "user-1".to_string(),
            platform: "all".to_string(),
            total_competitors: 1,
        })
        .await
        .unwrap();

        // old-job started 1900s ago (> 30 min), fresh-job 1000s ago (< 30 min).
        let old_start = (Utc::now() - Duration::seconds(1900)).to_rfc3339();
        let fresh_start = (Utc::now() - Duration::seconds(1000)).to_rfc3339();
        db.mark_job_running("old-job", &old_start).await.unwrap();
        db.mark_job_running("fresh-job", &fresh_start).await.unwrap();

        let cutoff = (Utc::now() - Duration::minutes(30)).to_rfc3339();
        let reaped = db
            .reap_stuck_jobs("user-1", &cutoff, "Job was stuck and automatically cleaned up")
            .await
            .unwrap();
        assert_eq!(reaped, vec!["old-job"]);

        let old = db.get_job("old-job").await.unwrap().unwrap();
        assert_eq!(old.status, JobStatus::Failed);
        assert_eq!(
            old.error_message.as_deref(),
            Some("Job was stuck and automatically cleaned up")
        );
        assert!(old.ended_at.is_some());

        let fresh = db.get_job("fresh-job").await.unwrap().unwrap();
        assert_eq!(fresh.status, JobStatus::Running);
    }

    #[tokio::test]
    async fn test_job_stats() {
        let db = db_with_job("job-1", "user-1").await;
        db.insert_job(&NewJob {
            job_id: "job-2".to_string(),
            user_id: "user-1".to_string(),
            platform: "meta".to_string(),
            total_competitors: 1,
        })
        .await
        .unwrap();

        let now = Utc::now().to_rfc3339();
        db.mark_job_running("job-1", &now).await.unwrap();
        db.finalize_job("job-1", &finalize_ok(42)).await.unwrap();

        let stats = db.job_stats("user-1").await.unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.total_ads_fetched, 42);
    }
}
