// crates/db/src/queries/row_types.rs
// Row types shared across query modules and the server layer.

use serde::{Deserialize, Serialize};
use sqlx::Row;

/// Lifecycle state of a fetch job.
///
/// Transitions are monotonic: `Pending → Running → {Completed | Failed}`,
/// with a direct jump to `Failed` for cancellation or reaping. Terminal
/// states are never left; lifecycle writes in `queries/jobs.rs` enforce
/// this with conditional updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn from_db_str(s: &str) -> Self {
        match s {
            "pending" => JobStatus::Pending,
            "running" => JobStatus::Running,
            "completed" => JobStatus::Completed,
            _ => JobStatus::Failed,
        }
    }

    /// Whether the job has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// One row of the `fetch_jobs` table.
#[derive(Debug, Clone, Serialize)]
pub struct JobRow {
    pub job_id: String,
    pub user_id: String,
    pub status: JobStatus,
    pub platform: String,
    pub total_competitors: i64,
    pub ads_fetched: i64,
    pub started_at: Option<String>,
    pub ended_at: Option<String>,
    pub duration_seconds: Option<i64>,
    pub logs: Option<String>,
    pub error_message: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl<'r> sqlx::FromRow<'r, sqlx::sqlite::SqliteRow> for JobRow {
    fn from_row(row: &'r sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        let status: String = row.try_get("status")?;
        Ok(Self {
            job_id: row.try_get("job_id")?,
            user_id: row.try_get("user_id")?,
            status: JobStatus::from_db_str(&status),
            platform: row.try_get("platform")?,
            total_competitors: row.try_get("total_competitors")?,
            ads_fetched: row.try_get("ads_fetched")?,
            started_at: row.try_get("started_at")?,
            ended_at: row.try_get("ended_at")?,
            duration_seconds: row.try_get("duration_seconds")?,
            logs: row.try_get("logs")?,
            error_message: row.try_get("error_message")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// One row of the `users` table.
#[derive(Debug, Clone)]
pub struct UserRow {
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub onboarding_completed: bool,
    pub created_at: String,
}

impl<'r> sqlx::FromRow<'r, sqlx::sqlite::SqliteRow> for UserRow {
    fn from_row(row: &'r sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            user_id: row.try_get("user_id")?,
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            password_hash: row.try_get("password_hash")?,
            onboarding_completed: row.try_get("onboarding_completed")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// One row of the `competitors` table.
#[derive(Debug, Clone, Serialize)]
pub struct CompetitorRow {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub domain: String,
    pub platform: String,
    pub industry: Option<String>,
    pub estimated_monthly_spend: Option<f64>,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl<'r> sqlx::FromRow<'r, sqlx::sqlite::SqliteRow> for CompetitorRow {
    fn from_row(row: &'r sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            name: row.try_get("name")?,
            domain: row.try_get("domain")?,
            platform: row.try_get("platform")?,
            industry: row.try_get("industry")?,
            estimated_monthly_spend: row.try_get("estimated_monthly_spend")?,
            is_active: row.try_get("is_active")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// One row of the `daily_metrics` table.
#[derive(Debug, Clone, Serialize)]
pub struct DailyMetricRow {
    pub id: String,
    pub competitor_id: String,
    pub competitor_name: Option<String>,
    pub platform: String,
    pub creative: Option<String>,
    pub date: String,
    pub daily_spend: f64,
    pub daily_impressions: i64,
    pub daily_ctr: f64,
    pub created_at: String,
}

impl<'r> sqlx::FromRow<'r, sqlx::sqlite::SqliteRow> for DailyMetricRow {
    fn from_row(row: &'r sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            competitor_id: row.try_get("competitor_id")?,
            competitor_name: row.try_get("competitor_name")?,
            platform: row.try_get("platform")?,
            creative: row.try_get("creative")?,
            date: row.try_get("date")?,
            daily_spend: row.try_get("daily_spend")?,
            daily_impressions: row.try_get("daily_impressions")?,
            daily_ctr: row.try_get("daily_ctr")?,
            created_at: row.try_get("created_at")?,
        })
    }
}
