// crates/db/src/queries/metrics.rs
// Analytics reads over daily_metrics, the table the external fetch
// capability writes into. Everything here is scoped to one user's
// competitors via a join on the competitors table.

use crate::queries::row_types::DailyMetricRow;
use crate::{Database, DbResult};
use serde::Serialize;

/// Totals across a user's active competitors.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MetricTotals {
    pub total_ads: i64,
    pub total_spend: f64,
    pub total_impressions: i64,
}

/// Per-competitor aggregate for the analytics summary.
#[derive(Debug, Clone, Serialize)]
pub struct CompetitorAggregate {
    pub competitor_id: String,
    pub competitor_name: String,
    pub total_spend: f64,
    pub total_impressions: i64,
    pub avg_ctr: f64,
    pub ad_count: i64,
}

impl<'r> sqlx::FromRow<'r, sqlx::sqlite::SqliteRow> for CompetitorAggregate {
    fn from_row(row: &'r sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;
        Ok(Self {
            competitor_id: row.try_get("competitor_id")?,
            competitor_name: row.try_get("competitor_name")?,
            total_spend: row.try_get("total_spend")?,
            total_impressions: row.try_get("total_impressions")?,
            avg_ctr: row.try_get("avg_ctr")?,
            ad_count: row.try_get("ad_count")?,
        })
    }
}

impl Database {
    /// Insert one metric row (used by the fetch pipeline and by tests).
    pub async fn insert_daily_metric(&self, metric: &DailyMetricRow) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO daily_metrics (
                id, competitor_id, competitor_name, platform, creative,
                date, daily_spend, daily_impressions, daily_ctr, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&metric.id)
        .bind(&metric.competitor_id)
        .bind(&metric.competitor_name)
        .bind(&metric.platform)
        .bind(&metric.creative)
        .bind(&metric.date)
        .bind(metric.daily_spend)
        .bind(metric.daily_impressions)
        .bind(metric.daily_ctr)
        .bind(&metric.created_at)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Recent metric rows for the user's active competitors, newest first,
    /// restricted to rows created at or after `since` (RFC 3339).
    pub async fn recent_metrics(
        &self,
        user_id: &str,
        since: &str,
        limit: i64,
    ) -> DbResult<Vec<DailyMetricRow>> {
        let rows = sqlx::query_as::<_, DailyMetricRow>(
            r#"
            SELECT m.* FROM daily_metrics m
            JOIN competitors c ON c.id = m.competitor_id
            WHERE c.user_id = ?1 AND c.is_active = 1 AND m.created_at >= ?2
            ORDER BY m.created_at DESC
            LIMIT ?3
            "#,
        )
        .bind(user_id)
        .bind(since)
        .bind(limit.clamp(1, 500))
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    /// Ads/spend/impressions totals across the user's active competitors.
    pub async fn metric_totals(&self, user_id: &str) -> DbResult<MetricTotals> {
        let (total_ads, total_spend, total_impressions): (i64, f64, i64) = sqlx::query_as(
            r#"
            SELECT
              COUNT(*),
              COALESCE(SUM(m.daily_spend), 0.0),
              COALESCE(SUM(m.daily_impressions), 0)
            FROM daily_metrics m
            JOIN competitors c ON c.id = m.competitor_id
            WHERE c.user_id = ?1 AND c.is_active = 1
            "#,
        )
        .bind(user_id)
        .fetch_one(self.pool())
        .await?;
        Ok(MetricTotals {
            total_ads,
            total_spend,
            total_impressions,
        })
    }

    /// Per-competitor spend/impressions/CTR aggregates over rows dated at or
    /// after `since` (YYYY-MM-DD), highest spend first.
    pub async fn competitor_aggregates(
        &self,
        user_id: &str,
        since: &str,
    ) -> DbResult<Vec<CompetitorAggregate>> {
        let rows = sqlx::query_as::<_, CompetitorAggregate>(
            r#"
            SELECT
              c.id AS competitor_id,
              c.name AS competitor_name,
              COALESCE(SUM(m.daily_spend), 0.0) AS total_spend,
              COALESCE(SUM(m.daily_impressions), 0) AS total_impressions,
              COALESCE(AVG(m.daily_ctr), 0.0) AS avg_ctr,
              COUNT(m.id) AS ad_count
            FROM competitors c
            LEFT JOIN daily_metrics m
              ON m.competitor_id = c.id AND m.date >= ?2
            WHERE c.user_id = ?1 AND c.is_active = 1
            GROUP BY c.id, c.name
            ORDER BY total_spend DESC
            "#,
        )
        .bind(user_id)
        .bind(since)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }
}
