// crates/db/src/queries/competitors.rs
// Competitor directory: CRUD with soft delete, plus per-user aggregates.
// The active-competitor count feeds the job subsystem's progress estimates.

use crate::queries::row_types::CompetitorRow;
use crate::{Database, DbResult};
use chrono::Utc;
use serde::Serialize;

#[derive(Debug, Clone)]
pub struct NewCompetitor {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub domain: String,
    pub platform: String,
    pub industry: Option<String>,
    pub estimated_monthly_spend: Option<f64>,
}

/// Partial update; `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct UpdateCompetitor {
    pub name: Option<String>,
    pub domain: Option<String>,
    pub platform: Option<String>,
    pub industry: Option<String>,
    pub estimated_monthly_spend: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CompetitorStats {
    pub total: i64,
    pub active: i64,
    pub total_estimated_spend: f64,
}

impl Database {
    pub async fn insert_competitor(&self, competitor: &NewCompetitor) -> DbResult<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            INSERT INTO competitors (
                id, user_id, name, domain, platform, industry,
                estimated_monthly_spend, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1, ?8, ?8)
            "#,
        )
        .bind(&competitor.id)
        .bind(&competitor.user_id)
        .bind(&competitor.name)
        .bind(&competitor.domain)
        .bind(&competitor.platform)
        .bind(&competitor.industry)
        .bind(competitor.estimated_monthly_spend)
        .bind(&now)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn get_competitor(&self, id: &str) -> DbResult<Option<CompetitorRow>> {
        let row = sqlx::query_as::<_, CompetitorRow>("SELECT * FROM competitors WHERE id = ?1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        Ok(row)
    }

    /// The user's active competitors, newest first.
    pub async fn list_active_competitors(&self, user_id: &str) -> DbResult<Vec<CompetitorRow>> {
        let rows = sqlx::query_as::<_, CompetitorRow>(
            r#"
            SELECT * FROM competitors
            WHERE user_id = ?1 AND is_active = 1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    /// Snapshot count used by job admission for `total_competitors`.
    pub async fn count_active_competitors(&self, user_id: &str) -> DbResult<i64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM competitors WHERE user_id = ?1 AND is_active = 1",
        )
        .bind(user_id)
        .fetch_one(self.pool())
        .await?;
        Ok(count)
    }

    /// Ids of the user's active competitors (analytics joins).
    pub async fn active_competitor_ids(&self, user_id: &str) -> DbResult<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT id FROM competitors WHERE user_id = ?1 AND is_active = 1",
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Apply a partial update. Returns false for unknown ids.
    pub async fn update_competitor(&self, id: &str, update: &UpdateCompetitor) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE competitors
            SET name = COALESCE(?2, name),
                domain = COALESCE(?3, domain),
                platform = COALESCE(?4, platform),
                industry = COALESCE(?5, industry),
                estimated_monthly_spend = COALESCE(?6, estimated_monthly_spend),
                updated_at = ?7
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(&update.name)
        .bind(&update.domain)
        .bind(&update.platform)
        .bind(&update.industry)
        .bind(update.estimated_monthly_spend)
        .bind(Utc::now().to_rfc3339())
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Soft delete: flips `is_active`. The row (and its metrics history)
    /// stays. Returns false if the competitor was already inactive.
    pub async fn deactivate_competitor(&self, id: &str) -> DbResult<bool> {
        let result = sqlx::query(
            "UPDATE competitors SET is_active = 0, updated_at = ?2 WHERE id = ?1 AND is_active = 1",
        )
        .bind(id)
        .bind(Utc::now().to_rfc3339())
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn competitor_stats(&self, user_id: &str) -> DbResult<CompetitorStats> {
        let (total, active, total_estimated_spend): (i64, i64, f64) = sqlx::query_as(
            r#"
            SELECT
              COUNT(*),
              COALESCE(SUM(is_active), 0),
              COALESCE(SUM(CASE WHEN is_active = 1 THEN estimated_monthly_spend ELSE 0 END), 0.0)
            FROM competitors WHERE user_id = ?1
            "#,
        )
        .bind(user_id)
        .fetch_one(self.pool())
        .await?;
        Ok(CompetitorStats {
            total,
            active,
            total_estimated_spend,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(user_id: &str, name: &str) -> NewCompetitor {
        NewCompetitor {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            name: name.to_string(),
            domain: format!("{}.example.com", name),
            platform: "all".to_string(),
            industry: None,
            estimated_monthly_spend: Some(1000.0),
        }
    }

    #[tokio::test]
    async fn test_insert_list_and_count() {
        let db = Database::new_in_memory().await.unwrap();
        db.insert_competitor(&sample("user-1", "acme")).await.unwrap();
        db.insert_competitor(&sample("user-1", "globex")).await.unwrap();
        db.insert_competitor(&sample("user-2", "initech")).await.unwrap();

        assert_eq!(db.list_active_competitors("user-1").await.unwrap().len(), 2);
        assert_eq!(db.count_active_competitors("user-1").await.unwrap(), 2);
        assert_eq!(db.count_active_competitors("user-3").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_soft_delete_hides_from_listing() {
        let db = Database::new_in_memory().await.unwrap();
        let competitor = sample("user-1", "acme");
        db.insert_competitor(&competitor).await.unwrap();

        assert!(db.deactivate_competitor(&competitor.id).await.unwrap());
        assert_eq!(db.count_active_competitors("user-1").await.unwrap(), 0);

        // Row still exists; a second deactivate is a no-op.
        assert!(db.get_competitor(&competitor.id).await.unwrap().is_some());
        assert!(!db.deactivate_competitor(&competitor.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_partial_update() {
        let db = Database::new_in_memory().await.unwrap();
        let competitor = sample("user-1", "acme");
        db.insert_competitor(&competitor).await.unwrap();

        let updated = db
            .update_competitor(
                &competitor.id,
                &UpdateCompetitor {
                    name: Some("acme-corp".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(updated);

        let row = db.get_competitor(&competitor.id).await.unwrap().unwrap();
        assert_eq!(row.name, "acme-corp");
        // Unspecified fields untouched.
        assert_eq!(row.domain, "acme.example.com");
        assert_eq!(row.estimated_monthly_spend, Some(1000.0));
    }

    #[tokio::test]
    async fn test_competitor_stats() {
        let db = Database::new_in_memory().await.unwrap();
        let a = sample("user-1", "acme");
        let b = sample("user-1", "globex");
        db.insert_competitor(&a).await.unwrap();
        db.insert_competitor(&b).await.unwrap();
        db.deactivate_competitor(&b.id).await.unwrap();

        let stats = db.competitor_stats("user-1").await.unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.active, 1);
        assert_eq!(stats.total_estimated_spend, 1000.0);
    }
}
