// crates/server/src/routes/analytics.rs
//! Analytics over fetched ads data: recent updates and the per-competitor
//! summary. Reads only; the fetch pipeline owns the writes.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

use adscope_db::DailyMetricRow;

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::state::AppState;

/// Long creatives are previewed at this many characters.
const CREATIVE_PREVIEW_CHARS: usize = 200;

#[derive(Debug, Deserialize, Default)]
pub struct RecentAdsQuery {
    pub limit: Option<i64>,
    pub hours: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct RecentAd {
    #[serde(flatten)]
    pub metric: DailyMetricRow,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creative_preview: Option<String>,
}

fn creative_preview(creative: Option<&str>) -> Option<String> {
    let creative = creative?;
    if creative.chars().count() > CREATIVE_PREVIEW_CHARS {
        let mut preview: String = creative.chars().take(CREATIVE_PREVIEW_CHARS).collect();
        preview.push_str("...");
        Some(preview)
    } else {
        Some(creative.to_string())
    }
}

/// GET /api/recent-ads-updates - Recently fetched ads for the caller's
/// competitors, newest first.
async fn recent_ads_updates(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(query): Query<RecentAdsQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let hours = query.hours.unwrap_or(24).clamp(1, 24 * 30);
    let limit = query.limit.unwrap_or(20);
    let since = (Utc::now() - Duration::hours(hours)).to_rfc3339();

    let competitors_count = state.db.count_active_competitors(&user.user_id).await?;
    let ads: Vec<RecentAd> = state
        .db
        .recent_metrics(&user.user_id, &since, limit)
        .await?
        .into_iter()
        .map(|metric| RecentAd {
            creative_preview: creative_preview(metric.creative.as_deref()),
            metric,
        })
        .collect();

    let count = ads.len();
    Ok(Json(serde_json::json!({
        "ads": ads,
        "count": count,
        "competitors_count": competitors_count,
        "timeframe_hours": hours,
        "last_updated": Utc::now().to_rfc3339(),
    })))
}

/// GET /api/analytics/summary - Per-competitor spend/impressions/CTR over
/// the last 30 days, plus totals.
async fn analytics_summary(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> ApiResult<Json<serde_json::Value>> {
    let since = (Utc::now() - Duration::days(30))
        .format("%Y-%m-%d")
        .to_string();

    let competitors = state.db.competitor_aggregates(&user.user_id, &since).await?;
    let totals = state.db.metric_totals(&user.user_id).await?;
    let total_competitors = competitors.len();

    Ok(Json(serde_json::json!({
        "success": true,
        "data": {
            "competitors": competitors,
            "total_competitors": total_competitors,
            "totals": totals,
        },
    })))
}

/// Create the analytics routes router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/recent-ads-updates", get(recent_ads_updates))
        .route("/analytics/summary", get(analytics_summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use adscope_db::NewCompetitor;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    async fn authed_state() -> (Arc<AppState>, String) {
        let state = AppState::for_tests().await;
        let token = crate::auth::issue_token(
            &state.config.jwt_secret,
            1,
            "user-1",
            "ada@example.com",
            "Ada",
        )
        .unwrap();
        (state, token)
    }

    fn app(state: Arc<AppState>) -> Router {
        Router::new().nest("/api", router()).with_state(state)
    }

    fn get_request(uri: &str, token: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header("authorization", format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn seed_competitor_with_metric(state: &AppState, creative_len: usize) -> String {
        let competitor = NewCompetitor {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: "user-1".to_string(),
            name: "acme".to_string(),
            domain: "acme.com".to_string(),
            platform: "meta".to_string(),
            industry: None,
            estimated_monthly_spend: None,
        };
        state.db.insert_competitor(&competitor).await.unwrap();
        state
            .db
            .insert_daily_metric(&DailyMetricRow {
                id: uuid::Uuid::new_v4().to_string(),
                competitor_id: competitor.id.clone(),
                competitor_name: Some("acme".to_string()),
                platform: "meta".to_string(),
                creative: Some("c".repeat(creative_len)),
                date: Utc::now().format("%Y-%m-%d").to_string(),
                daily_spend: 12.5,
                daily_impressions: 1000,
                daily_ctr: 2.0,
                created_at: Utc::now().to_rfc3339(),
            })
            .await
            .unwrap();
        competitor.id
    }

    #[tokio::test]
    async fn test_recent_ads_with_preview_truncation() {
        let (state, token) = authed_state().await;
        seed_competitor_with_metric(&state, 350).await;

        let response = app(state)
            .oneshot(get_request("/api/recent-ads-updates", &token))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["count"], 1);
        assert_eq!(json["competitors_count"], 1);
        let preview = json["ads"][0]["creative_preview"].as_str().unwrap();
        assert_eq!(preview.chars().count(), 203); // 200 + "..."
        assert!(preview.ends_with("..."));
    }

    #[tokio::test]
    async fn test_recent_ads_empty_for_new_user() {
        let (state, token) = authed_state().await;
        let response = app(state)
            .oneshot(get_request("/api/recent-ads-updates?hours=48", &token))
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["count"], 0);
        assert_eq!(json["timeframe_hours"], 48);
    }

    #[tokio::test]
    async fn test_analytics_summary() {
        let (state, token) = authed_state().await;
        let competitor_id = seed_competitor_with_metric(&state, 10).await;

        let response = app(state)
            .oneshot(get_request("/api/analytics/summary", &token))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"]["total_competitors"], 1);
        assert_eq!(json["data"]["competitors"][0]["competitor_id"], competitor_id);
        assert_eq!(json["data"]["competitors"][0]["total_spend"], 12.5);
        assert_eq!(json["data"]["totals"]["total_impressions"], 1000);
    }

    #[test]
    fn test_creative_preview() {
        assert_eq!(creative_preview(None), None);
        assert_eq!(creative_preview(Some("short")), Some("short".to_string()));
        let long = "x".repeat(250);
        let preview = creative_preview(Some(&long)).unwrap();
        assert!(preview.ends_with("..."));
        assert_eq!(preview.chars().count(), 203);
    }
}
