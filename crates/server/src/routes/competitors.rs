// crates/server/src/routes/competitors.rs
//! Competitor tracking: CRUD with soft delete, plus per-user stats.
//! Every route is owner-scoped via the bearer token.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use adscope_db::{CompetitorRow, CompetitorStats, NewCompetitor, UpdateCompetitor};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateCompetitorRequest {
    pub name: String,
    pub domain: String,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub estimated_monthly_spend: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
pub struct UpdateCompetitorRequest {
    pub name: Option<String>,
    pub domain: Option<String>,
    pub platform: Option<String>,
    pub industry: Option<String>,
    pub estimated_monthly_spend: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct CompetitorListResponse {
    pub success: bool,
    pub data: Vec<CompetitorRow>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct CompetitorResponse {
    pub success: bool,
    pub data: CompetitorRow,
}

/// Look up a competitor and verify the caller owns it. Distinguishes
/// "doesn't exist" (404) from "exists but not yours" (403).
async fn owned_competitor(
    state: &AppState,
    user_id: &str,
    competitor_id: &str,
) -> ApiResult<CompetitorRow> {
    let competitor = state
        .db
        .get_competitor(competitor_id)
        .await?
        .ok_or_else(|| ApiError::CompetitorNotFound(competitor_id.to_string()))?;
    if competitor.user_id != user_id {
        return Err(ApiError::Forbidden(
            "Unauthorized to access this competitor".to_string(),
        ));
    }
    Ok(competitor)
}

/// GET /api/competitors - The user's active competitors.
async fn list_competitors(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> ApiResult<Json<CompetitorListResponse>> {
    let data = state.db.list_active_competitors(&user.user_id).await?;
    Ok(Json(CompetitorListResponse {
        success: true,
        count: data.len(),
        data,
    }))
}

/// POST /api/competitors - Track a new competitor.
async fn create_competitor(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<CreateCompetitorRequest>,
) -> ApiResult<(StatusCode, Json<CompetitorResponse>)> {
    if req.name.trim().is_empty() || req.domain.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "Competitor name and domain are required".to_string(),
        ));
    }

    let competitor = NewCompetitor {
        id: Uuid::new_v4().to_string(),
        user_id: user.user_id.clone(),
        name: req.name.trim().to_string(),
        domain: req.domain.trim().to_string(),
        platform: req.platform.unwrap_or_else(|| "all".to_string()),
        industry: req.industry,
        estimated_monthly_spend: req.estimated_monthly_spend,
    };
    state.db.insert_competitor(&competitor).await?;
    tracing::info!(competitor_id = %competitor.id, user_id = %user.user_id, "competitor added");

    let data = state
        .db
        .get_competitor(&competitor.id)
        .await?
        .ok_or_else(|| ApiError::Internal("competitor vanished after insert".to_string()))?;
    Ok((
        StatusCode::CREATED,
        Json(CompetitorResponse {
            success: true,
            data,
        }),
    ))
}

/// PUT /api/competitors/{id} - Update an owned competitor.
async fn update_competitor(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateCompetitorRequest>,
) -> ApiResult<Json<CompetitorResponse>> {
    owned_competitor(&state, &user.user_id, &id).await?;

    state
        .db
        .update_competitor(
            &id,
            &UpdateCompetitor {
                name: req.name,
                domain: req.domain,
                platform: req.platform,
                industry: req.industry,
                estimated_monthly_spend: req.estimated_monthly_spend,
            },
        )
        .await?;

    let data = state
        .db
        .get_competitor(&id)
        .await?
        .ok_or_else(|| ApiError::CompetitorNotFound(id))?;
    Ok(Json(CompetitorResponse {
        success: true,
        data,
    }))
}

/// DELETE /api/competitors/{id} - Soft-delete an owned competitor.
async fn delete_competitor(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let competitor = owned_competitor(&state, &user.user_id, &id).await?;
    if !competitor.is_active || !state.db.deactivate_competitor(&id).await? {
        return Err(ApiError::CompetitorNotFound(id));
    }
    tracing::info!(competitor_id = %id, user_id = %user.user_id, "competitor deactivated");
    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Competitor removed",
        "id": id,
    })))
}

/// GET /api/competitors/stats - Counts and spend totals.
async fn competitor_stats(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> ApiResult<Json<CompetitorStats>> {
    Ok(Json(state.db.competitor_stats(&user.user_id).await?))
}

/// Create the competitors routes router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/competitors", get(list_competitors).post(create_competitor))
        .route("/competitors/stats", get(competitor_stats))
        .route(
            "/competitors/{id}",
            put(update_competitor).delete(delete_competitor),
        )
}
