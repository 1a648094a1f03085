// crates/server/src/routes/auth.rs
//! Registration, login, token verification, and onboarding.
//!
//! Tokens gate every job-subsystem operation; the crypto itself lives in
//! `crate::auth`.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use adscope_db::NewUser;

use crate::auth::{self, AuthUser};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(rename = "confirmPassword")]
    pub confirm_password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub token: String,
}

/// User payload embedded in auth responses. Never includes the hash.
#[derive(Debug, Serialize)]
pub struct UserPayload {
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub onboarding_completed: bool,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub success: bool,
    pub message: String,
    pub token: String,
    pub user: UserPayload,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub success: bool,
    pub user: UserPayload,
}

fn user_payload(user: &adscope_db::UserRow) -> UserPayload {
    UserPayload {
        user_id: user.user_id.clone(),
        name: user.name.clone(),
        email: user.email.clone(),
        onboarding_completed: user.onboarding_completed,
    }
}

/// POST /api/auth/signup - Register a new account.
async fn signup(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignupRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    if req.name.trim().is_empty() || req.email.trim().is_empty() || req.password.is_empty() {
        return Err(ApiError::BadRequest(
            "Fill all the details before proceeding".to_string(),
        ));
    }
    if req.password != req.confirm_password {
        return Err(ApiError::BadRequest("Passwords do not match".to_string()));
    }
    if req.password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::BadRequest(
            "Password must be at least 8 characters long".to_string(),
        ));
    }

    let email = req.email.trim().to_lowercase();
    if state.db.get_user_by_email(&email).await?.is_some() {
        return Err(ApiError::EmailTaken);
    }

    let user = NewUser {
        user_id: Uuid::new_v4().to_string(),
        name: req.name.trim().to_string(),
        email: email.clone(),
        password_hash: auth::hash_password(&req.password)?,
    };
    state.db.insert_user(&user).await?;
    tracing::info!(user_id = %user.user_id, "user registered");

    let token = auth::issue_token(
        &state.config.jwt_secret,
        state.config.token_ttl_days,
        &user.user_id,
        &user.email,
        &user.name,
    )?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            success: true,
            message: "Account Created Successfully".to_string(),
            token,
            user: UserPayload {
                user_id: user.user_id,
                name: user.name,
                email: user.email,
                onboarding_completed: false,
            },
        }),
    ))
}

/// POST /api/auth/login - Exchange credentials for a token.
async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let email = req.email.trim().to_lowercase();
    let user = state
        .db
        .get_user_by_email(&email)
        .await?
        .ok_or(ApiError::InvalidCredentials)?;

    if !auth::verify_password(&req.password, &user.password_hash) {
        return Err(ApiError::InvalidCredentials);
    }

    let token = auth::issue_token(
        &state.config.jwt_secret,
        state.config.token_ttl_days,
        &user.user_id,
        &user.email,
        &user.name,
    )?;

    Ok(Json(AuthResponse {
        success: true,
        message: "Login successful".to_string(),
        token,
        user: user_payload(&user),
    }))
}

/// POST /api/auth/verify - Validate a token and return its user.
async fn verify(
    State(state): State<Arc<AppState>>,
    Json(req): Json<VerifyRequest>,
) -> ApiResult<Json<VerifyResponse>> {
    let claims = auth::decode_token(&state.config.jwt_secret, &req.token)?;
    let user = state
        .db
        .get_user(&claims.user_id)
        .await?
        .ok_or(ApiError::UserNotFound)?;

    Ok(Json(VerifyResponse {
        success: true,
        user: user_payload(&user),
    }))
}

/// POST /api/auth/complete-onboarding - Flip the onboarding flag.
async fn complete_onboarding(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> ApiResult<Json<VerifyResponse>> {
    if !state.db.complete_onboarding(&user.user_id).await? {
        return Err(ApiError::UserNotFound);
    }
    let user = state
        .db
        .get_user(&user.user_id)
        .await?
        .ok_or(ApiError::UserNotFound)?;

    Ok(Json(VerifyResponse {
        success: true,
        user: user_payload(&user),
    }))
}

/// Create the auth routes router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/verify", post(verify))
        .route("/auth/complete-onboarding", post(complete_onboarding))
}
