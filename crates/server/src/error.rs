// crates/server/src/error.rs
use adscope_db::DbError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Structured JSON error response for API errors
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Conflicting job ids carried by admission rejections.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub existing_jobs: Option<Vec<String>>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: None,
            details: None,
            existing_jobs: None,
        }
    }

    pub fn with_details(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: None,
            details: Some(details.into()),
            existing_jobs: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

/// API error types that map to HTTP status codes
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid or expired token: {0}")]
    Unauthorized(String),

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Competitor not found: {0}")]
    CompetitorNotFound(String),

    #[error("User not found")]
    UserNotFound,

    #[error("An ads fetch is already in progress")]
    JobConflict { existing_jobs: Vec<String> },

    #[error("Email already exists")]
    EmailTaken,

    #[error("Job cannot be cancelled (current status: {current_status})")]
    InvalidState { current_status: String },

    #[error("Ads fetching is currently disabled")]
    FetcherUnavailable,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_response) = match &self {
            ApiError::Unauthorized(msg) => {
                tracing::warn!(message = %msg, "Unauthorized request");
                (
                    StatusCode::UNAUTHORIZED,
                    ErrorResponse::new("Invalid or expired token"),
                )
            }
            ApiError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                ErrorResponse::new("Invalid email or password"),
            ),
            ApiError::Forbidden(msg) => {
                tracing::warn!(message = %msg, "Forbidden");
                (StatusCode::FORBIDDEN, ErrorResponse::new(msg.clone()))
            }
            ApiError::JobNotFound(id) => {
                tracing::warn!(job_id = %id, "Job not found");
                (
                    StatusCode::NOT_FOUND,
                    ErrorResponse::with_details("Job not found", format!("Job ID: {}", id)),
                )
            }
            ApiError::CompetitorNotFound(id) => {
                tracing::warn!(competitor_id = %id, "Competitor not found");
                (
                    StatusCode::NOT_FOUND,
                    ErrorResponse::with_details(
                        "Competitor not found",
                        format!("Competitor ID: {}", id),
                    ),
                )
            }
            ApiError::UserNotFound => {
                (StatusCode::NOT_FOUND, ErrorResponse::new("User not found"))
            }
            ApiError::JobConflict { existing_jobs } => {
                tracing::warn!(existing = ?existing_jobs, "Admission conflict");
                let mut body = ErrorResponse::new("You already have an ads fetch in progress")
                    .with_code("JOB_ALREADY_RUNNING");
                body.existing_jobs = Some(existing_jobs.clone());
                (StatusCode::CONFLICT, body)
            }
            ApiError::EmailTaken => (
                StatusCode::CONFLICT,
                ErrorResponse::new("Email already exists"),
            ),
            ApiError::InvalidState { current_status } => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::new(format!(
                    "Job cannot be cancelled (current status: {})",
                    current_status
                )),
            ),
            ApiError::FetcherUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorResponse::with_details(
                    "Ads fetching is currently disabled",
                    "The ads fetcher is not properly configured. Please contact support.",
                )
                .with_code("FETCHER_NOT_AVAILABLE"),
            ),
            ApiError::BadRequest(msg) => {
                tracing::warn!(message = %msg, "Bad request");
                (
                    StatusCode::BAD_REQUEST,
                    ErrorResponse::with_details("Bad request", msg.clone()),
                )
            }
            ApiError::Database(db_err) => {
                tracing::error!(error = %db_err, "Database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new("Database error"),
                )
            }
            ApiError::Internal(msg) => {
                tracing::error!(message = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new("Internal server error"),
                )
            }
        };

        (status, Json(error_response)).into_response()
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
