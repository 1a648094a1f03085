// crates/server/src/auth.rs
//! Token issue/verify and password hashing for the auth surface, plus the
//! axum extractors that gate job-subsystem operations on a valid user.
//!
//! Tokens are HS256 with a 30-day expiry, signed with the configured
//! secret. Passwords are argon2id hashes; plaintext never leaves this
//! module's call sites.

use std::sync::Arc;

use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

/// Claims embedded in every issued token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: String,
    pub email: String,
    pub name: String,
    pub exp: i64,
}

/// Issue a signed token for the given user.
pub fn issue_token(
    secret: &str,
    ttl_days: i64,
    user_id: &str,
    email: &str,
    name: &str,
) -> Result<String, ApiError> {
    let claims = Claims {
        user_id: user_id.to_string(),
        email: email.to_string(),
        name: name.to_string(),
        exp: (Utc::now() + Duration::days(ttl_days)).timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(format!("token encoding failed: {e}")))
}

/// Decode and validate a token, returning its claims.
pub fn decode_token(secret: &str, token: &str) -> Result<Claims, ApiError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| ApiError::Unauthorized(e.to_string()))
}

/// Hash a password with argon2id and a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::Internal(format!("password hashing failed: {e}")))
}

/// Verify a password against a stored argon2 hash. A malformed stored hash
/// verifies as false rather than erroring.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    PasswordHash::new(stored_hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

/// Pull the bearer token out of the Authorization header, if present.
fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Extractor for endpoints that require an authenticated user.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
}

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| ApiError::Unauthorized("missing authorization header".to_string()))?;
        let claims = decode_token(&state.config.jwt_secret, token)?;
        Ok(AuthUser {
            user_id: claims.user_id,
        })
    }
}

/// Extractor for endpoints where authentication is optional (the polling
/// status endpoints). A missing or invalid token yields `None`; ownership
/// checks are then skipped, matching the polling contract.
#[derive(Debug, Clone)]
pub struct MaybeAuthUser(pub Option<AuthUser>);

impl FromRequestParts<Arc<AppState>> for MaybeAuthUser {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let user = bearer_token(parts)
            .and_then(|token| decode_token(&state.config.jwt_secret, token).ok())
            .map(|claims| AuthUser {
                user_id: claims.user_id,
            });
        Ok(MaybeAuthUser(user))
    }
}
