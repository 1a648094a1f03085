// crates/db/src/queries/users.rs
// User directory: registration, lookup, onboarding flag.

use crate::queries::row_types::UserRow;
use crate::{Database, DbResult};
use chrono::Utc;

/// Fields required to register a new user. The caller hashes the password;
/// this layer never sees plaintext credentials.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

impl Database {
    /// Insert a new user. Fails with a unique-constraint error when the
    /// email is already registered; callers map that to a conflict.
    pub async fn insert_user(&self, user: &NewUser) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (user_id, name, email, password_hash, onboarding_completed, created_at)
            VALUES (?1, ?2, ?3, ?4, 0, ?5)
            "#,
        )
        .bind(&user.user_id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(Utc::now().to_rfc3339())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn get_user(&self, user_id: &str) -> DbResult<Option<UserRow>> {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE user_id = ?1")
            .bind(user_id)
            .fetch_optional(self.pool())
            .await?;
        Ok(row)
    }

    /// Lookup by email (stored lowercased; callers normalize before calling).
    pub async fn get_user_by_email(&self, email: &str) -> DbResult<Option<UserRow>> {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE email = ?1")
            .bind(email)
            .fetch_optional(self.pool())
            .await?;
        Ok(row)
    }

    /// Mark the user's onboarding as completed. Returns false for unknown ids.
    pub async fn complete_onboarding(&self, user_id: &str) -> DbResult<bool> {
        let result = sqlx::query("UPDATE users SET onboarding_completed = 1 WHERE user_id = ?1")
            .bind(user_id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() == 1)
    }
}
