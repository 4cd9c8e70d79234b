use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_postgres::Pool;
use tokio_postgres::{error::SqlState, Row};
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    models::user::{NewUser, User},
};

/// Message surfaced when an e-mail is already taken.
pub const DUPLICATE_EMAIL: &str = "User with this email already exists";

/// Persistence of user records.
///
/// E-mail lookups are case-insensitive; implementations store the address
/// lower-cased.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Inserts a user. Fails with [`AppError::Conflict`] when the e-mail exists.
    async fn create_user(&self, new_user: NewUser) -> Result<User>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<User>>;

    /// Sets `last_login_at`.
    async fn record_login(&self, user_id: Uuid, at: DateTime<Utc>) -> Result<()>;

    /// Fills a missing Google id and picture and sets `last_login_at`.
    /// Fields that are already set are left untouched.
    async fn record_federated_login(
        &self,
        user_id: Uuid,
        google_id: &str,
        picture: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<User>;
}

/// A helper function to map a `tokio_postgres::Row` to a `User`.
fn row_to_user(row: &Row) -> Result<User> {
    Ok(User {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        google_id: row.try_get("google_id")?,
        profile_picture: row.try_get("profile_picture")?,
        created_at: row.try_get("created_at")?,
        last_login_at: row.try_get("last_login_at")?,
        is_active: row.try_get("is_active")?,
    })
}

/// PostgreSQL-backed [`UserStore`].
#[derive(Clone)]
pub struct PgUserStore {
    pool: Pool,
}

impl PgUserStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create_user(&self, new_user: NewUser) -> Result<User> {
        let client = self.pool.get().await?;
        let id = Uuid::new_v4();
        let email = new_user.email.to_lowercase();
        let row = client
            .query_one(
                r#"
                INSERT INTO users (id, name, email, password_hash, google_id, profile_picture, last_login_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING *
                "#,
                &[
                    &id,
                    &new_user.name,
                    &email,
                    &new_user.password_hash,
                    &new_user.google_id,
                    &new_user.profile_picture,
                    &new_user.last_login_at,
                ],
            )
            .await
            .map_err(|e| {
                if e.code() == Some(&SqlState::UNIQUE_VIOLATION) {
                    AppError::Conflict(DUPLICATE_EMAIL.to_string())
                } else {
                    AppError::from(e)
                }
            })?;
        row_to_user(&row)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                r#"
                SELECT *
                FROM users
                WHERE LOWER(email) = LOWER($1)
                "#,
                &[&email.trim()],
            )
            .await?;
        row.map(|r| row_to_user(&r)).transpose()
    }

    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<User>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                r#"
                SELECT *
                FROM users
                WHERE id = $1
                "#,
                &[&user_id],
            )
            .await?;
        row.map(|r| row_to_user(&r)).transpose()
    }

    async fn record_login(&self, user_id: Uuid, at: DateTime<Utc>) -> Result<()> {
        let client = self.pool.get().await?;
        client
            .execute(
                "UPDATE users SET last_login_at = $1 WHERE id = $2",
                &[&at, &user_id],
            )
            .await?;
        Ok(())
    }

    async fn record_federated_login(
        &self,
        user_id: Uuid,
        google_id: &str,
        picture: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<User> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                r#"
                UPDATE users
                SET
                    google_id = COALESCE(NULLIF(google_id, ''), $1),
                    profile_picture = COALESCE(NULLIF(profile_picture, ''), $2),
                    last_login_at = $3
                WHERE id = $4
                RETURNING *
                "#,
                &[&google_id, &picture, &at, &user_id],
            )
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
        row_to_user(&row)
    }
}
