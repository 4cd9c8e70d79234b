use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_postgres::Pool;
use tokio_postgres::Row;
use uuid::Uuid;

use crate::{
    error::Result,
    models::chat::{ChatSession, Message, Role, SessionWithCount},
};

/// Persistence of chat sessions and their messages.
///
/// Every lookup that takes a `user_id` only matches sessions owned by that
/// user; a foreign session behaves exactly like a missing one.
#[async_trait]
pub trait ChatStore: Send + Sync {
    async fn create_session(&self, user_id: Uuid, title: &str) -> Result<ChatSession>;

    async fn find_session(&self, session_id: Uuid, user_id: Uuid) -> Result<Option<ChatSession>>;

    /// Sessions of a user, most recently updated first.
    async fn list_sessions(&self, user_id: Uuid) -> Result<Vec<SessionWithCount>>;

    /// All messages of a session in creation order, or `None` when the
    /// session does not exist for this user.
    async fn list_messages(&self, session_id: Uuid, user_id: Uuid) -> Result<Option<Vec<Message>>>;

    /// The `limit` most recent messages of a session, oldest first.
    async fn recent_messages(&self, session_id: Uuid, limit: usize) -> Result<Vec<Message>>;

    /// Appends a message and bumps the session's `updated_at`.
    async fn append_message(&self, session_id: Uuid, role: Role, content: &str) -> Result<Message>;

    /// Bumps `updated_at`, optionally replacing the title.
    async fn touch_session(&self, session_id: Uuid, title: Option<&str>) -> Result<()>;

    /// Returns `false` when the session does not exist for this user.
    async fn rename_session(&self, session_id: Uuid, user_id: Uuid, title: &str) -> Result<bool>;

    /// Deletes the session and all of its messages. Returns `false` when the
    /// session does not exist for this user.
    async fn delete_session(&self, session_id: Uuid, user_id: Uuid) -> Result<bool>;
}

fn row_to_session(row: &Row) -> Result<ChatSession> {
    Ok(ChatSession {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        title: row.try_get("title")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_message(row: &Row) -> Result<Message> {
    Ok(Message {
        id: row.try_get("id")?,
        session_id: row.try_get("session_id")?,
        role: row.try_get("role")?,
        content: row.try_get("content")?,
        created_at: row.try_get("created_at")?,
    })
}

/// PostgreSQL-backed [`ChatStore`]. Cascading deletes are enforced by the
/// schema's foreign keys.
#[derive(Clone)]
pub struct PgChatStore {
    pool: Pool,
}

impl PgChatStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChatStore for PgChatStore {
    async fn create_session(&self, user_id: Uuid, title: &str) -> Result<ChatSession> {
        let client = self.pool.get().await?;
        let now: DateTime<Utc> = Utc::now();
        let row = client
            .query_one(
                r#"
                INSERT INTO chat_sessions (id, user_id, title, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $4)
                RETURNING id, user_id, title, created_at, updated_at
                "#,
                &[&Uuid::now_v7(), &user_id, &title, &now],
            )
            .await?;
        row_to_session(&row)
    }

    async fn find_session(&self, session_id: Uuid, user_id: Uuid) -> Result<Option<ChatSession>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                r#"
                SELECT id, user_id, title, created_at, updated_at
                FROM chat_sessions
                WHERE id = $1 AND user_id = $2
                "#,
                &[&session_id, &user_id],
            )
            .await?;
        row.map(|r| row_to_session(&r)).transpose()
    }

    async fn list_sessions(&self, user_id: Uuid) -> Result<Vec<SessionWithCount>> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                r#"
                SELECT s.id, s.user_id, s.title, s.created_at, s.updated_at,
                       COUNT(m.id) AS message_count
                FROM chat_sessions s
                LEFT JOIN chat_messages m ON m.session_id = s.id
                WHERE s.user_id = $1
                GROUP BY s.id
                ORDER BY s.updated_at DESC
                "#,
                &[&user_id],
            )
            .await?;

        rows.iter()
            .map(|row| {
                Ok(SessionWithCount {
                    session: row_to_session(row)?,
                    message_count: row.try_get("message_count")?,
                })
            })
            .collect()
    }

    async fn list_messages(&self, session_id: Uuid, user_id: Uuid) -> Result<Option<Vec<Message>>> {
        let client = self.pool.get().await?;
        let owned = client
            .query_opt(
                "SELECT 1 FROM chat_sessions WHERE id = $1 AND user_id = $2",
                &[&session_id, &user_id],
            )
            .await?;
        if owned.is_none() {
            return Ok(None);
        }

        let rows = client
            .query(
                r#"
                SELECT id, session_id, role, content, created_at
                FROM chat_messages
                WHERE session_id = $1
                ORDER BY created_at ASC, id ASC
                "#,
                &[&session_id],
            )
            .await?;
        rows.iter().map(row_to_message).collect::<Result<Vec<_>>>().map(Some)
    }

    async fn recent_messages(&self, session_id: Uuid, limit: usize) -> Result<Vec<Message>> {
        let client = self.pool.get().await?;
        let limit = limit as i64;
        let rows = client
            .query(
                r#"
                SELECT id, session_id, role, content, created_at
                FROM (
                    SELECT id, session_id, role, content, created_at
                    FROM chat_messages
                    WHERE session_id = $1
                    ORDER BY created_at DESC, id DESC
                    LIMIT $2
                ) recent
                ORDER BY created_at ASC, id ASC
                "#,
                &[&session_id, &limit],
            )
            .await?;
        rows.iter().map(row_to_message).collect()
    }

    async fn append_message(&self, session_id: Uuid, role: Role, content: &str) -> Result<Message> {
        let mut client = self.pool.get().await?;
        let transaction = client.transaction().await?;
        let now: DateTime<Utc> = Utc::now();

        let row = transaction
            .query_one(
                r#"
                INSERT INTO chat_messages (id, session_id, role, content, created_at)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING id, session_id, role, content, created_at
                "#,
                &[&Uuid::now_v7(), &session_id, &role, &content, &now],
            )
            .await?;

        transaction
            .execute(
                "UPDATE chat_sessions SET updated_at = $1 WHERE id = $2",
                &[&now, &session_id],
            )
            .await?;

        transaction.commit().await?;
        row_to_message(&row)
    }

    async fn touch_session(&self, session_id: Uuid, title: Option<&str>) -> Result<()> {
        let client = self.pool.get().await?;
        client
            .execute(
                r#"
                UPDATE chat_sessions
                SET updated_at = $1, title = COALESCE($2, title)
                WHERE id = $3
                "#,
                &[&Utc::now(), &title, &session_id],
            )
            .await?;
        Ok(())
    }

    async fn rename_session(&self, session_id: Uuid, user_id: Uuid, title: &str) -> Result<bool> {
        let client = self.pool.get().await?;
        let updated = client
            .execute(
                r#"
                UPDATE chat_sessions
                SET title = $1, updated_at = $2
                WHERE id = $3 AND user_id = $4
                "#,
                &[&title, &Utc::now(), &session_id, &user_id],
            )
            .await?;
        Ok(updated > 0)
    }

    async fn delete_session(&self, session_id: Uuid, user_id: Uuid) -> Result<bool> {
        let client = self.pool.get().await?;
        let deleted = client
            .execute(
                "DELETE FROM chat_sessions WHERE id = $1 AND user_id = $2",
                &[&session_id, &user_id],
            )
            .await?;
        Ok(deleted > 0)
    }
}
