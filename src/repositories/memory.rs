//! In-process store used when no database is configured, and by tests.
//!
//! All tables live behind one `RwLock`, so a session delete removes the
//! session and its messages atomically and no orphan message is observable.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    models::{
        chat::{ChatSession, Message, Role, SessionWithCount},
        user::{NewUser, User},
    },
    repositories::{
        chat::ChatStore,
        user::{UserStore, DUPLICATE_EMAIL},
    },
};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    sessions: HashMap<Uuid, ChatSession>,
    /// Messages in insertion order, which is also creation order.
    messages: Vec<Message>,
}

/// Implements both [`UserStore`] and [`ChatStore`]. Clones share state.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored messages across all sessions.
    pub async fn message_count(&self) -> usize {
        self.tables.read().await.messages.len()
    }

    /// Flags a user active or inactive.
    pub async fn set_active(&self, user_id: Uuid, active: bool) -> Result<()> {
        let mut tables = self.tables.write().await;
        let user = tables
            .users
            .get_mut(&user_id)
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
        user.is_active = active;
        Ok(())
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, new_user: NewUser) -> Result<User> {
        let mut tables = self.tables.write().await;
        let email = new_user.email.trim().to_lowercase();

        if tables.users.values().any(|u| u.email == email) {
            return Err(AppError::Conflict(DUPLICATE_EMAIL.to_string()));
        }

        let user = User {
            id: Uuid::new_v4(),
            name: new_user.name,
            email,
            password_hash: new_user.password_hash,
            google_id: new_user.google_id,
            profile_picture: new_user.profile_picture,
            created_at: Utc::now(),
            last_login_at: new_user.last_login_at,
            is_active: true,
        };
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let email = email.trim().to_lowercase();
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<User>> {
        Ok(self.tables.read().await.users.get(&user_id).cloned())
    }

    async fn record_login(&self, user_id: Uuid, at: DateTime<Utc>) -> Result<()> {
        if let Some(user) = self.tables.write().await.users.get_mut(&user_id) {
            user.last_login_at = Some(at);
        }
        Ok(())
    }

    async fn record_federated_login(
        &self,
        user_id: Uuid,
        google_id: &str,
        picture: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<User> {
        let mut tables = self.tables.write().await;
        let user = tables
            .users
            .get_mut(&user_id)
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        if user.google_id.as_deref().is_none_or(str::is_empty) {
            user.google_id = Some(google_id.to_string());
        }
        if user.profile_picture.as_deref().is_none_or(str::is_empty) {
            user.profile_picture = picture.map(str::to_string);
        }
        user.last_login_at = Some(at);
        Ok(user.clone())
    }
}

#[async_trait]
impl ChatStore for MemoryStore {
    async fn create_session(&self, user_id: Uuid, title: &str) -> Result<ChatSession> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&user_id) {
            return Err(AppError::Internal(format!(
                "session owner {} does not exist",
                user_id
            )));
        }

        let now = Utc::now();
        let session = ChatSession {
            id: Uuid::now_v7(),
            user_id,
            title: title.to_string(),
            created_at: now,
            updated_at: now,
        };
        tables.sessions.insert(session.id, session.clone());
        Ok(session)
    }

    async fn find_session(&self, session_id: Uuid, user_id: Uuid) -> Result<Option<ChatSession>> {
        let tables = self.tables.read().await;
        Ok(tables
            .sessions
            .get(&session_id)
            .filter(|s| s.user_id == user_id)
            .cloned())
    }

    async fn list_sessions(&self, user_id: Uuid) -> Result<Vec<SessionWithCount>> {
        let tables = self.tables.read().await;
        let mut sessions: Vec<SessionWithCount> = tables
            .sessions
            .values()
            .filter(|s| s.user_id == user_id)
            .map(|s| SessionWithCount {
                session: s.clone(),
                message_count: tables
                    .messages
                    .iter()
                    .filter(|m| m.session_id == s.id)
                    .count() as i64,
            })
            .collect();
        sessions.sort_by(|a, b| {
            b.session
                .updated_at
                .cmp(&a.session.updated_at)
                .then_with(|| b.session.id.cmp(&a.session.id))
        });
        Ok(sessions)
    }

    async fn list_messages(&self, session_id: Uuid, user_id: Uuid) -> Result<Option<Vec<Message>>> {
        let tables = self.tables.read().await;
        let owned = tables
            .sessions
            .get(&session_id)
            .is_some_and(|s| s.user_id == user_id);
        if !owned {
            return Ok(None);
        }

        Ok(Some(
            tables
                .messages
                .iter()
                .filter(|m| m.session_id == session_id)
                .cloned()
                .collect(),
        ))
    }

    async fn recent_messages(&self, session_id: Uuid, limit: usize) -> Result<Vec<Message>> {
        let tables = self.tables.read().await;
        let mut recent: Vec<Message> = tables
            .messages
            .iter()
            .rev()
            .filter(|m| m.session_id == session_id)
            .take(limit)
            .cloned()
            .collect();
        recent.reverse();
        Ok(recent)
    }

    async fn append_message(&self, session_id: Uuid, role: Role, content: &str) -> Result<Message> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();

        let session = tables
            .sessions
            .get_mut(&session_id)
            .ok_or_else(|| AppError::Internal(format!("session {} does not exist", session_id)))?;
        session.updated_at = now;

        let message = Message {
            id: Uuid::now_v7(),
            session_id,
            role,
            content: content.to_string(),
            created_at: now,
        };
        tables.messages.push(message.clone());
        Ok(message)
    }

    async fn touch_session(&self, session_id: Uuid, title: Option<&str>) -> Result<()> {
        let mut tables = self.tables.write().await;
        if let Some(session) = tables.sessions.get_mut(&session_id) {
            session.updated_at = Utc::now();
            if let Some(title) = title {
                session.title = title.to_string();
            }
        }
        Ok(())
    }

    async fn rename_session(&self, session_id: Uuid, user_id: Uuid, title: &str) -> Result<bool> {
        let mut tables = self.tables.write().await;
        match tables.sessions.get_mut(&session_id) {
            Some(session) if session.user_id == user_id => {
                session.title = title.to_string();
                session.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_session(&self, session_id: Uuid, user_id: Uuid) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let owned = tables
            .sessions
            .get(&session_id)
            .is_some_and(|s| s.user_id == user_id);
        if !owned {
            return Ok(false);
        }

        tables.messages.retain(|m| m.session_id != session_id);
        tables.sessions.remove(&session_id);
        Ok(true)
    }
}
