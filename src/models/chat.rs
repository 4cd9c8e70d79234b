use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Title given to sessions until the first exchange names them.
pub const DEFAULT_SESSION_TITLE: &str = "New Chat";

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSql, FromSql)]
#[serde(rename_all = "lowercase")]
#[postgres(name = "message_role")]
pub enum Role {
    #[postgres(name = "user")]
    User,
    #[postgres(name = "assistant")]
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            other => Err(format!("unknown message role: {other}")),
        }
    }
}

/// Represents a chat session owned by one user.
#[derive(Debug, Clone)]
pub struct ChatSession {
    /// The unique identifier for the session.
    pub id: Uuid,
    /// The ID of the user who owns the session.
    pub user_id: Uuid,
    /// The session title shown in the session list.
    pub title: String,
    /// The timestamp when the session was created.
    pub created_at: DateTime<Utc>,
    /// The timestamp of the last message or rename.
    pub updated_at: DateTime<Utc>,
}

/// A session together with its message count.
#[derive(Debug, Clone)]
pub struct SessionWithCount {
    pub session: ChatSession,
    pub message_count: i64,
}

/// A single message inside a chat session.
#[derive(Debug, Clone)]
pub struct Message {
    pub id: Uuid,
    pub session_id: Uuid,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}
