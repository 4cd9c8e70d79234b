use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::api::{MessageView, SessionSummary};
use crate::models::chat::{ChatSession, Role, DEFAULT_SESSION_TITLE};
use crate::services::gemini::HistoryTurn;
use crate::state::AppState;

/// Number of stored messages sent as context with each request (5 exchanges).
pub const CONTEXT_WINDOW: usize = 10;
/// Maximum length of an automatically derived title, before the ellipsis.
pub const TITLE_MAX_CHARS: usize = 40;
/// A derived title is only cut at a word boundary past this index.
const TITLE_MIN_WORD_BREAK: usize = 20;
/// Maximum stored title length.
pub const MAX_TITLE_LEN: usize = 255;

pub const SESSION_NOT_FOUND: &str = "Chat session not found";

/// Shown when a turn fails for reasons other than the language model.
pub const TURN_FAILED: &str = "An error occurred while processing your message";

/// Result of one conversational turn.
///
/// Once the session is resolved every outcome carries its id, so the client
/// stays in the same session even when the turn failed.
#[derive(Debug)]
pub struct ChatTurn {
    pub session_id: Uuid,
    pub reply: Result<String>,
}

/// Derives a session title from the first message of a conversation.
pub fn derive_title(message: &str) -> String {
    let collapsed = message.split_whitespace().collect::<Vec<_>>().join(" ");
    let chars: Vec<char> = collapsed.chars().collect();
    if chars.len() <= TITLE_MAX_CHARS {
        return collapsed;
    }

    let head = &chars[..TITLE_MAX_CHARS];
    let cut = match head.iter().rposition(|c| *c == ' ') {
        Some(space) if space > TITLE_MIN_WORD_BREAK => space,
        _ => TITLE_MAX_CHARS,
    };

    let mut title: String = head[..cut].iter().collect();
    title.push_str("...");
    title
}

fn normalize_title(title: &str) -> Result<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(AppError::Validation("Title cannot be empty".to_string()));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(AppError::Validation(format!(
            "Title must be at most {} characters",
            MAX_TITLE_LEN
        )));
    }
    Ok(title.to_string())
}

/// Handles one user message: resolves or creates the session, sends the
/// recent context plus the message to the model and stores both sides.
///
/// Errors before the session is known (blank message, unknown session) are
/// returned as `Err`; later failures are reported in [`ChatTurn::reply`].
pub async fn converse(
    state: &AppState,
    user_id: Uuid,
    message: &str,
    session_id: Option<Uuid>,
) -> Result<ChatTurn> {
    if message.trim().is_empty() {
        return Err(AppError::Validation("Message cannot be empty".to_string()));
    }

    let session = match session_id {
        Some(id) => state
            .chats
            .find_session(id, user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(SESSION_NOT_FOUND.to_string()))?,
        None => {
            let session = state
                .chats
                .create_session(user_id, DEFAULT_SESSION_TITLE)
                .await?;
            tracing::info!("🆕 Created chat session {} for user {}", session.id, user_id);
            session
        }
    };

    let reply = exchange(state, &session, message).await.map_err(|e| {
        if e.is_unexpected() {
            tracing::error!(session_id = %session.id, error = %e, "❌ Chat turn failed");
            AppError::Internal(TURN_FAILED.to_string())
        } else {
            e
        }
    });

    Ok(ChatTurn {
        session_id: session.id,
        reply,
    })
}

async fn exchange(state: &AppState, session: &ChatSession, message: &str) -> Result<String> {
    let context = state
        .chats
        .recent_messages(session.id, CONTEXT_WINDOW)
        .await?;
    let first_user_message = !context.iter().any(|m| m.role == Role::User);

    state
        .chats
        .append_message(session.id, Role::User, message)
        .await?;

    let history: Vec<HistoryTurn> = context.iter().map(HistoryTurn::from).collect();
    tracing::debug!(
        session_id = %session.id,
        context = history.len(),
        "Forwarding message to language model"
    );

    let reply = state
        .llm
        .send_message(message, &history)
        .await
        .map_err(|e| {
            tracing::warn!(session_id = %session.id, "Language model call failed: {}", e);
            AppError::Upstream(e.to_string())
        })?;

    state
        .chats
        .append_message(session.id, Role::Assistant, &reply)
        .await?;

    let title = (first_user_message && session.title == DEFAULT_SESSION_TITLE)
        .then(|| derive_title(message));
    state
        .chats
        .touch_session(session.id, title.as_deref())
        .await?;

    Ok(reply)
}

/// Sessions of a user, most recently updated first.
pub async fn list_sessions(state: &AppState, user_id: Uuid) -> Result<Vec<SessionSummary>> {
    let sessions = state.chats.list_sessions(user_id).await?;
    Ok(sessions.into_iter().map(SessionSummary::from).collect())
}

/// Messages of one session in creation order.
pub async fn get_messages(
    state: &AppState,
    user_id: Uuid,
    session_id: Uuid,
) -> Result<Vec<MessageView>> {
    let messages = state
        .chats
        .list_messages(session_id, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(SESSION_NOT_FOUND.to_string()))?;
    Ok(messages.into_iter().map(MessageView::from).collect())
}

/// Creates an empty session. A blank or missing title gets the default.
pub async fn create_session(
    state: &AppState,
    user_id: Uuid,
    title: Option<String>,
) -> Result<SessionSummary> {
    let title = match title.as_deref().map(str::trim) {
        Some(t) if !t.is_empty() => normalize_title(t)?,
        _ => DEFAULT_SESSION_TITLE.to_string(),
    };

    let session = state.chats.create_session(user_id, &title).await?;
    tracing::info!("🆕 Created chat session {} for user {}", session.id, user_id);

    Ok(SessionSummary {
        id: session.id,
        title: session.title,
        created_at: session.created_at,
        updated_at: session.updated_at,
        message_count: 0,
    })
}

pub async fn rename_session(
    state: &AppState,
    user_id: Uuid,
    session_id: Uuid,
    title: &str,
) -> Result<()> {
    let title = normalize_title(title)?;
    if !state.chats.rename_session(session_id, user_id, &title).await? {
        return Err(AppError::NotFound(SESSION_NOT_FOUND.to_string()));
    }
    Ok(())
}

/// Deletes a session together with its messages.
pub async fn delete_session(state: &AppState, user_id: Uuid, session_id: Uuid) -> Result<()> {
    if !state.chats.delete_session(session_id, user_id).await? {
        return Err(AppError::NotFound(SESSION_NOT_FOUND.to_string()));
    }
    tracing::info!("🗑️ Deleted chat session {} of user {}", session_id, user_id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_title_verbatim() {
        assert_eq!(derive_title("hello"), "hello");
    }

    #[test]
    fn test_whitespace_is_collapsed() {
        assert_eq!(derive_title("  hello \n\t  world  "), "hello world");
    }

    #[test]
    fn test_exactly_forty_chars_kept() {
        let input = "x".repeat(40);
        assert_eq!(derive_title(&input), input);
    }

    #[test]
    fn test_long_word_is_hard_cut() {
        let input = "a".repeat(50);
        assert_eq!(derive_title(&input), format!("{}...", "a".repeat(40)));
    }

    #[test]
    fn test_cut_at_late_space() {
        let input = format!("{} {}", "a".repeat(25), "b".repeat(34));
        assert_eq!(input.chars().count(), 60);
        assert_eq!(derive_title(&input), format!("{}...", "a".repeat(25)));
    }

    #[test]
    fn test_early_space_is_ignored() {
        let input = format!("{} {}", "a".repeat(10), "b".repeat(49));
        let expected: String = input.chars().take(40).collect();
        assert_eq!(derive_title(&input), format!("{expected}..."));
    }

    #[test]
    fn test_multibyte_characters_count_once() {
        let input = "é".repeat(45);
        assert_eq!(derive_title(&input), format!("{}...", "é".repeat(40)));
    }

    #[test]
    fn test_title_normalization() {
        assert_eq!(normalize_title("  Trip plans ").unwrap(), "Trip plans");
        assert!(normalize_title("   ").is_err());
        assert!(normalize_title(&"t".repeat(256)).is_err());
    }
}
