use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension,
};
use chrono::Utc;
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    handlers::response::{json_response, AppJson, AppPath},
    models::{
        api::{
            ChatRequest, ChatResponse, CreateSessionRequest, HealthResponse,
            RenameSessionRequest, SuccessResponse,
        },
        user::User,
    },
    services::chat as chat_service,
    state::AppState,
};

/// Sends one message to the model, creating a session when none is given.
///
/// Once the session is known, a failed turn still carries its id so the
/// client keeps talking in the same session.
pub async fn chat(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    AppJson(payload): AppJson<ChatRequest>,
) -> Result<Response> {
    tracing::info!(
        user_id = %user.id,
        session_id = ?payload.session_id,
        "💬 Chat message received"
    );

    let turn =
        chat_service::converse(&state, user.id, &payload.message, payload.session_id).await?;

    match turn.reply {
        Ok(response) => json_response(
            StatusCode::OK,
            &ChatResponse {
                success: true,
                response: Some(response),
                session_id: Some(turn.session_id),
                error: None,
            },
        ),
        Err(e) => {
            let status = e.status_code();
            json_response(
                status,
                &ChatResponse {
                    success: false,
                    response: None,
                    session_id: Some(turn.session_id),
                    error: Some(e.into_client_message()),
                },
            )
        }
    }
}

pub async fn list_sessions(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<Response> {
    let sessions = chat_service::list_sessions(&state, user.id).await?;
    json_response(StatusCode::OK, &sessions)
}

pub async fn session_messages(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    AppPath(session_id): AppPath<Uuid>,
) -> Result<Response> {
    let messages = chat_service::get_messages(&state, user.id, session_id).await?;
    json_response(StatusCode::OK, &messages)
}

pub async fn create_session(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    body: Bytes,
) -> Result<Response> {
    // An empty body means "no title".
    let title = if body.iter().all(u8::is_ascii_whitespace) {
        None
    } else {
        sonic_rs::from_slice::<CreateSessionRequest>(&body)
            .map_err(|e| AppError::Validation(format!("Invalid request body: {}", e)))?
            .title
    };
    let session = chat_service::create_session(&state, user.id, title).await?;
    json_response(StatusCode::CREATED, &session)
}

pub async fn rename_session(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    AppPath(session_id): AppPath<Uuid>,
    AppJson(payload): AppJson<RenameSessionRequest>,
) -> Result<Response> {
    chat_service::rename_session(&state, user.id, session_id, &payload.title).await?;
    json_response(StatusCode::OK, &SuccessResponse { success: true })
}

pub async fn delete_session(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    AppPath(session_id): AppPath<Uuid>,
) -> Result<Response> {
    chat_service::delete_session(&state, user.id, session_id).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub async fn health() -> Result<Response> {
    json_response(
        StatusCode::OK,
        &HealthResponse {
            status: "healthy".to_string(),
            timestamp: Utc::now(),
        },
    )
}
