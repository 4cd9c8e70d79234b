use axum::{
    extract::State,
    http::StatusCode,
    response::Response,
    Extension,
};

use crate::{
    error::Result,
    handlers::response::{json_response, AppJson},
    models::{
        api::{AuthResponse, GoogleClientIdResponse, GoogleLoginRequest, LoginRequest, RegisterRequest},
        user::User,
    },
    services::auth as auth_service,
    state::AppState,
};

/// Handles user registration.
pub async fn register(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RegisterRequest>,
) -> Result<Response> {
    let response = auth_service::register(&state, payload).await?;
    json_response(StatusCode::OK, &response)
}

/// Handles e-mail/password login.
pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> Result<Response> {
    let response = auth_service::login(&state, payload).await?;
    json_response(StatusCode::OK, &response)
}

/// Handles Google sign-in with an ID token.
pub async fn google_login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<GoogleLoginRequest>,
) -> Result<Response> {
    let response = auth_service::google_login(&state, payload).await?;
    json_response(StatusCode::OK, &response)
}

/// Returns the OAuth client id for the Google sign-in button.
pub async fn google_client_id(State(state): State<AppState>) -> Result<Response> {
    match state.identity.client_id() {
        Some(client_id) => json_response(
            StatusCode::OK,
            &GoogleClientIdResponse {
                client_id: client_id.to_string(),
            },
        ),
        None => json_response(
            StatusCode::NOT_FOUND,
            &sonic_rs::json!({ "error": "Google Client ID not configured" }),
        ),
    }
}

/// Echoes the profile of the authenticated user.
pub async fn validate(Extension(user): Extension<User>) -> Result<Response> {
    json_response(StatusCode::OK, &AuthResponse::validated(user.profile()))
}
