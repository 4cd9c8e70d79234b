use axum::{
    body::Body,
    extract::State,
    http::{header, Request},
    middleware::Next,
    response::Response,
};

use crate::{error::AppError, services::auth as auth_service, state::AppState};

/// Extracts the bearer token from the `Authorization` header.
///
/// # Arguments
///
/// * `request` - The incoming request.
///
/// # Returns
///
/// An `Option` containing the token if the header is well formed.
fn extract_bearer_token(request: &Request<Body>) -> Option<&str> {
    let value = request.headers().get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// A middleware that requires a valid bearer token.
///
/// On success the authenticated [`User`](crate::models::user::User) is
/// inserted as a request extension.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `request` - The incoming request.
/// * `next` - The next middleware in the chain.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    tracing::debug!("🔐 Checking authentication...");

    let token = extract_bearer_token(&request).ok_or_else(|| {
        tracing::debug!("❌ No bearer token in request");
        AppError::Unauthorized("No valid token provided".to_string())
    })?;

    let user = auth_service::validate_token(&state, token)
        .await
        .ok_or_else(|| AppError::Unauthorized("Invalid or expired token".to_string()))?;

    tracing::debug!("✅ User authenticated: {}", user.id);

    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}
