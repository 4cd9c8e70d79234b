use chrono::Utc;

use crate::crypto::password::{hash_password, verify_password};
use crate::error::{AppError, Result};
use crate::models::api::{AuthResponse, GoogleLoginRequest, LoginRequest, RegisterRequest};
use crate::models::user::{NewUser, User};
use crate::repositories::user::DUPLICATE_EMAIL;
use crate::services::identity::IdentityError;
use crate::state::AppState;
use crate::validation::auth::{
    is_sanctioned_email, normalize_email, validate_registration, MAX_NAME_LEN,
};

/// Returned for every credential mismatch, so callers cannot tell a missing
/// account from a wrong password.
pub const INVALID_CREDENTIALS: &str = "Invalid email or password";
/// Returned when a valid sign-in targets a deactivated account.
pub const ACCOUNT_DEACTIVATED: &str = "Account is deactivated";
/// Returned when a Google ID token fails verification.
pub const INVALID_GOOGLE_TOKEN: &str = "Invalid Google token";

/// Replaces infrastructure failures by a generic per-operation message,
/// logging the original.
fn mask_unexpected(err: AppError, operation: &str) -> AppError {
    if err.is_unexpected() {
        tracing::error!(error = %err, "❌ Error during {}", operation);
        AppError::Internal(format!("An error occurred during {}", operation))
    } else {
        err
    }
}

fn signed_in(state: &AppState, user: &User) -> Result<AuthResponse> {
    let token = state
        .tokens
        .issue(user.id, &user.email, &user.name)
        .map_err(|e| AppError::Internal(format!("Token issuance failed: {}", e)))?;
    Ok(AuthResponse::signed_in(token, user.profile()))
}

fn truncate_name(name: &str) -> String {
    name.trim().chars().take(MAX_NAME_LEN).collect()
}

/// Registers a new user with e-mail and password.
pub async fn register(state: &AppState, payload: RegisterRequest) -> Result<AuthResponse> {
    register_user(state, payload)
        .await
        .map_err(|e| mask_unexpected(e, "registration"))
}

async fn register_user(state: &AppState, payload: RegisterRequest) -> Result<AuthResponse> {
    validate_registration(&payload)?;

    let domain = &state.config.allowed_email_domain;
    if !is_sanctioned_email(&payload.email, domain) {
        return Err(AppError::Validation(format!(
            "Only {} employees (@{}) can register",
            state.config.organization_name, domain
        )));
    }

    let email = normalize_email(&payload.email);
    tracing::info!("📝 Registration attempt for: {}", email);

    if state.users.find_by_email(&email).await?.is_some() {
        return Err(AppError::Conflict(DUPLICATE_EMAIL.to_string()));
    }

    let password_hash = hash_password(&payload.password)?;
    let user = state
        .users
        .create_user(NewUser {
            name: truncate_name(&payload.name),
            email,
            password_hash: Some(password_hash),
            google_id: None,
            profile_picture: None,
            last_login_at: None,
        })
        .await?;

    tracing::info!("✅ User registered: {}", user.id);
    signed_in(state, &user)
}

/// Signs a user in with e-mail and password.
pub async fn login(state: &AppState, payload: LoginRequest) -> Result<AuthResponse> {
    login_user(state, payload)
        .await
        .map_err(|e| mask_unexpected(e, "login"))
}

async fn login_user(state: &AppState, payload: LoginRequest) -> Result<AuthResponse> {
    if payload.email.trim().is_empty() || payload.password.trim().is_empty() {
        return Err(AppError::Validation(
            "Email and password are required".to_string(),
        ));
    }

    tracing::info!("🔐 Login attempt for: {}", payload.email.trim());

    let user = state
        .users
        .find_by_email(&payload.email)
        .await?
        .ok_or_else(|| AppError::Authentication(INVALID_CREDENTIALS.to_string()))?;

    let hash = user
        .password_hash
        .as_deref()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| AppError::Authentication(INVALID_CREDENTIALS.to_string()))?;

    if !verify_password(&payload.password, hash)? {
        return Err(AppError::Authentication(INVALID_CREDENTIALS.to_string()));
    }

    if !user.is_active {
        return Err(AppError::Authentication(ACCOUNT_DEACTIVATED.to_string()));
    }

    state.users.record_login(user.id, Utc::now()).await?;

    tracing::info!("✅ User authenticated: {}", user.id);
    signed_in(state, &user)
}

/// Signs a user in with a Google ID token, creating the account on first use.
pub async fn google_login(state: &AppState, payload: GoogleLoginRequest) -> Result<AuthResponse> {
    federated_login(state, payload)
        .await
        .map_err(|e| mask_unexpected(e, "Google login"))
}

async fn federated_login(state: &AppState, payload: GoogleLoginRequest) -> Result<AuthResponse> {
    if payload.id_token.trim().is_empty() {
        return Err(AppError::Validation(
            "Google ID token is required".to_string(),
        ));
    }

    let identity = match state.identity.verify(payload.id_token.trim()).await {
        Ok(identity) => identity,
        Err(IdentityError::KeyFetch(e)) => {
            return Err(AppError::Internal(format!(
                "Failed to fetch identity provider keys: {}",
                e
            )));
        }
        Err(e) => {
            tracing::warn!("Invalid Google ID token: {}", e);
            return Err(AppError::Authentication(INVALID_GOOGLE_TOKEN.to_string()));
        }
    };

    let domain = &state.config.allowed_email_domain;
    if !is_sanctioned_email(&identity.email, domain) {
        return Err(AppError::Authentication(format!(
            "Only {} employees (@{}) can access this application",
            state.config.organization_name, domain
        )));
    }

    let email = normalize_email(&identity.email);
    let now = Utc::now();

    let user = match state.users.find_by_email(&email).await? {
        Some(existing) => {
            state
                .users
                .record_federated_login(
                    existing.id,
                    &identity.subject,
                    identity.picture.as_deref(),
                    now,
                )
                .await?
        }
        None => {
            let name = identity
                .name
                .clone()
                .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());
            let user = state
                .users
                .create_user(NewUser {
                    name: truncate_name(&name),
                    email,
                    password_hash: None,
                    google_id: Some(identity.subject.clone()),
                    profile_picture: identity.picture.clone(),
                    last_login_at: Some(now),
                })
                .await?;
            tracing::info!("✅ New user created via Google login: {}", user.email);
            user
        }
    };

    if !user.is_active {
        return Err(AppError::Authentication(ACCOUNT_DEACTIVATED.to_string()));
    }

    signed_in(state, &user)
}

/// Resolves a bearer token to its user.
///
/// Returns `None` for a bad signature, wrong issuer or audience, expiry,
/// a malformed subject, an unknown user, or a deactivated user.
pub async fn validate_token(state: &AppState, token: &str) -> Option<User> {
    let claims = match state.tokens.validate(token) {
        Ok(claims) => claims,
        Err(e) => {
            tracing::debug!("Token rejected: {}", e);
            return None;
        }
    };

    let user_id = claims.user_id().ok()?;

    match state.users.find_by_id(user_id).await {
        Ok(Some(user)) if user.is_active => Some(user),
        Ok(_) => {
            tracing::debug!("Token subject {} is unknown or inactive", user_id);
            None
        }
        Err(e) => {
            tracing::error!("❌ Failed to load token subject {}: {}", user_id, e);
            None
        }
    }
}
