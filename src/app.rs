use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    services::ServeDir,
    trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::{handlers, middleware_layer, state::AppState};

/// Largest accepted request body.
const MAX_BODY_BYTES: usize = 1024 * 1024;

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("⚠️ Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
        .allow_credentials(true)
        .max_age(Duration::from_secs(86400))
}

/// Builds the application router.
pub fn build_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/api/auth/register", post(handlers::auth::register))
        .route("/api/auth/login", post(handlers::auth::login))
        .route("/api/auth/google", post(handlers::auth::google_login))
        .route(
            "/api/auth/google/client-id",
            get(handlers::auth::google_client_id),
        )
        .route("/api/chat/health", get(handlers::chat::health))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/api/auth/validate", get(handlers::auth::validate))
        .route("/api/chat", post(handlers::chat::chat))
        .route(
            "/api/chat/sessions",
            get(handlers::chat::list_sessions).post(handlers::chat::create_session),
        )
        .route(
            "/api/chat/sessions/{session_id}",
            put(handlers::chat::rename_session).delete(handlers::chat::delete_session),
        )
        .route(
            "/api/chat/sessions/{session_id}/messages",
            get(handlers::chat::session_messages),
        )
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware_layer::auth::require_auth,
        ))
        .with_state(state.clone());

    let mut app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default().include_headers(false))
                .on_request(DefaultOnRequest::default().level(Level::DEBUG))
                .on_response(DefaultOnResponse::default().level(Level::DEBUG))
                .on_failure(DefaultOnFailure::default().level(Level::ERROR)),
        )
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors_layer(&state.config.cors_origins));

    if let Some(dir) = &state.config.static_dir {
        tracing::info!("📁 Serving static files from {}", dir);
        app = app.fallback_service(ServeDir::new(dir));
    }

    app
}
