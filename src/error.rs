use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// The application's error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// A database error.
    #[error("Database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    /// A connection pool error.
    #[error("Pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    /// A pool construction error.
    #[error("Pool build error: {0}")]
    PoolBuild(#[from] deadpool_postgres::CreatePoolError),

    /// An authentication error. The message is safe to show to the caller.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// A missing or malformed bearer token.
    #[error("Authorization failed: {0}")]
    Unauthorized(String),

    /// A resource not found error.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A validation error.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A uniqueness conflict.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A failure reported by an upstream service, with a user-facing message.
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// A password hashing error.
    #[error("Hashing error: {0}")]
    Hashing(String),

    /// An internal server error. The message is shown to the caller.
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether the error is an unexpected infrastructure failure rather than
    /// a domain outcome the caller can act on.
    pub fn is_unexpected(&self) -> bool {
        matches!(
            self,
            AppError::Database(_)
                | AppError::Pool(_)
                | AppError::PoolBuild(_)
                | AppError::Hashing(_)
                | AppError::Internal(_)
        )
    }

    /// The HTTP status this error maps to.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Authentication(_) | AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) | AppError::Conflict(_) => StatusCode::BAD_REQUEST,
            AppError::Database(_)
            | AppError::Pool(_)
            | AppError::PoolBuild(_)
            | AppError::Upstream(_)
            | AppError::Hashing(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// A `Result` type that uses `AppError` as the error type.
pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    /// Logs the error and returns the message that may be shown to the
    /// caller. Infrastructure details are replaced by generic text.
    pub fn into_client_message(self) -> String {
        match self {
            AppError::Database(ref e) => {
                tracing::error!("Database error: {}", e);
                "Database error".to_string()
            }

            AppError::Pool(ref e) => {
                tracing::error!("Pool error: {}", e);
                "Database unavailable".to_string()
            }

            AppError::PoolBuild(ref e) => {
                tracing::error!("Pool build error: {}", e);
                "Database unavailable".to_string()
            }

            AppError::Hashing(ref msg) => {
                tracing::error!("Hashing error: {}", msg);
                "Internal server error".to_string()
            }

            AppError::Authentication(msg) => {
                tracing::warn!("Authentication failed: {}", msg);
                msg
            }

            AppError::Unauthorized(msg) => {
                tracing::debug!("Authorization failed: {}", msg);
                msg
            }

            AppError::NotFound(msg) => {
                tracing::debug!("Resource not found: {}", msg);
                msg
            }

            AppError::Validation(msg) => {
                tracing::debug!("Validation error: {}", msg);
                msg
            }

            AppError::Conflict(msg) => {
                tracing::debug!("Conflict: {}", msg);
                msg
            }

            AppError::Upstream(msg) => {
                tracing::error!("Upstream error: {}", msg);
                msg
            }

            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                msg
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.into_client_message();

        let body = sonic_rs::to_string(&sonic_rs::json!({
            "success": false,
            "error": message
        }))
        .unwrap_or_else(|_| r#"{"success":false,"error":"Internal server error"}"#.to_string());

        (
            status,
            [(http::header::CONTENT_TYPE, "application/json")],
            body,
        )
            .into_response()
    }
}
