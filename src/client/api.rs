//! Typed client for the HTTP API.

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::api::{
    AuthResponse, ChatRequest, ChatResponse, CreateSessionRequest, GoogleClientIdResponse,
    GoogleLoginRequest, HealthResponse, LoginRequest, MessageView, RegisterRequest,
    RenameSessionRequest, SessionSummary,
};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("{message} ({status})")]
    Server {
        status: StatusCode,
        message: String,
        /// Present when a chat turn failed after the session was resolved.
        session_id: Option<Uuid>,
    },

    #[error("Not signed in")]
    NotAuthenticated,
}

impl ClientError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Server { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    session_id: Option<Uuid>,
}

/// Client for one server, optionally carrying a bearer token.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        }
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.base_url, path))
    }

    fn authed(&self, method: Method, path: &str) -> Result<RequestBuilder, ClientError> {
        let token = self.token.as_deref().ok_or(ClientError::NotAuthenticated)?;
        Ok(self.request(method, path).bearer_auth(token))
    }

    async fn check(response: Response) -> Result<Response, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let parsed: ErrorBody = sonic_rs::from_str(&body).unwrap_or_default();
        let message = parsed.error.unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Request failed")
                .to_string()
        });

        Err(ClientError::Server {
            status,
            message,
            session_id: parsed.session_id,
        })
    }

    async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, ClientError> {
        let response = Self::check(request.send().await?).await?;
        Ok(response.json::<T>().await?)
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        Self::send_json(self.request(Method::POST, path).json(body)).await
    }

    pub async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, ClientError> {
        self.post_json("/api/auth/register", request).await
    }

    pub async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, ClientError> {
        self.post_json("/api/auth/login", request).await
    }

    pub async fn google_login(&self, id_token: &str) -> Result<AuthResponse, ClientError> {
        let request = GoogleLoginRequest {
            id_token: id_token.to_string(),
        };
        self.post_json("/api/auth/google", &request).await
    }

    pub async fn google_client_id(&self) -> Result<String, ClientError> {
        let response: GoogleClientIdResponse =
            Self::send_json(self.request(Method::GET, "/api/auth/google/client-id")).await?;
        Ok(response.client_id)
    }

    pub async fn validate(&self) -> Result<AuthResponse, ClientError> {
        Self::send_json(self.authed(Method::GET, "/api/auth/validate")?).await
    }

    /// Sends a chat message. On a failed reply the error carries the session
    /// id the server assigned.
    pub async fn chat(
        &self,
        message: &str,
        session_id: Option<Uuid>,
    ) -> Result<ChatResponse, ClientError> {
        let request = ChatRequest {
            message: message.to_string(),
            session_id,
        };
        Self::send_json(self.authed(Method::POST, "/api/chat")?.json(&request)).await
    }

    pub async fn list_sessions(&self) -> Result<Vec<SessionSummary>, ClientError> {
        Self::send_json(self.authed(Method::GET, "/api/chat/sessions")?).await
    }

    pub async fn messages(&self, session_id: Uuid) -> Result<Vec<MessageView>, ClientError> {
        let path = format!("/api/chat/sessions/{}/messages", session_id);
        Self::send_json(self.authed(Method::GET, &path)?).await
    }

    pub async fn create_session(
        &self,
        title: Option<String>,
    ) -> Result<SessionSummary, ClientError> {
        let request = CreateSessionRequest { title };
        Self::send_json(self.authed(Method::POST, "/api/chat/sessions")?.json(&request)).await
    }

    pub async fn rename_session(&self, session_id: Uuid, title: &str) -> Result<(), ClientError> {
        let path = format!("/api/chat/sessions/{}", session_id);
        let request = RenameSessionRequest {
            title: title.to_string(),
        };
        Self::check(self.authed(Method::PUT, &path)?.json(&request).send().await?).await?;
        Ok(())
    }

    pub async fn delete_session(&self, session_id: Uuid) -> Result<(), ClientError> {
        let path = format!("/api/chat/sessions/{}", session_id);
        Self::check(self.authed(Method::DELETE, &path)?.send().await?).await?;
        Ok(())
    }

    pub async fn health(&self) -> Result<HealthResponse, ClientError> {
        Self::send_json(self.request(Method::GET, "/api/chat/health")).await
    }
}
