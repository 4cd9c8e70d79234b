//! Gateway to the Gemini `generateContent` API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::Zeroizing;

use crate::config::Config;
use crate::models::chat::{Message, Role};

/// Failures of a single gateway call. `Display` is the user-facing message;
/// details are logged where the failure happens.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("Gemini API key is not configured")]
    NotConfigured,

    #[error("Rate limit exceeded. Please wait a moment and try again.")]
    RateLimited,

    #[error("Gemini API error: {0}")]
    Api(StatusCode),

    #[error("Unable to reach the Gemini service. Please try again later.")]
    Transport,

    #[error("No response received from Gemini")]
    EmptyResponse,
}

/// One prior turn of the conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryTurn {
    pub role: Role,
    pub content: String,
}

impl From<&Message> for HistoryTurn {
    fn from(m: &Message) -> Self {
        Self {
            role: m.role,
            content: m.content.clone(),
        }
    }
}

/// A generative model that answers the latest user message given history.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn send_message(
        &self,
        message: &str,
        history: &[HistoryTurn],
    ) -> Result<String, GatewayError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeminiPart {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<GeminiPart>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerateContentRequest {
    pub contents: Vec<GeminiContent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeminiCandidate {
    #[serde(default)]
    pub content: Option<GeminiContent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<GeminiCandidate>,
}

impl GenerateContentResponse {
    /// Text of the first part of the first candidate, if non-empty.
    pub fn first_text(&self) -> Option<&str> {
        self.candidates
            .first()?
            .content
            .as_ref()?
            .parts
            .first()?
            .text
            .as_deref()
            .filter(|t| !t.is_empty())
    }
}

fn turn(role: &str, text: &str) -> GeminiContent {
    GeminiContent {
        role: Some(role.to_string()),
        parts: vec![GeminiPart {
            text: Some(text.to_string()),
        }],
    }
}

/// Builds the request body: history in order, then the new message as the
/// final `user` turn. Anything but a user turn is sent as `model`.
pub fn build_request(message: &str, history: &[HistoryTurn]) -> GenerateContentRequest {
    let mut contents: Vec<GeminiContent> = history
        .iter()
        .map(|h| {
            let role = match h.role {
                Role::User => "user",
                _ => "model",
            };
            turn(role, &h.content)
        })
        .collect();
    contents.push(turn("user", message));

    GenerateContentRequest { contents }
}

/// HTTP client for the Gemini API.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_url: String,
    model: String,
    api_key: Option<Zeroizing<String>>,
}

impl GeminiClient {
    pub fn new(
        api_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<Zeroizing<String>>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        Self::new(
            config.gemini_api_url.clone(),
            config.gemini_model.clone(),
            config.gemini_api_key.clone(),
            Duration::from_secs(config.gemini_timeout_secs),
        )
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.api_url, self.model
        )
    }
}

#[async_trait]
impl LanguageModel for GeminiClient {
    async fn send_message(
        &self,
        message: &str,
        history: &[HistoryTurn],
    ) -> Result<String, GatewayError> {
        let api_key = self
            .api_key
            .as_ref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                tracing::error!("❌ GEMINI_API_KEY is not set");
                GatewayError::NotConfigured
            })?;

        let request = build_request(message, history);
        tracing::info!(
            model = %self.model,
            turns = request.contents.len(),
            "Sending request to Gemini API"
        );

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", api_key.as_str())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("❌ Error communicating with Gemini API: {}", e);
                GatewayError::Transport
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "❌ Gemini API error");

            if status == StatusCode::TOO_MANY_REQUESTS {
                return Err(GatewayError::RateLimited);
            }
            return Err(GatewayError::Api(status));
        }

        let completion: GenerateContentResponse = response.json().await.map_err(|e| {
            tracing::error!("❌ Failed to decode Gemini response: {}", e);
            GatewayError::Transport
        })?;

        completion
            .first_text()
            .map(str::to_string)
            .ok_or_else(|| {
                tracing::warn!("Gemini returned no usable candidate");
                GatewayError::EmptyResponse
            })
    }
}
