//! Verification of Google ID tokens.

use async_trait::async_trait;
use jsonwebtoken::{decode, decode_header, jwk::JwkSet, Algorithm, DecodingKey, Validation};
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;

use crate::config::Config;

/// Issuers Google puts in ID tokens.
const GOOGLE_ISSUERS: [&str; 2] = ["accounts.google.com", "https://accounts.google.com"];

#[derive(Debug, Error)]
pub enum IdentityError {
    /// No OAuth client id is configured, so no audience can be checked.
    #[error("Google client id is not configured")]
    NotConfigured,

    /// The token is malformed, expired, or signed for someone else.
    #[error("Invalid ID token: {0}")]
    InvalidToken(String),

    /// The signing keys could not be fetched.
    #[error("Key fetch failed: {0}")]
    KeyFetch(#[from] reqwest::Error),
}

/// Claims extracted from a verified identity-provider token.
#[derive(Debug, Clone, PartialEq)]
pub struct FederatedIdentity {
    /// Provider-scoped subject identifier.
    pub subject: String,
    pub email: String,
    pub name: Option<String>,
    pub picture: Option<String>,
}

/// Verifies an opaque identity token and returns its claims.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, id_token: &str) -> Result<FederatedIdentity, IdentityError>;

    /// The OAuth client id the frontend should use, if any.
    fn client_id(&self) -> Option<&str>;
}

#[derive(Debug, Deserialize)]
struct GoogleClaims {
    sub: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    email_verified: Option<bool>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    picture: Option<String>,
}

/// Checks RS256 signatures against Google's published JWKS, the audience
/// against the configured client id, and the issuer and expiry.
///
/// Keys are fetched per verification; nothing is cached between requests.
#[derive(Clone)]
pub struct GoogleIdentityVerifier {
    client: Client,
    client_id: Option<String>,
    certs_url: String,
}

impl GoogleIdentityVerifier {
    pub fn new(client_id: Option<String>, certs_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            client_id,
            certs_url: certs_url.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.google_client_id.clone(), config.google_certs_url.clone())
    }

    async fn fetch_keys(&self) -> Result<JwkSet, IdentityError> {
        let keys = self
            .client
            .get(&self.certs_url)
            .send()
            .await?
            .error_for_status()?
            .json::<JwkSet>()
            .await?;
        Ok(keys)
    }
}

#[async_trait]
impl IdentityVerifier for GoogleIdentityVerifier {
    async fn verify(&self, id_token: &str) -> Result<FederatedIdentity, IdentityError> {
        let client_id = self.client_id.as_deref().ok_or(IdentityError::NotConfigured)?;

        let header = decode_header(id_token)
            .map_err(|e| IdentityError::InvalidToken(e.to_string()))?;
        if header.alg != Algorithm::RS256 {
            return Err(IdentityError::InvalidToken(format!(
                "unexpected algorithm {:?}",
                header.alg
            )));
        }
        let kid = header
            .kid
            .ok_or_else(|| IdentityError::InvalidToken("missing key id".to_string()))?;

        let keys = self.fetch_keys().await?;
        let jwk = keys
            .find(&kid)
            .ok_or_else(|| IdentityError::InvalidToken(format!("unknown key id {kid}")))?;
        let key = DecodingKey::from_jwk(jwk)
            .map_err(|e| IdentityError::InvalidToken(e.to_string()))?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[client_id]);
        validation.set_issuer(&GOOGLE_ISSUERS);

        let claims = decode::<GoogleClaims>(id_token, &key, &validation)
            .map_err(|e| IdentityError::InvalidToken(e.to_string()))?
            .claims;

        if claims.email_verified == Some(false) {
            return Err(IdentityError::InvalidToken("email is not verified".to_string()));
        }
        let email = claims
            .email
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| IdentityError::InvalidToken("token carries no email".to_string()))?;

        Ok(FederatedIdentity {
            subject: claims.sub,
            email,
            name: claims.name.filter(|n| !n.trim().is_empty()),
            picture: claims.picture.filter(|p| !p.trim().is_empty()),
        })
    }

    fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }
}
