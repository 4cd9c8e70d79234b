use std::env;
use std::net::SocketAddr;
use anyhow::{Context, Result};
use zeroize::Zeroizing;

/// Minimum length of the JWT signing secret in bytes.
const MIN_JWT_SECRET_LEN: usize = 32;

/// The application's configuration.
#[derive(Clone)]
pub struct Config {
    /// The URL of the PostgreSQL database. `None` selects the in-process store.
    pub database_url: Option<String>,
    /// Address the HTTP server binds to.
    pub bind_addr: SocketAddr,
    /// Origins allowed by the CORS layer.
    pub cors_origins: Vec<String>,
    /// Directory with a pre-built frontend served as the fallback route.
    pub static_dir: Option<String>,
    /// HMAC secret used to sign identity tokens.
    pub jwt_secret: Zeroizing<String>,
    /// `iss` claim of issued tokens.
    pub jwt_issuer: String,
    /// `aud` claim of issued tokens.
    pub jwt_audience: String,
    /// Lifetime of an identity token in days.
    pub jwt_expiration_days: i64,
    /// Gemini API key. Chat requests fail with a configuration message when unset.
    pub gemini_api_key: Option<Zeroizing<String>>,
    /// Gemini model name, e.g. `gemini-2.0-flash`.
    pub gemini_model: String,
    /// Base URL of the generative-language API.
    pub gemini_api_url: String,
    /// Timeout applied to every Gemini request.
    pub gemini_timeout_secs: u64,
    /// OAuth client id expected as the audience of Google ID tokens.
    pub google_client_id: Option<String>,
    /// Location of Google's JSON Web Key Set.
    pub google_certs_url: String,
    /// The only e-mail domain allowed to register or sign in (without `@`).
    pub allowed_email_domain: String,
    /// Organization name used in user-facing messages.
    pub organization_name: String,
}

impl Config {
    /// Creates a new `Config` from environment variables.
    pub fn from_env() -> Result<Self> {
        let jwt_secret = Zeroizing::new(
            env::var("JWT_SECRET")
                .context("JWT_SECRET must be set (generate with: openssl rand -hex 32)")?,
        );

        if jwt_secret.len() < MIN_JWT_SECRET_LEN {
            anyhow::bail!("JWT_SECRET must be at least {} bytes", MIN_JWT_SECRET_LEN);
        }

        Ok(Self {
            database_url: non_empty_var("DATABASE_URL"),
            bind_addr: env::var("BIND_ADDR")
                .unwrap_or_else(|_| "127.0.0.1:5000".to_string())
                .parse()
                .context("Invalid BIND_ADDR")?,
            cors_origins: env::var("CORS_ORIGINS")
                .map(|v| {
                    v.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_else(|_| {
                    vec![
                        "http://localhost:3000".to_string(),
                        "http://localhost:3001".to_string(),
                        "http://localhost:3002".to_string(),
                    ]
                }),
            static_dir: non_empty_var("STATIC_DIR"),
            jwt_secret,
            jwt_issuer: env::var("JWT_ISSUER").unwrap_or_else(|_| "gemini-chat".to_string()),
            jwt_audience: env::var("JWT_AUDIENCE")
                .unwrap_or_else(|_| "gemini-chat-users".to_string()),
            jwt_expiration_days: env::var("JWT_EXPIRATION_DAYS")
                .unwrap_or_else(|_| "7".to_string())
                .parse()
                .context("Invalid JWT_EXPIRATION_DAYS")?,
            gemini_api_key: non_empty_var("GEMINI_API_KEY").map(Zeroizing::new),
            gemini_model: env::var("GEMINI_MODEL")
                .unwrap_or_else(|_| "gemini-2.0-flash".to_string()),
            gemini_api_url: env::var("GEMINI_API_URL")
                .unwrap_or_else(|_| "https://generativelanguage.googleapis.com".to_string()),
            gemini_timeout_secs: env::var("GEMINI_TIMEOUT_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .context("Invalid GEMINI_TIMEOUT_SECS")?,
            google_client_id: non_empty_var("GOOGLE_CLIENT_ID"),
            google_certs_url: env::var("GOOGLE_CERTS_URL")
                .unwrap_or_else(|_| "https://www.googleapis.com/oauth2/v3/certs".to_string()),
            allowed_email_domain: env::var("ALLOWED_EMAIL_DOMAIN")
                .unwrap_or_else(|_| "amzur.com".to_string())
                .trim_start_matches('@')
                .to_lowercase(),
            organization_name: env::var("ORGANIZATION_NAME")
                .unwrap_or_else(|_| "Amzur".to_string()),
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}
