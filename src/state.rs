use std::sync::Arc;

use crate::config::Config;
use crate::crypto::jwt::TokenService;
use crate::error::{AppError, Result};
use crate::repositories::{
    chat::{ChatStore, PgChatStore},
    memory::MemoryStore,
    user::{PgUserStore, UserStore},
};
use crate::services::{
    gemini::{GeminiClient, LanguageModel},
    identity::{GoogleIdentityVerifier, IdentityVerifier},
};

/// The application's state, cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    /// The application's configuration.
    pub config: Arc<Config>,
    /// Credential store.
    pub users: Arc<dyn UserStore>,
    /// Session and message store.
    pub chats: Arc<dyn ChatStore>,
    /// Identity token issuer/validator.
    pub tokens: TokenService,
    /// Language API gateway.
    pub llm: Arc<dyn LanguageModel>,
    /// Federated identity verifier.
    pub identity: Arc<dyn IdentityVerifier>,
}

impl AppState {
    /// Creates a new `AppState`, connecting to PostgreSQL when a database
    /// URL is configured and falling back to the in-process store otherwise.
    pub async fn new(config: &Config) -> Result<Self> {
        let (users, chats): (Arc<dyn UserStore>, Arc<dyn ChatStore>) = match &config.database_url {
            Some(url) => {
                let pool = crate::db::create_pool(url)?;
                crate::db::run_migrations(&pool).await?;
                tracing::info!("✅ PostgreSQL pool initialized with deadpool-postgres");
                (
                    Arc::new(PgUserStore::new(pool.clone())) as Arc<dyn UserStore>,
                    Arc::new(PgChatStore::new(pool)) as Arc<dyn ChatStore>,
                )
            }
            None => {
                tracing::warn!(
                    "⚠️ DATABASE_URL not set - using the in-process store, data is lost on restart"
                );
                let store = MemoryStore::new();
                (
                    Arc::new(store.clone()) as Arc<dyn UserStore>,
                    Arc::new(store) as Arc<dyn ChatStore>,
                )
            }
        };

        let llm = GeminiClient::from_config(config)
            .map_err(|e| AppError::Internal(format!("Failed to build Gemini client: {}", e)))?;
        if config.gemini_api_key.is_none() {
            tracing::warn!("⚠️ GEMINI_API_KEY not set - chat requests will fail");
        }
        tracing::info!("✅ Gemini gateway initialized (model: {})", config.gemini_model);

        let identity = GoogleIdentityVerifier::from_config(config);
        if config.google_client_id.is_none() {
            tracing::warn!("⚠️ GOOGLE_CLIENT_ID not set - Google sign-in is disabled");
        }

        Ok(Self::from_parts(
            config.clone(),
            users,
            chats,
            Arc::new(llm),
            Arc::new(identity),
        ))
    }

    /// Assembles a state from already-built collaborators.
    pub fn from_parts(
        config: Config,
        users: Arc<dyn UserStore>,
        chats: Arc<dyn ChatStore>,
        llm: Arc<dyn LanguageModel>,
        identity: Arc<dyn IdentityVerifier>,
    ) -> Self {
        let tokens = TokenService::from_config(&config);
        Self {
            config: Arc::new(config),
            users,
            chats,
            tokens,
            llm,
            identity,
        }
    }
}
