//! Client-side sign-in state, persisted between `chat` invocations.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::api::UserProfile;

/// Directory under the platform config dir holding the session file.
const APP_DIR: &str = "gemini-chat";
const SESSION_FILE: &str = "session.json";

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredSession {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    user: Option<UserProfile>,
    #[serde(default)]
    active_session_id: Option<Uuid>,
}

/// The signed-in user, their token and the chat session in use.
#[derive(Debug, Clone)]
pub struct ClientSession {
    path: PathBuf,
    state: StoredSession,
}

impl ClientSession {
    /// Default location: `<config dir>/gemini-chat/session.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(SESSION_FILE))
    }

    /// Loads the session stored at `path`. A missing file is an empty session.
    pub fn load(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let state = match fs::read(&path) {
            Ok(bytes) => sonic_rs::from_slice(&bytes)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => StoredSession::default(),
            Err(e) => return Err(e),
        };
        Ok(Self { path, state })
    }

    pub fn save(&self) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = sonic_rs::to_string_pretty(&self.state)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
        fs::write(&self.path, json)
    }

    /// Forgets everything and removes the file.
    pub fn clear(&mut self) -> io::Result<()> {
        self.state = StoredSession::default();
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Records a successful sign-in. The active chat session is reset.
    pub fn sign_in(&mut self, token: String, user: UserProfile) {
        self.state = StoredSession {
            token: Some(token),
            user: Some(user),
            active_session_id: None,
        };
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.token.as_deref().is_some_and(|t| !t.is_empty())
    }

    pub fn token(&self) -> Option<&str> {
        self.state.token.as_deref()
    }

    pub fn user(&self) -> Option<&UserProfile> {
        self.state.user.as_ref()
    }

    pub fn active_session_id(&self) -> Option<Uuid> {
        self.state.active_session_id
    }

    pub fn set_active_session(&mut self, session_id: Option<Uuid>) {
        self.state.active_session_id = session_id;
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
