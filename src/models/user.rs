use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::api::UserProfile;

/// Represents a user in the system.
#[derive(Clone, Debug)]
pub struct User {
    /// The unique identifier for the user.
    pub id: Uuid,
    /// The user's display name.
    pub name: String,
    /// The user's e-mail address, stored lower-cased.
    pub email: String,
    /// The argon2 hash of the user's password, absent for Google-only accounts.
    pub password_hash: Option<String>,
    /// The Google account subject identifier.
    pub google_id: Option<String>,
    /// URL of the user's profile picture.
    pub profile_picture: Option<String>,
    /// The timestamp when the user was created.
    pub created_at: DateTime<Utc>,
    /// The timestamp of the user's last successful sign-in.
    pub last_login_at: Option<DateTime<Utc>>,
    /// Whether the user is active.
    pub is_active: bool,
}

impl User {
    /// The subset of the user exposed through the API.
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            profile_picture: self.profile_picture.clone(),
        }
    }
}

/// Fields required to insert a user.
#[derive(Clone, Debug)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: Option<String>,
    pub google_id: Option<String>,
    pub profile_picture: Option<String>,
    pub last_login_at: Option<DateTime<Utc>>,
}
