//! User account model.

use serde::{Deserialize, Serialize};

/// Title given to new accounts.
pub const DEFAULT_TITLE: &str = "My Flashcards";

/// A registered user.
#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub title: String,
}

impl User {
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            username: self.username.clone(),
            title: self.title.clone(),
        }
    }
}

/// Public view of a user.
#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    pub title: String,
}

/// Request body for registration and login.
#[derive(Debug, Clone, Deserialize)]
pub struct CredentialsRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// Request body for `PUT /api/user/title`.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateTitleRequest {
    #[serde(default)]
    pub title: Option<String>,
}

/// Request body for `PUT /api/user/username`.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateUsernameRequest {
    #[serde(default)]
    pub username: String,
}

/// Request body for `PUT /api/user/password`.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdatePasswordRequest {
    #[serde(default)]
    pub current_password: String,
    #[serde(default)]
    pub new_password: String,
    #[serde(default)]
    pub confirm_password: String,
}
