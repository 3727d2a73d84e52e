//! Authenticated session data
//!
//! A [`Session`] is what a successful login yields and what the token store
//! persists: the access token, the refresh token, and the user profile.

use serde::{Deserialize, Serialize};

/// Profile of the signed-in user as returned by the login endpoint
///
/// Only the common fields are typed; anything else the backend sends is kept
/// in `extra` so it survives a store/load cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl UserProfile {
    /// Best human-readable name for the user.
    pub fn display_name(&self) -> String {
        let full_name = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        if !full_name.is_empty() {
            return full_name;
        }

        self.username
            .clone()
            .or_else(|| self.email.clone())
            .unwrap_or_else(|| "Unknown user".to_string())
    }
}

/// Tokens (and profile) of an authenticated session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Short-lived token sent on every request
    pub access_token: String,
    /// Longer-lived token used only to mint a new access token
    pub refresh_token: Option<String>,
    /// Profile of the signed-in user
    pub user: Option<UserProfile>,
}

impl Session {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            user: None,
        }
    }

    pub fn with_refresh_token(mut self, token: impl Into<String>) -> Self {
        self.refresh_token = Some(token.into());
        self
    }

    pub fn with_user(mut self, user: UserProfile) -> Self {
        self.user = Some(user);
        self
    }
}
