//! Token store port (driven/secondary port)
//!
//! Reads and writes the session tokens from persistent storage. The store
//! reports presence or absence only; it knows nothing about validity.
//!
//! ## Design Notes
//!
//! - Methods never fail. Backend errors are logged by the adapter and
//!   surface as an absent value.
//! - Readers call [`TokenStore::access_token`] at send time, so a token
//!   cleared or replaced by another task is never reused.

use crate::domain::{Session, UserProfile};

/// Persistence key of the access token
pub const ACCESS_TOKEN_KEY: &str = "authToken";

/// Persistence key of the refresh token
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";

/// Persistence key of the serialized user profile
pub const USER_KEY: &str = "user";

/// Port trait for session token persistence
pub trait TokenStore: Send + Sync {
    /// Returns the current access token, if any
    fn access_token(&self) -> Option<String>;

    /// Returns the current refresh token, if any
    fn refresh_token(&self) -> Option<String>;

    /// Returns the persisted user profile, if any
    fn user(&self) -> Option<UserProfile>;

    /// Replaces the access token
    fn set_access_token(&self, token: &str);

    /// Replaces the refresh token
    fn set_refresh_token(&self, token: &str);

    /// Replaces the persisted user profile
    fn set_user(&self, user: &UserProfile);

    /// Removes the access token, the refresh token and the user profile
    fn clear_all(&self);

    /// Stores every part of a freshly established session
    fn set_session(&self, session: &Session) {
        self.set_access_token(&session.access_token);
        if let Some(refresh) = &session.refresh_token {
            self.set_refresh_token(refresh);
        }
        if let Some(user) = &session.user {
            self.set_user(user);
        }
    }

    /// Whether an access token is present
    fn has_session(&self) -> bool {
        self.access_token().is_some()
    }
}
