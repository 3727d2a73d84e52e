//! Token store adapters
//!
//! - [`KeyringTokenStore`] - persists tokens in the system keyring
//! - [`MemoryTokenStore`] - process-local store for tests and throwaway sessions
//!
//! Both implement [`TokenStore`], whose methods never fail: keyring errors
//! are logged and reported as an absent value.

use std::sync::{Mutex, PoisonError};

use anyhow::{Context, Result};
use ledgerdesk_core::{
    domain::UserProfile,
    ports::{
        token_store::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY},
        TokenStore,
    },
};
use tracing::{debug, info, warn};

// ============================================================================
// KeyringTokenStore
// ============================================================================

/// Stores session tokens in the system keyring
///
/// Uses the `keyring` crate to keep tokens in the OS credential store
/// (GNOME Keyring, KDE Wallet, macOS Keychain). Each value is a separate
/// entry under the configured service name, keyed `authToken`,
/// `refreshToken` and `user` (the profile serialized as JSON).
pub struct KeyringTokenStore {
    service: String,
}

impl KeyringTokenStore {
    /// Creates a store writing entries under `service`
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    /// Service name the entries are stored under
    pub fn service(&self) -> &str {
        &self.service
    }

    fn entry(&self, key: &str) -> Result<keyring::Entry> {
        keyring::Entry::new(&self.service, key).context("Failed to create keyring entry")
    }

    fn read(&self, key: &str) -> Result<Option<String>> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(anyhow::Error::new(e).context("Failed to read from keyring")),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        self.entry(key)?
            .set_password(value)
            .context("Failed to store value in keyring")
    }

    fn delete(&self, key: &str) -> Result<()> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(anyhow::Error::new(e).context("Failed to delete from keyring")),
        }
    }

    fn get_or_log(&self, key: &str) -> Option<String> {
        match self.read(key) {
            Ok(value) => value,
            Err(e) => {
                warn!(service = %self.service, key, error = %e, "Keyring read failed");
                None
            }
        }
    }

    fn set_or_log(&self, key: &str, value: &str) {
        match self.write(key, value) {
            Ok(()) => debug!(service = %self.service, key, "Stored keyring entry"),
            Err(e) => warn!(service = %self.service, key, error = %e, "Keyring write failed"),
        }
    }
}

impl TokenStore for KeyringTokenStore {
    fn access_token(&self) -> Option<String> {
        self.get_or_log(ACCESS_TOKEN_KEY)
    }

    fn refresh_token(&self) -> Option<String> {
        self.get_or_log(REFRESH_TOKEN_KEY)
    }

    fn user(&self) -> Option<UserProfile> {
        let json = self.get_or_log(USER_KEY)?;
        match serde_json::from_str(&json) {
            Ok(user) => Some(user),
            Err(e) => {
                warn!(service = %self.service, error = %e, "Stored user profile is corrupt");
                None
            }
        }
    }

    fn set_access_token(&self, token: &str) {
        self.set_or_log(ACCESS_TOKEN_KEY, token);
    }

    fn set_refresh_token(&self, token: &str) {
        self.set_or_log(REFRESH_TOKEN_KEY, token);
    }

    fn set_user(&self, user: &UserProfile) {
        match serde_json::to_string(user) {
            Ok(json) => self.set_or_log(USER_KEY, &json),
            Err(e) => warn!(error = %e, "Failed to serialize user profile"),
        }
    }

    fn clear_all(&self) {
        for key in [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY] {
            if let Err(e) = self.delete(key) {
                warn!(service = %self.service, key, error = %e, "Keyring delete failed");
            }
        }
        info!(service = %self.service, "Cleared session from keyring");
    }
}

// ============================================================================
// MemoryTokenStore
// ============================================================================

#[derive(Debug, Default)]
struct MemoryTokens {
    access: Option<String>,
    refresh: Option<String>,
    user: Option<UserProfile>,
}

/// Keeps session tokens in process memory
///
/// Nothing survives the process. Used by tests, which build one store per
/// client instance, and by demo sessions that must not touch the keyring.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    inner: Mutex<MemoryTokens>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store already holding an access and a refresh token
    pub fn with_tokens(access: impl Into<String>, refresh: impl Into<String>) -> Self {
        Self {
            inner: Mutex::new(MemoryTokens {
                access: Some(access.into()),
                refresh: Some(refresh.into()),
                user: None,
            }),
        }
    }

    fn with_inner<R>(&self, f: impl FnOnce(&mut MemoryTokens) -> R) -> R {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}

impl TokenStore for MemoryTokenStore {
    fn access_token(&self) -> Option<String> {
        self.with_inner(|t| t.access.clone())
    }

    fn refresh_token(&self) -> Option<String> {
        self.with_inner(|t| t.refresh.clone())
    }

    fn user(&self) -> Option<UserProfile> {
        self.with_inner(|t| t.user.clone())
    }

    fn set_access_token(&self, token: &str) {
        self.with_inner(|t| t.access = Some(token.to_string()));
    }

    fn set_refresh_token(&self, token: &str) {
        self.with_inner(|t| t.refresh = Some(token.to_string()));
    }

    fn set_user(&self, user: &UserProfile) {
        self.with_inner(|t| t.user = Some(user.clone()));
    }

    fn clear_all(&self) {
        self.with_inner(|t| *t = MemoryTokens::default());
    }
}
