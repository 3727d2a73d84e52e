//! Demo-mode request interception
//!
//! When demo mode is on, requests whose path has a registered fixture are
//! answered locally with that payload. The decision is pure: no network
//! access, no token access.
//!
//! ## Usage
//!
//! ```rust
//! use ledgerdesk_client::mock::MockInterceptor;
//!
//! let interceptor = MockInterceptor::new(true)
//!     .with_fixture("/api/accounts/", serde_json::json!({ "count": 0, "results": [] }));
//! assert!(interceptor.should_intercept("/api/accounts?page=2"));
//! ```

use std::{
    collections::HashMap,
    path::Path,
    sync::{
        atomic::{AtomicBool, Ordering},
        PoisonError, RwLock,
    },
};

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{debug, info};

/// Decides whether a canned payload replaces a network call
#[derive(Debug, Default)]
pub struct MockInterceptor {
    enabled: AtomicBool,
    fixtures: RwLock<HashMap<String, Value>>,
}

impl MockInterceptor {
    /// Creates an interceptor with no fixtures
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
            fixtures: RwLock::new(HashMap::new()),
        }
    }

    /// Creates a disabled interceptor
    pub fn disabled() -> Self {
        Self::new(false)
    }

    /// Registers a fixture (builder variant)
    pub fn with_fixture(self, url: &str, payload: Value) -> Self {
        self.insert(url, payload);
        self
    }

    /// Registers or replaces the payload served for `url`
    pub fn insert(&self, url: &str, payload: Value) {
        let key = normalize_path(url);
        debug!(path = %key, "Registered demo fixture");
        self.fixtures
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, payload);
    }

    /// Loads fixtures from a JSON or YAML file mapping paths to payloads
    ///
    /// Files with a `.yaml`/`.yml` extension are parsed as YAML, anything
    /// else as JSON. Returns the number of fixtures loaded.
    pub fn load_fixtures(&self, path: &Path) -> Result<usize> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read fixture file {}", path.display()))?;

        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        );
        let fixtures: HashMap<String, Value> = if is_yaml {
            serde_yaml::from_str(&content).context("Failed to parse YAML fixtures")?
        } else {
            serde_json::from_str(&content).context("Failed to parse JSON fixtures")?
        };

        let count = fixtures.len();
        for (url, payload) in fixtures {
            self.insert(&url, payload);
        }

        info!(count, file = %path.display(), "Loaded demo fixtures");
        Ok(count)
    }

    /// Turns demo mode on or off
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
        info!(enabled, "Demo mode toggled");
    }

    /// Whether demo mode is on
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Number of registered fixtures
    pub fn len(&self) -> usize {
        self.fixtures
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a request to `url` must be answered locally
    pub fn should_intercept(&self, url: &str) -> bool {
        self.is_enabled()
            && self
                .fixtures
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .contains_key(&normalize_path(url))
    }

    /// Returns the canned payload for `url` if the request must be intercepted
    pub fn resolve(&self, url: &str) -> Option<Value> {
        if !self.is_enabled() {
            return None;
        }
        self.fixtures
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&normalize_path(url))
            .cloned()
    }
}

/// Reduces a relative or absolute URL to the path fixtures are keyed by
///
/// Drops scheme, host, query string, fragment and trailing slashes, so
/// `https://erp/api/accounts/?page=2` and `/api/accounts` share one key.
pub fn normalize_path(url: &str) -> String {
    let path = match url::Url::parse(url) {
        Ok(parsed) if parsed.has_host() => parsed.path().to_string(),
        _ => url
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string(),
    };

    let trimmed = path.trim_end_matches('/');
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}
