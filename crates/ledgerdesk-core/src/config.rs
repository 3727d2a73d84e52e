//! Configuration module for Ledgerdesk.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for Ledgerdesk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub auth: AuthConfig,
    pub retry: RetryConfig,
    pub demo: DemoConfig,
    pub downloads: DownloadsConfig,
    pub logging: LoggingConfig,
}

/// Backend connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL every relative request path is joined to.
    pub base_url: String,
    /// Fixed per-request timeout, in seconds.
    pub timeout_secs: u64,
}

/// Authentication endpoints and session handling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Path of the credential exchange endpoint.
    pub login_path: String,
    /// Path of the token refresh endpoint.
    pub refresh_path: String,
    /// Route the user is sent to when the session expires.
    pub login_route: String,
    /// Refresh tokens starting with this prefix belong to demo sessions.
    pub demo_token_prefix: String,
    /// Service name used for keyring entries.
    pub keyring_service: String,
}

/// Opt-in retry wrapper settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Number of re-issues after the first failed attempt.
    pub max_attempts: u32,
    /// Delay unit for the linear backoff, in milliseconds.
    pub base_delay_ms: u64,
}

/// Demo / offline mode.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// Serve canned payloads instead of reaching the network.
    pub enabled: bool,
    /// JSON or YAML file mapping request paths to canned payloads.
    pub fixtures: Option<PathBuf>,
}

/// File download settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadsConfig {
    /// Directory downloaded files are written to.
    pub directory: PathBuf,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Write the configuration as YAML to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let yaml = serde_yaml::to_string(self).context("Failed to serialize config")?;
        std::fs::write(path, yaml)
            .with_context(|| format!("Failed to write config file {}", path.display()))?;
        Ok(())
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/ledgerdesk/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("ledgerdesk")
            .join("config.yaml")
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout_secs: 30,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            login_path: "/api/auth/token/".to_string(),
            refresh_path: "/api/auth/token/refresh/".to_string(),
            login_route: "/login".to_string(),
            demo_token_prefix: "demo".to_string(),
            keyring_service: "ledgerdesk".to_string(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
        }
    }
}

impl Default for DownloadsConfig {
    fn default() -> Self {
        let directory = dirs::download_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join("Downloads")))
            .unwrap_or_else(|| PathBuf::from("."));
        Self { directory }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"api.timeout_secs"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Upper bound for `retry.max_attempts`.
const MAX_RETRY_ATTEMPTS: u32 = 10;

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- api ---
        if !self.api.base_url.starts_with("http://") && !self.api.base_url.starts_with("https://")
        {
            errors.push(ValidationError {
                field: "api.base_url".into(),
                message: format!(
                    "must be an http:// or https:// URL, got '{}'",
                    self.api.base_url
                ),
            });
        }
        if self.api.timeout_secs == 0 {
            errors.push(ValidationError {
                field: "api.timeout_secs".into(),
                message: "must be greater than 0".into(),
            });
        }

        // --- auth ---
        for (field, value) in [
            ("auth.login_path", &self.auth.login_path),
            ("auth.refresh_path", &self.auth.refresh_path),
            ("auth.login_route", &self.auth.login_route),
        ] {
            if !value.starts_with('/') {
                errors.push(ValidationError {
                    field: field.into(),
                    message: format!("must start with '/', got '{}'", value),
                });
            }
        }
        if self.auth.demo_token_prefix.is_empty() {
            errors.push(ValidationError {
                field: "auth.demo_token_prefix".into(),
                message: "must not be empty".into(),
            });
        }
        if self.auth.keyring_service.is_empty() {
            errors.push(ValidationError {
                field: "auth.keyring_service".into(),
                message: "must not be empty".into(),
            });
        }

        // --- retry ---
        if self.retry.max_attempts > MAX_RETRY_ATTEMPTS {
            errors.push(ValidationError {
                field: "retry.max_attempts".into(),
                message: format!("must be at most {}", MAX_RETRY_ATTEMPTS),
            });
        }
        if self.retry.base_delay_ms == 0 {
            errors.push(ValidationError {
                field: "retry.base_delay_ms".into(),
                message: "must be greater than 0".into(),
            });
        }

        // --- demo ---
        if let Some(fixtures) = &self.demo.fixtures {
            if !fixtures.exists() {
                errors.push(ValidationError {
                    field: "demo.fixtures".into(),
                    message: format!("file does not exist: {}", fixtures.display()),
                });
            }
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use ledgerdesk_core::config::ConfigBuilder;
///
/// let config = ConfigBuilder::new()
///     .api_base_url("https://erp.example.com")
///     .retry_max_attempts(5)
///     .logging_level("debug")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- api ---

    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.api.base_url = url.into();
        self
    }

    pub fn api_timeout_secs(mut self, seconds: u64) -> Self {
        self.config.api.timeout_secs = seconds;
        self
    }

    // --- auth ---

    pub fn auth_login_path(mut self, path: impl Into<String>) -> Self {
        self.config.auth.login_path = path.into();
        self
    }

    pub fn auth_refresh_path(mut self, path: impl Into<String>) -> Self {
        self.config.auth.refresh_path = path.into();
        self
    }

    pub fn auth_login_route(mut self, route: impl Into<String>) -> Self {
        self.config.auth.login_route = route.into();
        self
    }

    pub fn auth_demo_token_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.auth.demo_token_prefix = prefix.into();
        self
    }

    pub fn auth_keyring_service(mut self, service: impl Into<String>) -> Self {
        self.config.auth.keyring_service = service.into();
        self
    }

    // --- retry ---

    pub fn retry_max_attempts(mut self, attempts: u32) -> Self {
        self.config.retry.max_attempts = attempts;
        self
    }

    pub fn retry_base_delay_ms(mut self, millis: u64) -> Self {
        self.config.retry.base_delay_ms = millis;
        self
    }

    // --- demo ---

    pub fn demo_enabled(mut self, enabled: bool) -> Self {
        self.config.demo.enabled = enabled;
        self
    }

    pub fn demo_fixtures(mut self, path: PathBuf) -> Self {
        self.config.demo.fixtures = Some(path);
        self
    }

    // --- downloads ---

    pub fn downloads_directory(mut self, directory: PathBuf) -> Self {
        self.config.downloads.directory = directory;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
