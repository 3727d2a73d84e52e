//! Shared setup for commands: configuration, client, argument parsing

use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Context, Result};
use ledgerdesk_client::{
    client::{ApiClient, ApiClientBuilder},
    navigation::RouteNavigator,
    notify::TracingNotifier,
    token_store::KeyringTokenStore,
};
use ledgerdesk_core::{config::Config, ports::Navigator};
use serde_json::{Map, Value};
use tracing::debug;

use crate::output::{get_formatter, OutputFormat, OutputFormatter};

/// Flags shared by every subcommand
#[derive(Debug, Clone)]
pub struct GlobalOptions {
    pub format: OutputFormat,
    pub config_path: Option<PathBuf>,
    pub demo: bool,
    pub retry: bool,
}

impl GlobalOptions {
    pub fn formatter(&self) -> Box<dyn OutputFormatter> {
        get_formatter(self.format == OutputFormat::Json)
    }

    pub fn is_json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    /// Config file in effect: `--config` or the platform default
    pub fn config_path(&self) -> PathBuf {
        self.config_path.clone().unwrap_or_else(Config::default_path)
    }

    /// Loads the configuration, falling back to defaults
    pub fn load_config(&self) -> Config {
        let mut config = Config::load_or_default(&self.config_path());
        if self.demo {
            config.demo.enabled = true;
        }
        config
    }
}

/// A configured client plus the navigator that observes session expiry
pub struct CliContext {
    pub config: Config,
    pub client: ApiClient,
    pub navigator: Arc<RouteNavigator>,
}

impl CliContext {
    /// Builds the client from configuration, with keyring-backed tokens
    pub fn new(options: &GlobalOptions) -> Result<Self> {
        let config = options.load_config();
        let errors = config.validate();
        if !errors.is_empty() {
            let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            bail!("Invalid configuration: {}", messages.join("; "));
        }

        let navigator = Arc::new(RouteNavigator::default());
        let client = ApiClientBuilder::from_config(&config)?
            .token_store(Arc::new(KeyringTokenStore::new(
                config.auth.keyring_service.clone(),
            )))
            .notifier(Arc::new(TracingNotifier))
            .navigator(navigator.clone())
            .build()
            .context("Failed to create API client")?;

        debug!(base_url = %config.api.base_url, demo = config.demo.enabled, "CLI context ready");

        Ok(Self {
            config,
            client,
            navigator,
        })
    }

    /// Whether a refresh failure sent the session to the login route
    pub fn session_expired(&self) -> bool {
        self.navigator.current_location() == self.config.auth.login_route
    }
}

/// Parses repeated `key=value` arguments
pub fn parse_key_values(pairs: &[String]) -> Result<Vec<(String, String)>> {
    pairs
        .iter()
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
            _ => bail!("Expected key=value, got '{}'", pair),
        })
        .collect()
}

/// `key=value` arguments as a JSON object, repeated keys becoming arrays
pub fn params_object(pairs: &[String]) -> Result<Option<Value>> {
    if pairs.is_empty() {
        return Ok(None);
    }

    let mut object = Map::new();
    for (key, value) in parse_key_values(pairs)? {
        let value = Value::String(value);
        match object.get_mut(&key) {
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                object.insert(key, value);
            }
        }
    }
    Ok(Some(Value::Object(object)))
}
