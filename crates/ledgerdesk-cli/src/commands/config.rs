//! Config command - View and validate Ledgerdesk configuration
//!
//! Provides the `ledgerdesk config` CLI command which:
//! 1. Shows the effective configuration (YAML or JSON)
//! 2. Validates the configuration file and reports errors
//! 3. Prints the path of the configuration file in use

use anyhow::{Context, Result};
use clap::Subcommand;
use ledgerdesk_core::config::Config;
use tracing::info;

use super::context::GlobalOptions;

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display current configuration
    Show,
    /// Validate configuration file
    Validate,
    /// Print the configuration file path
    Path,
}

impl ConfigCommand {
    pub async fn execute(&self, options: &GlobalOptions) -> Result<()> {
        match self {
            ConfigCommand::Show => self.execute_show(options),
            ConfigCommand::Validate => self.execute_validate(options),
            ConfigCommand::Path => self.execute_path(options),
        }
    }

    fn execute_show(&self, options: &GlobalOptions) -> Result<()> {
        let formatter = options.formatter();
        let config_path = options.config_path();
        let config = options.load_config();

        info!(config_path = %config_path.display(), "Showing configuration");

        if options.is_json() {
            let json = serde_json::to_value(&config)
                .context("Failed to serialize configuration to JSON")?;
            formatter.print_json(&json);
        } else {
            formatter.success(&format!("Configuration ({})", config_path.display()));
            formatter.info("");

            let yaml = serde_yaml::to_string(&config)
                .context("Failed to serialize configuration to YAML")?;

            for line in yaml.lines() {
                formatter.info(line);
            }
        }

        Ok(())
    }

    fn execute_validate(&self, options: &GlobalOptions) -> Result<()> {
        let formatter = options.formatter();
        let config_path = options.config_path();

        // Load explicitly: a parse error must be reported, not defaulted away
        let config = match Config::load(&config_path) {
            Ok(cfg) => cfg,
            Err(e) => {
                let message = if config_path.exists() {
                    format!("Failed to parse configuration: {:#}", e)
                } else {
                    "Configuration file not found. Using defaults.".to_string()
                };

                if options.is_json() {
                    formatter.print_json(&serde_json::json!({
                        "valid": false,
                        "config_path": config_path.display().to_string(),
                        "errors": [message],
                    }));
                } else if config_path.exists() {
                    formatter.error(&message);
                    formatter.info(&format!("File: {}", config_path.display()));
                } else {
                    formatter.info(&format!(
                        "Configuration file not found at {}",
                        config_path.display()
                    ));
                    formatter.info("Using default configuration.");
                }
                return Ok(());
            }
        };

        info!(config_path = %config_path.display(), "Validating configuration");

        let errors = config.validate();

        if options.is_json() {
            let error_strings: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            formatter.print_json(&serde_json::json!({
                "valid": errors.is_empty(),
                "config_path": config_path.display().to_string(),
                "errors": error_strings,
            }));
        } else if errors.is_empty() {
            formatter.success("Configuration is valid");
            formatter.info(&format!("File: {}", config_path.display()));
        } else {
            formatter.error(&format!(
                "Configuration has {} error{}:",
                errors.len(),
                if errors.len() == 1 { "" } else { "s" }
            ));
            formatter.info(&format!("File: {}", config_path.display()));
            formatter.info("");
            for error in &errors {
                formatter.info(&format!("  {} - {}", error.field, error.message));
            }
        }

        Ok(())
    }

    fn execute_path(&self, options: &GlobalOptions) -> Result<()> {
        let config_path = options.config_path();
        if options.is_json() {
            options.formatter().print_json(&serde_json::json!({
                "config_path": config_path.display().to_string(),
                "exists": config_path.exists(),
            }));
        } else {
            println!("{}", config_path.display());
        }
        Ok(())
    }
}
