//! Auth commands - Login, Logout, Demo and Status
//!
//! Provides the `ledgerdesk auth` CLI subcommands which:
//! 1. `login`  - Exchanges credentials for a token pair and stores it in the
//!    system keyring.
//! 2. `demo`   - Starts an offline demo session served from fixtures.
//! 3. `logout` - Clears stored tokens.
//! 4. `status` - Shows whether a session is stored and for whom.

use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use clap::Subcommand;
use ledgerdesk_core::domain::UserProfile;
use tracing::info;

use super::context::{CliContext, GlobalOptions};

#[derive(Debug, Subcommand)]
pub enum AuthCommand {
    /// Sign in with a username and password
    Login {
        /// Account username
        username: String,
        /// Password (read from stdin when omitted)
        #[arg(long)]
        password: Option<String>,
    },
    /// Start an offline demo session
    Demo,
    /// Remove stored credentials
    Logout,
    /// Check authentication status
    Status,
}

impl AuthCommand {
    pub async fn execute(&self, options: &GlobalOptions) -> Result<()> {
        let ctx = CliContext::new(options)?;
        match self {
            AuthCommand::Login { username, password } => {
                let password = match password {
                    Some(password) => password.clone(),
                    None => read_password()?,
                };
                self.execute_login(&ctx, options, username, &password).await
            }
            AuthCommand::Demo => self.execute_demo(&ctx, options),
            AuthCommand::Logout => self.execute_logout(&ctx, options),
            AuthCommand::Status => self.execute_status(&ctx, options),
        }
    }

    async fn execute_login(
        &self,
        ctx: &CliContext,
        options: &GlobalOptions,
        username: &str,
        password: &str,
    ) -> Result<()> {
        let fmt = options.formatter();
        info!(username, base_url = %ctx.config.api.base_url, "Signing in");

        let session = ctx.client.login(username, password).await?;
        let name = session
            .user
            .as_ref()
            .map(UserProfile::display_name)
            .unwrap_or_else(|| username.to_string());

        if options.is_json() {
            fmt.print_json(&serde_json::json!({
                "success": true,
                "user": session.user,
                "has_refresh_token": session.refresh_token.is_some(),
            }));
        } else {
            fmt.success(&format!("Signed in as {}", name));
            fmt.info(&format!("Server: {}", ctx.config.api.base_url));
            fmt.info("Tokens stored in the system keyring");
        }
        Ok(())
    }

    fn execute_demo(&self, ctx: &CliContext, options: &GlobalOptions) -> Result<()> {
        let fmt = options.formatter();
        let user = UserProfile {
            username: Some("demo".to_string()),
            first_name: Some("Demo".to_string()),
            last_name: Some("User".to_string()),
            ..Default::default()
        };
        ctx.client.start_demo_session(user);

        if options.is_json() {
            fmt.print_json(&serde_json::json!({ "success": true, "demo": true }));
        } else {
            fmt.success("Demo session started");
            fmt.info("Run commands with --demo (or set demo.enabled) to use fixtures");
        }
        Ok(())
    }

    fn execute_logout(&self, ctx: &CliContext, options: &GlobalOptions) -> Result<()> {
        let fmt = options.formatter();
        if !ctx.client.is_authenticated() {
            fmt.info("Not signed in. Nothing to log out.");
            return Ok(());
        }

        ctx.client.logout();
        fmt.success("Logged out successfully");
        fmt.info("Credentials removed from keyring");
        Ok(())
    }

    fn execute_status(&self, ctx: &CliContext, options: &GlobalOptions) -> Result<()> {
        let fmt = options.formatter();
        let tokens = ctx.client.token_store();
        let authenticated = ctx.client.is_authenticated();
        let demo = tokens
            .refresh_token()
            .is_some_and(|token| ctx.client.refresh_coordinator().is_demo_token(&token));
        let user = ctx.client.current_user();

        if options.is_json() {
            fmt.print_json(&serde_json::json!({
                "authenticated": authenticated,
                "demo": demo,
                "has_refresh_token": tokens.refresh_token().is_some(),
                "user": user,
                "server": ctx.config.api.base_url,
            }));
            return Ok(());
        }

        if !authenticated {
            fmt.info("Authentication status: Not signed in");
            fmt.info("Run 'ledgerdesk auth login <username>' to authenticate");
            return Ok(());
        }

        let name = user
            .as_ref()
            .map(UserProfile::display_name)
            .unwrap_or_else(|| "unknown user".to_string());
        fmt.success(&format!("Signed in as {}", name));
        fmt.info(&format!("Server: {}", ctx.config.api.base_url));
        if demo {
            fmt.info("Session: demo (offline)");
        }
        Ok(())
    }
}

fn read_password() -> Result<String> {
    eprint!("Password: ");
    std::io::stderr().flush().ok();
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read password from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
