//! Request commands - issue a verb against an API path and print the payload

use anyhow::{Context, Result};
use clap::Args;
use ledgerdesk_client::Verb;
use serde_json::Value;
use tracing::info;
use url::form_urlencoded;

use super::context::{params_object, parse_key_values, CliContext, GlobalOptions};

#[derive(Debug, Args)]
pub struct RequestArgs {
    /// API path, e.g. /api/accounts/
    pub path: String,

    /// Query parameter as key=value (repeatable)
    #[arg(short = 'p', long = "param")]
    pub params: Vec<String>,

    /// JSON body for POST/PUT/PATCH
    #[arg(short, long)]
    pub data: Option<String>,
}

impl RequestArgs {
    /// Payload for `verb`: the JSON body for body verbs, else the params
    fn payload(&self, verb: Verb) -> Result<Option<Value>> {
        if verb.sends_body() {
            return self
                .data
                .as_deref()
                .map(|data| serde_json::from_str(data).context("--data is not valid JSON"))
                .transpose();
        }
        params_object(&self.params)
    }

    pub async fn execute(&self, verb: Verb, options: &GlobalOptions) -> Result<()> {
        let ctx = CliContext::new(options)?;
        let payload = self.payload(verb)?;
        let path = if verb.sends_body() && !self.params.is_empty() {
            with_query_string(&self.path, &self.params)?
        } else {
            self.path.clone()
        };

        info!(%verb, path = %path, retry = options.retry, "Issuing request");
        let result = if options.retry {
            ctx.client
                .request_with_retry::<Value>(verb, &path, payload)
                .await
        } else {
            ctx.client.request::<Value>(verb, &path, payload).await
        };

        report_session_expiry(&ctx, options);
        options.formatter().print_data(&result?);
        Ok(())
    }
}

#[derive(Debug, Args)]
pub struct ListArgs {
    /// API path of a paginated collection
    pub path: String,

    /// Query parameter as key=value (repeatable)
    #[arg(short = 'p', long = "param")]
    pub params: Vec<String>,

    /// Follow `next` links and print every item
    #[arg(long)]
    pub all: bool,
}

impl ListArgs {
    pub async fn execute(&self, options: &GlobalOptions) -> Result<()> {
        let ctx = CliContext::new(options)?;
        let params = params_object(&self.params)?;
        let fmt = options.formatter();

        if self.all {
            let result = ctx.client.get_all::<Value>(&self.path, params).await;
            report_session_expiry(&ctx, options);
            let items = result?;
            if !options.is_json() {
                fmt.success(&format!("{} items", items.len()));
            }
            fmt.print_data(&Value::Array(items));
            return Ok(());
        }

        let result = ctx
            .client
            .get_paginated::<Value>(&self.path, params)
            .await;
        report_session_expiry(&ctx, options);
        let page = result?;
        if options.is_json() {
            fmt.print_json(&serde_json::to_value(&page)?);
        } else {
            fmt.success(&format!(
                "{} of {} items{}",
                page.results.len(),
                page.count,
                if page.has_next() { " (more pages, use --all)" } else { "" }
            ));
            fmt.print_data(&Value::Array(page.results));
        }
        Ok(())
    }
}

/// Appends form-encoded `key=value` pairs to a path that already carries a body
fn with_query_string(path: &str, params: &[String]) -> Result<String> {
    let query = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(parse_key_values(params)?)
        .finish();
    let separator = if path.contains('?') { '&' } else { '?' };
    Ok(format!("{}{}{}", path, separator, query))
}

/// Tells the user to sign in again when a refresh failed mid-command
pub(super) fn report_session_expiry(ctx: &CliContext, options: &GlobalOptions) {
    if ctx.session_expired() {
        options
            .formatter()
            .warn("Session expired. Run 'ledgerdesk auth login <username>' to sign in again.");
    }
}
