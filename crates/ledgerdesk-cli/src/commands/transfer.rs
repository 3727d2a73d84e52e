//! Upload and download commands

use std::{collections::BTreeMap, path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Args;
use ledgerdesk_client::transfer::{ProgressCallback, UploadFile, UploadProgress};
use serde_json::Value;
use tracing::{debug, info};

use super::{
    context::{params_object, parse_key_values, CliContext, GlobalOptions},
    request::report_session_expiry,
};

#[derive(Debug, Args)]
pub struct UploadArgs {
    /// API path receiving the upload
    pub path: String,

    /// File to upload
    pub file: PathBuf,

    /// Extra form field as key=value (repeatable)
    #[arg(short, long = "field")]
    pub fields: Vec<String>,

    /// Override the guessed MIME type
    #[arg(long)]
    pub mime: Option<String>,
}

impl UploadArgs {
    pub async fn execute(&self, options: &GlobalOptions) -> Result<()> {
        let ctx = CliContext::new(options)?;
        let fmt = options.formatter();

        let fields: BTreeMap<String, String> = parse_key_values(&self.fields)?.into_iter().collect();
        let mut file = UploadFile::from_path(&self.file)
            .await
            .with_context(|| format!("Failed to read {}", self.file.display()))?;
        if let Some(mime) = &self.mime {
            file = file.with_mime(mime.clone());
        }

        info!(path = %self.path, file = %file.file_name, size = file.len(), "Uploading");
        let progress: Option<ProgressCallback> = if options.is_json() {
            None
        } else {
            Some(Arc::new(|p: UploadProgress| {
                debug!(sent = p.sent, total = p.total, "Upload progress {}%", p.percent());
            }))
        };

        let result = ctx
            .client
            .upload_file::<Value>(&self.path, file, fields, progress)
            .await;
        report_session_expiry(&ctx, options);
        let created = result?;

        if !options.is_json() {
            fmt.success(&format!("Uploaded {}", self.file.display()));
        }
        fmt.print_data(&created);
        Ok(())
    }
}

#[derive(Debug, Args)]
pub struct DownloadArgs {
    /// API path of the resource
    pub path: String,

    /// File name to save under the download directory
    pub filename: String,

    /// Query parameter as key=value (repeatable)
    #[arg(short = 'p', long = "param")]
    pub params: Vec<String>,
}

impl DownloadArgs {
    pub async fn execute(&self, options: &GlobalOptions) -> Result<()> {
        let ctx = CliContext::new(options)?;
        let fmt = options.formatter();
        let params = params_object(&self.params)?;

        let result = ctx
            .client
            .download_file_with_params(&self.path, params, &self.filename)
            .await;
        report_session_expiry(&ctx, options);
        let saved = result?;

        if options.is_json() {
            fmt.print_json(&serde_json::json!({
                "success": true,
                "path": saved.display().to_string(),
            }));
        } else {
            fmt.success(&format!("Saved {}", saved.display()));
        }
        Ok(())
    }
}
