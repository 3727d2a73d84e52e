//! File transfer: multipart upload with progress, and download to disk
//!
//! - [`ApiClient::upload_file`] - `POST` a file plus form fields as
//!   `multipart/form-data`, reporting progress per chunk
//! - [`ApiClient::download_file`] - `GET` a binary resource and save it
//!   under the configured download directory
//!
//! Both go through the same pipeline as every other request, so a 401 is
//! refreshed and replayed (the form is rebuilt for the replay) and failures
//! are classified once.

use std::{
    collections::BTreeMap,
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};

use bytes::Bytes;
use ledgerdesk_core::{domain::NormalizedError, ports::Notification};
use reqwest::{
    multipart::{Form, Part},
    Body,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info};

use crate::{
    client::{ApiClient, RequestBody, RequestDescriptor, Verb},
    RequestFailure,
};

/// Size of the body chunks the progress callback observes (64 KiB)
pub const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// Form field carrying the file
pub const FILE_FIELD: &str = "file";

const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// A file held in memory, ready to upload
#[derive(Debug, Clone, PartialEq)]
pub struct UploadFile {
    pub file_name: String,
    pub content: Bytes,
    pub mime_type: String,
}

impl UploadFile {
    /// In-memory file; the MIME type is guessed from the extension
    pub fn new(file_name: impl Into<String>, content: impl Into<Bytes>) -> Self {
        let file_name = file_name.into();
        let mime_type = guess_mime_type(&file_name).to_string();
        Self {
            file_name,
            content: content.into(),
            mime_type,
        }
    }

    /// Reads `path` from disk
    pub async fn from_path(path: &Path) -> std::io::Result<Self> {
        let content = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        Ok(Self::new(file_name, content))
    }

    pub fn with_mime(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self
    }

    pub fn len(&self) -> u64 {
        self.content.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

fn guess_mime_type(file_name: &str) -> &'static str {
    let extension = Path::new(file_name)
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase());

    match extension.as_deref() {
        Some("pdf") => "application/pdf",
        Some("csv") => "text/csv",
        Some("txt") => "text/plain",
        Some("json") => "application/json",
        Some("xml") => "application/xml",
        Some("xlsx") => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        Some("xls") => "application/vnd.ms-excel",
        Some("ofx") => "application/x-ofx",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        _ => DEFAULT_MIME_TYPE,
    }
}

/// Bytes of the file body handed to the transport so far
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadProgress {
    pub sent: u64,
    pub total: u64,
}

impl UploadProgress {
    /// Whole percent, 100 for an empty file
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        ((self.sent.min(self.total) * 100) / self.total) as u8
    }
}

pub type ProgressCallback = Arc<dyn Fn(UploadProgress) + Send + Sync>;

/// Everything needed to (re)build a multipart body
pub(crate) struct MultipartUpload {
    pub file: UploadFile,
    pub fields: BTreeMap<String, String>,
    pub on_progress: Option<ProgressCallback>,
}

impl fmt::Debug for MultipartUpload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultipartUpload")
            .field("file_name", &self.file.file_name)
            .field("size", &self.file.len())
            .field("fields", &self.fields)
            .field("on_progress", &self.on_progress.is_some())
            .finish()
    }
}

/// Builds a fresh form for one send attempt
pub(crate) fn build_form(upload: &MultipartUpload) -> Result<Form, RequestFailure> {
    let mut form = Form::new();
    for (name, value) in &upload.fields {
        form = form.text(name.clone(), value.clone());
    }

    let content = upload.file.content.clone();
    let total = content.len() as u64;
    let chunks: Vec<Bytes> = (0..content.len())
        .step_by(UPLOAD_CHUNK_SIZE)
        .map(|start| content.slice(start..(start + UPLOAD_CHUNK_SIZE).min(content.len())))
        .collect();

    let progress = upload.on_progress.clone();
    let mut sent = 0u64;
    let stream = futures_util::stream::iter(chunks.into_iter().map(move |chunk| {
        sent += chunk.len() as u64;
        if let Some(callback) = &progress {
            callback(UploadProgress { sent, total });
        }
        Ok::<Bytes, std::io::Error>(chunk)
    }));

    let part = Part::stream_with_length(Body::wrap_stream(stream), total)
        .file_name(upload.file.file_name.clone())
        .mime_str(&upload.file.mime_type)
        .map_err(|e| RequestFailure::Other(format!("Invalid MIME type: {}", e)))?;

    Ok(form.part(FILE_FIELD, part))
}

/// Final path component of `file_name`, refusing anything that escapes the
/// download directory
fn sanitize_file_name(file_name: &str) -> Option<&str> {
    Path::new(file_name)
        .file_name()
        .and_then(|name| name.to_str())
        .filter(|name| !name.is_empty())
}

impl ApiClient {
    /// Uploads `file` with extra form fields as `multipart/form-data`
    pub async fn upload_file<T: DeserializeOwned>(
        &self,
        url: &str,
        file: UploadFile,
        fields: BTreeMap<String, String>,
        on_progress: Option<ProgressCallback>,
    ) -> Result<T, NormalizedError> {
        info!(url, file = %file.file_name, size = file.len(), "Uploading file");

        let upload = MultipartUpload {
            file,
            fields,
            on_progress,
        };
        let descriptor = RequestDescriptor::new(Verb::Post, url)
            .with_body(RequestBody::Multipart(Arc::new(upload)));

        let result = self.execute(descriptor).await;
        self.settle(result)
    }

    /// Downloads `url` into the download directory as `file_name`
    pub async fn download_file(&self, url: &str, file_name: &str) -> Result<PathBuf, NormalizedError> {
        self.download_file_with_params(url, None, file_name).await
    }

    /// Like [`download_file`](Self::download_file), with query parameters
    pub async fn download_file_with_params(
        &self,
        url: &str,
        params: Option<Value>,
        file_name: &str,
    ) -> Result<PathBuf, NormalizedError> {
        let Some(safe_name) = sanitize_file_name(file_name) else {
            return Err(self.fail(&RequestFailure::Other(format!(
                "Invalid download file name '{}'",
                file_name
            ))));
        };

        let descriptor = RequestDescriptor::new(Verb::Get, url).with_payload(params);
        let response = self
            .execute(descriptor)
            .await
            .map_err(|failure| self.fail(&failure))?;

        let target = self.download_dir().join(safe_name);
        debug!(url, target = %target.display(), bytes = response.body.len(), "Saving download");

        let written = async {
            tokio::fs::create_dir_all(self.download_dir()).await?;
            tokio::fs::write(&target, &response.body).await
        }
        .await;
        if let Err(e) = written {
            return Err(self.fail(&RequestFailure::Other(format!(
                "Failed to save {}: {}",
                target.display(),
                e
            ))));
        }

        self.notifier().notify(
            Notification::success("Download complete", format!("{} saved", safe_name))
                .with_category("download"),
        );
        info!(path = %target.display(), "Download complete");
        Ok(target)
    }
}
