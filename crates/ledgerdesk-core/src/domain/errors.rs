//! Normalized error types
//!
//! [`NormalizedError`] is the only failure shape callers of the API client
//! ever observe. Raw transport errors are converted at the client boundary.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Category of a failed request, serialized as the error `code`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// 400: the server rejected the payload, field errors may be available
    Validation,
    /// 403: the session is valid but lacks permission
    Forbidden,
    /// 404: the resource does not exist
    NotFound,
    /// 5xx: the server failed
    ServerError,
    /// The request was sent but no response arrived
    NetworkError,
    /// Anything that fits no other category
    UnknownError,
    /// 401 after the refresh was exhausted, or the refresh itself failed
    AuthExpired,
    /// A demo session hit an operation that needs a real backend
    DemoMode,
}

impl ErrorKind {
    /// Derives the kind for an HTTP status received from the server.
    pub fn from_status(status: u16) -> Self {
        match status {
            400 => ErrorKind::Validation,
            403 => ErrorKind::Forbidden,
            404 => ErrorKind::NotFound,
            500..=599 => ErrorKind::ServerError,
            _ => ErrorKind::UnknownError,
        }
    }

    /// Returns the wire code, e.g. `"NOT_FOUND"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "VALIDATION",
            ErrorKind::Forbidden => "FORBIDDEN",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::ServerError => "SERVER_ERROR",
            ErrorKind::NetworkError => "NETWORK_ERROR",
            ErrorKind::UnknownError => "UNKNOWN_ERROR",
            ErrorKind::AuthExpired => "AUTH_EXPIRED",
            ErrorKind::DemoMode => "DEMO_MODE",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Field name to list of messages, as returned by form validation endpoints
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// A classified request failure
///
/// Serializes to `{ message, status?, code, errors?, details? }`.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct NormalizedError {
    /// Human-readable description, never empty
    pub message: String,
    /// HTTP status, when the server responded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// Failure category
    pub code: ErrorKind,
    /// Per-field validation messages
    #[serde(
        rename = "errors",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub field_errors: Option<FieldErrors>,
    /// Raw response body, when it was JSON
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl NormalizedError {
    /// Creates an error with the given kind and message and no extra data.
    pub fn new(code: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
            code,
            field_errors: None,
            details: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_field_errors(mut self, errors: FieldErrors) -> Self {
        self.field_errors = Some(errors);
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Returns the messages recorded for `field`, if any.
    pub fn field(&self, field: &str) -> Option<&[String]> {
        self.field_errors
            .as_ref()
            .and_then(|errors| errors.get(field))
            .map(Vec::as_slice)
    }
}
