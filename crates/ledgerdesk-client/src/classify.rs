//! Failure classification
//!
//! Turns a [`RequestFailure`] into the [`NormalizedError`] callers observe
//! and emits exactly one user notification for it.
//!
//! Rules, in order:
//! 1. The server responded: the message comes from a string body, then the
//!    `message`, `detail` and `error` keys, then the first string inside an
//!    `errors` map. Status, status-derived code and field errors are copied.
//! 2. No response arrived: `NETWORK_ERROR` with a fixed message.
//! 3. Anything else: `UNKNOWN_ERROR` with the failure's own message.

use std::sync::Arc;

use ledgerdesk_core::{
    domain::{ErrorKind, FieldErrors, NormalizedError},
    ports::{Notification, Notifier},
};
use serde_json::Value;
use tracing::debug;

use crate::RequestFailure;

/// Message used when no response reached the client
pub const NETWORK_ERROR_MESSAGE: &str =
    "Unable to reach the server. Check your network connection and try again.";

/// Message used when a failure carries no usable description
pub const UNKNOWN_ERROR_MESSAGE: &str = "An unexpected error occurred.";

/// Keys searched, in order, for a message in a JSON error body
const MESSAGE_KEYS: &[&str] = &["message", "detail", "error"];

/// Longest plain-text body used verbatim as a message
const MAX_TEXT_MESSAGE_LEN: usize = 300;

/// Classifies failures and notifies the user about them
#[derive(Clone)]
pub struct ErrorClassifier {
    notifier: Arc<dyn Notifier>,
}

impl ErrorClassifier {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }

    /// Normalizes `failure` and emits one notification for it
    ///
    /// An auth failure whose "session expired" notice was already shown by
    /// the refresh coordinator is not announced a second time.
    pub fn classify(&self, failure: &RequestFailure) -> NormalizedError {
        let error = normalize(failure);
        debug!(code = %error.code, status = ?error.status, message = %error.message, "Classified request failure");

        let already_notified = matches!(failure, RequestFailure::AuthExpired { notified: true, .. });
        if !already_notified {
            self.notifier.notify(notification_for(&error));
        }

        error
    }
}

/// Pure classification, without notifying anyone
pub fn normalize(failure: &RequestFailure) -> NormalizedError {
    match failure {
        RequestFailure::Response { status, body } => normalize_response(*status, body),
        RequestFailure::NoResponse(_) => {
            NormalizedError::new(ErrorKind::NetworkError, NETWORK_ERROR_MESSAGE)
        }
        RequestFailure::AuthExpired { message, .. } => {
            NormalizedError::new(ErrorKind::AuthExpired, non_empty(message)).with_status(401)
        }
        RequestFailure::DemoMode(message) => {
            NormalizedError::new(ErrorKind::DemoMode, non_empty(message))
        }
        RequestFailure::Other(message) => {
            NormalizedError::new(ErrorKind::UnknownError, non_empty(message))
        }
    }
}

fn non_empty(message: &str) -> String {
    if message.trim().is_empty() {
        UNKNOWN_ERROR_MESSAGE.to_string()
    } else {
        message.to_string()
    }
}

fn normalize_response(status: u16, body: &str) -> NormalizedError {
    let kind = ErrorKind::from_status(status);
    let fallback = || format!("Request failed with status {}", status);

    let Ok(json) = serde_json::from_str::<Value>(body) else {
        let text = body.trim();
        let message = if is_plain_text_message(text) {
            text.to_string()
        } else {
            fallback()
        };
        return NormalizedError::new(kind, message).with_status(status);
    };

    let message = extract_message(&json).unwrap_or_else(fallback);
    let mut error = NormalizedError::new(kind, message).with_status(status);
    if let Some(fields) = extract_field_errors(&json) {
        error = error.with_field_errors(fields);
    }
    error.with_details(json)
}

/// A non-JSON body is used as the message unless it is empty, markup, or huge
fn is_plain_text_message(text: &str) -> bool {
    !text.is_empty() && !text.starts_with('<') && text.len() <= MAX_TEXT_MESSAGE_LEN
}

/// Finds the most specific human-readable message in a JSON error body
pub fn extract_message(json: &Value) -> Option<String> {
    if let Value::String(s) = json {
        return Some(s.clone()).filter(|s| !s.trim().is_empty());
    }

    let object = json.as_object()?;
    for key in MESSAGE_KEYS {
        if let Some(Value::String(s)) = object.get(*key) {
            if !s.trim().is_empty() {
                return Some(s.clone());
            }
        }
    }

    object
        .get("errors")
        .and_then(Value::as_object)
        .and_then(|errors| errors.values().find_map(first_string))
}

fn first_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Array(items) => items.iter().find_map(first_string),
        _ => None,
    }
}

/// Collects the `errors` map into field name → messages
fn extract_field_errors(json: &Value) -> Option<FieldErrors> {
    let errors = json.get("errors")?.as_object()?;
    let fields: FieldErrors = errors
        .iter()
        .filter_map(|(field, value)| {
            let messages: Vec<String> = match value {
                Value::String(s) => vec![s.clone()],
                Value::Array(items) => items
                    .iter()
                    .filter_map(|item| item.as_str().map(str::to_string))
                    .collect(),
                _ => Vec::new(),
            };
            (!messages.is_empty()).then(|| (field.clone(), messages))
        })
        .collect();

    (!fields.is_empty()).then_some(fields)
}

/// The single notification shown for a classified failure
pub fn notification_for(error: &NormalizedError) -> Notification {
    let (title, category) = match error.code {
        ErrorKind::Validation => ("Validation error", "validation"),
        ErrorKind::Forbidden => ("Access denied", "forbidden"),
        ErrorKind::NotFound => ("Not found", "not_found"),
        ErrorKind::ServerError => ("Server error", "server"),
        ErrorKind::NetworkError => ("Network error", "network"),
        ErrorKind::UnknownError => ("Request failed", "unknown"),
        ErrorKind::AuthExpired => ("Session expired", "auth"),
        ErrorKind::DemoMode => ("Demo mode", "demo"),
    };

    let notification = match error.code {
        ErrorKind::Validation | ErrorKind::DemoMode => Notification::warning(title, &error.message),
        _ => Notification::error(title, &error.message),
    };
    notification.with_category(category)
}
