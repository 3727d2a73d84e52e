//! Notification port (driven/secondary port)
//!
//! This module defines the interface for short, transient messages shown
//! to the user: failure categories, "session expired", download complete.
//! Implementations may render toasts, print to a terminal, or record them.
//!
//! ## Design Notes
//!
//! - Notifications are fire-and-forget; the caller does not wait for
//!   user interaction and delivery failures are the adapter's concern.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Severity of a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationLevel {
    /// Neutral information
    #[default]
    Info,
    /// An operation completed
    Success,
    /// Something needs the user's attention
    Warning,
    /// An operation failed
    Error,
}

impl std::fmt::Display for NotificationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            NotificationLevel::Info => "info",
            NotificationLevel::Success => "success",
            NotificationLevel::Warning => "warning",
            NotificationLevel::Error => "error",
        };
        write!(f, "{}", s)
    }
}

/// A notification to display to the user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Short title (e.g. "Server error")
    pub title: String,
    /// Body text with details about the event
    pub body: String,
    /// Severity affecting how the notification is displayed
    pub level: NotificationLevel,
    /// Category for grouping/filtering (e.g. "validation", "auth", "download")
    pub category: String,
    /// When the notification was raised
    pub issued_at: DateTime<Utc>,
}

impl Notification {
    /// Creates a new notification with the given title and body
    ///
    /// Uses `Info` level and an empty category by default.
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            level: NotificationLevel::Info,
            category: String::new(),
            issued_at: Utc::now(),
        }
    }

    pub fn with_level(mut self, level: NotificationLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// Creates a success notification
    pub fn success(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(title, body).with_level(NotificationLevel::Success)
    }

    /// Creates a warning notification
    pub fn warning(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(title, body).with_level(NotificationLevel::Warning)
    }

    /// Creates an error notification
    pub fn error(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(title, body).with_level(NotificationLevel::Error)
    }
}

/// Port trait for user-facing notifications
pub trait Notifier: Send + Sync {
    /// Shows a notification to the user
    fn notify(&self, notification: Notification);
}
