//! Notifier adapters
//!
//! - [`TracingNotifier`] - writes notifications to the tracing pipeline
//! - [`RecordingNotifier`] - keeps notifications in memory until drained

use std::sync::{Mutex, PoisonError};

use ledgerdesk_core::ports::{Notification, NotificationLevel, Notifier};
use tracing::{error, info, warn};

/// Logs every notification at a level matching its severity
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) {
        let Notification {
            title,
            body,
            level,
            category,
            ..
        } = notification;

        match level {
            NotificationLevel::Info | NotificationLevel::Success => {
                info!(%category, "{}: {}", title, body)
            }
            NotificationLevel::Warning => warn!(%category, "{}: {}", title, body),
            NotificationLevel::Error => error!(%category, "{}: {}", title, body),
        }
    }
}

/// Collects notifications so a front end can render them later
///
/// Tests use it to assert how many notifications a failure produced.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notifications: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far
    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Removes and returns everything recorded so far
    pub fn drain(&self) -> Vec<Notification> {
        std::mem::take(
            &mut *self
                .notifications
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        )
    }

    pub fn len(&self) -> usize {
        self.notifications
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of recorded notifications in `category`
    pub fn count_category(&self, category: &str) -> usize {
        self.notifications
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|n| n.category == category)
            .count()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.notifications
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notification);
    }
}
