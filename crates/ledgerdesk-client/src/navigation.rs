//! In-process navigator
//!
//! Tracks the current route in memory. Front ends without a router of
//! their own (the CLI, tests) use it to learn that the session expired.

use std::sync::{Mutex, PoisonError};

use ledgerdesk_core::ports::Navigator;
use tracing::info;

/// Navigator remembering the current route and every redirect
#[derive(Debug)]
pub struct RouteNavigator {
    current: Mutex<String>,
    history: Mutex<Vec<String>>,
}

impl RouteNavigator {
    /// Starts at `initial` with an empty history
    pub fn new(initial: impl Into<String>) -> Self {
        Self {
            current: Mutex::new(initial.into()),
            history: Mutex::new(Vec::new()),
        }
    }

    /// Routes navigated to, oldest first
    pub fn history(&self) -> Vec<String> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Default for RouteNavigator {
    fn default() -> Self {
        Self::new("/")
    }
}

impl Navigator for RouteNavigator {
    fn current_location(&self) -> String {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn navigate(&self, route: &str) {
        info!(route, "Navigating");
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = route.to_string();
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(route.to_string());
    }
}
