//! Single-flight access token refresh
//!
//! [`RefreshCoordinator`] guarantees at most one outstanding call to the
//! refresh endpoint. The first caller to hit a 401 becomes the leader and
//! performs the refresh; callers arriving while it is in flight are queued
//! and released, in queue order, with the leader's outcome. If the leader
//! is cancelled before it settles, the queued callers contend again.
//!
//! ## State machine
//!
//! ```text
//!            refresh()                    settle (ok / err)
//!   Idle ───────────────▶ Refreshing ────────────────────────▶ Idle
//!                          │      ▲
//!                          └──────┘ refresh(): enqueue waiter
//! ```
//!
//! The state flag and the waiter queue live under one lock, so the queue
//! exists exactly while a refresh is in flight and is drained exactly once.
//! The lock is never held across an `.await`.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, PoisonError},
};

use ledgerdesk_core::ports::{Navigator, Notification, Notifier, TokenStore};
use reqwest::Client;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::auth::{RefreshRequest, RefreshResponse};

/// Why a refresh did not produce a new access token
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefreshError {
    /// The stored refresh token belongs to a demo session; no call was made
    #[error("Demo session: token refresh is not available without a backend")]
    DemoSession,

    /// The refresh call failed and the session was cleared
    #[error("{message}")]
    Failed {
        message: String,
        /// Whether the "session expired" notification was shown
        notified: bool,
    },
}

type Waiter = oneshot::Sender<Result<String, RefreshError>>;

#[derive(Debug, Default)]
enum RefreshState {
    #[default]
    Idle,
    Refreshing {
        waiters: VecDeque<Waiter>,
    },
}

/// Everything the coordinator needs besides the token store
#[derive(Debug, Clone)]
pub struct RefreshSettings {
    /// Absolute URL of the refresh endpoint
    pub refresh_url: String,
    /// Refresh tokens with this prefix belong to demo sessions
    pub demo_token_prefix: String,
    /// Route of the login view
    pub login_route: String,
}

/// Serializes token refreshes and fans the outcome out to waiters
pub struct RefreshCoordinator {
    http: Client,
    settings: RefreshSettings,
    tokens: Arc<dyn TokenStore>,
    notifier: Arc<dyn Notifier>,
    navigator: Arc<dyn Navigator>,
    state: Mutex<RefreshState>,
}

enum Role {
    Leader,
    Waiter(oneshot::Receiver<Result<String, RefreshError>>),
}

impl RefreshCoordinator {
    pub fn new(
        http: Client,
        settings: RefreshSettings,
        tokens: Arc<dyn TokenStore>,
        notifier: Arc<dyn Notifier>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            http,
            settings,
            tokens,
            notifier,
            navigator,
            state: Mutex::new(RefreshState::Idle),
        }
    }

    pub fn demo_token_prefix(&self) -> &str {
        &self.settings.demo_token_prefix
    }

    /// Whether `refresh_token` belongs to a demo session
    pub fn is_demo_token(&self, refresh_token: &str) -> bool {
        refresh_token.starts_with(&self.settings.demo_token_prefix)
    }

    /// Whether a refresh is currently in flight
    pub fn is_refreshing(&self) -> bool {
        matches!(*self.lock_state(), RefreshState::Refreshing { .. })
    }

    /// Number of callers waiting on the in-flight refresh
    pub fn pending_waiters(&self) -> usize {
        match &*self.lock_state() {
            RefreshState::Idle => 0,
            RefreshState::Refreshing { waiters } => waiters.len(),
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, RefreshState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Obtains a new access token, sharing any refresh already in flight
    ///
    /// On success the new token is already in the token store when this
    /// returns. On failure the session has been cleared (except for demo
    /// sessions, which are left untouched).
    pub async fn refresh(&self) -> Result<String, RefreshError> {
        loop {
            let refresh_token = self.tokens.refresh_token();
            if refresh_token
                .as_deref()
                .is_some_and(|token| self.is_demo_token(token))
            {
                debug!("Demo refresh token, not contacting the refresh endpoint");
                return Err(RefreshError::DemoSession);
            }

            let role = {
                let mut state = self.lock_state();
                match &mut *state {
                    RefreshState::Idle => {
                        *state = RefreshState::Refreshing {
                            waiters: VecDeque::new(),
                        };
                        Role::Leader
                    }
                    RefreshState::Refreshing { waiters } => {
                        let (tx, rx) = oneshot::channel();
                        waiters.push_back(tx);
                        debug!(queued = waiters.len(), "Refresh in flight, queuing caller");
                        Role::Waiter(rx)
                    }
                }
            };

            match role {
                Role::Waiter(rx) => match rx.await {
                    Ok(outcome) => return outcome,
                    // Leader was dropped before settling; contend again
                    Err(_) => debug!("Refresh leader went away, retrying refresh"),
                },
                Role::Leader => {
                    let guard = LeaderGuard {
                        coordinator: self,
                        settled: false,
                    };
                    let outcome = self.perform_refresh(refresh_token).await;
                    return guard.settle(outcome);
                }
            }
        }
    }

    async fn perform_refresh(&self, refresh_token: Option<String>) -> Result<String, RefreshError> {
        let Some(refresh_token) = refresh_token else {
            warn!("Access token rejected and no refresh token is stored");
            return Err(self.expire_session("No refresh token available"));
        };

        info!("Refreshing access token");
        let response = self
            .http
            .post(&self.settings.refresh_url)
            .json(&RefreshRequest {
                refresh: refresh_token,
            })
            .send()
            .await;

        let response = match response {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                let status = response.status().as_u16();
                warn!(status, "Refresh endpoint rejected the refresh token");
                return Err(self.expire_session(&format!(
                    "Token refresh failed with status {}",
                    status
                )));
            }
            Err(e) => {
                warn!(error = %e, "Refresh request did not complete");
                return Err(self.expire_session("Token refresh request failed"));
            }
        };

        match response.json::<RefreshResponse>().await {
            Ok(body) => {
                self.tokens.set_access_token(&body.access);
                if let Some(rotated) = &body.refresh {
                    self.tokens.set_refresh_token(rotated);
                }
                info!("Successfully refreshed access token");
                Ok(body.access)
            }
            Err(e) => {
                warn!(error = %e, "Refresh response was not understood");
                Err(self.expire_session("Token refresh returned an invalid response"))
            }
        }
    }

    /// Clears the session and, unless the user is already on the login
    /// view, tells them and redirects there
    fn expire_session(&self, message: &str) -> RefreshError {
        self.tokens.clear_all();

        let location = self.navigator.current_location();
        let notified = route_path(&location) != route_path(&self.settings.login_route);
        if notified {
            self.notifier.notify(
                Notification::warning(
                    "Session expired",
                    "Your session has expired. Please sign in again.",
                )
                .with_category("auth"),
            );
            self.navigator.navigate(&self.settings.login_route);
        }

        info!(from = %location, redirected = notified, "Session expired");
        RefreshError::Failed {
            message: message.to_string(),
            notified,
        }
    }
}

/// Path part of a route, without query, fragment or trailing slash
fn route_path(location: &str) -> &str {
    let path = location.split(['?', '#']).next().unwrap_or(location);
    match path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    }
}

/// Returns the coordinator to `Idle` even if the leader is dropped mid-refresh
struct LeaderGuard<'a> {
    coordinator: &'a RefreshCoordinator,
    settled: bool,
}

impl LeaderGuard<'_> {
    fn settle(mut self, outcome: Result<String, RefreshError>) -> Result<String, RefreshError> {
        self.settled = true;
        let waiters = self.take_waiters();
        debug!(waiters = waiters.len(), ok = outcome.is_ok(), "Refresh settled, releasing waiters");
        for waiter in waiters {
            let _ = waiter.send(outcome.clone());
        }
        outcome
    }

    fn take_waiters(&self) -> VecDeque<Waiter> {
        let mut state = self.coordinator.lock_state();
        match std::mem::take(&mut *state) {
            RefreshState::Refreshing { waiters } => waiters,
            RefreshState::Idle => VecDeque::new(),
        }
    }
}

impl Drop for LeaderGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            // Dropping the senders wakes every waiter so one of them can lead.
            let abandoned = self.take_waiters();
            warn!(waiters = abandoned.len(), "Refresh leader dropped before settling");
        }
    }
}
