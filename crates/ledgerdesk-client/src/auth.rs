//! Login, logout and token endpoint wire types

use ledgerdesk_core::domain::{NormalizedError, Session, UserProfile};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::client::{ApiClient, RequestDescriptor, Verb};

/// Body of `POST <login_path>`
#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

/// Token pair returned by the login endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub access: String,
    #[serde(default)]
    pub refresh: Option<String>,
    #[serde(default)]
    pub user: Option<UserProfile>,
}

impl From<LoginResponse> for Session {
    fn from(response: LoginResponse) -> Self {
        Session {
            access_token: response.access,
            refresh_token: response.refresh,
            user: response.user,
        }
    }
}

/// Body of `POST <refresh_path>`
#[derive(Debug, Serialize)]
pub(crate) struct RefreshRequest {
    pub refresh: String,
}

/// New access token, with a rotated refresh token when the backend rotates
#[derive(Debug, Deserialize)]
pub(crate) struct RefreshResponse {
    pub access: String,
    #[serde(default)]
    pub refresh: Option<String>,
}

impl ApiClient {
    /// Exchanges credentials for a session and stores it
    ///
    /// The login call is unauthenticated: a 401 here means bad credentials
    /// and never triggers a token refresh.
    pub async fn login(&self, username: &str, password: &str) -> Result<Session, NormalizedError> {
        let body = serde_json::to_value(LoginRequest { username, password }).map_err(|e| {
            self.fail(&crate::RequestFailure::Other(format!(
                "Failed to serialize credentials: {}",
                e
            )))
        })?;
        let descriptor = RequestDescriptor::new(Verb::Post, self.login_path())
            .with_payload(Some(body))
            .unauthenticated();

        let result = self.execute(descriptor).await;
        let response: LoginResponse = self.settle(result)?;
        let session = Session::from(response);
        self.token_store().set_session(&session);

        info!(
            user = %session.user.as_ref().map(UserProfile::display_name).unwrap_or_default(),
            "Signed in"
        );
        Ok(session)
    }

    /// Starts an offline demo session
    ///
    /// Stores tokens carrying the demo prefix (so a 401 never reaches the
    /// refresh endpoint) and turns the interceptor on.
    pub fn start_demo_session(&self, user: UserProfile) -> Session {
        let prefix = self.refresh_coordinator().demo_token_prefix().to_string();
        let session = Session::new(format!("{}-access-token", prefix))
            .with_refresh_token(format!("{}-refresh-token", prefix))
            .with_user(user);

        self.token_store().set_session(&session);
        self.interceptor().set_enabled(true);
        info!("Demo session started");
        session
    }

    /// Forgets the stored session
    pub fn logout(&self) {
        self.token_store().clear_all();
        info!("Signed out");
    }

    /// Whether an access token is stored
    pub fn is_authenticated(&self) -> bool {
        self.token_store().access_token().is_some()
    }

    /// Profile stored with the current session
    pub fn current_user(&self) -> Option<UserProfile> {
        self.token_store().user()
    }
}
