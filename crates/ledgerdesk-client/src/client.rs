//! Request facade for the Ledgerdesk backend
//!
//! [`ApiClient`] is the surface the rest of the application depends on:
//! typed verbs, the opt-in retry wrapper, and (in sibling modules) login,
//! pagination, upload and download. Every call runs the same pipeline:
//!
//! 1. The demo-mode [`MockInterceptor`] may answer locally.
//! 2. The request is sent with the access token read at send time.
//! 3. A 401 goes through the [`RefreshCoordinator`] and is replayed once.
//! 4. Any remaining failure is classified exactly once into a
//!    [`NormalizedError`], the only error type callers ever see.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use ledgerdesk_client::{client::ApiClient, token_store::MemoryTokenStore};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = ApiClient::builder()
//!     .base_url("https://erp.example.com")
//!     .token_store(Arc::new(MemoryTokenStore::with_tokens("access", "refresh")))
//!     .build()?;
//! let accounts: serde_json::Value = client.get("/api/accounts/").await?;
//! # Ok(())
//! # }
//! ```

use std::{path::PathBuf, str::FromStr, sync::Arc, time::Duration};

use anyhow::Context;
use bytes::Bytes;
use ledgerdesk_core::{
    config::Config,
    domain::NormalizedError,
    ports::{Navigator, Notifier, TokenStore},
};
use reqwest::{Client, Method};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::{
    classify::ErrorClassifier,
    mock::MockInterceptor,
    navigation::RouteNavigator,
    notify::TracingNotifier,
    refresh::{RefreshCoordinator, RefreshError, RefreshSettings},
    retry::RetryPolicy,
    token_store::MemoryTokenStore,
    transfer::{self, MultipartUpload},
    RequestFailure,
};

// ============================================================================
// Verb
// ============================================================================

/// HTTP verbs the facade exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Verb {
    /// The matching `reqwest` method
    pub fn method(self) -> Method {
        match self {
            Verb::Get => Method::GET,
            Verb::Post => Method::POST,
            Verb::Put => Method::PUT,
            Verb::Patch => Method::PATCH,
            Verb::Delete => Method::DELETE,
        }
    }

    /// Whether the payload travels as a JSON body (otherwise as query params)
    pub fn sends_body(self) -> bool {
        matches!(self, Verb::Post | Verb::Put | Verb::Patch)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::Post => "POST",
            Verb::Put => "PUT",
            Verb::Patch => "PATCH",
            Verb::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for Verb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verb {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Verb::Get),
            "POST" => Ok(Verb::Post),
            "PUT" => Ok(Verb::Put),
            "PATCH" => Ok(Verb::Patch),
            "DELETE" => Ok(Verb::Delete),
            other => Err(format!("unsupported HTTP verb '{}'", other)),
        }
    }
}

// ============================================================================
// Request descriptor
// ============================================================================

#[derive(Debug, Clone)]
pub(crate) enum RequestBody {
    Empty,
    Json(Value),
    Multipart(Arc<MultipartUpload>),
}

/// One outbound request, replayable after a token refresh
#[derive(Debug, Clone)]
pub(crate) struct RequestDescriptor {
    pub verb: Verb,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub body: RequestBody,
    /// Sends the bearer token and takes part in refresh-and-replay
    pub authenticated: bool,
    /// Already replayed after a refresh; a second 401 is final
    pub retried: bool,
}

impl RequestDescriptor {
    pub fn new(verb: Verb, url: &str) -> Self {
        Self {
            verb,
            url: url.to_string(),
            query: Vec::new(),
            body: RequestBody::Empty,
            authenticated: true,
            retried: false,
        }
    }

    /// Routes `payload` to the body or the query string depending on the verb
    pub fn with_payload(mut self, payload: Option<Value>) -> Self {
        match payload {
            None | Some(Value::Null) => {}
            Some(value) if self.verb.sends_body() => self.body = RequestBody::Json(value),
            Some(value) => self.query = query_pairs(&value),
        }
        self
    }

    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }

    pub fn unauthenticated(mut self) -> Self {
        self.authenticated = false;
        self
    }
}

/// Flattens a JSON object into query pairs
///
/// Nulls are skipped, arrays repeat the key, nested objects are sent as JSON.
pub(crate) fn query_pairs(params: &Value) -> Vec<(String, String)> {
    let Some(object) = params.as_object() else {
        if !params.is_null() {
            warn!("Ignoring query parameters that are not an object");
        }
        return Vec::new();
    };

    let mut pairs = Vec::new();
    for (key, value) in object {
        match value {
            Value::Null => {}
            Value::Array(items) => {
                for item in items.iter().filter(|item| !item.is_null()) {
                    pairs.push((key.clone(), scalar_to_string(item)));
                }
            }
            other => pairs.push((key.clone(), scalar_to_string(other))),
        }
    }
    pairs
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// A settled response (real or synthesized by the interceptor)
#[derive(Debug, Clone)]
pub(crate) struct RawResponse {
    pub status: u16,
    pub body: Bytes,
}

impl RawResponse {
    /// The 200 response standing in for a network call in demo mode
    pub fn synthesized(payload: &Value) -> Self {
        Self {
            status: 200,
            body: Bytes::from(serde_json::to_vec(payload).unwrap_or_default()),
        }
    }

    /// Decodes the body; an empty body decodes as JSON `null`
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, RequestFailure> {
        let decoded = if self.body.is_empty() {
            serde_json::from_value(Value::Null)
        } else {
            serde_json::from_slice(&self.body)
        };
        decoded.map_err(|e| RequestFailure::Other(format!("Failed to parse response: {}", e)))
    }
}

// ============================================================================
// ApiClient
// ============================================================================

/// Resilient HTTP client for the Ledgerdesk backend
///
/// Construct one per process (or per test) and share it by reference or
/// `Arc`. All methods take `&self` and may run concurrently.
pub struct ApiClient {
    http: Client,
    base_url: String,
    login_path: String,
    tokens: Arc<dyn TokenStore>,
    interceptor: Arc<MockInterceptor>,
    classifier: ErrorClassifier,
    refresh: RefreshCoordinator,
    retry: RetryPolicy,
    notifier: Arc<dyn Notifier>,
    download_dir: PathBuf,
}

impl ApiClient {
    /// Creates a builder with default settings
    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::default()
    }

    /// Creates a client for `base_url` with in-memory tokens and default ports
    pub fn with_base_url(base_url: impl Into<String>) -> anyhow::Result<Self> {
        Self::builder().base_url(base_url).build()
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn token_store(&self) -> &Arc<dyn TokenStore> {
        &self.tokens
    }

    pub fn interceptor(&self) -> &Arc<MockInterceptor> {
        &self.interceptor
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn refresh_coordinator(&self) -> &RefreshCoordinator {
        &self.refresh
    }

    pub fn download_dir(&self) -> &std::path::Path {
        &self.download_dir
    }

    pub(crate) fn login_path(&self) -> &str {
        &self.login_path
    }

    pub(crate) fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }

    /// Absolute URL for `url`; absolute inputs (e.g. `next` links) pass through
    pub fn url_for(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            return url.to_string();
        }
        let base = self.base_url.trim_end_matches('/');
        if url.starts_with('/') {
            format!("{}{}", base, url)
        } else {
            format!("{}/{}", base, url)
        }
    }

    // ------------------------------------------------------------------
    // Verbs
    // ------------------------------------------------------------------

    /// `GET url`
    pub async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T, NormalizedError> {
        self.request(Verb::Get, url, None).await
    }

    /// `GET url?params`
    pub async fn get_with_params<T, P>(&self, url: &str, params: &P) -> Result<T, NormalizedError>
    where
        T: DeserializeOwned,
        P: Serialize + ?Sized,
    {
        let params = self.to_payload(params)?;
        self.request(Verb::Get, url, Some(params)).await
    }

    /// `POST url` with a JSON body (`()` sends no body)
    pub async fn post<T, B>(&self, url: &str, body: &B) -> Result<T, NormalizedError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let body = self.to_payload(body)?;
        self.request(Verb::Post, url, Some(body)).await
    }

    /// `PUT url` with a JSON body
    pub async fn put<T, B>(&self, url: &str, body: &B) -> Result<T, NormalizedError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let body = self.to_payload(body)?;
        self.request(Verb::Put, url, Some(body)).await
    }

    /// `PATCH url` with a JSON body
    pub async fn patch<T, B>(&self, url: &str, body: &B) -> Result<T, NormalizedError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let body = self.to_payload(body)?;
        self.request(Verb::Patch, url, Some(body)).await
    }

    /// `DELETE url`
    pub async fn delete<T: DeserializeOwned>(&self, url: &str) -> Result<T, NormalizedError> {
        self.request(Verb::Delete, url, None).await
    }

    /// Issues `verb` against `url` once
    ///
    /// For `GET`/`DELETE` the payload becomes query parameters, otherwise the
    /// JSON body.
    pub async fn request<T: DeserializeOwned>(
        &self,
        verb: Verb,
        url: &str,
        payload: Option<Value>,
    ) -> Result<T, NormalizedError> {
        let descriptor = RequestDescriptor::new(verb, url).with_payload(payload);
        let result = self.execute(descriptor).await;
        self.settle(result)
    }

    // ------------------------------------------------------------------
    // Retry wrapper
    // ------------------------------------------------------------------

    /// Like [`request`](Self::request), re-issuing transient failures with
    /// the policy's full budget
    pub async fn request_with_retry<T: DeserializeOwned>(
        &self,
        verb: Verb,
        url: &str,
        payload: Option<Value>,
    ) -> Result<T, NormalizedError> {
        self.request_with_retry_budget(verb, url, payload, self.retry.max_attempts())
            .await
    }

    /// Re-issues transient failures up to `attempts_left` more times
    ///
    /// Before each re-issue it waits [`RetryPolicy::delay_for`] the attempts
    /// still left. A non-retryable failure, or a retryable one with no
    /// attempts left, is classified and returned.
    pub async fn request_with_retry_budget<T: DeserializeOwned>(
        &self,
        verb: Verb,
        url: &str,
        payload: Option<Value>,
        attempts_left: u32,
    ) -> Result<T, NormalizedError> {
        let descriptor = RequestDescriptor::new(verb, url).with_payload(payload);
        let mut attempts_left = attempts_left;

        loop {
            match self.execute(descriptor.clone()).await {
                Ok(response) => return self.settle(Ok(response)),
                Err(failure) if attempts_left > 0 && RetryPolicy::is_retryable(&failure) => {
                    let delay = self.retry.delay_for(attempts_left);
                    warn!(
                        %verb,
                        url,
                        attempts_left,
                        delay_ms = delay.as_millis() as u64,
                        error = %failure,
                        "Transient failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempts_left -= 1;
                }
                Err(failure) => return self.settle(Err(failure)),
            }
        }
    }

    // ------------------------------------------------------------------
    // Pipeline
    // ------------------------------------------------------------------

    fn to_payload<P: Serialize + ?Sized>(&self, payload: &P) -> Result<Value, NormalizedError> {
        serde_json::to_value(payload).map_err(|e| {
            self.fail(&RequestFailure::Other(format!(
                "Failed to serialize request payload: {}",
                e
            )))
        })
    }

    /// Classifies a failure (and notifies the user once)
    pub(crate) fn fail(&self, failure: &RequestFailure) -> NormalizedError {
        self.classifier.classify(failure)
    }

    /// Decodes a settled response or classifies the failure
    pub(crate) fn settle<T: DeserializeOwned>(
        &self,
        result: Result<RawResponse, RequestFailure>,
    ) -> Result<T, NormalizedError> {
        result
            .and_then(|response| response.json())
            .map_err(|failure| self.fail(&failure))
    }

    /// Runs a descriptor through interception, transport and refresh
    pub(crate) async fn execute(
        &self,
        mut descriptor: RequestDescriptor,
    ) -> Result<RawResponse, RequestFailure> {
        if let Some(payload) = self.interceptor.resolve(&descriptor.url) {
            debug!(verb = %descriptor.verb, url = %descriptor.url, "Served from demo fixture");
            return Ok(RawResponse::synthesized(&payload));
        }

        loop {
            let response = self.send(&descriptor).await?;

            if response.status == 401 && descriptor.authenticated {
                if descriptor.retried {
                    warn!(url = %descriptor.url, "Still unauthorized after token refresh");
                    return Err(RequestFailure::AuthExpired {
                        message: "Your session is no longer valid. Please sign in again."
                            .to_string(),
                        notified: false,
                    });
                }

                descriptor.retried = true;
                debug!(url = %descriptor.url, "Unauthorized, refreshing access token");
                match self.refresh.refresh().await {
                    Ok(_) => {
                        debug!(url = %descriptor.url, "Replaying request with refreshed token");
                        continue;
                    }
                    Err(RefreshError::DemoSession) => {
                        return Err(RequestFailure::DemoMode(
                            RefreshError::DemoSession.to_string(),
                        ));
                    }
                    Err(RefreshError::Failed { message, notified }) => {
                        return Err(RequestFailure::AuthExpired { message, notified });
                    }
                }
            }

            if !(200..300).contains(&response.status) {
                return Err(RequestFailure::Response {
                    status: response.status,
                    body: String::from_utf8_lossy(&response.body).into_owned(),
                });
            }

            return Ok(response);
        }
    }

    /// Sends one attempt; the access token is read here, at send time
    async fn send(&self, descriptor: &RequestDescriptor) -> Result<RawResponse, RequestFailure> {
        let url = self.url_for(&descriptor.url);
        debug!(verb = %descriptor.verb, url = %url, retried = descriptor.retried, "Sending request");

        let mut request = self.http.request(descriptor.verb.method(), &url);
        if !descriptor.query.is_empty() {
            request = request.query(&descriptor.query);
        }
        if descriptor.authenticated {
            if let Some(token) = self.tokens.access_token() {
                request = request.bearer_auth(token);
            }
        }
        request = match &descriptor.body {
            RequestBody::Empty => request,
            RequestBody::Json(value) => request.json(value),
            RequestBody::Multipart(upload) => request.multipart(transfer::build_form(upload)?),
        };

        let response = request
            .send()
            .await
            .map_err(RequestFailure::from_send_error)?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(RequestFailure::NoResponse)?;

        debug!(url = %url, status, bytes = body.len(), "Response received");
        Ok(RawResponse { status, body })
    }
}

// ============================================================================
// ApiClientBuilder
// ============================================================================

/// Builder for [`ApiClient`]
///
/// Defaults come from [`Config::default`]; ports default to an in-memory
/// token store, a tracing notifier, a navigator starting at `/`, and a
/// disabled interceptor.
pub struct ApiClientBuilder {
    base_url: String,
    timeout: Duration,
    login_path: String,
    refresh_path: String,
    login_route: String,
    demo_token_prefix: String,
    retry: RetryPolicy,
    download_dir: PathBuf,
    tokens: Option<Arc<dyn TokenStore>>,
    notifier: Option<Arc<dyn Notifier>>,
    navigator: Option<Arc<dyn Navigator>>,
    interceptor: Option<Arc<MockInterceptor>>,
}

impl Default for ApiClientBuilder {
    fn default() -> Self {
        Self::with_settings(&Config::default())
    }
}

impl ApiClientBuilder {
    fn with_settings(config: &Config) -> Self {
        Self {
            base_url: config.api.base_url.clone(),
            timeout: Duration::from_secs(config.api.timeout_secs),
            login_path: config.auth.login_path.clone(),
            refresh_path: config.auth.refresh_path.clone(),
            login_route: config.auth.login_route.clone(),
            demo_token_prefix: config.auth.demo_token_prefix.clone(),
            retry: RetryPolicy::from_config(&config.retry),
            download_dir: config.downloads.directory.clone(),
            tokens: None,
            notifier: None,
            navigator: None,
            interceptor: None,
        }
    }

    /// Builder preloaded from a [`Config`], including demo fixtures
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let interceptor = MockInterceptor::new(config.demo.enabled);
        if let Some(fixtures) = &config.demo.fixtures {
            interceptor
                .load_fixtures(fixtures)
                .context("Failed to load demo fixtures")?;
        }

        let mut builder = Self::with_settings(config);
        builder.interceptor = Some(Arc::new(interceptor));
        Ok(builder)
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = path.into();
        self
    }

    pub fn refresh_path(mut self, path: impl Into<String>) -> Self {
        self.refresh_path = path.into();
        self
    }

    pub fn login_route(mut self, route: impl Into<String>) -> Self {
        self.login_route = route.into();
        self
    }

    pub fn demo_token_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.demo_token_prefix = prefix.into();
        self
    }

    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn download_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.download_dir = dir.into();
        self
    }

    pub fn token_store(mut self, tokens: Arc<dyn TokenStore>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    pub fn interceptor(mut self, interceptor: Arc<MockInterceptor>) -> Self {
        self.interceptor = Some(interceptor);
        self
    }

    /// Builds the client
    ///
    /// Fails only if the underlying HTTP client cannot be created.
    pub fn build(self) -> anyhow::Result<ApiClient> {
        let http = Client::builder()
            .timeout(self.timeout)
            .build()
            .context("Failed to build HTTP client")?;

        let tokens = self
            .tokens
            .unwrap_or_else(|| Arc::new(MemoryTokenStore::new()));
        let notifier = self.notifier.unwrap_or_else(|| Arc::new(TracingNotifier));
        let navigator = self
            .navigator
            .unwrap_or_else(|| Arc::new(RouteNavigator::default()));
        let interceptor = self
            .interceptor
            .unwrap_or_else(|| Arc::new(MockInterceptor::disabled()));

        let base_url = self.base_url.trim_end_matches('/').to_string();
        let refresh = RefreshCoordinator::new(
            http.clone(),
            RefreshSettings {
                refresh_url: format!("{}{}", base_url, self.refresh_path),
                demo_token_prefix: self.demo_token_prefix,
                login_route: self.login_route,
            },
            tokens.clone(),
            notifier.clone(),
            navigator,
        );

        info!(base_url = %base_url, demo = interceptor.is_enabled(), "API client ready");

        Ok(ApiClient {
            http,
            base_url,
            login_path: self.login_path,
            tokens,
            interceptor,
            classifier: ErrorClassifier::new(notifier.clone()),
            refresh,
            retry: self.retry,
            notifier,
            download_dir: self.download_dir,
        })
    }
}
