//! Ledgerdesk Client - resilient HTTP client for the Ledgerdesk backend
//!
//! Wraps every outbound request with:
//! - Bearer authentication read from a [`TokenStore`](ledgerdesk_core::ports::TokenStore)
//! - A single-flight token refresh with replay of queued requests
//! - An opt-in linear-backoff retry wrapper for transient failures
//! - A demo-mode interceptor serving canned payloads without network I/O
//! - Classification of every failure into a [`NormalizedError`](ledgerdesk_core::domain::NormalizedError)
//!
//! ## Modules
//!
//! - [`client`] - the request facade ([`ApiClient`](client::ApiClient))
//! - [`auth`] - login/logout and token endpoint wire types
//! - [`token_store`] - keyring and in-memory token stores
//! - [`mock`] - demo-mode interceptor
//! - [`classify`] - failure classification and user notifications
//! - [`refresh`] - single-flight refresh coordinator
//! - [`retry`] - retry decision and backoff schedule
//! - [`pagination`] - paginated list helpers
//! - [`transfer`] - multipart upload and file download
//! - [`notify`] / [`navigation`] - port adapters

pub mod auth;
pub mod classify;
pub mod client;
pub mod mock;
pub mod navigation;
pub mod notify;
pub mod pagination;
pub mod refresh;
pub mod retry;
pub mod token_store;
pub mod transfer;

use thiserror::Error;

pub use client::{ApiClient, ApiClientBuilder, Verb};

/// A raw request failure, before classification
///
/// This never leaves the client: public methods hand it to the
/// [`ErrorClassifier`](classify::ErrorClassifier) and return the resulting
/// `NormalizedError`.
#[derive(Debug, Error)]
pub enum RequestFailure {
    /// The server answered with a non-success status
    #[error("Server responded with status {status}")]
    Response {
        /// HTTP status code
        status: u16,
        /// Response body as text (may be empty)
        body: String,
    },

    /// The request was sent but no response arrived (connect error, timeout,
    /// connection reset mid-body)
    #[error("No response received: {0}")]
    NoResponse(#[source] reqwest::Error),

    /// The session could not be recovered by a token refresh
    #[error("Session expired: {message}")]
    AuthExpired {
        message: String,
        /// Whether the user was already told (by the refresh coordinator)
        notified: bool,
    },

    /// A demo session attempted something that needs a real backend
    #[error("Demo mode: {0}")]
    DemoMode(String),

    /// Anything else: request construction, decoding, local I/O
    #[error("{0}")]
    Other(String),
}

impl RequestFailure {
    /// Maps an error returned by `RequestBuilder::send`.
    ///
    /// Builder errors never reached the network; everything else means the
    /// request went out and no usable response came back.
    pub fn from_send_error(err: reqwest::Error) -> Self {
        if err.is_builder() {
            RequestFailure::Other(err.to_string())
        } else {
            RequestFailure::NoResponse(err)
        }
    }

    /// HTTP status carried by the failure, if the server responded
    pub fn status(&self) -> Option<u16> {
        match self {
            RequestFailure::Response { status, .. } => Some(*status),
            _ => None,
        }
    }
}
