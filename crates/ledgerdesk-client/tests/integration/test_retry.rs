//! Opt-in retry wrapper

use std::time::Instant;

use ledgerdesk_client::{client::ApiClient, notify::RecordingNotifier, retry::RetryPolicy, Verb};
use ledgerdesk_core::domain::ErrorKind;
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::common::{self, TEST_BASE_DELAY};

#[tokio::test]
async fn test_persistent_503_exhausts_budget() {
    let h = common::setup("tok", "r", "/reports").await;
    Mock::given(method("GET"))
        .and(path("/api/reports/balance/"))
        .respond_with(ResponseTemplate::new(503).set_body_string("Service Unavailable"))
        .expect(4)
        .mount(&h.server)
        .await;

    let started = Instant::now();
    let err = h
        .client
        .request_with_retry::<Value>(Verb::Get, "/api/reports/balance/", None)
        .await
        .unwrap_err();

    // Waits of 1, 2 and 3 base units between the four attempts.
    assert!(started.elapsed() >= TEST_BASE_DELAY * 6);
    assert_eq!(err.code, ErrorKind::ServerError);
    assert_eq!(err.status, Some(503));
    assert_eq!(err.message, "Service Unavailable");
    assert_eq!(h.notifier.len(), 1);
    h.server.verify().await;
}

#[tokio::test]
async fn test_transient_failure_then_success() {
    let h = common::setup("tok", "r", "/reports").await;
    Mock::given(method("POST"))
        .and(path("/api/reports/run/"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(2)
        .expect(2)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/reports/run/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "done" })))
        .expect(1)
        .mount(&h.server)
        .await;

    let result: Value = h
        .client
        .request_with_retry(Verb::Post, "/api/reports/run/", Some(json!({ "year": 2024 })))
        .await
        .unwrap();

    assert_eq!(result["status"], "done");
    assert!(h.notifier.is_empty());
    h.server.verify().await;
}

#[tokio::test]
async fn test_not_found_is_not_retried() {
    let h = common::setup("tok", "r", "/reports").await;
    Mock::given(method("GET"))
        .and(path("/api/invoices/999/"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "detail": "Not found." })))
        .expect(1)
        .mount(&h.server)
        .await;

    let err = h
        .client
        .request_with_retry::<Value>(Verb::Get, "/api/invoices/999/", None)
        .await
        .unwrap_err();

    assert_eq!(err.code, ErrorKind::NotFound);
    assert_eq!(err.message, "Not found.");
    assert_eq!(h.notifier.count_category("not_found"), 1);
    h.server.verify().await;
}

#[tokio::test]
async fn test_explicit_zero_budget_sends_once() {
    let h = common::setup("tok", "r", "/reports").await;
    Mock::given(method("GET"))
        .and(path("/api/health/"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&h.server)
        .await;

    let err = h
        .client
        .request_with_retry_budget::<Value>(Verb::Get, "/api/health/", None, 0)
        .await
        .unwrap_err();

    assert_eq!(err.code, ErrorKind::ServerError);
    assert_eq!(err.message, "Request failed with status 500");
    h.server.verify().await;
}

#[tokio::test]
async fn test_plain_request_never_retries() {
    let h = common::setup("tok", "r", "/reports").await;
    Mock::given(method("GET"))
        .and(path("/api/health/"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&h.server)
        .await;

    let err = h.client.get::<Value>("/api/health/").await.unwrap_err();

    assert_eq!(err.code, ErrorKind::ServerError);
    h.server.verify().await;
}

#[tokio::test]
async fn test_network_error_is_retried_then_classified() {
    let notifier = std::sync::Arc::new(RecordingNotifier::new());
    let client = ApiClient::builder()
        .base_url("http://127.0.0.1:1")
        .notifier(notifier.clone())
        .retry_policy(RetryPolicy::new(2, TEST_BASE_DELAY))
        .build()
        .unwrap();

    let started = Instant::now();
    let err = client
        .request_with_retry::<Value>(Verb::Get, "/api/accounts/", None)
        .await
        .unwrap_err();

    assert!(started.elapsed() >= TEST_BASE_DELAY * 3);
    assert_eq!(err.code, ErrorKind::NetworkError);
    assert!(err.status.is_none());
    assert_eq!(notifier.len(), 1);
    assert_eq!(notifier.count_category("network"), 1);
}
