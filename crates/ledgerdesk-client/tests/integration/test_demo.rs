//! Demo mode: local fixtures and the refresh guard

use std::time::Duration;

use ledgerdesk_client::mock::MockInterceptor;
use ledgerdesk_core::{domain::ErrorKind, ports::TokenStore};
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::common::{self, REFRESH_PATH};

#[tokio::test]
async fn test_fixture_short_circuits_network() {
    let interceptor = MockInterceptor::new(true).with_fixture(
        "/api/accounts/",
        json!({ "count": 1, "next": null, "previous": null, "results": [{ "code": "512" }] }),
    );
    let h = common::setup_with("demo-access", "demo-refresh", "/dashboard", interceptor).await;

    let first: Value = h.client.get("/api/accounts/").await.unwrap();
    let second: Value = h
        .client
        .get_with_params("/api/accounts?page=2", &json!({ "search": "bank" }))
        .await
        .unwrap();
    let absolute: Value = h
        .client
        .get(&format!("{}/api/accounts", h.server.uri()))
        .await
        .unwrap();

    assert_eq!(first["results"][0]["code"], "512");
    assert_eq!(first, second);
    assert_eq!(first, absolute);
    assert!(h.server.received_requests().await.unwrap_or_default().is_empty());
    assert!(h.notifier.is_empty());
}

#[tokio::test]
async fn test_fixture_answers_every_verb() {
    let interceptor =
        MockInterceptor::new(true).with_fixture("/api/invoices/", json!({ "id": 12 }));
    let h = common::setup_with("demo-access", "demo-refresh", "/dashboard", interceptor).await;

    let created: Value = h
        .client
        .post("/api/invoices/", &json!({ "amount": "100.00" }))
        .await
        .unwrap();

    assert_eq!(created["id"], 12);
    assert!(h.server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn test_disabled_interceptor_goes_to_network() {
    let interceptor = MockInterceptor::new(false).with_fixture("/api/accounts/", json!([]));
    let h = common::setup_with("tok", "r", "/dashboard", interceptor).await;
    Mock::given(method("GET"))
        .and(path("/api/accounts/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(["live"])))
        .expect(1)
        .mount(&h.server)
        .await;

    let accounts: Vec<String> = h.client.get("/api/accounts/").await.unwrap();

    assert_eq!(accounts, vec!["live".to_string()]);
    h.server.verify().await;
}

#[tokio::test]
async fn test_unmatched_path_goes_to_network() {
    let interceptor = MockInterceptor::new(true).with_fixture("/api/accounts/", json!([]));
    let h = common::setup_with("demo-access", "demo-refresh", "/dashboard", interceptor).await;
    Mock::given(method("GET"))
        .and(path("/api/budgets/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "total": 0 })))
        .expect(1)
        .mount(&h.server)
        .await;

    let budgets: Value = h.client.get("/api/budgets/").await.unwrap();

    assert_eq!(budgets["total"], 0);
    h.server.verify().await;
}

#[tokio::test]
async fn test_demo_session_never_refreshes() {
    let h = common::setup("demo-access", "demo-refresh", "/dashboard").await;
    Mock::given(method("GET"))
        .and(path("/api/closing/"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access": "real" })))
        .expect(0)
        .mount(&h.server)
        .await;

    let err = h.client.get::<Value>("/api/closing/").await.unwrap_err();

    assert_eq!(err.code, ErrorKind::DemoMode);
    assert_eq!(h.tokens.access_token().as_deref(), Some("demo-access"));
    assert_eq!(h.tokens.refresh_token().as_deref(), Some("demo-refresh"));
    assert!(h.navigator.history().is_empty());
    assert_eq!(h.notifier.count_category("demo"), 1);
    h.server.verify().await;
}

#[tokio::test]
async fn test_start_demo_session_serves_fixtures() {
    let interceptor =
        MockInterceptor::disabled().with_fixture("/api/dashboard/", json!({ "cash": "1200.00" }));
    let h = common::setup_with("", "", "/login", interceptor).await;
    h.tokens.clear_all();

    h.client.start_demo_session(Default::default());
    let dashboard: Value = tokio::time::timeout(
        Duration::from_secs(1),
        h.client.get::<Value>("/api/dashboard/"),
    )
    .await
    .unwrap()
    .unwrap();

    assert!(h.interceptor.is_enabled());
    assert_eq!(dashboard["cash"], "1200.00");
    assert!(h
        .client
        .refresh_coordinator()
        .is_demo_token(&h.tokens.refresh_token().unwrap()));
}
