//! Refresh-and-replay behavior on 401 responses

use std::time::Duration;

use futures_util::future::join_all;
use ledgerdesk_core::{
    domain::ErrorKind,
    ports::{Navigator, TokenStore},
};
use serde_json::{json, Value};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::common::{self, REFRESH_PATH};

/// Mounts `request_path` answering 401 to `stale` and `body` to `fresh`
async fn mount_protected(
    server: &wiremock::MockServer,
    request_path: &str,
    stale: &str,
    fresh: &str,
    body: Value,
) {
    Mock::given(method("GET"))
        .and(path(request_path))
        .and(header("authorization", format!("Bearer {}", stale).as_str()))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "detail": "Given token not valid for any token type"
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(request_path))
        .and(header("authorization", format!("Bearer {}", fresh).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_concurrent_401s_share_one_refresh() {
    let h = common::setup("tok1", "r1", "/dashboard").await;
    mount_protected(&h.server, "/accounts", "tok1", "tok2", json!({ "id": "acc" })).await;
    mount_protected(&h.server, "/invoices", "tok1", "tok2", json!({ "id": "inv" })).await;
    common::mount_refresh_success(&h.server, "r1", "tok2", Duration::from_millis(50)).await;

    let (accounts, invoices) = tokio::join!(
        h.client.get::<Value>("/accounts"),
        h.client.get::<Value>("/invoices"),
    );

    assert_eq!(accounts.unwrap(), json!({ "id": "acc" }));
    assert_eq!(invoices.unwrap(), json!({ "id": "inv" }));
    assert_eq!(h.tokens.access_token().as_deref(), Some("tok2"));
    assert_eq!(h.tokens.refresh_token().as_deref(), Some("r1"));
    assert_eq!(common::hits(&h.server, REFRESH_PATH).await, 1);
    assert!(h.notifier.is_empty());
    assert!(!h.client.refresh_coordinator().is_refreshing());
    h.server.verify().await;
}

#[tokio::test]
async fn test_waiter_takes_over_when_leader_is_cancelled() {
    let h = common::setup("tok1", "r1", "/dashboard").await;
    mount_protected(&h.server, "/a", "tok1", "tok2", json!({ "id": "a" })).await;
    mount_protected(&h.server, "/b", "tok1", "tok2", json!({ "id": "b" })).await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "access": "tok2" }))
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&h.server)
        .await;

    let (leader, waiter) = tokio::join!(
        tokio::time::timeout(Duration::from_millis(100), h.client.get::<Value>("/a")),
        async {
            tokio::time::sleep(Duration::from_millis(30)).await;
            h.client.get::<Value>("/b").await
        },
    );

    assert!(leader.is_err());
    assert_eq!(waiter.unwrap(), json!({ "id": "b" }));
    assert_eq!(h.tokens.access_token().as_deref(), Some("tok2"));
    assert_eq!(h.tokens.refresh_token().as_deref(), Some("r1"));
    assert_eq!(h.notifier.count_category("auth"), 0);
    assert!(h.navigator.history().is_empty());
    assert!(!h.client.refresh_coordinator().is_refreshing());
}

#[tokio::test]
async fn test_many_waiters_are_all_replayed() {
    let h = common::setup("tok1", "r1", "/dashboard").await;
    mount_protected(&h.server, "/api/entries/", "tok1", "tok2", json!([])).await;
    common::mount_refresh_success(&h.server, "r1", "tok2", Duration::from_millis(100)).await;

    let results = join_all((0..8).map(|_| h.client.get::<Value>("/api/entries/"))).await;

    assert!(results.iter().all(Result::is_ok));
    assert_eq!(common::hits(&h.server, REFRESH_PATH).await, 1);
    assert_eq!(h.client.refresh_coordinator().pending_waiters(), 0);
    h.server.verify().await;
}

#[tokio::test]
async fn test_rotated_refresh_token_is_stored() {
    let h = common::setup("tok1", "r1", "/dashboard").await;
    mount_protected(&h.server, "/api/me/", "tok1", "tok2", json!({ "username": "ana" })).await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "access": "tok2", "refresh": "r2" })),
        )
        .expect(1)
        .mount(&h.server)
        .await;

    let me: Value = h.client.get("/api/me/").await.unwrap();

    assert_eq!(me["username"], "ana");
    assert_eq!(h.tokens.refresh_token().as_deref(), Some("r2"));
}

#[tokio::test]
async fn test_second_401_is_final() {
    let h = common::setup("tok1", "r1", "/dashboard").await;
    Mock::given(method("GET"))
        .and(path("/api/ledger/"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&h.server)
        .await;
    common::mount_refresh_success(&h.server, "r1", "tok2", Duration::ZERO).await;

    let err = h.client.get::<Value>("/api/ledger/").await.unwrap_err();

    assert_eq!(err.code, ErrorKind::AuthExpired);
    assert_eq!(err.status, Some(401));
    assert_eq!(common::hits(&h.server, REFRESH_PATH).await, 1);
    assert_eq!(h.notifier.count_category("auth"), 1);
    h.server.verify().await;
}

#[tokio::test]
async fn test_refresh_failure_clears_session_and_redirects() {
    let h = common::setup("tok1", "r1", "/treasury").await;
    Mock::given(method("GET"))
        .and(path("/api/bank-accounts/"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&h.server)
        .await;
    common::mount_refresh_rejected(&h.server, Duration::ZERO).await;

    let err = h.client.get::<Value>("/api/bank-accounts/").await.unwrap_err();

    assert_eq!(err.code, ErrorKind::AuthExpired);
    assert!(h.tokens.access_token().is_none());
    assert!(h.tokens.refresh_token().is_none());
    assert!(!h.tokens.has_session());
    assert_eq!(h.navigator.history(), vec!["/login".to_string()]);
    // The coordinator's notice is the only one.
    assert_eq!(h.notifier.len(), 1);
    assert_eq!(h.notifier.count_category("auth"), 1);
    h.server.verify().await;
}

#[tokio::test]
async fn test_refresh_failure_rejects_every_waiter_with_one_notice() {
    let h = common::setup("tok1", "r1", "/dashboard").await;
    Mock::given(method("GET"))
        .and(path("/api/journals/"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&h.server)
        .await;
    common::mount_refresh_rejected(&h.server, Duration::from_millis(100)).await;

    let results = join_all((0..4).map(|_| h.client.get::<Value>("/api/journals/"))).await;

    for result in &results {
        let err = result.as_ref().unwrap_err();
        assert_eq!(err.code, ErrorKind::AuthExpired);
    }
    assert_eq!(common::hits(&h.server, REFRESH_PATH).await, 1);
    assert_eq!(h.notifier.len(), 1);
    assert_eq!(h.navigator.history().len(), 1);
    h.server.verify().await;
}

#[tokio::test]
async fn test_no_redirect_when_already_on_login() {
    let h = common::setup("tok1", "r1", "/login").await;
    Mock::given(method("GET"))
        .and(path("/api/profile/"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&h.server)
        .await;
    common::mount_refresh_rejected(&h.server, Duration::ZERO).await;

    let err = h.client.get::<Value>("/api/profile/").await.unwrap_err();

    assert_eq!(err.code, ErrorKind::AuthExpired);
    assert!(h.navigator.history().is_empty());
    assert!(h.tokens.access_token().is_none());
    // The coordinator stayed silent, so the classifier reports the failure.
    assert_eq!(h.notifier.count_category("auth"), 1);
}

#[tokio::test]
async fn test_missing_refresh_token_expires_session() {
    let h = common::setup("tok1", "r1", "/dashboard").await;
    h.tokens.clear_all();
    h.tokens.set_access_token("tok1");
    Mock::given(method("GET"))
        .and(path("/api/payments/"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&h.server)
        .await;

    let err = h.client.get::<Value>("/api/payments/").await.unwrap_err();

    assert_eq!(err.code, ErrorKind::AuthExpired);
    assert_eq!(common::hits(&h.server, REFRESH_PATH).await, 0);
    assert_eq!(h.navigator.current_location(), "/login");
    h.server.verify().await;
}
