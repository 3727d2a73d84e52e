//! Verbs, authentication, classification, pagination and file transfer

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
};

use ledgerdesk_client::{
    client::ApiClient,
    pagination::Page,
    transfer::{UploadFile, UploadProgress},
    Verb,
};
use ledgerdesk_core::{domain::ErrorKind, ports::TokenStore};
use serde::Deserialize;
use serde_json::{json, Value};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use crate::common::{self, REFRESH_PATH};

#[derive(Debug, Deserialize, PartialEq)]
struct Account {
    id: u32,
    code: String,
}

#[tokio::test]
async fn test_get_sends_bearer_token() {
    let h = common::setup("access-1", "refresh-1", "/").await;
    Mock::given(method("GET"))
        .and(path("/api/accounts/7/"))
        .and(header("authorization", "Bearer access-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 7, "code": "401" })))
        .expect(1)
        .mount(&h.server)
        .await;

    let account: Account = h.client.get("/api/accounts/7/").await.unwrap();

    assert_eq!(account, Account { id: 7, code: "401".into() });
    h.server.verify().await;
}

#[tokio::test]
async fn test_get_with_params_builds_query() {
    let h = common::setup("a", "r", "/").await;
    Mock::given(method("GET"))
        .and(path("/api/entries/"))
        .and(query_param("journal", "VT"))
        .and(query_param("page", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&h.server)
        .await;

    let entries: Vec<Value> = h
        .client
        .get_with_params("/api/entries/", &json!({ "journal": "VT", "page": 3, "q": null }))
        .await
        .unwrap();

    assert!(entries.is_empty());
    h.server.verify().await;
}

#[tokio::test]
async fn test_body_verbs() {
    let h = common::setup("a", "r", "/").await;
    for (verb, status) in [("POST", 201), ("PUT", 200), ("PATCH", 200)] {
        Mock::given(method(verb))
            .and(path("/api/accounts/"))
            .and(body_json(json!({ "code": "512" })))
            .respond_with(ResponseTemplate::new(status).set_body_json(json!({ "verb": verb })))
            .expect(1)
            .mount(&h.server)
            .await;
    }

    let body = json!({ "code": "512" });
    let posted: Value = h.client.post("/api/accounts/", &body).await.unwrap();
    let put: Value = h.client.put("/api/accounts/", &body).await.unwrap();
    let patched: Value = h.client.patch("/api/accounts/", &body).await.unwrap();

    assert_eq!(posted["verb"], "POST");
    assert_eq!(put["verb"], "PUT");
    assert_eq!(patched["verb"], "PATCH");
    h.server.verify().await;
}

#[tokio::test]
async fn test_delete_with_empty_body() {
    let h = common::setup("a", "r", "/").await;
    Mock::given(method("DELETE"))
        .and(path("/api/accounts/3/"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&h.server)
        .await;

    h.client.delete::<()>("/api/accounts/3/").await.unwrap();

    h.server.verify().await;
}

#[tokio::test]
async fn test_generic_request_dispatch() {
    let h = common::setup("a", "r", "/").await;
    Mock::given(method("DELETE"))
        .and(path("/api/sessions/"))
        .and(query_param("all", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "deleted": 2 })))
        .expect(1)
        .mount(&h.server)
        .await;

    let result: Value = h
        .client
        .request(Verb::Delete, "/api/sessions/", Some(json!({ "all": true })))
        .await
        .unwrap();

    assert_eq!(result["deleted"], 2);
    h.server.verify().await;
}

#[tokio::test]
async fn test_validation_error_is_classified() {
    let h = common::setup("a", "r", "/").await;
    Mock::given(method("POST"))
        .and(path("/api/invoices/"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "message": "Invoice is invalid",
            "errors": { "due_date": ["Must follow the issue date."] }
        })))
        .mount(&h.server)
        .await;

    let err = h
        .client
        .post::<Value, _>("/api/invoices/", &json!({}))
        .await
        .unwrap_err();

    assert_eq!(err.code, ErrorKind::Validation);
    assert_eq!(err.status, Some(400));
    assert_eq!(err.message, "Invoice is invalid");
    assert_eq!(
        err.field("due_date"),
        Some(&["Must follow the issue date.".to_string()][..])
    );
    assert_eq!(h.notifier.len(), 1);
    assert_eq!(h.notifier.count_category("validation"), 1);
}

#[tokio::test]
async fn test_forbidden_and_server_errors_are_classified() {
    let h = common::setup("a", "r", "/").await;
    Mock::given(method("GET"))
        .and(path("/api/payroll/"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({ "detail": "Forbidden area" })))
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/crash/"))
        .respond_with(ResponseTemplate::new(502).set_body_string("<html>Bad gateway</html>"))
        .mount(&h.server)
        .await;

    let forbidden = h.client.get::<Value>("/api/payroll/").await.unwrap_err();
    let crashed = h.client.get::<Value>("/api/crash/").await.unwrap_err();

    assert_eq!(forbidden.code, ErrorKind::Forbidden);
    assert_eq!(forbidden.message, "Forbidden area");
    assert_eq!(crashed.code, ErrorKind::ServerError);
    assert_eq!(crashed.message, "Request failed with status 502");
    assert_eq!(h.notifier.len(), 2);
}

#[tokio::test]
async fn test_undecodable_success_body_is_unknown_error() {
    let h = common::setup("a", "r", "/").await;
    Mock::given(method("GET"))
        .and(path("/api/accounts/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&h.server)
        .await;

    let err = h.client.get::<Vec<Account>>("/api/accounts/").await.unwrap_err();

    assert_eq!(err.code, ErrorKind::UnknownError);
    assert!(err.status.is_none());
}

#[tokio::test]
async fn test_login_stores_session() {
    let h = common::setup("", "", "/login").await;
    h.tokens.clear_all();
    Mock::given(method("POST"))
        .and(path("/api/auth/token/"))
        .and(body_json(json!({ "username": "ana", "password": "s3cret" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access": "acc-1",
            "refresh": "ref-1",
            "user": { "id": 4, "username": "ana", "first_name": "Ana", "last_name": "Silva" }
        })))
        .expect(1)
        .mount(&h.server)
        .await;

    let session = h.client.login("ana", "s3cret").await.unwrap();

    assert_eq!(session.access_token, "acc-1");
    assert!(h.client.is_authenticated());
    assert_eq!(h.tokens.refresh_token().as_deref(), Some("ref-1"));
    assert_eq!(
        h.client.current_user().map(|u| u.display_name()).as_deref(),
        Some("Ana Silva")
    );
    h.server.verify().await;
}

#[tokio::test]
async fn test_bad_credentials_do_not_refresh() {
    let h = common::setup("", "stale-refresh", "/login").await;
    Mock::given(method("POST"))
        .and(path("/api/auth/token/"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "detail": "No active account found with the given credentials"
        })))
        .expect(1)
        .mount(&h.server)
        .await;

    let err = h.client.login("ana", "wrong").await.unwrap_err();

    assert_eq!(err.code, ErrorKind::UnknownError);
    assert_eq!(err.status, Some(401));
    assert_eq!(err.message, "No active account found with the given credentials");
    assert_eq!(common::hits(&h.server, REFRESH_PATH).await, 0);
    h.server.verify().await;
}

#[tokio::test]
async fn test_get_all_follows_next_links() {
    let h = common::setup("a", "r", "/").await;
    let uri = h.server.uri();
    Mock::given(method("GET"))
        .and(path("/api/accounts/"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 3,
            "next": null,
            "previous": format!("{}/api/accounts/", uri),
            "results": [{ "id": 3, "code": "530" }]
        })))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/accounts/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 3,
            "next": format!("{}/api/accounts/?page=2", uri),
            "previous": null,
            "results": [{ "id": 1, "code": "401" }, { "id": 2, "code": "411" }]
        })))
        .expect(1)
        .mount(&h.server)
        .await;

    let accounts: Vec<Account> = h.client.get_all("/api/accounts/", None).await.unwrap();

    assert_eq!(accounts.len(), 3);
    assert_eq!(accounts[2], Account { id: 3, code: "530".into() });
    h.server.verify().await;
}

#[tokio::test]
async fn test_get_paginated_single_page() {
    let h = common::setup("a", "r", "/").await;
    Mock::given(method("GET"))
        .and(path("/api/journals/"))
        .and(query_param("page_size", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 2,
            "next": "http://elsewhere/api/journals/?page=2",
            "previous": null,
            "results": [{ "id": 1, "code": "VT" }]
        })))
        .mount(&h.server)
        .await;

    let page: Page<Account> = h
        .client
        .get_paginated("/api/journals/", Some(json!({ "page_size": 1 })))
        .await
        .unwrap();

    assert_eq!(page.count, 2);
    assert!(page.has_next());
    assert_eq!(page.results.len(), 1);
}

#[tokio::test]
async fn test_upload_file_sends_multipart() {
    let h = common::setup("a", "r", "/").await;
    Mock::given(method("POST"))
        .and(path("/api/documents/"))
        .and(header("authorization", "Bearer a"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": 90 })))
        .expect(1)
        .mount(&h.server)
        .await;

    let progress = Arc::new(Mutex::new(Vec::<UploadProgress>::new()));
    let sink = progress.clone();
    let content = vec![b'x'; 200 * 1024];
    let created: Value = h
        .client
        .upload_file(
            "/api/documents/",
            UploadFile::new("statement.csv", content.clone()),
            BTreeMap::from([("journal".to_string(), "BQ".to_string())]),
            Some(Arc::new(move |p: UploadProgress| sink.lock().unwrap().push(p))),
        )
        .await
        .unwrap();

    assert_eq!(created["id"], 90);

    let requests = h.server.received_requests().await.unwrap();
    let request = &requests[0];
    let content_type = request.headers.get("content-type").unwrap().to_str().unwrap();
    assert!(content_type.starts_with("multipart/form-data"));
    let body = String::from_utf8_lossy(&request.body);
    assert!(body.contains("name=\"journal\""));
    assert!(body.contains("filename=\"statement.csv\""));
    assert!(body.contains("BQ"));

    let progress = progress.lock().unwrap();
    let last = progress.last().unwrap();
    assert_eq!(last.sent, content.len() as u64);
    assert_eq!(last.percent(), 100);
    assert!(progress.len() > 1);
    h.server.verify().await;
}

#[tokio::test]
async fn test_download_file_saves_to_directory() {
    let dir = tempfile::tempdir().unwrap();
    let server = wiremock::MockServer::start().await;
    let notifier = Arc::new(ledgerdesk_client::notify::RecordingNotifier::new());
    let client = ApiClient::builder()
        .base_url(server.uri())
        .notifier(notifier.clone())
        .download_dir(dir.path().join("exports"))
        .build()
        .unwrap();
    Mock::given(method("GET"))
        .and(path("/api/reports/ledger/"))
        .and(query_param("format", "pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.7 ledger".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let saved = client
        .download_file_with_params(
            "/api/reports/ledger/",
            Some(json!({ "format": "pdf" })),
            "../ledger.pdf",
        )
        .await
        .unwrap();

    assert_eq!(saved, dir.path().join("exports").join("ledger.pdf"));
    assert_eq!(std::fs::read(&saved).unwrap(), b"%PDF-1.7 ledger");
    assert_eq!(notifier.count_category("download"), 1);
    server.verify().await;
}

#[tokio::test]
async fn test_download_failure_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let h = common::setup("a", "r", "/").await;
    let client = ApiClient::builder()
        .base_url(h.server.uri())
        .download_dir(dir.path())
        .build()
        .unwrap();
    Mock::given(method("GET"))
        .and(path("/api/reports/missing/"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&h.server)
        .await;

    let err = client
        .download_file("/api/reports/missing/", "missing.pdf")
        .await
        .unwrap_err();

    assert_eq!(err.code, ErrorKind::NotFound);
    assert!(!dir.path().join("missing.pdf").exists());
}
