// Integration tests for the admin-delegated drive routes

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use drivegate::api::{create_router, AppState};
use drivegate::config::DriveGateConfig;
use drivegate::credentials::{ConnectionGrant, CredentialStore};
use mockito::{Matcher, Server, ServerGuard};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

const ADMIN_TOKEN: &str = "test-admin-token";
const REFRESH_TOKEN: &str = "1//0g-stored-refresh-token";
const MAX_UPLOAD_BYTES: usize = 1024;

fn test_store() -> Arc<CredentialStore> {
    let key = BASE64.encode([7u8; 32]);
    Arc::new(CredentialStore::new(":memory:", Some(&key)).unwrap())
}

fn test_config(server: &ServerGuard) -> DriveGateConfig {
    let mut config = DriveGateConfig::default();
    config.provider.token_url = format!("{}/token", server.url());
    config.provider.api_base = format!("{}/drive/v3", server.url());
    config.provider.upload_base = format!("{}/upload/drive/v3", server.url());
    config.provider.client_id = "client-id".to_string();
    config.provider.client_secret = "client-secret".to_string();
    config.server.max_upload_bytes = MAX_UPLOAD_BYTES;
    config
}

fn create_test_app(server: &ServerGuard, store: Arc<CredentialStore>, admin_token: Option<&str>) -> Router {
    let state = AppState::from_config(
        &test_config(server),
        admin_token.map(|t| t.to_string()),
        store,
        reqwest::Client::new(),
    );
    create_router(state)
}

fn connect(store: &CredentialStore, user_id: &str) {
    store
        .upsert_connection(
            user_id,
            &ConnectionGrant {
                refresh_token: Some(REFRESH_TOKEN.to_string()),
                access_token: None,
                scope: Some("https://www.googleapis.com/auth/drive".to_string()),
            },
        )
        .unwrap();
}

async fn mock_refresh(server: &mut ServerGuard) -> mockito::Mock {
    server
        .mock("POST", "/token")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()),
            Matcher::UrlEncoded("refresh_token".into(), REFRESH_TOKEN.into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"access_token":"ya29.test-access","expires_in":3599,"token_type":"Bearer"}"#)
        .create_async()
        .await
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .header("x-admin-token", ADMIN_TOKEN)
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header("x-admin-token", ADMIN_TOKEN)
        .body(Body::empty())
        .unwrap()
}

fn multipart_request(boundary: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/admin/drive/upload")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", boundary),
        )
        .header("x-admin-token", ADMIN_TOKEN)
        .body(Body::from(body))
        .unwrap()
}

fn multipart_body(boundary: &str, fields: &[(&str, &str)], file: Option<(&str, &str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                boundary, name, value
            )
            .as_bytes(),
        );
    }
    if let Some((file_name, content_type, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                boundary, file_name, content_type
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());
    body
}

async fn json_body(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

/// Every admin route rejects a missing token before any credential read or upstream call.
#[tokio::test]
async fn test_missing_admin_token_rejected_without_upstream_calls() {
    let mut server = Server::new_async().await;
    let token = server.mock("POST", "/token").expect(0).create_async().await;
    let store = test_store();
    connect(&store, "u1");
    let app = create_test_app(&server, store, Some(ADMIN_TOKEN));

    let requests = [
        ("POST", "/api/admin/drive/folders", r#"{"userId":"u1","folderName":"x"}"#),
        ("POST", "/api/admin/drive/delete", r#"{"userId":"u1","fileId":"f1"}"#),
        ("POST", "/api/admin/drive/download", r#"{"userId":"u1","fileId":"f1"}"#),
        ("POST", "/api/admin/drive/upload", ""),
        ("GET", "/api/admin/drive/storage-quota?userId=u1", ""),
        ("POST", "/api/admin/drive/list", r#"{"userId":"u1"}"#),
        ("GET", "/api/admin/drive/diagnostics?userId=u1", ""),
    ];

    for (method, uri, body) in requests {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{} {}", method, uri);

        let json = json_body(response).await;
        assert_eq!(json["code"], "unauthorized");
    }

    token.assert_async().await;
}

/// A wrong token is rejected the same way as a missing one.
#[tokio::test]
async fn test_wrong_admin_token_rejected() {
    let mut server = Server::new_async().await;
    let token = server.mock("POST", "/token").expect(0).create_async().await;
    let store = test_store();
    connect(&store, "u1");
    let app = create_test_app(&server, store, Some(ADMIN_TOKEN));

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/api/admin/drive/storage-quota?userId=u1")
                .header("x-admin-token", "test-admin-tokem")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    token.assert_async().await;
}

/// With no admin secret configured every request is rejected, whatever header is sent.
#[tokio::test]
async fn test_unconfigured_gate_rejects_everything() {
    let mut server = Server::new_async().await;
    let token = server.mock("POST", "/token").expect(0).create_async().await;
    let store = test_store();
    connect(&store, "u1");
    let app = create_test_app(&server, store, None);

    for header in ["", "admin", ADMIN_TOKEN] {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/api/admin/drive/storage-quota?userId=u1")
                    .header("x-admin-token", header)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    token.assert_async().await;
}

#[tokio::test]
async fn test_missing_user_id_is_bad_request() {
    let server = Server::new_async().await;
    let app = create_test_app(&server, test_store(), Some(ADMIN_TOKEN));

    let response = app
        .clone()
        .oneshot(json_request("POST", "/api/admin/drive/delete", json!({ "fileId": "f1" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert_eq!(json["code"], "bad_request");
    assert!(json["error"].as_str().unwrap().contains("userId"));

    let response = app
        .oneshot(get_request("/api/admin/drive/storage-quota"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let server = Server::new_async().await;
    let app = create_test_app(&server, test_store(), Some(ADMIN_TOKEN));

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/admin/drive/list")
                .header("content-type", "application/json")
                .header("x-admin-token", ADMIN_TOKEN)
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["code"], "bad_request");
}

/// Unknown user is 404; no token endpoint call.
#[tokio::test]
async fn test_unknown_user_not_found() {
    let mut server = Server::new_async().await;
    let token = server.mock("POST", "/token").expect(0).create_async().await;
    let app = create_test_app(&server, test_store(), Some(ADMIN_TOKEN));

    let response = app
        .oneshot(get_request("/api/admin/drive/storage-quota?userId=nobody"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = json_body(response).await;
    assert_eq!(json["code"], "not_found");
    token.assert_async().await;
}

/// A row without any refresh token is NotConnected (400) on every operation; no upstream calls.
#[tokio::test]
async fn test_credential_without_refresh_token_not_connected() {
    let mut server = Server::new_async().await;
    let token = server.mock("POST", "/token").expect(0).create_async().await;
    let store = test_store();
    store.insert_raw("u1", None, None, None, true).unwrap();
    let app = create_test_app(&server, store, Some(ADMIN_TOKEN));

    let boundary = "drivegate-boundary";
    let requests = vec![
        (
            "folders",
            json_request("POST", "/api/admin/drive/folders", json!({ "userId": "u1", "folderName": "Reports" })),
        ),
        (
            "delete",
            json_request("POST", "/api/admin/drive/delete", json!({ "userId": "u1", "fileId": "f1" })),
        ),
        (
            "download",
            json_request("POST", "/api/admin/drive/download", json!({ "userId": "u1", "fileId": "f1" })),
        ),
        (
            "upload",
            multipart_request(
                boundary,
                multipart_body(boundary, &[("userId", "u1")], Some(("a.txt", "text/plain", b"hello"))),
            ),
        ),
        ("storage-quota", get_request("/api/admin/drive/storage-quota?userId=u1")),
        (
            "list",
            json_request("POST", "/api/admin/drive/list", json!({ "userId": "u1" })),
        ),
    ];

    for (operation, request) in requests {
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", operation);
        let json = json_body(response).await;
        assert_eq!(json["code"], "not_connected", "{}", operation);
    }

    // Without a refresh token nothing reaches the token endpoint or the drive API
    token.assert_async().await;
}

/// Accepts connections and never answers them.
async fn stalled_endpoint() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    format!("http://{}", addr)
}

fn short_timeout_app(config: &DriveGateConfig, store: Arc<CredentialStore>) -> Router {
    let http = reqwest::Client::builder()
        .timeout(std::time::Duration::from_millis(200))
        .build()
        .unwrap();
    create_router(AppState::from_config(
        config,
        Some(ADMIN_TOKEN.to_string()),
        store,
        http,
    ))
}

/// A token endpoint that never answers fails with 500 once the client timeout fires.
#[tokio::test]
async fn test_stalled_token_endpoint_times_out() {
    let server = Server::new_async().await;
    let mut config = test_config(&server);
    config.provider.token_url = format!("{}/token", stalled_endpoint().await);
    let store = test_store();
    connect(&store, "u1");
    let app = short_timeout_app(&config, store);

    let response = tokio::time::timeout(
        std::time::Duration::from_secs(5),
        app.oneshot(get_request("/api/admin/drive/storage-quota?userId=u1")),
    )
    .await
    .expect("request hung past the client timeout")
    .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = json_body(response).await;
    assert_eq!(json["code"], "refresh_failed");
    assert!(json["error"].as_str().unwrap().contains("timed out"));
}

/// A drive API that never answers fails with 500 once the client timeout fires.
#[tokio::test]
async fn test_stalled_drive_api_times_out() {
    let mut server = Server::new_async().await;
    let _token = mock_refresh(&mut server).await;
    let mut config = test_config(&server);
    config.provider.api_base = format!("{}/drive/v3", stalled_endpoint().await);
    let store = test_store();
    connect(&store, "u1");
    let app = short_timeout_app(&config, store);

    let response = tokio::time::timeout(
        std::time::Duration::from_secs(5),
        app.oneshot(get_request("/api/admin/drive/storage-quota?userId=u1")),
    )
    .await
    .expect("request hung past the client timeout")
    .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = json_body(response).await;
    assert_eq!(json["code"], "upstream_unavailable");
    assert!(json["error"].as_str().unwrap().contains("timed out"));
}

/// A 200 from the token endpoint that carries `error` fails the operation.
#[tokio::test]
async fn test_refresh_error_body_on_success_status_fails() {
    let mut server = Server::new_async().await;
    let _token = server
        .mock("POST", "/token")
        .with_status(200)
        .with_body(r#"{"error":"invalid_grant","error_description":"Bad Request"}"#)
        .create_async()
        .await;
    let about = server
        .mock("GET", "/drive/v3/about")
        .match_query(Matcher::Any)
        .expect(0)
        .create_async()
        .await;
    let store = test_store();
    connect(&store, "u1");
    let app = create_test_app(&server, store, Some(ADMIN_TOKEN));

    let response = app
        .oneshot(get_request("/api/admin/drive/storage-quota?userId=u1"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = json_body(response).await;
    assert_eq!(json["code"], "refresh_failed");
    about.assert_async().await;
}

#[tokio::test]
async fn test_storage_quota() {
    let mut server = Server::new_async().await;
    let _token = mock_refresh(&mut server).await;
    let _about = server
        .mock("GET", "/drive/v3/about")
        .match_query(Matcher::UrlEncoded("fields".into(), "storageQuota".into()))
        .match_header("authorization", "Bearer ya29.test-access")
        .with_status(200)
        .with_body(r#"{"storageQuota":{"limit":"16106127360","usage":"524288","usageInDrive":"1024"}}"#)
        .create_async()
        .await;
    let store = test_store();
    connect(&store, "u1");
    let app = create_test_app(&server, store, Some(ADMIN_TOKEN));

    let response = app
        .oneshot(get_request("/api/admin/drive/storage-quota?userId=u1"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["storageQuota"]["usage"], "524288");
    assert_eq!(json["storageQuota"]["limit"], "16106127360");
}

/// Both 204 and 200 from the provider mean the file is gone.
#[tokio::test]
async fn test_delete_success_statuses() {
    for status in [204, 200] {
        let mut server = Server::new_async().await;
        let _token = mock_refresh(&mut server).await;
        let delete = server
            .mock("DELETE", "/drive/v3/files/file-123")
            .with_status(status)
            .expect(1)
            .create_async()
            .await;
        let store = test_store();
        connect(&store, "u1");
        let app = create_test_app(&server, store, Some(ADMIN_TOKEN));

        let response = app
            .oneshot(json_request(
                "POST",
                "/api/admin/drive/delete",
                json!({ "userId": "u1", "fileId": "file-123" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK, "upstream {}", status);
        assert_eq!(json_body(response).await, json!({ "ok": true }));
        delete.assert_async().await;
    }
}

/// Upstream failures carry the provider's body text.
#[tokio::test]
async fn test_delete_upstream_failure_carries_body() {
    let mut server = Server::new_async().await;
    let _token = mock_refresh(&mut server).await;
    let _delete = server
        .mock("DELETE", "/drive/v3/files/missing")
        .with_status(404)
        .with_body("File not found: missing.")
        .create_async()
        .await;
    let store = test_store();
    connect(&store, "u1");
    let app = create_test_app(&server, store, Some(ADMIN_TOKEN));

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/admin/drive/delete",
            json!({ "userId": "u1", "fileId": "missing" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = json_body(response).await;
    assert_eq!(json["code"], "upstream_error");
    let message = json["error"].as_str().unwrap();
    assert!(message.contains("404"));
    assert!(message.contains("File not found: missing."));
}

#[tokio::test]
async fn test_create_folder() {
    let mut server = Server::new_async().await;
    let _token = mock_refresh(&mut server).await;
    let create = server
        .mock("POST", "/drive/v3/files")
        .match_query(Matcher::Any)
        .match_body(Matcher::PartialJson(json!({
            "name": "Site Photos",
            "mimeType": "application/vnd.google-apps.folder",
            "parents": ["parent-1"]
        })))
        .with_status(200)
        .with_body(r#"{"id":"folder-9","name":"Site Photos","mimeType":"application/vnd.google-apps.folder","parents":["parent-1"]}"#)
        .create_async()
        .await;
    let store = test_store();
    connect(&store, "u1");
    let app = create_test_app(&server, store, Some(ADMIN_TOKEN));

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/admin/drive/folders",
            json!({ "userId": "u1", "folderName": "Site Photos", "parentId": "parent-1" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["folder"]["id"], "folder-9");
    create.assert_async().await;
}

#[tokio::test]
async fn test_list_files() {
    let mut server = Server::new_async().await;
    let _token = mock_refresh(&mut server).await;
    let _list = server
        .mock("GET", "/drive/v3/files")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("q".into(), "'folder-1' in parents and trashed=false".into()),
            Matcher::UrlEncoded("pageSize".into(), "25".into()),
            Matcher::UrlEncoded("pageToken".into(), "next-abc".into()),
        ]))
        .with_status(200)
        .with_body(
            r#"{"files":[{"id":"a","name":"a.pdf","mimeType":"application/pdf"}],"nextPageToken":"next-def"}"#,
        )
        .create_async()
        .await;
    let store = test_store();
    connect(&store, "u1");
    let app = create_test_app(&server, store, Some(ADMIN_TOKEN));

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/admin/drive/list",
            json!({ "userId": "u1", "folderId": "folder-1", "pageToken": "next-abc", "pageSize": 25 }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["files"][0]["name"], "a.pdf");
    assert_eq!(json["nextPageToken"], "next-def");
}

#[tokio::test]
async fn test_download_streams_bytes_with_content_type() {
    let mut server = Server::new_async().await;
    let _token = mock_refresh(&mut server).await;
    let _media = server
        .mock("GET", "/drive/v3/files/file-7")
        .match_query(Matcher::UrlEncoded("alt".into(), "media".into()))
        .with_status(200)
        .with_header("content-type", "image/png")
        .with_body(vec![0x89, b'P', b'N', b'G'])
        .create_async()
        .await;
    let store = test_store();
    connect(&store, "u1");
    let app = create_test_app(&server, store, Some(ADMIN_TOKEN));

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/admin/drive/download",
            json!({ "userId": "u1", "fileId": "file-7" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "image/png");
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&body[..], &[0x89, b'P', b'N', b'G']);
}

/// Upload sends a metadata part and the file bytes in one multipart request.
#[tokio::test]
async fn test_upload_sends_metadata_and_file() {
    let mut server = Server::new_async().await;
    let _token = mock_refresh(&mut server).await;
    let upload = server
        .mock("POST", "/upload/drive/v3/files")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("uploadType".into(), "multipart".into()),
            Matcher::UrlEncoded("fields".into(), "id,name,webViewLink,webContentLink".into()),
        ]))
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex(r#"\{"name":"renamed.txt","parents":\["parent-1"\]\}"#.to_string()),
            Matcher::Regex("hello drive".to_string()),
        ]))
        .with_status(200)
        .with_body(r#"{"id":"up-1","name":"renamed.txt","webViewLink":"https://drive.example/view/up-1","webContentLink":"https://drive.example/dl/up-1"}"#)
        .create_async()
        .await;
    let store = test_store();
    connect(&store, "u1");
    let app = create_test_app(&server, store, Some(ADMIN_TOKEN));

    let boundary = "drivegate-test-boundary";
    let body = multipart_body(
        boundary,
        &[("userId", "u1"), ("parentId", "parent-1"), ("name", "renamed.txt")],
        Some(("original.txt", "text/plain", b"hello drive")),
    );

    let response = app.oneshot(multipart_request(boundary, body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["file"]["id"], "up-1");
    assert_eq!(json["file"]["webViewLink"], "https://drive.example/view/up-1");
    upload.assert_async().await;
}

#[tokio::test]
async fn test_upload_without_file_is_bad_request() {
    let mut server = Server::new_async().await;
    let token = server.mock("POST", "/token").expect(0).create_async().await;
    let store = test_store();
    connect(&store, "u1");
    let app = create_test_app(&server, store, Some(ADMIN_TOKEN));

    let boundary = "b0undary";
    let body = multipart_body(boundary, &[("userId", "u1")], None);
    let response = app.oneshot(multipart_request(boundary, body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    token.assert_async().await;
}

/// Oversized files are rejected with 413 before any upstream call.
#[tokio::test]
async fn test_upload_over_limit_rejected() {
    let mut server = Server::new_async().await;
    let token = server.mock("POST", "/token").expect(0).create_async().await;
    let store = test_store();
    connect(&store, "u1");
    let app = create_test_app(&server, store, Some(ADMIN_TOKEN));

    let boundary = "b0undary";
    let big = vec![b'x'; MAX_UPLOAD_BYTES + 1];
    let body = multipart_body(
        boundary,
        &[("userId", "u1")],
        Some(("big.bin", "application/octet-stream", &big)),
    );
    let response = app.oneshot(multipart_request(boundary, body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let json = json_body(response).await;
    assert_eq!(json["code"], "payload_too_large");
    token.assert_async().await;
}

/// The stored refresh token never appears in any admin response.
#[tokio::test]
async fn test_refresh_token_never_returned() {
    let mut server = Server::new_async().await;
    let _token = mock_refresh(&mut server).await;
    let _about = server
        .mock("GET", "/drive/v3/about")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"storageQuota":{"usage":"1"}}"#)
        .create_async()
        .await;
    let store = test_store();
    connect(&store, "u1");
    let app = create_test_app(&server, store, Some(ADMIN_TOKEN));

    for uri in [
        "/api/admin/drive/storage-quota?userId=u1",
        "/api/admin/drive/diagnostics?userId=u1",
    ] {
        let response = app.clone().oneshot(get_request(uri)).await.unwrap();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8_lossy(&body);
        assert!(!text.contains(REFRESH_TOKEN), "{} leaked the refresh token", uri);
        assert!(!text.contains("ya29.test-access"), "{} leaked the access token", uri);
    }
}

/// Invalid ciphertext: decrypt fails, plaintext fallback is still attempted.
#[tokio::test]
async fn test_diagnostics_reports_each_step() {
    let mut server = Server::new_async().await;
    let token = server.mock("POST", "/token").expect(0).create_async().await;
    let store = test_store();
    store
        .insert_raw("u1", None, Some("bm90LWE:Y2lwaGVydGV4dA"), None, true)
        .unwrap();
    let app = create_test_app(&server, store, Some(ADMIN_TOKEN));

    let response = app
        .oneshot(get_request("/api/admin/drive/diagnostics?userId=u1"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["userId"], "u1");
    assert_eq!(json["outcome"], "no_refresh_token");

    let steps = json["steps"].as_array().unwrap();
    let status_of = |name: &str| {
        steps
            .iter()
            .find(|s| s["step"] == name)
            .map(|s| s["status"].as_str().unwrap().to_string())
    };
    assert_eq!(status_of("credential_lookup").as_deref(), Some("ok"));
    assert_eq!(status_of("decrypt").as_deref(), Some("failed"));
    assert_eq!(status_of("plaintext_fallback").as_deref(), Some("failed"));
    assert_eq!(status_of("refresh").as_deref(), Some("skipped"));
    token.assert_async().await;
}

#[tokio::test]
async fn test_diagnostics_for_unknown_user() {
    let server = Server::new_async().await;
    let app = create_test_app(&server, test_store(), Some(ADMIN_TOKEN));

    let response = app
        .oneshot(get_request("/api/admin/drive/diagnostics?userId=ghost"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["outcome"], "no_credential");
}
