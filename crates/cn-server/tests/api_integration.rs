//! Full-stack REST API integration tests.
//!
//! Each test wires the AppState over an in-memory database, constructs the
//! axum Router, and sends actual HTTP requests via `tower::ServiceExt`. This
//! validates routing, serialisation, handler logic, and storage in one pass.
//! The workflow engine is played by a mockito server.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt; // for `.oneshot()`

use cn_core::UserStore;
use cn_engine::config::ChatBackendKind;
use cn_engine::EngineConfig;
use cn_server::rest::create_router;
use cn_server::state::AppState;
use cn_storage::SqliteDb;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct TestApp {
    state: Arc<AppState>,
    router: axum::Router,
    _tmp: TempDir,
}

fn test_config(data_dir: &str, webhook_url: Option<String>) -> EngineConfig {
    let mut config = EngineConfig {
        data_dir: data_dir.to_string(),
        ..EngineConfig::default()
    };
    config.workflow.chat_webhook_url = webhook_url;
    config.workflow.base_url = "http://127.0.0.1:1".to_string();
    config
}

fn setup(webhook_url: Option<String>) -> TestApp {
    let tmp = TempDir::new().expect("tempdir");
    let config = test_config(&tmp.path().to_string_lossy(), webhook_url);
    setup_with_config(config, tmp)
}

fn setup_with_config(config: EngineConfig, tmp: TempDir) -> TestApp {
    let db = Arc::new(SqliteDb::open_in_memory().expect("in-memory db"));
    let state = Arc::new(AppState::with_db(config, db).expect("app state"));
    let router = create_router(Arc::clone(&state));
    TestApp {
        state,
        router,
        _tmp: tmp,
    }
}

fn json_request(method: Method, uri: &str, body: Option<Value>) -> Request<Body> {
    request_as(method, uri, body, None)
}

fn request_as(
    method: Method,
    uri: &str,
    body: Option<Value>,
    user: Option<&str>,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(user) = user {
        builder = builder.header("x-user-id", user);
    }
    match body {
        Some(val) => builder.body(Body::from(val.to_string())).unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn body_json(resp: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).to_string()))
}

async fn send(app: &TestApp, request: Request<Body>) -> axum::response::Response {
    app.router.clone().oneshot(request).await.unwrap()
}

const WINDOW: (&str, &str) = ("2000-01-01T00:00:00Z", "2100-01-01T00:00:00Z");

fn window_body(user: &str) -> Value {
    json!({
        "user_id": user,
        "start_timestamp": WINDOW.0,
        "end_timestamp": WINDOW.1,
    })
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_endpoint_returns_ok() {
    let app = setup(None);
    let resp = send(&app, json_request(Method::GET, "/api/health", None)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["status"], "healthy");
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

#[tokio::test]
async fn send_message_normalizes_and_persists_the_turn() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/webhook")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"potential_suppliers":[{"name":"A","ranking":5},{"name":"B","ranking":9}]}"#)
        .create_async()
        .await;
    let app = setup(Some(format!("{}/webhook", server.url())));

    let resp = send(
        &app,
        json_request(
            Method::POST,
            "/api/chat/startup/send-message",
            Some(json!({"message": "solar panels", "user_id": "alice"})),
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let envelope = body_json(resp).await;
    assert_eq!(envelope["success"], true);
    assert_eq!(envelope["existing_solutions"], json!([]));
    assert_eq!(envelope["potential_suppliers"][0]["name"], "B");
    assert_eq!(envelope["potential_suppliers"][1]["name"], "A");

    // Both turns persisted; the assistant content IS the serialized envelope.
    let resp = send(
        &app,
        json_request(
            Method::GET,
            "/api/chat/startup/history?user_id=alice",
            None,
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    let history = body["history"].as_array().unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0]["message_type"], "user");
    assert_eq!(history[0]["content"], "solar panels");
    assert_eq!(history[1]["message_type"], "assistant");
    let stored: Value = serde_json::from_str(history[1]["content"].as_str().unwrap()).unwrap();
    assert_eq!(stored, envelope);
}

#[tokio::test]
async fn send_message_requires_a_message() {
    let app = setup(None);
    let resp = send(
        &app,
        json_request(
            Method::POST,
            "/api/chat/suk/send-message",
            Some(json!({"message": "   "})),
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = body_json(resp).await;
    assert!(body["error"].as_str().unwrap().contains("message"));
}

#[tokio::test]
async fn unknown_chat_domain_is_not_found() {
    let app = setup(None);
    let resp = send(
        &app,
        json_request(
            Method::POST,
            "/api/chat/banking/send-message",
            Some(json!({"message": "hi"})),
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn upstream_failure_maps_to_bad_gateway() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/webhook")
        .with_status(500)
        .with_body("boom")
        .create_async()
        .await;
    let app = setup(Some(format!("{}/webhook", server.url())));

    let resp = send(
        &app,
        json_request(
            Method::POST,
            "/api/chat/suk/send-message",
            Some(json!({"message": "hello"})),
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    let body = body_json(resp).await;
    assert_eq!(body["error"], "Failed to process message");
}

#[tokio::test]
async fn history_is_domain_scoped_per_actor() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/webhook")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"existing_solutions":[]}"#)
        .create_async()
        .await;
    let app = setup(Some(format!("{}/webhook", server.url())));

    let resp = send(
        &app,
        json_request(
            Method::POST,
            "/api/chat/startup/send-message",
            Some(json!({"message": "startup question", "user_id": "alice"})),
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    // Same actor, other domain: nothing leaks.
    let resp = send(
        &app,
        json_request(Method::GET, "/api/chat/suk/history?user_id=alice", None),
    )
    .await;
    let body = body_json(resp).await;
    assert_eq!(body["history"].as_array().unwrap().len(), 0);
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn conversation_title_lifecycle() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/webhook")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"existing_solutions":[]}"#)
        .create_async()
        .await;
    let app = setup(Some(format!("{}/webhook", server.url())));

    let resp = send(
        &app,
        json_request(
            Method::POST,
            "/api/chat/suk/send-message",
            Some(json!({"message": "first question", "user_id": "alice"})),
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    // First title.
    let mut body = window_body("alice");
    body["title"] = json!("Research");
    let resp = send(
        &app,
        json_request(Method::PUT, "/api/chat/suk/update-conversation-title", Some(body)),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    // Retitle: the second title replaces the first, no stacking.
    let mut body = window_body("alice");
    body["title"] = json!("Final title");
    let resp = send(
        &app,
        json_request(Method::PUT, "/api/chat/suk/update-conversation-title", Some(body)),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = send(
        &app,
        json_request(Method::GET, "/api/chat/suk/history?user_id=alice", None),
    )
    .await;
    let body = body_json(resp).await;
    let first = &body["history"][0];
    // The marker is stripped out of content and surfaced as a title field.
    assert_eq!(first["content"], "first question");
    assert_eq!(first["title"], "Final title");
}

#[tokio::test]
async fn retitle_without_user_message_is_not_found() {
    let app = setup(None);
    let mut body = window_body("nobody");
    body["title"] = json!("Ghost");
    let resp = send(
        &app,
        json_request(Method::PUT, "/api/chat/suk/update-conversation-title", Some(body)),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn retitle_rejects_malformed_timestamps_before_any_write() {
    let app = setup(None);
    let resp = send(
        &app,
        json_request(
            Method::PUT,
            "/api/chat/suk/update-conversation-title",
            Some(json!({
                "user_id": "alice",
                "start_timestamp": "not-a-time",
                "end_timestamp": WINDOW.1,
                "title": "T",
            })),
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = body_json(resp).await;
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("start_timestamp"));
}

#[tokio::test]
async fn delete_conversation_is_idempotent() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/webhook")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"existing_solutions":[]}"#)
        .create_async()
        .await;
    let app = setup(Some(format!("{}/webhook", server.url())));

    for _ in 0..2 {
        let resp = send(
            &app,
            json_request(
                Method::POST,
                "/api/chat/suk/send-message",
                Some(json!({"message": "to be deleted", "user_id": "alice"})),
            ),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    let resp = send(
        &app,
        json_request(
            Method::DELETE,
            "/api/chat/suk/delete-conversation",
            Some(window_body("alice")),
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["deleted_count"], 4); // two turns per send

    let resp = send(
        &app,
        json_request(
            Method::DELETE,
            "/api/chat/suk/delete-conversation",
            Some(window_body("alice")),
        ),
    )
    .await;
    let body = body_json(resp).await;
    assert_eq!(body["deleted_count"], 0);
}

#[tokio::test]
async fn graph_backend_answers_without_a_webhook() {
    let tmp = TempDir::new().expect("tempdir");
    let mut config = test_config(&tmp.path().to_string_lossy(), None);
    config.chat.backend = ChatBackendKind::Graph;
    let app = setup_with_config(config, tmp);

    let resp = send(
        &app,
        json_request(
            Method::POST,
            "/api/chat/suk/send-message",
            Some(json!({"message": "artificial intelligence suppliers", "user_id": "alice"})),
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let envelope = body_json(resp).await;
    assert_eq!(envelope["success"], true);
    // Degraded gateway still surfaces sector matches from fallback data.
    assert!(!envelope["potential_suppliers"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn regions_and_provinces_come_from_the_gateway() {
    let app = setup(None);

    let resp = send(&app, json_request(Method::GET, "/api/chat/startup/regions", None)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert!(body["regions"]
        .as_array()
        .unwrap()
        .iter()
        .any(|r| r["name"] == "Lombardia"));

    let resp = send(
        &app,
        json_request(Method::GET, "/api/chat/startup/provinces", None),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = send(
        &app,
        json_request(
            Method::GET,
            "/api/chat/startup/provinces?region=Lombardia",
            None,
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

#[tokio::test]
async fn report_routes_require_an_identified_known_user() {
    let app = setup(None);

    let resp = send(
        &app,
        json_request(
            Method::POST,
            "/api/reports/generate",
            Some(json!({"company_name": "Acme"})),
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = send(
        &app,
        request_as(
            Method::POST,
            "/api/reports/generate",
            Some(json!({"company_name": "Acme"})),
            Some("stranger"),
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn report_generation_completes_on_pdf_response() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/webhook")
        .with_status(200)
        .with_header("content-type", "application/pdf")
        .with_body("%PDF-1.7 generated report")
        .create_async()
        .await;
    let app = setup(Some(format!("{}/webhook", server.url())));
    app.state.users.ensure("admin", "admin").await.unwrap();

    let resp = send(
        &app,
        request_as(
            Method::POST,
            "/api/reports/generate",
            Some(json!({"company_name": "Acme Corporation"})),
            Some("admin"),
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["status"], "completed");
    let report_id = body["report_id"].as_str().unwrap().to_string();

    let resp = send(
        &app,
        request_as(
            Method::GET,
            &format!("/api/reports/status/{report_id}"),
            None,
            Some("admin"),
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["status"], "completed");
    assert!(body["file_name"]
        .as_str()
        .unwrap()
        .starts_with("Acme_Corporation_"));

    // Download streams the PDF bytes back.
    let resp = send(
        &app,
        request_as(
            Method::GET,
            &format!("/api/reports/download/{report_id}"),
            None,
            Some("admin"),
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get("content-type").unwrap(),
        "application/pdf"
    );
}

#[tokio::test]
async fn reports_are_invisible_to_other_users() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/webhook")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"execution_id":"exec-1","status":"started"}"#)
        .create_async()
        .await;
    let app = setup(Some(format!("{}/webhook", server.url())));
    app.state.users.ensure("alice", "user").await.unwrap();
    app.state.users.ensure("bob", "user").await.unwrap();

    let resp = send(
        &app,
        request_as(
            Method::POST,
            "/api/reports/generate",
            Some(json!({"company_name": "Acme"})),
            Some("alice"),
        ),
    )
    .await;
    let body = body_json(resp).await;
    let report_id = body["report_id"].as_str().unwrap().to_string();

    let resp = send(
        &app,
        request_as(
            Method::GET,
            &format!("/api/reports/status/{report_id}"),
            None,
            Some("bob"),
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = send(
        &app,
        request_as(Method::GET, "/api/reports/history", None, Some("bob")),
    )
    .await;
    let body = body_json(resp).await;
    assert_eq!(body["reports"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn generate_requires_company_name() {
    let app = setup(None);
    app.state.users.ensure("admin", "admin").await.unwrap();

    let resp = send(
        &app,
        request_as(
            Method::POST,
            "/api/reports/generate",
            Some(json!({})),
            Some("admin"),
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Dashboard
// ---------------------------------------------------------------------------

#[tokio::test]
async fn dashboard_requires_identity_and_serves_degraded_data() {
    let app = setup(None);

    let resp = send(&app, json_request(Method::GET, "/api/dashboard/stats", None)).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = send(
        &app,
        request_as(Method::GET, "/api/dashboard/stats", None, Some("admin")),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    // Graph store is not configured: the gateway serves fallback data
    // instead of failing.
    assert_eq!(body["company_count"], 150);
    assert_eq!(body["reports_today"], 0);
    assert!(!body["sector_distribution"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn sector_companies_requires_the_sector_parameter() {
    let app = setup(None);
    let resp = send(
        &app,
        request_as(
            Method::GET,
            "/api/dashboard/sector-companies",
            None,
            Some("admin"),
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = send(
        &app,
        request_as(
            Method::GET,
            "/api/dashboard/sector-companies?sector=Technology",
            None,
            Some("admin"),
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert!(!body["companies"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn company_relationships_have_a_center_node() {
    let app = setup(None);
    let resp = send(
        &app,
        request_as(
            Method::GET,
            "/api/dashboard/company-relationships?company=Acme%20Corporation",
            None,
            Some("admin"),
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["nodes"][0]["node_type"], "center");
    assert_eq!(body["nodes"][0]["name"], "Acme Corporation");
}
