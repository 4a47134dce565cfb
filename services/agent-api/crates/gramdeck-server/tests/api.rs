//! HTTP-level tests driving the router with `tower::ServiceExt::oneshot`.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{Result, bail};
use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use gramdeck_server::{
    AgentController, AppState, AutomationClient, ControllerSettings, StatusStore, router,
};

#[derive(Default)]
struct FakeClient {
    calls: AtomicUsize,
    fail: bool,
}

#[async_trait]
impl AutomationClient for FakeClient {
    async fn run_pass(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            bail!("checkpoint required");
        }
        Ok(())
    }
}

fn app_with(client: Arc<FakeClient>) -> Router {
    let controller = AgentController::new(
        StatusStore::new(),
        client,
        ControllerSettings::default(),
        CancellationToken::new(),
    );
    router(
        AppState::new(Arc::new(controller)),
        "http://localhost:8080",
    )
    .expect("router")
}

fn app() -> Router {
    app_with(Arc::new(FakeClient::default()))
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(v) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(v.to_string())),
        None => builder.body(Body::empty()),
    }
    .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

// ── Health & auth ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn health_reports_ok_with_timestamp() {
    let (status, body) = send(&app(), "GET", "/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "OK");
    assert!(body["timestamp"].as_str().is_some());
}

#[tokio::test]
async fn login_with_any_credentials_succeeds() {
    let (status, body) = send(
        &app(),
        "POST",
        "/api/auth/login",
        Some(json!({"username": "a", "password": "b"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"], json!({"username": "a", "authenticated": true}));
}

#[tokio::test]
async fn login_with_empty_username_is_bad_request() {
    let (status, body) = send(
        &app(),
        "POST",
        "/api/auth/login",
        Some(json!({"username": "", "password": "x"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Username and password are required");
}

#[tokio::test]
async fn login_without_body_is_bad_request() {
    let (status, body) = send(&app(), "POST", "/api/auth/login", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

// ── Agents ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn list_returns_catalog() {
    let (status, body) = send(&app(), "GET", "/api/agents/list", None).await;
    assert_eq!(status, StatusCode::OK);
    let agents = body["data"].as_array().unwrap();
    assert_eq!(agents.len(), 3);
    assert_eq!(agents[1]["id"], "engagement-bot");
    assert_eq!(agents[2]["status"], "Premium");
}

#[tokio::test]
async fn fresh_status_is_idle() {
    let (status, body) = send(&app(), "GET", "/api/agents/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["data"],
        json!({
            "isRunning": false,
            "agentId": null,
            "startTime": null,
            "lastActivity": null,
            "uptime": 0,
        })
    );
}

#[tokio::test]
async fn deploy_then_status_shows_running_agent() {
    let app = app();
    let (status, body) = send(
        &app,
        "POST",
        "/api/agents/deploy",
        Some(json!({"agentId": "content-creator"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Agent content-creator deployed successfully");
    assert_eq!(body["data"]["agentId"], "content-creator");
    assert_eq!(body["data"]["status"], "running");
    assert!(body["data"]["startTime"].as_str().is_some());

    let (_, body) = send(&app, "GET", "/api/agents/status", None).await;
    assert_eq!(body["data"]["isRunning"], true);
    assert_eq!(body["data"]["agentId"], "content-creator");
}

#[tokio::test]
async fn deploy_without_agent_id_is_bad_request() {
    let app = app();
    for payload in [json!({}), json!({"agentId": ""}), json!({"agentId": null})] {
        let (status, body) = send(&app, "POST", "/api/agents/deploy", Some(payload)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Agent ID is required");
    }
    let (_, body) = send(&app, "GET", "/api/agents/status", None).await;
    assert_eq!(body["data"]["isRunning"], false);
}

#[tokio::test]
async fn second_deploy_conflicts() {
    let app = app();
    send(
        &app,
        "POST",
        "/api/agents/deploy",
        Some(json!({"agentId": "content-creator"})),
    )
    .await;
    let (status, body) = send(
        &app,
        "POST",
        "/api/agents/deploy",
        Some(json!({"agentId": "analytics-tracker", "username": "u", "password": "p"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Another agent is already running");

    let (_, body) = send(&app, "GET", "/api/agents/status", None).await;
    assert_eq!(body["data"]["agentId"], "content-creator");
}

#[tokio::test]
async fn stop_is_idempotent() {
    let app = app();
    for _ in 0..2 {
        let (status, body) = send(&app, "POST", "/api/agents/stop", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"success": true, "message": "Agent stopped successfully"}));
    }
    let (_, body) = send(&app, "GET", "/api/agents/status", None).await;
    assert_eq!(body["data"]["isRunning"], false);
}

#[tokio::test]
async fn stop_allows_redeploy() {
    let app = app();
    let deploy = json!({"agentId": "content-creator"});
    send(&app, "POST", "/api/agents/deploy", Some(deploy.clone())).await;
    send(&app, "POST", "/api/agents/stop", None).await;
    let (status, _) = send(&app, "POST", "/api/agents/deploy", Some(deploy)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test(start_paused = true)]
async fn failed_engagement_pass_resets_status() {
    let client = Arc::new(FakeClient {
        fail: true,
        ..Default::default()
    });
    let app = app_with(client.clone());
    let (status, _) = send(
        &app,
        "POST",
        "/api/agents/deploy",
        Some(json!({"agentId": "engagement-bot"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app, "GET", "/api/agents/status", None).await;
    assert_eq!(body["data"]["isRunning"], true);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(client.calls.load(Ordering::SeqCst), 1);

    let (_, body) = send(&app, "GET", "/api/agents/status", None).await;
    assert_eq!(body["data"]["isRunning"], false);
    assert_eq!(body["data"]["agentId"], Value::Null);
}

#[tokio::test]
async fn responses_carry_security_headers() {
    let request = Request::builder()
        .uri("/api/health")
        .body(Body::empty())
        .unwrap();
    let response = app().oneshot(request).await.unwrap();
    assert_eq!(
        response.headers()[header::X_CONTENT_TYPE_OPTIONS],
        "nosniff"
    );
    assert!(response.headers().contains_key(header::X_XSS_PROTECTION));
}

#[tokio::test]
async fn cors_allows_configured_origin_with_credentials() {
    let request = Request::builder()
        .method("OPTIONS")
        .uri("/api/agents/deploy")
        .header(header::ORIGIN, "http://localhost:8080")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .unwrap();
    let response = app().oneshot(request).await.unwrap();
    let headers = response.headers();
    assert_eq!(
        headers[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "http://localhost:8080"
    );
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
}
