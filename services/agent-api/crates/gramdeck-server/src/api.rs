//! HTTP routes.
//!
//!   - `POST /api/auth/login`
//!   - `GET  /api/agents/list`
//!   - `POST /api/agents/deploy`
//!   - `GET  /api/agents/status`
//!   - `POST /api/agents/stop`
//!   - `GET  /api/health`

use std::any::Any;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::{HeaderValue, Method, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use gramdeck_common::{
    AgentDescriptor, AgentStatusView, ApiResponse, DeployRequest, DeploymentInfo, HealthResponse,
    LoginInfo, LoginRequest,
};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::auth;
use crate::error::{ApiError, LifecycleError};
use crate::lifecycle::AgentController;

/// Shared handler state.
#[derive(Debug, Clone)]
pub struct AppState {
    pub controller: Arc<AgentController>,
}

impl AppState {
    #[must_use]
    pub fn new(controller: Arc<AgentController>) -> Self {
        Self { controller }
    }
}

/// Build the full router with CORS, security headers, panic recovery and
/// request tracing.
pub fn router(state: AppState, cors_origin: &str) -> Result<Router> {
    with_middleware(routes(state), cors_origin)
}

/// Wrap `routes` in the middleware stack shared by every endpoint.
fn with_middleware(routes: Router, cors_origin: &str) -> Result<Router> {
    let origin = HeaderValue::from_str(cors_origin)
        .with_context(|| format!("invalid CORS origin '{cors_origin}'"))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Ok(routes
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_XSS_PROTECTION,
            HeaderValue::from_static("1; mode=block"),
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http()))
}

/// Routes without middleware.
pub fn routes(state: AppState) -> Router {
    let agents = Router::new()
        .route("/list", get(list_agents))
        .route("/deploy", post(deploy_agent))
        .route("/status", get(agent_status))
        .route("/stop", post(stop_agent));

    Router::new()
        .route("/api/auth/login", post(login))
        .nest("/api/agents", agents)
        .route("/api/health", get(health))
        .with_state(state)
}

// ===================================================================
// Handlers
// ===================================================================

async fn login(
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<LoginInfo>>, ApiError> {
    let Json(request) =
        body.map_err(|_| ApiError::Validation(auth::MISSING_CREDENTIALS.to_string()))?;
    let info = auth::login(&request)?;
    Ok(Json(ApiResponse::ok(info).with_message("Login successful")))
}

async fn list_agents(State(state): State<AppState>) -> Json<ApiResponse<Vec<AgentDescriptor>>> {
    Json(ApiResponse::ok(state.controller.list().to_vec()))
}

async fn deploy_agent(
    State(state): State<AppState>,
    body: Result<Json<DeployRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<DeploymentInfo>>, ApiError> {
    let Json(request) =
        body.map_err(|_| ApiError::from(LifecycleError::MissingAgentId))?;
    if let Some(username) = request.username.as_deref() {
        tracing::debug!(username, "deploy request carries credentials");
    }

    let info = state.controller.deploy(request.agent_id.as_deref())?;
    let message = format!("Agent {} deployed successfully", info.agent_id);
    Ok(Json(ApiResponse::ok(info).with_message(message)))
}

async fn agent_status(State(state): State<AppState>) -> Json<ApiResponse<AgentStatusView>> {
    Json(ApiResponse::ok(state.controller.status()))
}

async fn stop_agent(State(state): State<AppState>) -> Json<ApiResponse<()>> {
    state.controller.stop();
    Json(ApiResponse::done("Agent stopped successfully"))
}

/// Minimal health-check handler for load-balancer probes.
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::ok(Utc::now()))
}

fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "<non-string panic payload>".to_string());
    ApiError::unexpected("Internal server error", anyhow::anyhow!(detail)).into_response()
}
