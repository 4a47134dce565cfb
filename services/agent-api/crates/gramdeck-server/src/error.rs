//! Typed error enums for the lifecycle controller and the HTTP boundary.
//!
//! `LifecycleError` is what the controller returns. `ApiError` is what
//! handlers return; it renders the `{success:false, message}` envelope
//! with the matching status code.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use gramdeck_common::ApiResponse;
use thiserror::Error;

// ── Lifecycle errors ──────────────────────────────────────────────────────────

/// Errors returned by [`crate::lifecycle::AgentController`] operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("Agent ID is required")]
    MissingAgentId,

    #[error("Another agent is already running")]
    AlreadyRunning { active: Option<String> },
}

// ── HTTP errors ───────────────────────────────────────────────────────────────

/// Errors surfaced to HTTP clients.
#[derive(Debug, Error)]
pub enum ApiError {
    /// A required field is missing or the body could not be decoded.
    #[error("{0}")]
    Validation(String),

    /// The request conflicts with current state.
    #[error("{0}")]
    Conflict(String),

    /// Anything else; the message shown to the client is fixed per route.
    #[error("{message}")]
    Unexpected {
        message: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl ApiError {
    pub fn unexpected(message: &'static str, source: impl Into<anyhow::Error>) -> Self {
        Self::Unexpected {
            message,
            source: source.into(),
        }
    }

    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Unexpected { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<LifecycleError> for ApiError {
    fn from(err: LifecycleError) -> Self {
        match err {
            LifecycleError::MissingAgentId => ApiError::Validation(err.to_string()),
            LifecycleError::AlreadyRunning { .. } => ApiError::Conflict(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match &self {
            ApiError::Unexpected { message, source } => {
                tracing::error!(error = ?source, "{message}");
            }
            ApiError::Validation(msg) | ApiError::Conflict(msg) => {
                tracing::debug!(status = status.as_u16(), "{msg}");
            }
        }
        (status, Json(ApiResponse::failure(self.to_string()))).into_response()
    }
}
