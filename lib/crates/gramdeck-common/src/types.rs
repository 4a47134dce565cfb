use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Availability label shown in the agent catalog
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AgentAvailability {
    Available,
    Premium,
    #[serde(rename = "Coming Soon")]
    ComingSoon,
}

/// A catalog entry describing a deployable agent
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgentDescriptor {
    pub id: String,
    pub name: String,
    pub description: String,
    pub status: AgentAvailability,
}

/// Process-wide record of the active agent.
///
/// Idle means `is_running == false` with every other field `None`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct AgentStatus {
    pub is_running: bool,
    pub agent_id: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub last_activity: Option<DateTime<Utc>>,
}

impl AgentStatus {
    /// The idle record every process starts with.
    #[must_use]
    pub fn idle() -> Self {
        Self::default()
    }

    /// A record for `agent_id` deployed at `now`.
    #[must_use]
    pub fn running(agent_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            is_running: true,
            agent_id: Some(agent_id.into()),
            start_time: Some(now),
            last_activity: Some(now),
        }
    }

    /// Milliseconds elapsed since `start_time`, or 0 when not running.
    #[must_use]
    pub fn uptime_ms(&self, now: DateTime<Utc>) -> u64 {
        match (self.is_running, self.start_time) {
            (true, Some(start)) => u64::try_from((now - start).num_milliseconds()).unwrap_or(0),
            _ => 0,
        }
    }
}

/// Status snapshot returned by `GET /api/agents/status`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgentStatusView {
    #[serde(flatten)]
    pub status: AgentStatus,
    /// Milliseconds since the active agent was deployed.
    pub uptime: u64,
}

/// Lifecycle label reported for a freshly deployed agent
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentState {
    Running,
}

/// Payload of a successful deploy
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentInfo {
    pub agent_id: String,
    pub status: DeploymentState,
    pub start_time: DateTime<Utc>,
}

/// Body of `POST /api/auth/login`.
///
/// Fields are optional on the wire so that a missing field is reported
/// as a validation failure instead of a decode error.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// Body of `POST /api/agents/deploy`
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployRequest {
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

fn redact(value: Option<&String>) -> &'static str {
    if value.is_some() { "<redacted>" } else { "<none>" }
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("username", &self.username)
            .field("password", &redact(self.password.as_ref()))
            .finish()
    }
}

impl fmt::Debug for DeployRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeployRequest")
            .field("agent_id", &self.agent_id)
            .field("username", &self.username)
            .field("password", &redact(self.password.as_ref()))
            .finish()
    }
}

/// Payload of a successful login
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoginInfo {
    pub username: String,
    pub authenticated: bool,
}

/// Uniform JSON envelope for every `/api/auth` and `/api/agents` response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    #[must_use]
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
        }
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl ApiResponse<()> {
    /// A success envelope with a message and no payload.
    #[must_use]
    pub fn done(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: None,
        }
    }

    /// A failure envelope carrying a user-facing message.
    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            data: None,
        }
    }
}

/// Body of `GET /api/health`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

impl HealthResponse {
    #[must_use]
    pub fn ok(timestamp: DateTime<Utc>) -> Self {
        Self {
            status: "OK".to_string(),
            timestamp,
        }
    }
}
