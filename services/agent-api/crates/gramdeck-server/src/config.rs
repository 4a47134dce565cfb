//! Server configuration loaded from `GRAMDECK_*` environment variables,
//! optionally seeded from a `.env` file.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use gramdeck_common::RunMode;
use serde::{Deserialize, Deserializer};

/// Prefix shared by every configuration variable.
pub const ENV_PREFIX: &str = "GRAMDECK_";

/// Server configuration loaded from environment variables via `envy`.
///
/// Each field maps to `GRAMDECK_<FIELD>`:
///   - `GRAMDECK_LISTEN_ADDR`               (default `0.0.0.0:3001`)
///   - `GRAMDECK_MODE`                      (`api` or `full`, default `full`)
///   - `GRAMDECK_AUTOMATION_PROGRAM`        (default `node`)
///   - `GRAMDECK_AUTOMATION_ARGS`           (comma-separated)
///   - `GRAMDECK_AUTOMATION_TIMEOUT_SECS`   (optional, no timeout when unset)
///   - `GRAMDECK_ITERATION_INTERVAL_SECS`   (default `30`)
///   - `GRAMDECK_DEPLOY_DELAY_MS`           (default `1000`)
///   - `GRAMDECK_ENGAGEMENT_AGENT_ID`       (default `engagement-bot`)
///   - `GRAMDECK_CORS_ORIGIN`               (default `http://localhost:8080`)
///   - `GRAMDECK_SHUTDOWN_GRACE_SECS`       (default `10`)
///   - `GRAMDECK_TLS_CERT` / `GRAMDECK_TLS_KEY` (optional, enables HTTPS)
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    #[serde(default, deserialize_with = "deserialize_mode")]
    pub mode: RunMode,

    /// Program that performs one automation pass.
    #[serde(default = "default_automation_program")]
    pub automation_program: String,

    /// Arguments passed to `automation_program`.
    #[serde(default = "default_automation_args")]
    pub automation_args: Vec<String>,

    pub automation_timeout_secs: Option<u64>,

    #[serde(default = "default_iteration_interval_secs")]
    pub iteration_interval_secs: u64,

    #[serde(default = "default_deploy_delay_ms")]
    pub deploy_delay_ms: u64,

    /// Deploying this agent id triggers an automation pass.
    #[serde(default = "default_engagement_agent_id")]
    pub engagement_agent_id: String,

    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,

    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,

    pub tls_cert: Option<String>,

    pub tls_key: Option<String>,
}

/// Parse `GRAMDECK_MODE` with [`RunMode`]'s `FromStr`, so `API` and ` full `
/// are accepted the same way everywhere.
fn deserialize_mode<'de, D>(deserializer: D) -> Result<RunMode, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    raw.parse().map_err(serde::de::Error::custom)
}

fn default_listen_addr() -> String {
    "0.0.0.0:3001".to_string()
}

fn default_automation_program() -> String {
    "node".to_string()
}

fn default_automation_args() -> Vec<String> {
    vec!["dist/client/instagram.js".to_string()]
}

fn default_iteration_interval_secs() -> u64 {
    30
}

fn default_deploy_delay_ms() -> u64 {
    1000
}

fn default_engagement_agent_id() -> String {
    "engagement-bot".to_string()
}

fn default_cors_origin() -> String {
    "http://localhost:8080".to_string()
}

fn default_shutdown_grace_secs() -> u64 {
    10
}

impl Config {
    /// Load `.env` from the working directory if present, then the process
    /// environment.
    pub fn load() -> Result<Self> {
        Self::load_with_env_file(Path::new(".env"))
    }

    /// Load `env_file` into the process environment if it exists, then read
    /// the configuration. Variables already set are not overridden.
    pub fn load_with_env_file(env_file: &Path) -> Result<Self> {
        match dotenvy::from_path(env_file) {
            Ok(()) => tracing::info!(path = %env_file.display(), "loaded environment file"),
            Err(e) if e.not_found() => {}
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("failed to read {}", env_file.display()));
            }
        }
        Self::from_env()
    }

    /// Load from the process environment and validate.
    pub fn from_env() -> Result<Self> {
        let config: Self = envy::prefixed(ENV_PREFIX)
            .from_env()
            .context("failed to load config from GRAMDECK_* env vars")?;
        config.validate()?;
        Ok(config)
    }

    /// Load from an explicit set of `(KEY, value)` pairs.
    pub fn from_pairs<I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let config: Self = envy::prefixed(ENV_PREFIX)
            .from_iter(pairs)
            .context("failed to parse GRAMDECK_* settings")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        self.socket_addr()?;
        ensure!(
            self.iteration_interval_secs > 0,
            "GRAMDECK_ITERATION_INTERVAL_SECS must be greater than zero"
        );
        ensure!(
            !self.automation_program.trim().is_empty(),
            "GRAMDECK_AUTOMATION_PROGRAM must not be empty"
        );
        ensure!(
            !self.engagement_agent_id.is_empty(),
            "GRAMDECK_ENGAGEMENT_AGENT_ID must not be empty"
        );
        ensure!(
            self.tls_cert.is_some() == self.tls_key.is_some(),
            "GRAMDECK_TLS_CERT and GRAMDECK_TLS_KEY must be set together"
        );
        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.listen_addr
            .parse()
            .with_context(|| format!("invalid listen address '{}'", self.listen_addr))
    }

    #[must_use]
    pub fn iteration_interval(&self) -> Duration {
        Duration::from_secs(self.iteration_interval_secs)
    }

    #[must_use]
    pub fn deploy_delay(&self) -> Duration {
        Duration::from_millis(self.deploy_delay_ms)
    }

    #[must_use]
    pub fn automation_timeout(&self) -> Option<Duration> {
        self.automation_timeout_secs.map(Duration::from_secs)
    }

    #[must_use]
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    /// Cert and key paths when HTTPS is configured.
    #[must_use]
    pub fn tls_paths(&self) -> Option<(&str, &str)> {
        match (&self.tls_cert, &self.tls_key) {
            (Some(cert), Some(key)) => Some((cert.as_str(), key.as_str())),
            _ => None,
        }
    }
}
