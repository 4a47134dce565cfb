use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Process run mode.
///
/// `Api` serves HTTP only. `Full` additionally runs the background
/// iteration loop against the automation client.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    Api,
    #[default]
    Full,
}

impl RunMode {
    /// Whether the background iteration loop should be started.
    #[must_use]
    pub fn runs_background_loop(self) -> bool {
        matches!(self, RunMode::Full)
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::Api => f.write_str("api"),
            RunMode::Full => f.write_str("full"),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown run mode '{0}' (expected 'api' or 'full')")]
pub struct ParseRunModeError(pub String);

impl FromStr for RunMode {
    type Err = ParseRunModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "api" => Ok(RunMode::Api),
            "full" => Ok(RunMode::Full),
            other => Err(ParseRunModeError(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_mode_runs_background_loop() {
        assert_eq!(RunMode::default(), RunMode::Full);
        assert!(RunMode::default().runs_background_loop());
    }

    #[test]
    fn api_mode_suppresses_background_loop() {
        assert!(!RunMode::Api.runs_background_loop());
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("API".parse::<RunMode>(), Ok(RunMode::Api));
        assert_eq!(" full ".parse::<RunMode>(), Ok(RunMode::Full));
    }

    #[test]
    fn parse_rejects_unknown_mode() {
        let err = "daemon".parse::<RunMode>().unwrap_err();
        assert_eq!(err, ParseRunModeError("daemon".to_string()));
        assert!(err.to_string().contains("daemon"));
    }

    #[test]
    fn deserializes_from_lowercase_string() {
        let mode: RunMode = serde_json::from_str("\"api\"").unwrap();
        assert_eq!(mode, RunMode::Api);
    }
}
