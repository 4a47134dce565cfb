//! Login handling.
//!
//! Credentials are checked for presence only; nothing is stored and no
//! external account is contacted.

use gramdeck_common::{LoginInfo, LoginRequest};

use crate::error::ApiError;

pub const MISSING_CREDENTIALS: &str = "Username and password are required";

/// Accept any non-empty username/password pair.
pub fn login(request: &LoginRequest) -> Result<LoginInfo, ApiError> {
    let username = request.username.as_deref().unwrap_or_default();
    let password = request.password.as_deref().unwrap_or_default();

    if username.is_empty() || password.is_empty() {
        return Err(ApiError::Validation(MISSING_CREDENTIALS.to_string()));
    }

    tracing::info!(username, "login attempt");
    Ok(LoginInfo {
        username: username.to_string(),
        authenticated: true,
    })
}
