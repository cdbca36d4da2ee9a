//! Authentication error types.

use thiserror::Error;

/// Authentication error type.
#[derive(Error, Debug)]
pub enum AuthError {
    /// A refresh was requested but no refresh token is stored
    #[error("No refresh token available")]
    NoRefreshToken,

    /// The refresh exchange failed; the session has been cleared
    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    /// No usable credentials for an authenticated request
    #[error("No authentication token found")]
    Unauthenticated,

    /// Still unauthorized after refreshing; the session has been cleared
    #[error("Session expired. Please login again.")]
    SessionExpired,

    /// Login or signup rejected
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// Non-success response from the API
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Network unavailable (transient error, can retry)
    #[error("Network unavailable")]
    NetworkUnavailable,

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Header value could not be encoded
    #[error("Invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<sauron_config_and_utils::CoreError> for AuthError {
    fn from(err: sauron_config_and_utils::CoreError) -> Self {
        AuthError::Config(err.to_string())
    }
}

impl AuthError {
    /// Returns true if this error is transient and the operation can be retried.
    ///
    /// Transient errors include:
    /// - Network unavailable
    /// - API responses and HTTP errors with 5xx status codes
    /// - Connection failures and timeouts
    pub fn is_transient(&self) -> bool {
        match self {
            AuthError::NetworkUnavailable => true,
            AuthError::Api { status, .. } => *status >= 500,
            AuthError::Http(e) => {
                if e.is_connect() || e.is_timeout() {
                    return true;
                }
                if let Some(status) = e.status() {
                    return status.is_server_error();
                }
                false
            }
            _ => false,
        }
    }
}

/// Result type alias using AuthError.
pub type AuthResult<T> = Result<T, AuthError>;
