//! Error types for test execution.
//!
//! Per-case failures (auth, transport, timeout) are recorded in the
//! `TestResult` of the affected case; these types only describe them.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Why authentication could not be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthErrorReason {
    /// The auth configuration is missing required fields.
    InvalidConfig,
    /// The OAuth2 token endpoint failed or returned a malformed response.
    TokenAcquisitionFailed,
}

impl std::fmt::Display for AuthErrorReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthErrorReason::InvalidConfig => write!(f, "invalid_config"),
            AuthErrorReason::TokenAcquisitionFailed => write!(f, "token_acquisition_failed"),
        }
    }
}

/// Authentication resolution or acquisition failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Authentication error ({reason}): {detail}")]
pub struct AuthError {
    pub reason: AuthErrorReason,
    pub detail: String,
}

impl AuthError {
    pub fn invalid_config(detail: impl Into<String>) -> Self {
        Self {
            reason: AuthErrorReason::InvalidConfig,
            detail: detail.into(),
        }
    }

    pub fn token_acquisition_failed(detail: impl Into<String>) -> Self {
        Self {
            reason: AuthErrorReason::TokenAcquisitionFailed,
            detail: detail.into(),
        }
    }
}

/// Curl command import failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Nothing to parse.
    #[error("Curl command cannot be empty")]
    Empty,

    /// First token is not `curl`.
    #[error("Not a curl command: expected 'curl', found '{0}'")]
    NotCurl(String),

    /// A quoted string was never closed.
    #[error("Unterminated {0} quote")]
    UnterminatedQuote(char),

    /// A flag that takes a value was the last token.
    #[error("Flag '{0}' requires a value")]
    MissingValue(String),

    /// No URL positional argument or `--url` flag.
    #[error("No URL found in curl command")]
    MissingUrl,

    /// The URL could not be parsed.
    #[error("Invalid URL '{0}'")]
    InvalidUrl(String),

    /// Method given with `-X` is not a supported HTTP method.
    #[error("Unsupported HTTP method: {0}")]
    UnsupportedMethod(String),
}

/// Failure while sending a request or reading its response.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Deadline exceeded before a response was received.
    #[error("Request timed out after {} ms", .0.as_millis())]
    Timeout(Duration),

    /// Target URL could not be built or parsed.
    #[error("Invalid URL '{url}': {detail}")]
    InvalidUrl { url: String, detail: String },

    /// Connection, TLS or protocol failure.
    #[error("Request failed: {0}")]
    Request(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        TransportError::Request(e.to_string())
    }
}

/// Crate-level error for callers that want a single type.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(String),

    /// Input failed validation.
    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Json(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AuthError::token_acquisition_failed("HTTP 500");
        assert_eq!(
            err.to_string(),
            "Authentication error (token_acquisition_failed): HTTP 500"
        );

        let err = TransportError::Timeout(Duration::from_secs(2));
        assert_eq!(err.to_string(), "Request timed out after 2000 ms");

        let err = ParseError::MissingValue("-H".to_string());
        assert_eq!(err.to_string(), "Flag '-H' requires a value");
    }

    #[test]
    fn test_error_from_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: CoreError = json_err.into();
        assert!(matches!(err, CoreError::Json(_)));
    }

    #[test]
    fn test_auth_error_reason_serialization() {
        let json = serde_json::to_string(&AuthErrorReason::InvalidConfig).unwrap();
        assert_eq!(json, "\"invalid_config\"");
    }
}
