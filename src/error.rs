//! Unified client error model.
//! Every failure the core reports is one of these variants, decoded once at the
//! HTTP boundary so callers never inspect raw response bodies.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Network,
    Client,
    Server,
    NotFound,
    InvalidCredentials,
    AuthenticationFailure,
    Decode,
    Config,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::Network => "network_error",
            ErrorKind::Client => "client_error",
            ErrorKind::Server => "server_error",
            ErrorKind::NotFound => "not_found",
            ErrorKind::InvalidCredentials => "invalid_credentials",
            ErrorKind::AuthenticationFailure => "authentication_failure",
            ErrorKind::Decode => "decode_error",
            ErrorKind::Config => "config_error",
        };
        f.write_str(s)
    }
}

/// Errors surfaced by the API client and session layer.
///
/// `Clone` because a single refresh failure is delivered to every request that
/// was queued behind it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ApiError {
    /// The request never produced a response (offline, DNS, timeout).
    #[error("network error: {message}")]
    Network { message: String },
    /// Any 4xx other than the ones with a dedicated variant.
    #[error("client error (HTTP {status}): {}", display_msg(.message))]
    Client { status: u16, message: Option<String> },
    #[error("server error (HTTP {status}): {}", display_msg(.message))]
    Server { status: u16, message: Option<String> },
    #[error("not found: {}", display_msg(.message))]
    NotFound { message: Option<String> },
    #[error("invalid credentials: {}", display_msg(.message))]
    InvalidCredentials { message: Option<String> },
    /// Terminal: refresh failed, or an auth endpoint itself answered 401.
    /// Local credentials are already cleared when this is returned.
    #[error("authentication failure: {}", display_msg(.message))]
    AuthenticationFailure { message: Option<String> },
    #[error("failed to decode response: {message}")]
    Decode { message: String },
    #[error("configuration error: {message}")]
    Config { message: String },
}

fn display_msg(m: &Option<String>) -> &str {
    m.as_deref().unwrap_or("<no message>")
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn network<S: Into<String>>(msg: S) -> Self { ApiError::Network { message: msg.into() } }
    pub fn decode<S: Into<String>>(msg: S) -> Self { ApiError::Decode { message: msg.into() } }
    pub fn config<S: Into<String>>(msg: S) -> Self { ApiError::Config { message: msg.into() } }
    pub fn auth_failure(message: Option<String>) -> Self { ApiError::AuthenticationFailure { message } }

    /// Classify a non-success HTTP status. 404 gets its own variant; 401 is
    /// reported as a plain client error here because the interception layer
    /// decides whether it becomes a refresh or a terminal failure.
    pub fn from_status(status: u16, message: Option<String>) -> Self {
        match status {
            404 => ApiError::NotFound { message },
            400..=499 => ApiError::Client { status, message },
            _ => ApiError::Server { status, message },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Network { .. } => ErrorKind::Network,
            ApiError::Client { .. } => ErrorKind::Client,
            ApiError::Server { .. } => ErrorKind::Server,
            ApiError::NotFound { .. } => ErrorKind::NotFound,
            ApiError::InvalidCredentials { .. } => ErrorKind::InvalidCredentials,
            ApiError::AuthenticationFailure { .. } => ErrorKind::AuthenticationFailure,
            ApiError::Decode { .. } => ErrorKind::Decode,
            ApiError::Config { .. } => ErrorKind::Config,
        }
    }

    /// HTTP status when the error came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Client { status, .. } | ApiError::Server { status, .. } => Some(*status),
            ApiError::NotFound { .. } => Some(404),
            _ => None,
        }
    }

    /// Message supplied by the server in the error body, if any.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            ApiError::Client { message, .. }
            | ApiError::Server { message, .. }
            | ApiError::NotFound { message }
            | ApiError::InvalidCredentials { message }
            | ApiError::AuthenticationFailure { message } => message.as_deref(),
            ApiError::Network { .. } | ApiError::Decode { .. } | ApiError::Config { .. } => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::Network { .. } | ApiError::Server { .. })
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return ApiError::Decode { message: err.to_string() };
        }
        if let Some(status) = err.status() {
            return ApiError::from_status(status.as_u16(), None);
        }
        // connect, timeout, request, body: nothing usable came back
        ApiError::Network { message: err.to_string() }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Decode { message: err.to_string() }
    }
}

/// Pull a human-readable message out of an error body.
/// Accepts `{"message": ..}` or `{"error": ..}`; anything else yields `None`.
pub fn extract_server_message(body: &str) -> Option<String> {
    let v: serde_json::Value = serde_json::from_str(body).ok()?;
    v.get("message")
        .or_else(|| v.get("error"))
        .and_then(|m| m.as_str())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert_eq!(ApiError::from_status(400, None).kind(), ErrorKind::Client);
        assert_eq!(ApiError::from_status(401, None).kind(), ErrorKind::Client);
        assert_eq!(ApiError::from_status(404, None).kind(), ErrorKind::NotFound);
        assert_eq!(ApiError::from_status(500, None).kind(), ErrorKind::Server);
        assert_eq!(ApiError::from_status(503, None).status(), Some(503));
    }

    #[test]
    fn retryable_kinds() {
        assert!(ApiError::network("offline").is_retryable());
        assert!(ApiError::from_status(502, None).is_retryable());
        assert!(!ApiError::from_status(409, None).is_retryable());
        assert!(!ApiError::auth_failure(None).is_retryable());
        assert!(!ApiError::decode("bad json").is_retryable());
    }

    #[test]
    fn server_message_extraction() {
        assert_eq!(extract_server_message(r#"{"message":"Invalid email"}"#).as_deref(), Some("Invalid email"));
        assert_eq!(extract_server_message(r#"{"error":"nope"}"#).as_deref(), Some("nope"));
        assert_eq!(extract_server_message("<html>oops</html>"), None);
        assert_eq!(extract_server_message(r#"{"message":42}"#), None);

        let e = ApiError::from_status(422, extract_server_message(r#"{"message":"title required"}"#));
        assert_eq!(e.server_message(), Some("title required"));
        assert_eq!(e.to_string(), "client error (HTTP 422): title required");
    }

    #[test]
    fn display_without_message() {
        let e = ApiError::NotFound { message: None };
        assert_eq!(e.to_string(), "not found: <no message>");
        assert_eq!(ErrorKind::AuthenticationFailure.to_string(), "authentication_failure");
    }
}
