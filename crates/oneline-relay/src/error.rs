//! Relay error types and their HTTP rendering.

use axum::extract::rejection::BytesRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// `details` value used when the upstream gave us no body to pass back.
pub const UNKNOWN_ERROR_DETAILS: &str = "Unknown error";

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("server API configuration is missing")]
    ServerMisconfigured,

    #[error("invalid request data format: {0}")]
    MalformedInput(String),

    /// The request body could not be read (too large, aborted, ...).
    #[error("request body rejected: {message}")]
    BodyRejected { status: StatusCode, message: String },

    #[error("{message}")]
    UpstreamFailure {
        message: String,
        status: Option<StatusCode>,
        details: Value,
    },
}

/// JSON body returned to the client for every relay failure.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl RelayError {
    pub fn body_rejected(rejection: &BytesRejection) -> Self {
        Self::BodyRejected {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }

    /// The upstream could not be reached or did not answer in time.
    pub fn transport(err: reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            "upstream request timed out".to_string()
        } else if err.is_connect() {
            "failed to connect to upstream".to_string()
        } else {
            // The endpoint is a server secret; keep it out of client-facing text.
            err.without_url().to_string()
        };

        Self::UpstreamFailure {
            message,
            status: None,
            details: Value::String(UNKNOWN_ERROR_DETAILS.to_string()),
        }
    }

    /// The upstream answered with a non-2xx status.
    pub fn upstream_status(status: StatusCode, body: &[u8]) -> Self {
        Self::UpstreamFailure {
            message: format!("upstream responded with status {}", status.as_u16()),
            status: Some(status),
            details: error_details(body),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::ServerMisconfigured => StatusCode::INTERNAL_SERVER_ERROR,
            Self::MalformedInput(_) => StatusCode::BAD_REQUEST,
            Self::BodyRejected { status, .. } => *status,
            Self::UpstreamFailure { status, .. } => {
                status.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }

    pub fn to_body(&self) -> ErrorBody {
        match self {
            Self::ServerMisconfigured => ErrorBody {
                error: "Server API configuration is missing",
                message: self.to_string(),
                status: None,
                status_text: None,
                details: None,
            },
            Self::MalformedInput(_) => ErrorBody {
                error: "Invalid request data format",
                message: self.to_string(),
                status: None,
                status_text: None,
                details: None,
            },
            Self::BodyRejected { .. } => ErrorBody {
                error: "Invalid request data format",
                message: self.to_string(),
                status: None,
                status_text: None,
                details: None,
            },
            Self::UpstreamFailure {
                message,
                status,
                details,
            } => ErrorBody {
                error: "Proxy request failed",
                message: message.clone(),
                status: status.map(|s| s.as_u16()),
                status_text: status
                    .and_then(|s| s.canonical_reason())
                    .map(str::to_string),
                details: Some(details.clone()),
            },
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self.to_body())).into_response()
    }
}

/// Upstream error body as JSON when it parses, as text when it does not.
fn error_details(body: &[u8]) -> Value {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Value::String(UNKNOWN_ERROR_DETAILS.to_string());
    }
    serde_json::from_slice(body)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body).into_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            RelayError::ServerMisconfigured.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            RelayError::MalformedInput("eof".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            RelayError::upstream_status(StatusCode::TOO_MANY_REQUESTS, b"").status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    #[test]
    fn test_upstream_body_kept_as_json() {
        let err = RelayError::upstream_status(
            StatusCode::SERVICE_UNAVAILABLE,
            br#"{"detail":"overloaded"}"#,
        );
        let body = serde_json::to_value(err.to_body()).unwrap();

        assert_eq!(body["error"], "Proxy request failed");
        assert_eq!(body["status"], 503);
        assert_eq!(body["statusText"], "Service Unavailable");
        assert_eq!(body["details"], json!({"detail": "overloaded"}));
    }

    #[test]
    fn test_upstream_text_body_kept_as_string() {
        let err = RelayError::upstream_status(StatusCode::BAD_GATEWAY, b"<html>bad gateway</html>");
        let body = serde_json::to_value(err.to_body()).unwrap();
        assert_eq!(body["details"], "<html>bad gateway</html>");
    }

    #[test]
    fn test_empty_upstream_body_reports_unknown_error() {
        let err = RelayError::upstream_status(StatusCode::INTERNAL_SERVER_ERROR, b"  ");
        let body = serde_json::to_value(err.to_body()).unwrap();
        assert_eq!(body["details"], UNKNOWN_ERROR_DETAILS);
    }

    #[test]
    fn test_local_errors_omit_upstream_fields() {
        let body = serde_json::to_value(RelayError::ServerMisconfigured.to_body()).unwrap();
        assert_eq!(body["error"], "Server API configuration is missing");
        assert!(body.get("status").is_none());
        assert!(body.get("statusText").is_none());
        assert!(body.get("details").is_none());
    }
}
