//! Error Normalizer
//!
//! Converts every raw request failure into one stable [`EnhancedError`]
//! shape. Classification:
//!
//! | Raw failure                         | `error_code`    |
//! |-------------------------------------|-----------------|
//! | connection could not be established | `NETWORK_ERROR` |
//! | request timed out                   | `TIMEOUT`       |
//! | request sent, nothing came back     | `NO_RESPONSE`   |
//! | non-2xx response                    | `HTTP_<status>` |
//! | anything else                       | `CLIENT_ERROR`  |
//!
//! For HTTP failures the message comes from the structured body when there is
//! one (`message`, then a string `detail`), with field-level validation
//! errors appended as `field: message` pairs; otherwise the status line.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

/// Closed error taxonomy carried by every [`EnhancedError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No connectivity to the backend
    NetworkError,
    /// Request was sent but no response came back
    NoResponse,
    /// Request exceeded its timeout
    Timeout,
    /// Backend answered with a non-2xx status
    Http(u16),
    /// Anything else, including programming errors in the caller
    ClientError,
}

impl ErrorKind {
    /// Transient failures that are safe to retry automatically
    pub fn is_retryable(&self) -> bool {
        match self {
            ErrorKind::NetworkError | ErrorKind::NoResponse | ErrorKind::Timeout => true,
            ErrorKind::Http(status) => *status >= 500,
            ErrorKind::ClientError => false,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::NetworkError => f.write_str("NETWORK_ERROR"),
            ErrorKind::NoResponse => f.write_str("NO_RESPONSE"),
            ErrorKind::Timeout => f.write_str("TIMEOUT"),
            ErrorKind::Http(status) => write!(f, "HTTP_{}", status),
            ErrorKind::ClientError => f.write_str("CLIENT_ERROR"),
        }
    }
}

/// Unrecognized error code string
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown error code: {0}")]
pub struct ParseErrorKindError(pub String);

impl FromStr for ErrorKind {
    type Err = ParseErrorKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NETWORK_ERROR" => Ok(ErrorKind::NetworkError),
            "NO_RESPONSE" => Ok(ErrorKind::NoResponse),
            "TIMEOUT" => Ok(ErrorKind::Timeout),
            "CLIENT_ERROR" => Ok(ErrorKind::ClientError),
            other => other
                .strip_prefix("HTTP_")
                .and_then(|status| status.parse::<u16>().ok())
                .map(ErrorKind::Http)
                .ok_or_else(|| ParseErrorKindError(other.to_string())),
        }
    }
}

impl Serialize for ErrorKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ErrorKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = String::deserialize(deserializer)?;
        code.parse().map_err(serde::de::Error::custom)
    }
}

/// A failure as observed at the transport boundary, before normalization
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawFailure {
    /// Connection could not be established
    Connect(String),
    /// Request timed out
    Timeout(String),
    /// Request went out but no response object came back
    NoResponse(String),
    /// Non-2xx response with its raw body
    Status { status: u16, body: String },
    /// Response arrived but could not be decoded
    Malformed(String),
    /// Request could not be built or any other caller-side failure
    Client(String),
}

impl fmt::Display for RawFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawFailure::Connect(message) => write!(f, "connect failed: {}", message),
            RawFailure::Timeout(message) => write!(f, "timed out: {}", message),
            RawFailure::NoResponse(message) => write!(f, "no response: {}", message),
            RawFailure::Status { status, .. } => write!(f, "status {}", status),
            RawFailure::Malformed(message) => write!(f, "malformed response: {}", message),
            RawFailure::Client(message) => write!(f, "client error: {}", message),
        }
    }
}

impl From<reqwest::Error> for RawFailure {
    fn from(err: reqwest::Error) -> Self {
        let message = err.to_string();

        if err.is_timeout() {
            RawFailure::Timeout(message)
        } else if err.is_connect() {
            RawFailure::Connect(message)
        } else if let Some(status) = err.status() {
            RawFailure::Status {
                status: status.as_u16(),
                body: String::new(),
            }
        } else if err.is_decode() {
            RawFailure::Malformed(message)
        } else if err.is_request() || err.is_body() {
            RawFailure::NoResponse(message)
        } else {
            RawFailure::Client(message)
        }
    }
}

impl From<serde_json::Error> for RawFailure {
    fn from(err: serde_json::Error) -> Self {
        RawFailure::Malformed(err.to_string())
    }
}

/// Where a failed request was headed
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RequestContext {
    pub url: String,
    pub method: String,
}

impl RequestContext {
    pub fn new(url: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: method.into(),
        }
    }
}

/// Normalized, immutable error shape exposed to every consumer.
///
/// The raw failure is kept for diagnostics but never serialized, so UI
/// consumers only see the stable fields.
#[derive(Debug, Clone, Serialize, Error)]
#[serde(rename_all = "camelCase")]
#[error("{error_code}: {message}")]
pub struct EnhancedError {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    status_code: Option<u16>,
    error_code: ErrorKind,
    #[serde(skip)]
    original_error: Arc<RawFailure>,
    timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_method: Option<String>,
}

impl EnhancedError {
    /// Build a `CLIENT_ERROR` for failures originating in the caller
    pub fn client(message: impl Into<String>) -> Self {
        normalize(RawFailure::Client(message.into()), None)
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn status_code(&self) -> Option<u16> {
        self.status_code
    }

    pub fn error_code(&self) -> ErrorKind {
        self.error_code
    }

    pub fn original_error(&self) -> &RawFailure {
        &self.original_error
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn request_url(&self) -> Option<&str> {
        self.request_url.as_deref()
    }

    pub fn request_method(&self) -> Option<&str> {
        self.request_method.as_deref()
    }

    /// Transient by code, or any server-side (5xx) status
    pub fn is_retryable(&self) -> bool {
        self.error_code.is_retryable() || self.status_code.is_some_and(|status| status >= 500)
    }
}

/// Convert a raw failure into an [`EnhancedError`]. Total: never panics.
pub fn normalize(raw: RawFailure, context: Option<&RequestContext>) -> EnhancedError {
    let (message, status_code, error_code) = match &raw {
        RawFailure::Connect(_) => (
            "Network error: unable to reach the server".to_string(),
            None,
            ErrorKind::NetworkError,
        ),
        RawFailure::Timeout(_) => (
            "Request timed out".to_string(),
            None,
            ErrorKind::Timeout,
        ),
        RawFailure::NoResponse(_) => (
            "No response received from the server".to_string(),
            None,
            ErrorKind::NoResponse,
        ),
        RawFailure::Status { status, body } => {
            (http_message(*status, body), Some(*status), ErrorKind::Http(*status))
        }
        RawFailure::Malformed(detail) => (
            format!("Malformed response: {}", detail),
            None,
            ErrorKind::ClientError,
        ),
        RawFailure::Client(detail) => (detail.clone(), None, ErrorKind::ClientError),
    };

    EnhancedError {
        message,
        status_code,
        error_code,
        original_error: Arc::new(raw),
        timestamp: Utc::now(),
        request_url: context.map(|ctx| ctx.url.clone()),
        request_method: context.map(|ctx| ctx.method.clone()),
    }
}

/// Status line used when the body carries no readable message
fn status_line(status: u16) -> String {
    match reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|code| code.canonical_reason())
    {
        Some(reason) => format!("HTTP {} {}", status, reason),
        None => format!("HTTP {}", status),
    }
}

/// Message for a non-2xx response, from `{status, message, detail?: {errors}}`
fn http_message(status: u16, body: &str) -> String {
    let Ok(json) = serde_json::from_str::<Value>(body) else {
        return status_line(status);
    };

    let text = |key: &str| {
        json.get(key)
            .and_then(Value::as_str)
            .filter(|message| !message.trim().is_empty())
    };
    let headline = text("message").or_else(|| text("detail")).map(str::to_string);

    let field_errors: Vec<String> = json
        .pointer("/detail/errors")
        .and_then(Value::as_array)
        .map(|errors| {
            errors
                .iter()
                .filter_map(|entry| {
                    let field = entry.get("field")?.as_str()?;
                    let message = entry.get("message")?.as_str()?;
                    Some(format!("{}: {}", field, message))
                })
                .collect()
        })
        .unwrap_or_default();

    match (headline, field_errors.is_empty()) {
        (Some(headline), true) => headline,
        (Some(headline), false) => format!("{}: {}", headline, field_errors.join(", ")),
        (None, false) => format!("{}: {}", status_line(status), field_errors.join(", ")),
        (None, true) => status_line(status),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn status(status: u16, body: Value) -> RawFailure {
        RawFailure::Status {
            status,
            body: body.to_string(),
        }
    }

    #[test]
    fn test_structured_server_error_uses_body_message() {
        let error = normalize(
            status(500, json!({"status": "error", "message": "db unavailable"})),
            None,
        );

        assert_eq!(error.error_code(), ErrorKind::Http(500));
        assert_eq!(error.error_code().to_string(), "HTTP_500");
        assert_eq!(error.message(), "db unavailable");
        assert_eq!(error.status_code(), Some(500));
        assert!(error.is_retryable());
    }

    #[test]
    fn test_validation_errors_are_appended() {
        let body = json!({
            "status": "error",
            "message": "Validation failed",
            "detail": {"errors": [
                {"field": "page_size", "message": "must be <= 500", "type": "value_error"},
                {"field": "sort_by", "message": "unknown column", "type": "value_error"}
            ]}
        });
        let error = normalize(status(422, body), None);

        assert_eq!(
            error.message(),
            "Validation failed: page_size: must be <= 500, sort_by: unknown column"
        );
        assert_eq!(error.error_code(), ErrorKind::Http(422));
        assert!(!error.is_retryable());
    }

    #[test]
    fn test_string_detail_is_used_as_message() {
        let error = normalize(status(404, json!({"detail": "Agent not found"})), None);
        assert_eq!(error.message(), "Agent not found");
    }

    #[test]
    fn test_blank_message_defers_to_detail() {
        let error = normalize(
            status(409, json!({"status": "error", "message": "  ", "detail": "Rule already exists"})),
            None,
        );
        assert_eq!(error.message(), "Rule already exists");
    }

    #[test]
    fn test_unstructured_body_falls_back_to_status_line() {
        let error = normalize(
            RawFailure::Status {
                status: 502,
                body: "<html>bad gateway</html>".to_string(),
            },
            None,
        );
        assert_eq!(error.message(), "HTTP 502 Bad Gateway");
        assert_eq!(error.error_code(), ErrorKind::Http(502));
    }

    #[test]
    fn test_transport_failures_classify() {
        let ctx = RequestContext::new("http://localhost:8000/api/v1/events/", "GET");

        let error = normalize(RawFailure::Connect("refused".into()), Some(&ctx));
        assert_eq!(error.error_code(), ErrorKind::NetworkError);
        assert_eq!(error.request_url(), Some("http://localhost:8000/api/v1/events/"));
        assert_eq!(error.request_method(), Some("GET"));

        let error = normalize(RawFailure::Timeout("10s".into()), None);
        assert_eq!(error.error_code(), ErrorKind::Timeout);
        assert!(error.status_code().is_none());

        let error = normalize(RawFailure::NoResponse("reset".into()), None);
        assert_eq!(error.error_code(), ErrorKind::NoResponse);

        let error = normalize(RawFailure::Malformed("eof".into()), None);
        assert_eq!(error.error_code(), ErrorKind::ClientError);
        assert!(!error.is_retryable());
    }

    #[test]
    fn test_error_code_round_trips_through_strings() {
        for kind in [
            ErrorKind::NetworkError,
            ErrorKind::NoResponse,
            ErrorKind::Timeout,
            ErrorKind::Http(503),
            ErrorKind::ClientError,
        ] {
            assert_eq!(kind.to_string().parse::<ErrorKind>(), Ok(kind));
        }
        assert!("HTTP_abc".parse::<ErrorKind>().is_err());
    }

    #[test]
    fn test_serialized_shape_hides_original_error() {
        let ctx = RequestContext::new("http://localhost/api/v1/alerts/", "POST");
        let error = normalize(status(400, json!({"message": "bad filter"})), Some(&ctx));
        let value = serde_json::to_value(&error).unwrap();

        assert_eq!(value["errorCode"], "HTTP_400");
        assert_eq!(value["statusCode"], 400);
        assert_eq!(value["message"], "bad filter");
        assert_eq!(value["requestMethod"], "POST");
        assert!(value.get("originalError").is_none());
        assert!(value["timestamp"].is_string());
    }
}
