//! Error taxonomy and upstream error translation.
//!
//! Three kinds of failure leave this crate: [`ValidationError`] (caller's
//! fault, raised before any network access), [`DocError::Upstream`]
//! (transport/server failure carrying status and endpoint), and
//! [`DocError::SchemaUnavailable`] (both schema strategies failed).
//! Verification outcomes are report values, not errors; see
//! [`crate::verify::Verification`].

use serde_json::Value;
use thiserror::Error;

/// Argument validation errors raised synchronously, before any network access.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("doctype cannot be empty")]
    EmptyDoctype,
    #[error("document name cannot be empty")]
    EmptyName,
    #[error("values map cannot be empty")]
    EmptyValues,
    #[error("method name cannot be empty")]
    EmptyMethod,
    #[error("fieldname cannot be empty")]
    EmptyFieldname,
}

/// Structured transport failure produced by a [`crate::channel::Channel`].
///
/// Carries the HTTP status and endpoint when the failure came from an
/// upstream response, and nothing but a message when it did not (connect
/// errors, decode errors). The raw response body is kept so the translator
/// can dig a human-readable message out of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelError {
    status: Option<u16>,
    endpoint: Option<String>,
    body: Option<String>,
    message: String,
    retryable: bool,
}

impl ChannelError {
    /// Failure before a response arrived (connect, timeout, TLS).
    pub fn transport(endpoint: impl Into<String>, message: impl Into<String>, retryable: bool) -> Self {
        Self {
            status: None,
            endpoint: Some(endpoint.into()),
            body: None,
            message: message.into(),
            retryable,
        }
    }

    /// Upstream responded with a non-success status.
    pub fn status(endpoint: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            endpoint: Some(endpoint.into()),
            body: Some(body.into()),
            message: format!("upstream returned status {status}"),
            retryable: status == 429 || (500..=599).contains(&status),
        }
    }

    /// Response arrived but could not be decoded as the expected shape.
    pub fn decode(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: None,
            endpoint: Some(endpoint.into()),
            body: None,
            message: message.into(),
            retryable: false,
        }
    }

    /// Failure with no transport context at all.
    pub fn other(message: impl Into<String>) -> Self {
        Self {
            status: None,
            endpoint: None,
            body: None,
            message: message.into(),
            retryable: false,
        }
    }

    pub const fn status_code(&self) -> Option<u16> {
        self.status
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn retryable(&self) -> bool {
        self.retryable
    }
}

impl std::fmt::Display for ChannelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.endpoint, self.status) {
            (Some(endpoint), Some(status)) => {
                write!(f, "{} (status {status}, endpoint {endpoint})", self.message)
            }
            (Some(endpoint), None) => write!(f, "{} (endpoint {endpoint})", self.message),
            _ => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for ChannelError {}

/// Top-level domain error returned by every public operation.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DocError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("document '{doctype}/{name}' not found")]
    NotFound { doctype: String, name: String },

    #[error("{operation} failed: {message}")]
    Upstream {
        operation: String,
        status: Option<u16>,
        endpoint: Option<String>,
        message: String,
    },

    #[error("schema for doctype '{doctype}' unavailable: {detail}")]
    SchemaUnavailable { doctype: String, detail: String },

    #[error("field '{fieldname}' not found on doctype '{doctype}'")]
    UnknownField { doctype: String, fieldname: String },

    #[error("create of '{doctype}' could not be verified: {message}")]
    Unverified { doctype: String, message: String },
}

/// Translate a raw channel failure into a [`DocError::Upstream`].
///
/// The most informative message wins, tried in order: an explicit upstream
/// `exception` string, structured `_server_messages` (which arrive as
/// JSON-encoded strings nested one level deep), a generic `message` field,
/// and finally the raw transport message.
pub fn translate(error: ChannelError, operation: &str) -> DocError {
    let message = error
        .body()
        .and_then(extract_server_message)
        .unwrap_or_else(|| error.message().to_owned());

    DocError::Upstream {
        operation: operation.to_owned(),
        status: error.status_code(),
        endpoint: error.endpoint().map(str::to_owned),
        message,
    }
}

fn extract_server_message(body: &str) -> Option<String> {
    let payload: Value = serde_json::from_str(body).ok()?;

    if let Some(exception) = payload.get("exception").and_then(Value::as_str) {
        if !exception.is_empty() {
            return Some(exception.to_owned());
        }
    }

    if let Some(raw) = payload.get("_server_messages") {
        if let Some(flattened) = flatten_messages(&unwrap_nested_json(raw)) {
            return Some(flattened);
        }
    }

    payload
        .get("message")
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
        .map(str::to_owned)
}

/// Attempt-parse-else-literal unwrapping for JSON payloads that embed
/// JSON-encoded strings. Strings that parse as JSON are replaced by their
/// parsed value, recursively; everything else passes through untouched.
pub fn unwrap_nested_json(value: &Value) -> Value {
    match value {
        Value::String(text) => match serde_json::from_str::<Value>(text) {
            Ok(inner) => unwrap_nested_json(&inner),
            Err(_) => value.clone(),
        },
        Value::Array(items) => Value::Array(items.iter().map(unwrap_nested_json).collect()),
        _ => value.clone(),
    }
}

fn flatten_messages(value: &Value) -> Option<String> {
    let parts: Vec<String> = match value {
        Value::Array(items) => items.iter().filter_map(message_text).collect(),
        other => message_text(other).into_iter().collect(),
    };

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("; "))
    }
}

fn message_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        Value::Object(map) => map
            .get("message")
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty())
            .map(str::to_owned),
        _ => None,
    }
}
