//! API error model.
//!
//! Every failed call surfaces as exactly one [`ApiError`]. Non-success HTTP
//! responses are classified by [`ApiError::from_response`], which understands
//! the three error body shapes the backend emits:
//!
//! - `{"error": {"message": "..."}}`
//! - `{"detail": "..."}`
//! - `{"detail": [{"loc": [...], "msg": "...", "type": "..."}]}` (validation)

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Message used for a validation entry that carries no `msg`.
pub const DEFAULT_DETAIL_MESSAGE: &str = "Invalid value";

/// Message for a success response whose body could not be decoded.
pub const DECODE_FAILURE_MESSAGE: &str = "Failed to parse server response";

/// One segment of a validation location path, e.g. `["body", "tags", 0]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Index(u64),
    Key(String),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Index(i) => write!(f, "{}", i),
            PathSegment::Key(k) => f.write_str(k),
        }
    }
}

/// A single field-level validation failure reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationDetail {
    /// Location of the offending field.
    #[serde(default)]
    pub loc: Vec<PathSegment>,

    /// Human-readable message, if the backend supplied one.
    #[serde(default)]
    pub msg: Option<String>,

    /// Machine-readable error type (e.g. `value_error.missing`).
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl ValidationDetail {
    /// The message to show for this entry.
    pub fn message(&self) -> &str {
        self.msg
            .as_deref()
            .filter(|m| !m.is_empty())
            .unwrap_or(DEFAULT_DETAIL_MESSAGE)
    }

    /// Dotted rendering of the location path (`body.tags.0`).
    pub fn field_path(&self) -> String {
        self.loc
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(".")
    }

    /// The last location segment, which names the form field.
    pub fn field(&self) -> Option<String> {
        self.loc.last().map(ToString::to_string)
    }
}

/// Errors produced by the API client.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The backend answered with a non-success status.
    #[error("{message}")]
    Http {
        status: u16,
        message: String,
        /// Present only for structured validation failures.
        details: Option<Vec<ValidationDetail>>,
    },

    /// A success response whose body was not valid JSON for the expected shape.
    #[error("Failed to parse server response")]
    Decode { status: u16, reason: String },

    /// The call could not complete (connection refused, DNS, TLS, ...).
    #[error("Network error: {0}")]
    Network(String),

    /// The CSRF cookie is still absent after a bootstrap call.
    #[error("Missing CSRF token")]
    MissingCsrfToken,

    /// The request could not be built (bad URL, unserializable body, bad header).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ApiError {
    /// Build an HTTP error without validation details.
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        ApiError::Http {
            status,
            message: message.into(),
            details: None,
        }
    }

    /// Build a decode error for a response with the given status.
    pub fn decode(status: u16, reason: impl Into<String>) -> Self {
        ApiError::Decode {
            status,
            reason: reason.into(),
        }
    }

    /// Classify a non-success response body into an error.
    pub fn from_response(status: u16, body: &[u8]) -> Self {
        let fallback = format!("Request failed ({})", status);

        let payload: Value = match serde_json::from_slice(body) {
            Ok(payload) => payload,
            Err(_) => {
                let text = String::from_utf8_lossy(body);
                let text = text.trim();
                let message = if text.is_empty() {
                    fallback
                } else {
                    format!("{}: {}", fallback, text)
                };
                return ApiError::http(status, message);
            }
        };

        if let Some(message) = payload
            .pointer("/error/message")
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty())
        {
            return ApiError::http(status, message);
        }

        match payload.get("detail") {
            Some(Value::String(detail)) if !detail.is_empty() => {
                ApiError::http(status, detail.as_str())
            }
            Some(detail @ Value::Array(_)) => {
                match serde_json::from_value::<Vec<ValidationDetail>>(detail.clone()) {
                    Ok(details) if !details.is_empty() => {
                        let message = details
                            .iter()
                            .map(ValidationDetail::message)
                            .collect::<Vec<_>>()
                            .join("; ");
                        // Field-level details only describe client errors.
                        let details = (400..500).contains(&status).then_some(details);
                        ApiError::Http {
                            status,
                            message,
                            details,
                        }
                    }
                    _ => ApiError::http(status, fallback),
                }
            }
            _ => ApiError::http(status, fallback),
        }
    }

    /// HTTP status associated with the failure, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } | ApiError::Decode { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Human-readable message. Never empty.
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Structured validation entries, when the failure was a validation failure.
    pub fn details(&self) -> Option<&[ValidationDetail]> {
        match self {
            ApiError::Http { details, .. } => details.as_deref(),
            _ => None,
        }
    }

    /// True for 401/403 responses, which trigger CSRF recovery on protected calls.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, ApiError::Http { status: 401 | 403, .. })
    }

    /// True when the failure is a missing CSRF token (backend misconfiguration).
    pub fn is_missing_csrf(&self) -> bool {
        matches!(self, ApiError::MissingCsrfToken)
    }

    /// Map of field name to message, keyed by the last `loc` segment.
    ///
    /// Later entries for the same field overwrite earlier ones.
    pub fn field_errors(&self) -> BTreeMap<String, String> {
        self.details()
            .unwrap_or_default()
            .iter()
            .filter_map(|d| d.field().map(|field| (field, d.message().to_string())))
            .collect()
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_builder() {
            ApiError::InvalidRequest(e.to_string())
        } else {
            ApiError::Network(e.to_string())
        }
    }
}

impl From<url::ParseError> for ApiError {
    fn from(e: url::ParseError) -> Self {
        ApiError::InvalidRequest(e.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        ApiError::InvalidRequest(e.to_string())
    }
}
