//! Error model used by GitLab API client operations.

use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GitLabError>;

/// Error conditions raised while talking to GitLab: non-success HTTP responses carrying the
/// parsed server message, rejected credentials, timeouts, transport failures and payload
/// (de)serialization problems.
#[derive(Debug, Error)]
pub enum GitLabError {
    #[error("http {status}: {message}")]
    Http { status: StatusCode, message: String },
    #[error("authentication error: {0}")]
    Authentication(String),
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("unexpected error: {0}")]
    Other(String),
}

impl GitLabError {
    /// Builds an HTTP error from a raw response body, preferring the server supplied message.
    pub fn from_response(status: StatusCode, body: &str) -> Self {
        let message = extract_error_message(body).unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                format!("HTTP {}", status.as_u16())
            } else {
                trimmed.to_string()
            }
        });
        GitLabError::Http { status, message }
    }

    /// Text suitable for showing to a user, without transport prefixes.
    pub fn user_message(&self) -> String {
        match self {
            GitLabError::Http { message, .. } => message.clone(),
            GitLabError::Authentication(message) => message.clone(),
            GitLabError::Timeout(_) => "GitLab did not respond in time".to_string(),
            GitLabError::Network(message) => format!("Could not reach GitLab: {message}"),
            GitLabError::Serialization(message) => {
                format!("Unexpected response from GitLab: {message}")
            }
            GitLabError::Other(message) => message.clone(),
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            GitLabError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Pulls a human readable message from a GitLab error body.
///
/// GitLab answers with `{"message": "..."}`, `{"message": {"field": ["..."]}}`
/// or `{"error": "..."}` depending on the endpoint.
pub fn extract_error_message(body: &str) -> Option<String> {
    let value = serde_json::from_str::<Value>(body).ok()?;
    value
        .get("message")
        .and_then(flatten_message)
        .or_else(|| value.get("error").and_then(flatten_message))
        .filter(|message| !message.is_empty())
}

fn flatten_message(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(flatten_message).collect();
            (!parts.is_empty()).then(|| parts.join(", "))
        }
        Value::Object(fields) => {
            let parts: Vec<String> = fields
                .iter()
                .filter_map(|(field, inner)| {
                    flatten_message(inner).map(|text| format!("{field} {text}"))
                })
                .collect();
            (!parts.is_empty()).then(|| parts.join("; "))
        }
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

impl From<reqwest::Error> for GitLabError {
    /// Converts reqwest errors into semantic GitLabError variants.
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GitLabError::Timeout(err.to_string())
        } else if err.is_status() {
            let status = err.status().unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            GitLabError::Http {
                status,
                message: err.to_string(),
            }
        } else if err.is_connect() || err.is_request() {
            GitLabError::Network(err.to_string())
        } else if err.is_decode() {
            GitLabError::Serialization(err.to_string())
        } else {
            GitLabError::Other(err.to_string())
        }
    }
}

impl From<serde_json::Error> for GitLabError {
    fn from(err: serde_json::Error) -> Self {
        GitLabError::Serialization(err.to_string())
    }
}
