// Error taxonomy for the routing API client
//
// Every failure the client can produce is an `ApiError`. Errors are plain data
// (messages, status codes, parsed bodies) so they can be cloned into monitor
// state and rendered later with an actionable hint.
//
// Localization Support:
// Hint labels follow the LANG environment variable, same as the rest of the
// CLI output. English is the default.

use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// A response payload that failed schema or range checks.
///
/// `field` is a JSON path to the first offending value
/// (e.g. `model_metrics[2].confidence`).
#[derive(Debug, Clone, PartialEq, Error)]
#[error("malformed response: `{field}` {reason}")]
pub struct ValidationError {
    pub field: String,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("request to {endpoint} rejected with status {status}: {message}")]
    Client {
        endpoint: String,
        status: u16,
        message: String,
        body: Option<Value>,
    },

    /// 5xx after retries, or a transport failure after retries (`status` is None)
    #[error("request to {endpoint} failed after {attempts} attempt(s): {message}")]
    Server {
        endpoint: String,
        status: Option<u16>,
        message: String,
        attempts: u32,
    },

    #[error("request to {endpoint} timed out after {timeout_ms}ms")]
    Timeout { endpoint: String, timeout_ms: u64 },

    #[error("query submission returned unexpected status {status}")]
    QuerySubmission { status: u16, body: Option<Value> },

    #[error("job {job_id} failed: {message}")]
    JobFailed { job_id: String, message: String },

    #[error("job {job_id} not found")]
    JobNotFound { job_id: String },

    #[error("job {job_id} did not finish within {elapsed_ms}ms ({attempts} polls)")]
    PollingTimeout {
        job_id: String,
        elapsed_ms: u64,
        attempts: u32,
    },

    #[error("query cancelled{}", cancelled_suffix(.job_id))]
    Cancelled { job_id: Option<String> },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("failed to build HTTP client: {0}")]
    Build(String),
}

fn cancelled_suffix(job_id: &Option<String>) -> String {
    match job_id {
        Some(id) => format!(" while polling job {}", id),
        None => String::new(),
    }
}

/// Coarse classification used by callers deciding how to degrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Client,
    Server,
    Timeout,
    QuerySubmission,
    JobFailed,
    JobNotFound,
    PollingTimeout,
    Cancelled,
    InvalidRequest,
    Build,
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Validation(_) => ErrorKind::Validation,
            ApiError::Client { .. } => ErrorKind::Client,
            ApiError::Server { .. } => ErrorKind::Server,
            ApiError::Timeout { .. } => ErrorKind::Timeout,
            ApiError::QuerySubmission { .. } => ErrorKind::QuerySubmission,
            ApiError::JobFailed { .. } => ErrorKind::JobFailed,
            ApiError::JobNotFound { .. } => ErrorKind::JobNotFound,
            ApiError::PollingTimeout { .. } => ErrorKind::PollingTimeout,
            ApiError::Cancelled { .. } => ErrorKind::Cancelled,
            ApiError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            ApiError::Build(_) => ErrorKind::Build,
        }
    }

    /// HTTP status carried by the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Client { status, .. } => Some(*status),
            ApiError::Server { status, .. } => *status,
            ApiError::QuerySubmission { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self.status(), Some(401) | Some(403))
    }

    /// Network-level trouble: the backend could not be reached or answered too slowly
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            ApiError::Timeout { .. } | ApiError::Server { status: None, .. }
        )
    }

    /// Suggestion for the presentation layer
    pub fn hint(&self) -> &'static str {
        if self.is_auth() {
            return "Check your API key (NEXTAGI_API_KEY or api.api_key in ~/.nextagi/config.toml).";
        }
        match self {
            ApiError::Timeout { .. } | ApiError::Server { status: None, .. } => {
                "Check your network connection and that the backend is running."
            }
            ApiError::Server { .. } => "The backend reported an internal error. Try again later.",
            ApiError::Validation(_) => {
                "The backend response does not match this client version. Do not retry; upgrade the client or backend."
            }
            ApiError::PollingTimeout { .. } => {
                "The job is still running on the backend. Raise polling.max_polling_time_ms or try again later."
            }
            ApiError::JobNotFound { .. } => "The job expired or was never created. Submit the query again.",
            ApiError::InvalidRequest(_) => "Fix the request parameters and submit again.",
            ApiError::Build(_) => "Check api.base_url and TLS settings in your config.",
            _ => "See the error message above for details.",
        }
    }
}

/// Get the current locale from environment
fn get_locale() -> &'static str {
    if let Ok(lang) = std::env::var("LANG") {
        if lang.starts_with("es") {
            return "es";
        } else if lang.starts_with("fr") {
            return "fr";
        } else if lang.starts_with("de") {
            return "de";
        }
    }
    "en"
}

/// Localized label helper
fn t(key: &str) -> &'static str {
    match (get_locale(), key) {
        ("es", "suggestion") => "Sugerencia",
        ("fr", "suggestion") => "Suggestion",
        ("de", "suggestion") => "Vorschlag",
        ("es", "error") => "Error",
        ("fr", "error") => "Erreur",
        ("de", "error") => "Fehler",
        (_, "suggestion") => "Suggestion",
        _ => "Error",
    }
}

/// Wrap a generic error with a suggestion
pub fn wrap_error_with_suggestion(error: impl fmt::Display, suggestion: &str) -> String {
    format!(
        "\x1b[1;31m{}:\x1b[0m {}\n\n\
        \x1b[1;33m{}:\x1b[0m {}",
        t("error"),
        error,
        t("suggestion"),
        suggestion
    )
}

/// Render an API error the way the CLI prints it
pub fn describe(error: &ApiError) -> String {
    wrap_error_with_suggestion(error, error.hint())
}
