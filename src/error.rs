//! Error types for the Local Line client.
//!
//! Every failure the crate can surface is classified onto one of the
//! [`ErrorCode`] values that callers (the CLI, a tool host, a script) switch
//! on. Transport and decoding errors keep their source for logging but are
//! reported under the code of the class they belong to.

use std::fmt;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// A specialized `Result` type for Local Line operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Recovery instructions attached to every `AUTH_FAILED` result.
pub const AUTH_RUNBOOK: &str = "Re-export LOCALLINE_USERNAME and LOCALLINE_PASSWORD, \
run `localline auth-bootstrap`, then retry the original command";

/// Stable result codes exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Bad input, rejected before any network call.
    ValidationError,
    /// Credential or token rejected; requires an operator bootstrap.
    AuthFailed,
    /// Rate-limit backoff budget exhausted.
    RateLimited,
    /// Network failures or 5xx responses exhausted the retry budget.
    UpstreamUnavailable,
    /// The vendor rejected a well-formed request.
    RequestInvalid,
    /// The credential store could not be read or written.
    StoreUnavailable,
}

impl ErrorCode {
    /// The wire name of this code, e.g. `AUTH_FAILED`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::AuthFailed => "AUTH_FAILED",
            ErrorCode::RateLimited => "RATE_LIMITED",
            ErrorCode::UpstreamUnavailable => "UPSTREAM_UNAVAILABLE",
            ErrorCode::RequestInvalid => "REQUEST_INVALID",
            ErrorCode::StoreUnavailable => "STORE_UNAVAILABLE",
        }
    }

    /// Process exit status used by the command-line front end.
    pub fn exit_code(&self) -> i32 {
        match self {
            ErrorCode::ValidationError => 2,
            ErrorCode::AuthFailed => 3,
            ErrorCode::RateLimited => 4,
            ErrorCode::UpstreamUnavailable => 5,
            ErrorCode::RequestInvalid => 6,
            ErrorCode::StoreUnavailable => 7,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The main error type for all Local Line operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid input provided to an operation
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Authentication failed (rejected credentials or refresh token)
    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    /// Rate limited by the API and the backoff budget is spent
    #[error("Rate limited after {attempts} attempts")]
    RateLimited {
        /// Attempts made, including the first
        attempts: u32,
        /// Last `Retry-After` value announced by the server
        retry_after_secs: Option<u64>,
    },

    /// Transient failures exhausted the retry budget
    #[error("Upstream unavailable after {attempts} attempts: {reason}")]
    UpstreamUnavailable {
        /// Attempts made, including the first
        attempts: u32,
        /// Last failure observed
        reason: String,
    },

    /// API rejected the request
    #[error("Request rejected: status={status}, message={message}")]
    RequestInvalid {
        /// HTTP status code
        status: u16,
        /// Human-readable error message
        message: String,
        /// Vendor error payload
        body: Value,
    },

    /// Credential store read or write failed
    #[error("Credential store unavailable: {0}")]
    StoreUnavailable(String),

    /// HTTP transport error that was not retried
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV rendering failed
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// URL parsing error
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// The caller-facing classification of this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::Validation(_) | Error::Config(_) | Error::UrlParse(_) | Error::Csv(_) => {
                ErrorCode::ValidationError
            }
            Error::AuthFailed(_) => ErrorCode::AuthFailed,
            Error::RateLimited { .. } => ErrorCode::RateLimited,
            Error::UpstreamUnavailable { .. } | Error::Http(_) | Error::Json(_) => {
                ErrorCode::UpstreamUnavailable
            }
            Error::RequestInvalid { .. } => ErrorCode::RequestInvalid,
            Error::StoreUnavailable(_) => ErrorCode::StoreUnavailable,
        }
    }

    /// Returns `true` if this error is potentially transient and the
    /// operation could be retried by the caller later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Http(_) | Error::RateLimited { .. } | Error::UpstreamUnavailable { .. }
        )
    }

    /// Returns `true` if this is an authentication-related error.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Error::AuthFailed(_))
    }

    /// Operator instructions for recovering from this error, if any.
    pub fn fix(&self) -> Option<&'static str> {
        match self.code() {
            ErrorCode::AuthFailed => Some(AUTH_RUNBOOK),
            _ => None,
        }
    }

    /// The human-readable reason without the class prefix.
    pub fn reason(&self) -> String {
        match self {
            Error::Validation(reason)
            | Error::AuthFailed(reason)
            | Error::StoreUnavailable(reason)
            | Error::Config(reason) => reason.clone(),
            other => other.to_string(),
        }
    }

    /// Create a request error from a rejected response.
    pub(crate) fn from_api_response(status: u16, body: Value) -> Self {
        let message = vendor_message(&body).unwrap_or_else(|| "Unknown API error".to_string());

        Error::RequestInvalid {
            status,
            message,
            body,
        }
    }
}

/// Pull a human-readable message out of a vendor error payload.
///
/// The backoffice API answers with `{"detail": ...}` for most failures and
/// with a field → messages map for validation failures.
pub(crate) fn vendor_message(body: &Value) -> Option<String> {
    for key in ["detail", "message", "error"] {
        if let Some(text) = body.get(key).and_then(Value::as_str) {
            return Some(text.to_string());
        }
    }

    if let Some(errors) = body.get("non_field_errors").and_then(Value::as_array) {
        let joined: Vec<&str> = errors.iter().filter_map(Value::as_str).collect();
        if !joined.is_empty() {
            return Some(joined.join("; "));
        }
    }

    if let Some(text) = body.as_str() {
        return Some(text.to_string());
    }

    if let Some(raw) = body.get("raw").and_then(Value::as_str) {
        return Some(raw.chars().take(200).collect());
    }

    None
}

/// Clonable summary of an [`Error`], for results shared between tasks.
#[derive(Debug, Clone)]
pub(crate) struct ErrorSummary {
    code: ErrorCode,
    reason: String,
}

impl From<&Error> for ErrorSummary {
    fn from(err: &Error) -> Self {
        Self {
            code: err.code(),
            reason: err.reason(),
        }
    }
}

impl From<ErrorSummary> for Error {
    fn from(summary: ErrorSummary) -> Self {
        match summary.code {
            ErrorCode::StoreUnavailable => Error::StoreUnavailable(summary.reason),
            ErrorCode::ValidationError => Error::Validation(summary.reason),
            _ => Error::AuthFailed(summary.reason),
        }
    }
}
