//! # Error Handling
//!
//! Application error type and its mapping to HTTP responses.
//!
//! Lower layers keep their own small error enums (`PathError` for the path
//! pipeline, `StoreError` for the catalog). They are converted into
//! [`AppError`] with `?` at the registry boundary, so handlers only ever see
//! one type.
//!
//! ## Error Categories:
//! - **UnresolvablePath**: the path has no recognizable models directory (422)
//! - **InvalidPath**: the path resolves outside the trusted roots (422)
//! - **Conflict**: the catalog row kept changing during a write (409)
//! - **NotFound / BadRequest / ValidationError**: the usual client errors
//! - **Internal / ConfigError**: server-side problems (500)

use crate::paths::PathError;
use crate::registry::StoreError;
use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use std::fmt;

/// Custom error types for the application.
///
/// ## Usage Example:
/// ```rust
/// return Err(AppError::BadRequest("Invalid JSON".to_string()));
/// ```
#[derive(Debug)]
pub enum AppError {
    /// Internal server errors
    Internal(String),

    /// Client sent invalid or malformed data
    BadRequest(String),

    /// Requested resource was not found
    NotFound(String),

    /// Configuration file or environment variable problems
    ConfigError(String),

    /// User input failed validation rules
    ValidationError(String),

    /// Candidate path could not be rebased onto the models root
    UnresolvablePath(String),

    /// Path lies outside every trusted root
    InvalidPath(String),

    /// Concurrent modification of the same catalog row
    Conflict(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AppError::UnresolvablePath(msg) => write!(f, "Unresolvable path: {}", msg),
            AppError::InvalidPath(msg) => write!(f, "Invalid path: {}", msg),
            AppError::Conflict(msg) => write!(f, "Conflict: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl AppError {
    /// HTTP status plus the machine-readable `type` used in the JSON body.
    fn classify(&self) -> (StatusCode, &'static str, &str) {
        match self {
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            AppError::ConfigError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error", msg),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, "validation_error", msg),
            AppError::UnresolvablePath(msg) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "unresolvable_path", msg)
            }
            AppError::InvalidPath(msg) => (StatusCode::UNPROCESSABLE_ENTITY, "invalid_path", msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg),
        }
    }
}

/// Converts errors into JSON responses:
///
/// ```json
/// {
///   "error": {
///     "type": "invalid_path",
///     "message": "invalid model path '/etc/passwd': ...",
///     "timestamp": "2026-01-01T12:00:00Z"
///   }
/// }
/// ```
impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        self.classify().0
    }

    fn error_response(&self) -> HttpResponse {
        let (status, error_type, message) = self.classify();

        HttpResponse::build(status).json(json!({
            "error": {
                "type": error_type,
                "message": message,
                "timestamp": chrono::Utc::now().to_rfc3339()
            }
        }))
    }
}

impl From<PathError> for AppError {
    fn from(err: PathError) -> Self {
        match err {
            PathError::Unresolvable { .. } => AppError::UnresolvablePath(err.to_string()),
            PathError::Invalid { .. } => AppError::InvalidPath(err.to_string()),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { .. } => AppError::Conflict(err.to_string()),
            StoreError::NotFound { .. } => AppError::NotFound(err.to_string()),
        }
    }
}

/// `?` on an anyhow error becomes an internal error.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

/// JSON parsing errors are almost always the client's fault.
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(format!("JSON parsing error: {}", err))
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

/// Shorthand for `Result<T, AppError>`.
pub type AppResult<T> = Result<T, AppError>;
