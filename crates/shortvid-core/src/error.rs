//! Error types module
//!
//! `AppError` covers failures outside the publish pipeline (request validation,
//! authentication, repository access). Every error type that reaches a client
//! implements [`ErrorMetadata`], which tells the HTTP layer how to render it.
//!
//! The `Database` variant and `From<sqlx::Error>` are gated behind the `sqlx` feature.

use std::io;

#[cfg(feature = "sqlx")]
use sqlx::Error as SqlxError;

/// Envelope status codes carried in the `status_code` field of every response.
pub mod status {
    pub const OK: i32 = 0;
    pub const INVALID_REQUEST: i32 = 1;
    pub const UNAUTHORIZED: i32 = 2;
    pub const NOT_FOUND: i32 = 3;
    pub const STAGING_IO: i32 = 10;
    pub const EXTRACTION: i32 = 11;
    pub const ENCODE: i32 = 12;
    pub const STORAGE: i32 = 13;
    pub const PERSISTENCE: i32 = 14;
    pub const TIMEOUT: i32 = 15;
    pub const INTERNAL: i32 = 50;
}

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata for error responses - defines how an error should be presented
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Non-zero status code placed in the response envelope
    fn envelope_status(&self) -> i32;

    /// Machine-readable error code (e.g., "DATABASE_ERROR")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Client-facing message (never includes paths, keys or driver output)
    fn client_message(&self) -> String;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[source] SqlxError),

    #[cfg(not(feature = "sqlx"))]
    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

#[cfg(feature = "sqlx")]
impl From<SqlxError> for AppError {
    fn from(err: SqlxError) -> Self {
        AppError::Database(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Internal(format!("IO error: {}", err))
    }
}

/// Static metadata for each variant: (http_status, envelope_status, error_code, recoverable, log_level).
fn app_error_static_metadata(err: &AppError) -> (u16, i32, &'static str, bool, LogLevel) {
    match err {
        AppError::Database(_) => (
            500,
            status::PERSISTENCE,
            "DATABASE_ERROR",
            true,
            LogLevel::Error,
        ),
        AppError::InvalidInput(_) => (
            400,
            status::INVALID_REQUEST,
            "INVALID_INPUT",
            false,
            LogLevel::Debug,
        ),
        AppError::NotFound(_) => (404, status::NOT_FOUND, "NOT_FOUND", false, LogLevel::Debug),
        AppError::Unauthorized(_) => (
            401,
            status::UNAUTHORIZED,
            "UNAUTHORIZED",
            false,
            LogLevel::Debug,
        ),
        AppError::Internal(_) | AppError::InternalWithSource { .. } => (
            500,
            status::INTERNAL,
            "INTERNAL_ERROR",
            true,
            LogLevel::Error,
        ),
    }
}

impl AppError {
    /// Get the error type name for log fields
    pub fn error_type(&self) -> &str {
        match self {
            AppError::Database(_) => "Database",
            AppError::InvalidInput(_) => "InvalidInput",
            AppError::NotFound(_) => "NotFound",
            AppError::Unauthorized(_) => "Unauthorized",
            AppError::Internal(_) | AppError::InternalWithSource { .. } => "Internal",
        }
    }

    /// Get detailed error information including error chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        app_error_static_metadata(self).0
    }

    fn envelope_status(&self) -> i32 {
        app_error_static_metadata(self).1
    }

    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).2
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).3
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).4
    }

    fn client_message(&self) -> String {
        match self {
            AppError::Database(_) => "Failed to access database".to_string(),
            AppError::InvalidInput(ref msg) => msg.clone(),
            AppError::NotFound(ref msg) => msg.clone(),
            AppError::Unauthorized(ref msg) => msg.clone(),
            AppError::Internal(_) | AppError::InternalWithSource { .. } => {
                "Internal server error".to_string()
            }
        }
    }
}
