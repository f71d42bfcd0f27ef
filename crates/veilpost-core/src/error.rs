//! Error types module
//!
//! All pipeline failures surface to callers as [`AppError`]. Each variant
//! self-describes how it should be presented through [`ErrorMetadata`]; the
//! client-facing message never carries key material, ciphertext, file-system
//! paths or internal error chains.

use std::io;

use crate::encryption::{DecryptionError, EncryptionError};
use crate::models::ScrubErrorKind;

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

    /// Machine-readable error code (e.g., "AUTHENTICATION_FAILURE")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Whether details should be hidden from end users
    fn is_sensitive(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid container: {0}")]
    InvalidContainer(String),

    #[error("Scrub failure: {0}")]
    ScrubFailure(String),

    #[error("Unsupported type: {0}")]
    UnsupportedType(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),

    #[error("Authentication failure")]
    AuthenticationFailure,

    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    #[error("IO failure: {0}")]
    IoFailure(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<DecryptionError> for AppError {
    fn from(err: DecryptionError) -> Self {
        match err {
            DecryptionError::MalformedEnvelope(reason) => {
                AppError::MalformedEnvelope(reason.to_string())
            }
            DecryptionError::AuthenticationFailure => AppError::AuthenticationFailure,
            DecryptionError::DeserializationError(reason) => AppError::DeserializationError(reason),
        }
    }
}

impl From<EncryptionError> for AppError {
    fn from(err: EncryptionError) -> Self {
        match err {
            EncryptionError::KeyDerivation(msg) => AppError::Configuration(msg),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::IoFailure(err.to_string())
    }
}

/// Static metadata for each variant: (http_status, error_code, recoverable, sensitive, log_level).
fn app_error_static_metadata(err: &AppError) -> (u16, &'static str, bool, bool, LogLevel) {
    match err {
        AppError::InvalidContainer(_) => (400, "INVALID_CONTAINER", false, false, LogLevel::Debug),
        AppError::ScrubFailure(_) => (422, "SCRUB_FAILURE", false, true, LogLevel::Warn),
        AppError::UnsupportedType(_) => (415, "UNSUPPORTED_TYPE", false, false, LogLevel::Debug),
        AppError::Validation(_) => (400, "VALIDATION_ERROR", false, false, LogLevel::Debug),
        // Decryption failures are data-integrity errors: retrying the same
        // inputs cannot succeed.
        AppError::MalformedEnvelope(_) => (500, "DATA_INTEGRITY_ERROR", false, true, LogLevel::Error),
        AppError::AuthenticationFailure => (500, "DATA_INTEGRITY_ERROR", false, true, LogLevel::Error),
        AppError::DeserializationError(_) => {
            (500, "DATA_INTEGRITY_ERROR", false, true, LogLevel::Error)
        }
        AppError::IoFailure(_) => (500, "IO_FAILURE", true, true, LogLevel::Error),
        AppError::Configuration(_) => (500, "CONFIGURATION_ERROR", false, true, LogLevel::Error),
        AppError::Persistence(_) => (500, "PERSISTENCE_ERROR", true, true, LogLevel::Error),
        AppError::Internal(_) => (500, "INTERNAL_ERROR", true, true, LogLevel::Error),
    }
}

impl AppError {
    /// Failure reason recorded in a `ScrubResult`, for upload-path errors.
    pub fn scrub_kind(&self) -> ScrubErrorKind {
        match self {
            AppError::InvalidContainer(_) => ScrubErrorKind::InvalidContainer,
            AppError::UnsupportedType(_) => ScrubErrorKind::UnsupportedType,
            AppError::Validation(_) => ScrubErrorKind::Validation,
            AppError::IoFailure(_) => ScrubErrorKind::IoFailure,
            _ => ScrubErrorKind::ScrubFailure,
        }
    }

    /// Whether this error came from reading an encrypted record.
    pub fn is_data_integrity(&self) -> bool {
        matches!(
            self,
            AppError::MalformedEnvelope(_)
                | AppError::AuthenticationFailure
                | AppError::DeserializationError(_)
        )
    }

    /// Text safe to put in a report that leaves the process: the error
    /// code, plus the internal message only when it is not sensitive.
    pub fn report_reason(&self) -> String {
        if self.is_sensitive() {
            format!("{}: {}", self.error_code(), self.client_message())
        } else {
            format!("{}: {}", self.error_code(), self)
        }
    }
}

/// Log an error at the level its metadata asks for.
pub fn log_error(error: &AppError, operation: &str) {
    let error_code = error.error_code();
    match error.log_level() {
        LogLevel::Debug => {
            tracing::debug!(operation, error = %error, error_code, "Operation failed");
        }
        LogLevel::Warn => {
            tracing::warn!(operation, error = %error, error_code, "Operation failed");
        }
        LogLevel::Error => {
            tracing::error!(operation, error = %error, error_code, "Operation failed");
        }
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        app_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).2
    }

    fn is_sensitive(&self) -> bool {
        app_error_static_metadata(self).3
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).4
    }

    fn client_message(&self) -> String {
        match self {
            AppError::InvalidContainer(_) => "The uploaded file is corrupt or truncated".to_string(),
            AppError::ScrubFailure(_) => {
                "Metadata could not be removed from the uploaded file".to_string()
            }
            AppError::UnsupportedType(_) => "Unsupported file type".to_string(),
            AppError::Validation(ref msg) => msg.clone(),
            AppError::MalformedEnvelope(_)
            | AppError::AuthenticationFailure
            | AppError::DeserializationError(_) => {
                "Stored data failed an integrity check".to_string()
            }
            AppError::IoFailure(_) => "Storage operation failed".to_string(),
            AppError::Configuration(_) => "Service is misconfigured".to_string(),
            AppError::Persistence(_) => "Failed to access database".to_string(),
            AppError::Internal(_) => "Internal server error".to_string(),
        }
    }
}
