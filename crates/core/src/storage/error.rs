//! Storage error types.

use ifmsa_shared::{AppError, NameError};
use thiserror::Error;

/// Content store operation errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The origin answered with a 4xx status. Never retried.
    #[error("origin rejected request with status {status}: {message}")]
    Rejected {
        /// HTTP status returned by the origin.
        status: u16,
        /// Message extracted from the response body.
        message: String,
    },

    /// Every attempt failed with a 5xx status or a transport error.
    #[error("request failed after {attempts} attempts: {last_error}")]
    ExhaustedRetries {
        /// Number of attempts made.
        attempts: u32,
        /// Message of the last underlying failure.
        last_error: String,
    },

    /// Every disambiguated candidate name was already taken.
    #[error("no free name found for '{filename}' after {attempts} attempts")]
    NameExhausted {
        /// Requested filename.
        filename: String,
        /// Number of candidates tried.
        attempts: u32,
    },

    /// File size exceeds maximum allowed.
    #[error("file size {size} bytes exceeds maximum allowed {max} bytes")]
    FileTooLarge {
        /// Actual file size.
        size: u64,
        /// Maximum allowed size.
        max: u64,
    },

    /// File extension not allowed.
    #[error("file type '{extension}' is not allowed")]
    UnsupportedFileType {
        /// The rejected extension (empty when the name has none).
        extension: String,
    },

    /// A namespace, entity id or filename failed validation.
    #[error("invalid name: {0}")]
    InvalidName(#[from] NameError),

    /// The origin answered with a body that could not be decoded.
    #[error("unexpected origin response: {0}")]
    Decode(String),

    /// Store configuration error.
    #[error("storage configuration error: {0}")]
    Configuration(String),
}

impl StorageError {
    /// Create a rejected error.
    #[must_use]
    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        Self::Rejected {
            status,
            message: message.into(),
        }
    }

    /// Create an exhausted retries error.
    #[must_use]
    pub fn exhausted(attempts: u32, last_error: impl Into<String>) -> Self {
        Self::ExhaustedRetries {
            attempts,
            last_error: last_error.into(),
        }
    }

    /// Create a file too large error.
    #[must_use]
    pub fn file_too_large(size: u64, max: u64) -> Self {
        Self::FileTooLarge { size, max }
    }

    /// Create an unsupported file type error.
    #[must_use]
    pub fn unsupported_file_type(extension: impl Into<String>) -> Self {
        Self::UnsupportedFileType {
            extension: extension.into(),
        }
    }

    /// Create a decode error.
    #[must_use]
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Create a configuration error.
    #[must_use]
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::FileTooLarge { .. } => Self::PayloadTooLarge(err.to_string()),
            StorageError::UnsupportedFileType { .. } | StorageError::InvalidName(_) => {
                Self::Validation(err.to_string())
            }
            StorageError::NameExhausted { .. } => Self::Conflict(err.to_string()),
            StorageError::Rejected { .. }
            | StorageError::ExhaustedRetries { .. }
            | StorageError::Decode(_) => Self::ExternalService(err.to_string()),
            StorageError::Configuration(_) => Self::Internal(err.to_string()),
        }
    }
}
