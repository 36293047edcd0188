//! Attachment error types.

use ifmsa_shared::{AppError, NameError};
use thiserror::Error;

use crate::storage::StorageError;

/// Attachment operation errors.
#[derive(Debug, Error)]
pub enum AttachmentError {
    /// Uploaded file has no content.
    #[error("file is empty")]
    EmptyFile,

    /// Namespace, entity id or filename is invalid.
    #[error("invalid name: {0}")]
    InvalidName(#[from] NameError),

    /// Storage operation failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl From<AttachmentError> for AppError {
    fn from(err: AttachmentError) -> Self {
        match err {
            AttachmentError::EmptyFile => Self::Validation(err.to_string()),
            AttachmentError::InvalidName(e) => e.into(),
            AttachmentError::Storage(e) => e.into(),
        }
    }
}
