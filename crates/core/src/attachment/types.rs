//! Attachment types and data structures.

use ifmsa_shared::{EntityId, Namespace};
use serde::Serialize;

/// An upload on behalf of an owning record.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Entity family, e.g. `noticias`.
    pub namespace: Namespace,
    /// Owning record.
    pub entity_id: EntityId,
    /// Filename as supplied by the client; sanitised before use.
    pub filename: String,
    /// File bytes.
    pub content: Vec<u8>,
    /// Commit message; defaults to `Upload <namespace>/<entity_id>/<file>`.
    pub commit_message: Option<String>,
    /// Public URL this upload supersedes, removed once the upload succeeds.
    pub replaces: Option<String>,
}

impl UploadRequest {
    /// Create a request with default message and nothing to replace.
    #[must_use]
    pub fn new(
        namespace: Namespace,
        entity_id: EntityId,
        filename: impl Into<String>,
        content: Vec<u8>,
    ) -> Self {
        Self {
            namespace,
            entity_id,
            filename: filename.into(),
            content,
            commit_message: None,
            replaces: None,
        }
    }

    /// Set the commit message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.commit_message = Some(message.into());
        self
    }

    /// Set the URL being replaced.
    #[must_use]
    pub fn replacing(mut self, public_url: impl Into<String>) -> Self {
        self.replaces = Some(public_url.into());
        self
    }
}

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadResult {
    /// URL to persist in the owning record.
    pub public_url: String,
    /// Filename actually written.
    pub filename: String,
    /// Whether the name was changed to avoid overwriting an existing file.
    pub renamed: bool,
    /// What happened to the superseded file, if one was named.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replaced: Option<RemovalStatus>,
}

/// Outcome of a best-effort removal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RemovalStatus {
    /// The file was deleted.
    Removed,
    /// Nothing was stored there any more.
    AlreadyAbsent,
    /// Not a managed file, or the same file that was just uploaded.
    Skipped,
    /// Removal failed; the file may need manual cleanup.
    Failed {
        /// Error message.
        reason: String,
    },
}

impl RemovalStatus {
    /// Whether the remote file may still be there.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Removal outcome for one URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileCleanup {
    /// URL as stored in the record.
    pub url: String,
    /// What happened.
    #[serde(flatten)]
    pub status: RemovalStatus,
}

/// Result of releasing every file of an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    /// Entity family.
    pub namespace: Namespace,
    /// Released record.
    pub entity_id: EntityId,
    /// Per-URL outcomes, in request order.
    pub files: Vec<FileCleanup>,
}

impl CleanupReport {
    /// Whether any file could not be removed.
    #[must_use]
    pub fn needs_manual_cleanup(&self) -> bool {
        self.files.iter().any(|f| f.status.is_failed())
    }

    /// URLs whose removal failed.
    pub fn failed_urls(&self) -> impl Iterator<Item = &str> {
        self.files
            .iter()
            .filter(|f| f.status.is_failed())
            .map(|f| f.url.as_str())
    }

    /// Operator-facing message naming the entity, when cleanup failed.
    #[must_use]
    pub fn manual_cleanup_message(&self) -> Option<String> {
        if !self.needs_manual_cleanup() {
            return None;
        }
        Some(format!(
            "Record {}/{} was released but some files may need manual cleanup: {}",
            self.namespace,
            self.entity_id,
            self.failed_urls().collect::<Vec<_>>().join(", ")
        ))
    }
}
