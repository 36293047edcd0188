//! Attachment service implementation.

use std::sync::Arc;

use ifmsa_shared::{EntityId, FileName, Namespace};
use tracing::{info, warn};

use super::error::AttachmentError;
use super::types::{CleanupReport, FileCleanup, RemovalStatus, UploadRequest, UploadResult};
use crate::storage::{ContentStore, HttpTransport, RemoveOutcome};

/// Upload and cleanup conventions shared by every entity family.
pub struct AttachmentService<T = reqwest::Client> {
    store: Arc<ContentStore<T>>,
}

impl<T: HttpTransport> AttachmentService<T> {
    /// Create a new attachment service.
    #[must_use]
    pub fn new(store: Arc<ContentStore<T>>) -> Self {
        Self { store }
    }

    /// The underlying content store.
    #[must_use]
    pub fn store(&self) -> &ContentStore<T> {
        &self.store
    }

    /// Store a file for an entity.
    ///
    /// When `replaces` names a different URL, that file is removed after the
    /// upload succeeds. A failed removal is reported in the result and never
    /// fails the upload.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The filename is unusable after sanitising
    /// - The file is empty, too large or of a disallowed type
    /// - The store fails to write it
    pub async fn upload(&self, request: UploadRequest) -> Result<UploadResult, AttachmentError> {
        let filename = FileName::sanitize(&request.filename)?;
        if request.content.is_empty() {
            return Err(AttachmentError::EmptyFile);
        }
        let size = u64::try_from(request.content.len()).unwrap_or(u64::MAX);
        self.store.validate_upload(&filename, size)?;

        let message = request.commit_message.unwrap_or_else(|| {
            format!(
                "Upload {}/{}/{}",
                request.namespace, request.entity_id, filename
            )
        });
        let public_url = self
            .store
            .put(
                &request.namespace,
                &request.entity_id,
                &filename,
                &request.content,
                &message,
            )
            .await?;

        let stored = public_url
            .rsplit('/')
            .next()
            .unwrap_or(filename.as_str())
            .to_string();
        let renamed = stored != filename.as_str();

        let replaced = match request.replaces.as_deref() {
            Some(old) if old == public_url => Some(RemovalStatus::Skipped),
            Some(old) => Some(
                self.remove_best_effort(old, &request.namespace, &request.entity_id)
                    .await,
            ),
            None => None,
        };

        Ok(UploadResult {
            public_url,
            filename: stored,
            renamed,
            replaced,
        })
    }

    /// Remove every file of a released entity.
    ///
    /// Never fails: each URL gets a [`RemovalStatus`], and failures are
    /// logged with the entity id for manual cleanup.
    pub async fn release(
        &self,
        namespace: &Namespace,
        entity_id: &EntityId,
        urls: &[String],
    ) -> CleanupReport {
        let mut files = Vec::with_capacity(urls.len());
        for url in urls {
            let status = self.remove_best_effort(url, namespace, entity_id).await;
            files.push(FileCleanup {
                url: url.clone(),
                status,
            });
        }

        let report = CleanupReport {
            namespace: namespace.clone(),
            entity_id: entity_id.clone(),
            files,
        };
        info!(
            namespace = %namespace,
            entity_id = %entity_id,
            files = report.files.len(),
            failed = report.failed_urls().count(),
            "entity files released"
        );
        report
    }

    async fn remove_best_effort(
        &self,
        url: &str,
        namespace: &Namespace,
        entity_id: &EntityId,
    ) -> RemovalStatus {
        // Only the owning entity may remove its files.
        if let Some(path) = self.store.translator().to_origin_path(url, namespace)
            && path.entity_id != *entity_id
        {
            warn!(
                namespace = %namespace,
                entity_id = %entity_id,
                owner = %path.entity_id,
                url,
                "file belongs to another entity, not removing"
            );
            return RemovalStatus::Skipped;
        }

        match self.store.remove(url, namespace).await {
            Ok(RemoveOutcome::Deleted { .. }) => RemovalStatus::Removed,
            Ok(RemoveOutcome::AlreadyAbsent) => RemovalStatus::AlreadyAbsent,
            Ok(RemoveOutcome::Unmanaged) => RemovalStatus::Skipped,
            Err(e) => {
                warn!(
                    namespace = %namespace,
                    entity_id = %entity_id,
                    url,
                    error = %e,
                    "file removal failed, may need manual cleanup"
                );
                RemovalStatus::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }
}
