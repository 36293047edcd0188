//! Content store configuration types.

use std::time::Duration;

use ifmsa_shared::{FileName, StorageSettings};
use serde::Serialize;

use super::client::RetryPolicy;
use super::error::StorageError;

/// Identity recorded as committer on every write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Committer {
    /// Display name.
    pub name: String,
    /// Email address.
    pub email: String,
}

impl Committer {
    /// Create a committer.
    #[must_use]
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }
}

/// Content store configuration.
///
/// Built once at startup and shared read-only by every operation.
#[derive(Clone)]
pub struct StoreConfig {
    /// Repository owner.
    pub owner: String,
    /// Repository name.
    pub repo: String,
    /// Bearer token for the contents API.
    pub token: String,
    /// Base URL of the contents API, without trailing slash.
    pub api_base: String,
    /// CDN host serving the repository.
    pub cdn_host: String,
    /// Committer recorded on writes and deletes.
    pub committer: Committer,
    /// Retry schedule for outbound calls.
    pub retry: RetryPolicy,
    /// Maximum upload size in bytes.
    pub max_file_size: u64,
    /// Lowercase extensions accepted for upload.
    pub allowed_extensions: Vec<String>,
    /// User agent sent to the origin.
    pub user_agent: String,
}

impl StoreConfig {
    /// Default contents API base.
    pub const DEFAULT_API_BASE: &'static str = "https://api.github.com";
    /// Default CDN host.
    pub const DEFAULT_CDN_HOST: &'static str = "cdn.jsdelivr.net";
    /// Default max file size: 10MB.
    pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

    /// Create a config with default settings.
    #[must_use]
    pub fn new(owner: impl Into<String>, repo: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            token: token.into(),
            api_base: Self::DEFAULT_API_BASE.to_string(),
            cdn_host: Self::DEFAULT_CDN_HOST.to_string(),
            committer: Committer::new("IFMSA Brazil Admin", "admin@ifmsabrazil.org"),
            retry: RetryPolicy::default(),
            max_file_size: Self::DEFAULT_MAX_FILE_SIZE,
            allowed_extensions: Self::default_extensions(),
            user_agent: concat!("ifmsa-admin/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }

    /// Build from loaded application settings.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an empty owner/repo/token or an
    /// invalid retry policy.
    pub fn from_settings(settings: &StorageSettings) -> Result<Self, StorageError> {
        for (field, value) in [
            ("owner", &settings.owner),
            ("repo", &settings.repo),
            ("token", &settings.token),
        ] {
            if value.trim().is_empty() {
                return Err(StorageError::configuration(format!(
                    "storage.{field} must not be empty"
                )));
            }
        }

        let retry = RetryPolicy::new(
            settings.retry.max_attempts,
            Duration::from_millis(settings.retry.initial_delay_ms),
            settings.retry.backoff_multiplier,
        )?;

        Ok(Self::new(&settings.owner, &settings.repo, &settings.token)
            .with_api_base(&settings.api_base)
            .with_cdn_host(&settings.cdn_host)
            .with_committer(Committer::new(
                &settings.committer_name,
                &settings.committer_email,
            ))
            .with_retry(retry)
            .with_max_file_size(settings.max_file_size)
            .with_allowed_extensions(settings.allowed_extensions.clone()))
    }

    /// Set the contents API base URL.
    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the CDN host.
    #[must_use]
    pub fn with_cdn_host(mut self, cdn_host: impl Into<String>) -> Self {
        self.cdn_host = cdn_host.into();
        self
    }

    /// Set the committer.
    #[must_use]
    pub fn with_committer(mut self, committer: Committer) -> Self {
        self.committer = committer;
        self
    }

    /// Set the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set maximum file size.
    #[must_use]
    pub fn with_max_file_size(mut self, size: u64) -> Self {
        self.max_file_size = size;
        self
    }

    /// Set allowed extensions (compared case-insensitively).
    #[must_use]
    pub fn with_allowed_extensions(mut self, extensions: Vec<String>) -> Self {
        self.allowed_extensions = extensions
            .into_iter()
            .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
            .collect();
        self
    }

    /// Default allowed extensions: web images, markdown bodies, PDFs.
    #[must_use]
    pub fn default_extensions() -> Vec<String> {
        ["png", "jpg", "jpeg", "gif", "webp", "svg", "md", "pdf"]
            .into_iter()
            .map(String::from)
            .collect()
    }

    /// Check if a filename's extension is allowed.
    #[must_use]
    pub fn is_extension_allowed(&self, filename: &FileName) -> bool {
        filename.extension().is_some_and(|ext| {
            self.allowed_extensions
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(ext))
        })
    }
}

impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreConfig")
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("token", &"<redacted>")
            .field("api_base", &self.api_base)
            .field("cdn_host", &self.cdn_host)
            .field("committer", &self.committer)
            .field("retry", &self.retry)
            .field("max_file_size", &self.max_file_size)
            .field("allowed_extensions", &self.allowed_extensions)
            .finish_non_exhaustive()
    }
}
