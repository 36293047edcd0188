//! Translation between CDN URLs and origin repository paths.
//!
//! Only the public URL is ever persisted in entity records; the origin path
//! is recomputed from it on demand. Both directions are pure.

use ifmsa_shared::{EntityId, FileName, Namespace};
use url::Url;

/// Location of a managed file inside the storage repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OriginPath {
    /// Entity family prefix.
    pub namespace: Namespace,
    /// Owning record.
    pub entity_id: EntityId,
    /// Logical filename.
    pub filename: FileName,
}

impl OriginPath {
    /// Create a path.
    #[must_use]
    pub fn new(namespace: Namespace, entity_id: EntityId, filename: FileName) -> Self {
        Self {
            namespace,
            entity_id,
            filename,
        }
    }

    /// Repository-relative path: `namespace/entityId/filename`.
    #[must_use]
    pub fn repo_path(&self) -> String {
        format!("{}/{}/{}", self.namespace, self.entity_id, self.filename)
    }

    /// Same entity slot, different filename.
    #[must_use]
    pub fn with_filename(&self, filename: FileName) -> Self {
        Self {
            namespace: self.namespace.clone(),
            entity_id: self.entity_id.clone(),
            filename,
        }
    }
}

/// Compose `https://<cdn_host>/gh/<owner>/<repo>/<namespace>/<entity_id>/<filename>`.
#[must_use]
pub fn compose_public_url(
    cdn_host: &str,
    owner: &str,
    repo: &str,
    namespace: &Namespace,
    entity_id: &EntityId,
    filename: &FileName,
) -> String {
    format!("https://{cdn_host}/gh/{owner}/{repo}/{namespace}/{entity_id}/{filename}")
}

/// Maps between public CDN URLs and [`OriginPath`]s for one repository.
#[derive(Debug, Clone)]
pub struct UrlTranslator {
    cdn_host: String,
    owner: String,
    repo: String,
}

impl UrlTranslator {
    /// Create a translator for `owner/repo` served from `cdn_host`.
    #[must_use]
    pub fn new(
        cdn_host: impl Into<String>,
        owner: impl Into<String>,
        repo: impl Into<String>,
    ) -> Self {
        Self {
            cdn_host: cdn_host.into().to_ascii_lowercase(),
            owner: owner.into(),
            repo: repo.into(),
        }
    }

    /// Public URL for `path`.
    #[must_use]
    pub fn to_public_url(&self, path: &OriginPath) -> String {
        compose_public_url(
            &self.cdn_host,
            &self.owner,
            &self.repo,
            &path.namespace,
            &path.entity_id,
            &path.filename,
        )
    }

    /// Resolve a stored URL back to its origin path.
    ///
    /// Returns `None` when the URL is not a managed file of this repository
    /// under `namespace`, e.g. a placeholder image. Callers treat that as
    /// "nothing to do", not as a failure. Query strings and fragments are
    /// ignored.
    #[must_use]
    pub fn to_origin_path(&self, public_url: &str, namespace: &Namespace) -> Option<OriginPath> {
        let url = Url::parse(public_url).ok()?;
        if url.scheme() != "https" || url.host_str() != Some(self.cdn_host.as_str()) {
            return None;
        }
        if url.port().is_some() {
            return None;
        }

        let segments: Vec<&str> = url.path_segments()?.collect();
        let [gh, owner, repo, ns, entity_id, filename] = segments.as_slice() else {
            return None;
        };
        if *gh != "gh" || *owner != self.owner || *repo != self.repo || *ns != namespace.as_str() {
            return None;
        }

        Some(OriginPath::new(
            namespace.clone(),
            EntityId::new(*entity_id).ok()?,
            FileName::new(*filename).ok()?,
        ))
    }
}
