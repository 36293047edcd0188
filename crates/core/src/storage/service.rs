//! Content store adapter over the origin contents API.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use ifmsa_shared::{EntityId, FileName, Namespace};
use rand::Rng;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use super::client::ResilientClient;
use super::config::StoreConfig;
use super::error::StorageError;
use super::transport::{HttpRequest, HttpResponse, HttpTransport};
use super::url::{OriginPath, UrlTranslator};

/// Candidate names drawn before giving up on a collision.
pub const MAX_RENAME_ATTEMPTS: u32 = 10;

/// Per-request timeout of the production transport.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Metadata of a file present at the origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFileMeta {
    /// Revision token required to delete or overwrite.
    pub sha: String,
    /// Size in bytes.
    pub size: u64,
    /// Repository-relative path.
    pub path: String,
}

/// Outcome of an existence check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// A file occupies the path.
    Found(RemoteFileMeta),
    /// The origin definitively reported nothing there.
    NotFound,
}

impl Lookup {
    /// Whether a file was found.
    #[must_use]
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }
}

/// Outcome of a remove.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RemoveOutcome {
    /// The file was deleted.
    Deleted {
        /// Repository-relative path that was deleted.
        path: String,
    },
    /// Nothing existed at the resolved path.
    AlreadyAbsent,
    /// The URL does not point at a managed file; nothing was attempted.
    Unmanaged,
}

/// Contents API entry, as returned by `GET .../contents/<path>`.
#[derive(Debug, Deserialize)]
struct ContentsEntry {
    sha: String,
    size: u64,
    path: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    encoding: Option<String>,
}

impl ContentsEntry {
    fn meta(&self) -> RemoteFileMeta {
        RemoteFileMeta {
            sha: self.sha.clone(),
            size: self.size,
            path: self.path.clone(),
        }
    }

    fn decode_content(&self) -> Result<Vec<u8>, StorageError> {
        match (self.encoding.as_deref(), self.content.as_deref()) {
            (Some("base64"), Some(content)) => {
                let compact: String = content.split_whitespace().collect();
                STANDARD
                    .decode(compact)
                    .map_err(|e| StorageError::decode(format!("invalid base64 content: {e}")))
            }
            (Some(encoding), _) => Err(StorageError::decode(format!(
                "content of '{}' is not inline (encoding '{encoding}')",
                self.path
            ))),
            (None, _) => Err(StorageError::decode(format!(
                "content of '{}' is missing",
                self.path
            ))),
        }
    }
}

/// File store backed by a repository's contents API and served from a CDN.
///
/// Files live at `namespace/entity_id/filename`; callers only ever persist
/// the public URL returned by [`ContentStore::put`].
pub struct ContentStore<T = reqwest::Client> {
    client: ResilientClient<T>,
    translator: UrlTranslator,
    config: StoreConfig,
}

impl ContentStore<reqwest::Client> {
    /// Create a store using a `reqwest` transport.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the HTTP client cannot be built or
    /// the token is not a valid header value.
    pub fn from_config(config: StoreConfig) -> Result<Self, StorageError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| StorageError::configuration(format!("http client: {e}")))?;
        Self::with_transport(http, config)
    }
}

impl<T: HttpTransport> ContentStore<T> {
    /// Create a store over an arbitrary transport.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the token or user agent is not a
    /// valid header value.
    pub fn with_transport(transport: T, config: StoreConfig) -> Result<Self, StorageError> {
        let client = ResilientClient::new(
            transport,
            &config.token,
            &config.user_agent,
            config.retry.clone(),
        )?;
        let translator = UrlTranslator::new(&config.cdn_host, &config.owner, &config.repo);
        Ok(Self {
            client,
            translator,
            config,
        })
    }

    /// Store configuration.
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// URL translator for this repository.
    #[must_use]
    pub fn translator(&self) -> &UrlTranslator {
        &self.translator
    }

    /// Validate an upload before sending anything.
    ///
    /// # Errors
    ///
    /// Returns `FileTooLarge` or `UnsupportedFileType`.
    pub fn validate_upload(&self, filename: &FileName, size: u64) -> Result<(), StorageError> {
        if size > self.config.max_file_size {
            return Err(StorageError::file_too_large(size, self.config.max_file_size));
        }
        if !self.config.is_extension_allowed(filename) {
            return Err(StorageError::unsupported_file_type(
                filename.extension().unwrap_or_default(),
            ));
        }
        Ok(())
    }

    /// Check whether a file exists.
    ///
    /// Any 4xx is a definitive "not found".
    ///
    /// # Errors
    ///
    /// Propagates exhausted retries and undecodable responses.
    pub async fn exists(
        &self,
        namespace: &Namespace,
        entity_id: &EntityId,
        filename: &FileName,
    ) -> Result<Lookup, StorageError> {
        let path = OriginPath::new(namespace.clone(), entity_id.clone(), filename.clone());
        Ok(match self.fetch(&path).await? {
            Some(entry) => Lookup::Found(entry.meta()),
            None => Lookup::NotFound,
        })
    }

    /// Read a stored file's bytes, `None` when it does not exist.
    ///
    /// # Errors
    ///
    /// Propagates exhausted retries; returns `Decode` when the origin does
    /// not inline the content (files above the inline size limit).
    pub async fn read(
        &self,
        namespace: &Namespace,
        entity_id: &EntityId,
        filename: &FileName,
    ) -> Result<Option<Vec<u8>>, StorageError> {
        let path = OriginPath::new(namespace.clone(), entity_id.clone(), filename.clone());
        match self.fetch(&path).await? {
            Some(entry) => entry.decode_content().map(Some),
            None => Ok(None),
        }
    }

    /// Upload a file and return its public URL.
    ///
    /// An existing file is never overwritten: on collision the file is
    /// written as `stem_NNN.ext` with a random three-digit suffix, and the
    /// returned URL names the file actually written.
    ///
    /// # Errors
    ///
    /// `Rejected` when the origin refuses the write, `NameExhausted` when no
    /// free name was found, `InvalidName` when no suffixed name fits, or
    /// exhausted retries. Nothing is written on error.
    pub async fn put(
        &self,
        namespace: &Namespace,
        entity_id: &EntityId,
        filename: &FileName,
        content: &[u8],
        message: &str,
    ) -> Result<String, StorageError> {
        let requested = OriginPath::new(namespace.clone(), entity_id.clone(), filename.clone());
        let target = if self.fetch(&requested).await?.is_some() {
            let free = self.free_path(&requested).await?;
            debug!(
                requested = %requested.repo_path(),
                renamed = %free.filename,
                "name taken, writing under a new name"
            );
            free
        } else {
            requested
        };

        let body = json!({
            "message": message,
            "content": STANDARD.encode(content),
            "committer": &self.config.committer,
        });
        let response = self
            .client
            .send(HttpRequest::put(self.contents_url(&target), body.to_string()))
            .await?;
        if !response.status.is_success() {
            return Err(rejection(&response));
        }

        let public_url = self.translator.to_public_url(&target);
        info!(
            path = %target.repo_path(),
            size = content.len(),
            url = %public_url,
            "file stored"
        );
        Ok(public_url)
    }

    /// Delete the file a public URL points at.
    ///
    /// URLs that do not resolve to a managed file under `namespace` are
    /// [`RemoveOutcome::Unmanaged`] and cause no outbound call.
    ///
    /// # Errors
    ///
    /// `Rejected` when the origin refuses the delete (e.g. a stale sha), or
    /// exhausted retries.
    pub async fn remove(
        &self,
        public_url: &str,
        namespace: &Namespace,
    ) -> Result<RemoveOutcome, StorageError> {
        let Some(path) = self.translator.to_origin_path(public_url, namespace) else {
            debug!(url = public_url, namespace = %namespace, "not a managed file, skipping");
            return Ok(RemoveOutcome::Unmanaged);
        };

        let Some(entry) = self.fetch(&path).await? else {
            debug!(path = %path.repo_path(), "file already absent");
            return Ok(RemoveOutcome::AlreadyAbsent);
        };

        let repo_path = path.repo_path();
        let body = json!({
            "message": format!("Delete {repo_path}"),
            "sha": entry.sha,
            "committer": &self.config.committer,
        });
        let response = self
            .client
            .send(HttpRequest::delete(self.contents_url(&path), body.to_string()))
            .await?;

        match response.status {
            status if status.is_success() => {
                info!(path = %repo_path, "file deleted");
                Ok(RemoveOutcome::Deleted { path: repo_path })
            }
            StatusCode::NOT_FOUND => {
                debug!(path = %repo_path, "file vanished before delete");
                Ok(RemoveOutcome::AlreadyAbsent)
            }
            _ => Err(rejection(&response)),
        }
    }

    /// `GET` a contents entry; `None` on any 4xx.
    async fn fetch(&self, path: &OriginPath) -> Result<Option<ContentsEntry>, StorageError> {
        let response = self
            .client
            .send(HttpRequest::get(self.contents_url(path)))
            .await?;
        if response.status.is_client_error() {
            return Ok(None);
        }
        serde_json::from_slice(&response.body)
            .map(Some)
            .map_err(|e| StorageError::decode(format!("contents entry: {e}")))
    }

    /// Draw suffixed candidates until one is free.
    async fn free_path(&self, requested: &OriginPath) -> Result<OriginPath, StorageError> {
        for _ in 0..MAX_RENAME_ATTEMPTS {
            let filename = requested.filename.with_suffix(random_suffix())?;
            let candidate = requested.with_filename(filename);
            if self.fetch(&candidate).await?.is_none() {
                return Ok(candidate);
            }
        }
        Err(StorageError::NameExhausted {
            filename: requested.filename.to_string(),
            attempts: MAX_RENAME_ATTEMPTS,
        })
    }

    fn contents_url(&self, path: &OriginPath) -> String {
        format!(
            "{}/repos/{}/{}/contents/{}",
            self.config.api_base,
            self.config.owner,
            self.config.repo,
            path.repo_path()
        )
    }
}

/// Random suffix in `100..=999`.
fn random_suffix() -> u16 {
    rand::rng().random_range(100..=999)
}

/// Build a `Rejected` error from a 4xx response, preferring the origin's
/// `message` field.
fn rejection(response: &HttpResponse) -> StorageError {
    #[derive(Deserialize)]
    struct OriginMessage {
        message: String,
    }

    let message = serde_json::from_slice::<OriginMessage>(&response.body)
        .map(|m| m.message)
        .unwrap_or_else(|_| String::from_utf8_lossy(&response.body).into_owned());
    StorageError::rejected(response.status.as_u16(), message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::client::RetryPolicy;
    use crate::storage::testing::{FakeOrigin, ScriptedTransport};
    use reqwest::Method;

    fn config() -> StoreConfig {
        StoreConfig::new("owner", "repo", "ghp_test")
            .with_api_base("https://origin.test")
            .with_cdn_host("cdn.example")
            .with_retry(RetryPolicy::new(3, Duration::from_millis(10), 2.0).unwrap())
    }

    fn store(origin: &FakeOrigin) -> ContentStore<FakeOrigin> {
        ContentStore::with_transport(origin.clone(), config()).unwrap()
    }

    fn names(ns: &str, id: &str, file: &str) -> (Namespace, EntityId, FileName) {
        (
            Namespace::new(ns).unwrap(),
            EntityId::new(id).unwrap(),
            FileName::new(file).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_put_then_put_again_renames() {
        let origin = FakeOrigin::new();
        let store = store(&origin);
        let (ns, id, file) = names("noticias", "42", "cover.png");

        let first = store.put(&ns, &id, &file, b"first", "add cover").await.unwrap();
        assert_eq!(first, "https://cdn.example/gh/owner/repo/noticias/42/cover.png");

        let second = store.put(&ns, &id, &file, b"second", "add cover").await.unwrap();
        let renamed = second
            .strip_prefix("https://cdn.example/gh/owner/repo/noticias/42/cover_")
            .and_then(|rest| rest.strip_suffix(".png"))
            .expect("suffixed name");
        assert_eq!(renamed.len(), 3);
        assert!(renamed.chars().all(|c| c.is_ascii_digit()));

        assert_ne!(first, second);
        assert_eq!(origin.content("noticias/42/cover.png").unwrap(), b"first");
        assert_eq!(origin.len(), 2);
        assert_eq!(origin.messages(), vec!["add cover", "add cover"]);
    }

    #[tokio::test]
    async fn test_put_sends_committer_and_base64() {
        let transport = ScriptedTransport::new(vec![
            Ok((StatusCode::NOT_FOUND, r#"{"message":"Not Found"}"#.to_string())),
            Ok((StatusCode::CREATED, "{}".to_string())),
        ]);
        let store = ContentStore::with_transport(transport.clone(), config()).unwrap();
        let (ns, id, file) = names("eb", "7", "foto.jpg");

        store.put(&ns, &id, &file, b"hello", "msg").await.unwrap();

        let requests = transport.requests();
        assert_eq!(requests[0].method, Method::GET);
        assert_eq!(
            requests[0].url,
            "https://origin.test/repos/owner/repo/contents/eb/7/foto.jpg"
        );
        assert_eq!(requests[1].method, Method::PUT);
        let body: serde_json::Value =
            serde_json::from_slice(requests[1].body.as_ref().unwrap()).unwrap();
        assert_eq!(body["content"], "aGVsbG8=");
        assert_eq!(body["message"], "msg");
        assert_eq!(body["committer"]["name"], "IFMSA Brazil Admin");
        assert!(body.get("sha").is_none());
    }

    #[tokio::test]
    async fn test_put_rejected_is_not_retried() {
        let origin = FakeOrigin::new();
        origin.reject_puts(StatusCode::FORBIDDEN);
        let store = store(&origin);
        let (ns, id, file) = names("cr", "1", "logo.svg");

        let err = store.put(&ns, &id, &file, b"<svg/>", "m").await.unwrap_err();

        assert!(matches!(err, StorageError::Rejected { status: 403, .. }));
        assert_eq!(origin.calls_with(&Method::PUT), 1);
        assert_eq!(origin.len(), 0);
    }

    #[tokio::test]
    async fn test_put_name_exhausted() {
        let origin = FakeOrigin::new();
        origin.insert("cred/9/card.png", b"x");
        for suffix in 100..=999 {
            origin.insert(&format!("cred/9/card_{suffix}.png"), b"x");
        }
        let store = store(&origin);
        let (ns, id, file) = names("cred", "9", "card.png");

        let err = store.put(&ns, &id, &file, b"new", "m").await.unwrap_err();

        assert!(matches!(
            err,
            StorageError::NameExhausted { attempts: MAX_RENAME_ATTEMPTS, .. }
        ));
        assert_eq!(origin.calls_with(&Method::PUT), 0);
        assert_eq!(origin.calls_with(&Method::GET), 1 + MAX_RENAME_ATTEMPTS as usize);
    }

    #[tokio::test]
    async fn test_put_refuses_unaddressable_rename() {
        let origin = FakeOrigin::new();
        let long = format!("a.{}", "x".repeat(252));
        origin.insert(&format!("cred/9/{long}"), b"x");
        let store = store(&origin);
        let (ns, id, file) = names("cred", "9", &long);

        let err = store.put(&ns, &id, &file, b"new", "m").await.unwrap_err();

        assert!(matches!(err, StorageError::InvalidName(_)));
        assert_eq!(origin.calls_with(&Method::PUT), 0);
        assert_eq!(origin.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_put_survives_transient_failures() {
        let origin = FakeOrigin::new();
        origin.fail_next(StatusCode::BAD_GATEWAY, 2);
        let store = store(&origin);
        let (ns, id, file) = names("patrocinadores", "3", "logo.png");

        let url = store.put(&ns, &id, &file, b"png", "m").await.unwrap();

        assert!(url.ends_with("/patrocinadores/3/logo.png"));
        assert!(origin.contains("patrocinadores/3/logo.png"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exists_propagates_exhausted_retries() {
        let origin = FakeOrigin::new();
        origin.fail_next(StatusCode::SERVICE_UNAVAILABLE, 3);
        let store = store(&origin);
        let (ns, id, file) = names("eb", "1", "a.png");

        let err = store.exists(&ns, &id, &file).await.unwrap_err();

        assert!(matches!(err, StorageError::ExhaustedRetries { attempts: 3, .. }));
        assert_eq!(origin.calls(), 3);
    }

    #[tokio::test]
    async fn test_exists_found_and_not_found() {
        let origin = FakeOrigin::new();
        let sha = origin.insert("eb/1/a.png", b"12345");
        let store = store(&origin);
        let (ns, id, file) = names("eb", "1", "a.png");

        let found = store.exists(&ns, &id, &file).await.unwrap();
        assert_eq!(
            found,
            Lookup::Found(RemoteFileMeta {
                sha,
                size: 5,
                path: "eb/1/a.png".to_string(),
            })
        );

        let (_, _, other) = names("eb", "1", "b.png");
        assert_eq!(store.exists(&ns, &id, &other).await.unwrap(), Lookup::NotFound);
    }

    #[tokio::test]
    async fn test_read_decodes_wrapped_base64() {
        let origin = FakeOrigin::new();
        let body = "# Título\n".repeat(40);
        origin.insert("noticias/5/texto.md", body.as_bytes());
        let store = store(&origin);
        let (ns, id, file) = names("noticias", "5", "texto.md");

        let read = store.read(&ns, &id, &file).await.unwrap();
        assert_eq!(read.as_deref(), Some(body.as_bytes()));

        let (_, _, missing) = names("noticias", "5", "outro.md");
        assert_eq!(store.read(&ns, &id, &missing).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_read_without_inline_content() {
        let transport = ScriptedTransport::new(vec![Ok((
            StatusCode::OK,
            r#"{"sha":"abc","size":5000000,"path":"eb/1/big.pdf","content":"","encoding":"none"}"#
                .to_string(),
        ))]);
        let store = ContentStore::with_transport(transport, config()).unwrap();
        let (ns, id, file) = names("eb", "1", "big.pdf");

        let err = store.read(&ns, &id, &file).await.unwrap_err();
        assert!(matches!(err, StorageError::Decode(_)));
    }

    #[tokio::test]
    async fn test_remove_deletes_with_sha() {
        let origin = FakeOrigin::new();
        origin.insert("eb/3/foto.jpg", b"jpg");
        let store = store(&origin);
        let ns = Namespace::new("eb").unwrap();

        let outcome = store
            .remove("https://cdn.example/gh/owner/repo/eb/3/foto.jpg", &ns)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            RemoveOutcome::Deleted {
                path: "eb/3/foto.jpg".to_string()
            }
        );
        assert!(!origin.contains("eb/3/foto.jpg"));
        assert_eq!(origin.messages(), vec!["Delete eb/3/foto.jpg"]);
    }

    #[tokio::test]
    async fn test_remove_missing_is_idempotent() {
        let origin = FakeOrigin::new();
        let store = store(&origin);
        let ns = Namespace::new("eb").unwrap();
        let url = "https://cdn.example/gh/owner/repo/eb/3/foto.jpg";

        assert_eq!(store.remove(url, &ns).await.unwrap(), RemoveOutcome::AlreadyAbsent);
        assert_eq!(store.remove(url, &ns).await.unwrap(), RemoveOutcome::AlreadyAbsent);
        assert_eq!(origin.calls_with(&Method::DELETE), 0);
    }

    #[tokio::test]
    async fn test_remove_unmanaged_makes_no_calls() {
        let origin = FakeOrigin::new();
        let store = store(&origin);
        let ns = Namespace::new("noticias").unwrap();

        let outcome = store.remove("https://placehold.co/400", &ns).await.unwrap();

        assert_eq!(outcome, RemoveOutcome::Unmanaged);
        assert_eq!(origin.calls(), 0);
    }

    #[tokio::test]
    async fn test_remove_stale_sha_is_rejected() {
        let transport = ScriptedTransport::new(vec![
            Ok((
                StatusCode::OK,
                r#"{"sha":"old","size":1,"path":"eb/3/foto.jpg"}"#.to_string(),
            )),
            Ok((
                StatusCode::CONFLICT,
                r#"{"message":"eb/3/foto.jpg does not match old"}"#.to_string(),
            )),
        ]);
        let store = ContentStore::with_transport(transport, config()).unwrap();
        let ns = Namespace::new("eb").unwrap();

        let err = store
            .remove("https://cdn.example/gh/owner/repo/eb/3/foto.jpg", &ns)
            .await
            .unwrap_err();

        match err {
            StorageError::Rejected { status, message } => {
                assert_eq!(status, 409);
                assert!(message.contains("does not match"));
            }
            other => panic!("expected Rejected, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_remove_race_to_404_is_absent() {
        let transport = ScriptedTransport::new(vec![
            Ok((
                StatusCode::OK,
                r#"{"sha":"abc","size":1,"path":"eb/3/foto.jpg"}"#.to_string(),
            )),
            Ok((StatusCode::NOT_FOUND, r#"{"message":"Not Found"}"#.to_string())),
        ]);
        let store = ContentStore::with_transport(transport, config()).unwrap();
        let ns = Namespace::new("eb").unwrap();

        let outcome = store
            .remove("https://cdn.example/gh/owner/repo/eb/3/foto.jpg", &ns)
            .await
            .unwrap();
        assert_eq!(outcome, RemoveOutcome::AlreadyAbsent);
    }

    #[test]
    fn test_validate_upload() {
        let store = store(&FakeOrigin::new());
        let png = FileName::new("cover.png").unwrap();
        let exe = FileName::new("setup.exe").unwrap();
        let bare = FileName::new("README").unwrap();

        assert!(store.validate_upload(&png, 1024).is_ok());
        assert!(matches!(
            store.validate_upload(&png, StoreConfig::DEFAULT_MAX_FILE_SIZE + 1),
            Err(StorageError::FileTooLarge { .. })
        ));
        assert!(matches!(
            store.validate_upload(&exe, 10),
            Err(StorageError::UnsupportedFileType { extension }) if extension == "exe"
        ));
        assert!(matches!(
            store.validate_upload(&bare, 10),
            Err(StorageError::UnsupportedFileType { extension }) if extension.is_empty()
        ));
    }

    #[test]
    fn test_random_suffix_range() {
        for _ in 0..1000 {
            assert!((100..=999).contains(&random_suffix()));
        }
    }

    #[test]
    fn test_remove_outcome_serialization() {
        let json = serde_json::to_value(RemoveOutcome::Deleted {
            path: "eb/1/a.png".to_string(),
        })
        .unwrap();
        assert_eq!(json["outcome"], "deleted");
        assert_eq!(json["path"], "eb/1/a.png");
        assert_eq!(
            serde_json::to_value(RemoveOutcome::AlreadyAbsent).unwrap()["outcome"],
            "already_absent"
        );
    }
}
