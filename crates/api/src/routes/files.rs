//! Admin file routes.
//!
//! Owning records persist only the `public_url` these routes return. Removal
//! never fails on a URL that is not a managed file; it reports `unmanaged`.

use axum::{
    Json, Router,
    extract::{Multipart, Path, State, multipart::MultipartError},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use ifmsa_core::attachment::{CleanupReport, UploadRequest};
use ifmsa_core::storage::{Lookup, OriginPath};
use ifmsa_shared::{AppError, EntityId, FileName, Namespace};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::error_response;
use crate::AppState;

/// Creates the file routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/files/{namespace}", delete(remove_file))
        .route("/files/{namespace}/{entity_id}", post(upload_file))
        .route("/files/{namespace}/{entity_id}/{filename}", get(lookup_file))
        .route(
            "/files/{namespace}/{entity_id}/{filename}/content",
            get(read_file),
        )
        .route(
            "/entities/{namespace}/{entity_id}/files",
            delete(release_entity_files),
        )
}

// ============================================================================
// Request/Response DTOs
// ============================================================================

/// Body of `DELETE /files/{namespace}`.
#[derive(Debug, Deserialize)]
pub struct RemoveFileRequest {
    /// Public URL as stored in the owning record.
    pub public_url: String,
}

/// Body of `DELETE /entities/{namespace}/{entity_id}/files`.
#[derive(Debug, Deserialize)]
pub struct ReleaseFilesRequest {
    /// Every file URL the record held.
    pub urls: Vec<String>,
}

/// Response of a file lookup.
#[derive(Debug, Serialize)]
pub struct FileMetaResponse {
    /// Revision token.
    pub sha: String,
    /// Size in bytes.
    pub size: u64,
    /// Repository-relative path.
    pub path: String,
    /// CDN URL of the file.
    pub public_url: String,
}

/// Response of an entity cleanup.
#[derive(Debug, Serialize)]
pub struct ReleaseFilesResponse {
    /// Per-file outcomes.
    #[serde(flatten)]
    pub report: CleanupReport,
    /// Operator message when some files may need manual cleanup.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manual_cleanup: Option<String>,
}

/// Fields collected from the upload form.
#[derive(Debug, Default)]
struct UploadForm {
    filename: Option<String>,
    content: Vec<u8>,
    message: Option<String>,
    replaces: Option<String>,
}

// ============================================================================
// Helpers
// ============================================================================

fn parse_namespace(raw: &str) -> Result<Namespace, AppError> {
    Ok(Namespace::new(raw)?)
}

fn parse_slot(namespace: &str, entity_id: &str) -> Result<(Namespace, EntityId), AppError> {
    Ok((parse_namespace(namespace)?, EntityId::new(entity_id)?))
}

fn parse_path(namespace: &str, entity_id: &str, filename: &str) -> Result<OriginPath, AppError> {
    let (namespace, entity_id) = parse_slot(namespace, entity_id)?;
    Ok(OriginPath::new(namespace, entity_id, FileName::new(filename)?))
}

fn multipart_error(err: &MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(err.body_text())
    } else {
        AppError::Validation(err.body_text())
    }
}

async fn read_upload_form(multipart: &mut Multipart) -> Result<UploadForm, AppError> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(&e))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                form.filename = field.file_name().map(str::to_string);
                form.content = field
                    .bytes()
                    .await
                    .map_err(|e| multipart_error(&e))?
                    .to_vec();
            }
            Some("message") => {
                let text = field.text().await.map_err(|e| multipart_error(&e))?;
                form.message = Some(text).filter(|t| !t.trim().is_empty());
            }
            Some("replaces") => {
                let text = field.text().await.map_err(|e| multipart_error(&e))?;
                form.replaces = Some(text).filter(|t| !t.trim().is_empty());
            }
            _ => {}
        }
    }

    Ok(form)
}

/// Content type served for a stored file.
fn content_type_for(filename: &FileName) -> &'static str {
    match filename
        .extension()
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        Some("md") => "text/markdown; charset=utf-8",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}

// ============================================================================
// Route Handlers
// ============================================================================

/// POST `/files/{namespace}/{entity_id}`
/// Upload a file for an entity (multipart: `file`, `message`, `replaces`).
async fn upload_file(
    State(state): State<AppState>,
    Path((namespace, entity_id)): Path<(String, String)>,
    mut multipart: Multipart,
) -> Response {
    let (namespace, entity_id) = match parse_slot(&namespace, &entity_id) {
        Ok(slot) => slot,
        Err(e) => return error_response(&e),
    };

    let form = match read_upload_form(&mut multipart).await {
        Ok(form) => form,
        Err(e) => return error_response(&e),
    };
    let Some(filename) = form.filename else {
        return error_response(&AppError::Validation(
            "multipart field 'file' with a filename is required".to_string(),
        ));
    };

    let mut request = UploadRequest::new(
        namespace.clone(),
        entity_id.clone(),
        filename,
        form.content,
    );
    request.commit_message = form.message;
    request.replaces = form.replaces;

    match state.attachments.upload(request).await {
        Ok(result) => {
            info!(
                namespace = %namespace,
                entity_id = %entity_id,
                url = %result.public_url,
                renamed = result.renamed,
                "File uploaded"
            );
            (StatusCode::CREATED, Json(result)).into_response()
        }
        Err(e) => {
            error!(
                namespace = %namespace,
                entity_id = %entity_id,
                error = %e,
                "Failed to upload file"
            );
            error_response(&AppError::from(e))
        }
    }
}

/// GET `/files/{namespace}/{entity_id}/{filename}`
/// Look up a stored file's metadata.
async fn lookup_file(
    State(state): State<AppState>,
    Path((namespace, entity_id, filename)): Path<(String, String, String)>,
) -> Response {
    let path = match parse_path(&namespace, &entity_id, &filename) {
        Ok(path) => path,
        Err(e) => return error_response(&e),
    };

    match state
        .storage
        .exists(&path.namespace, &path.entity_id, &path.filename)
        .await
    {
        Ok(Lookup::Found(meta)) => (
            StatusCode::OK,
            Json(FileMetaResponse {
                sha: meta.sha,
                size: meta.size,
                path: meta.path,
                public_url: state.storage.translator().to_public_url(&path),
            }),
        )
            .into_response(),
        Ok(Lookup::NotFound) => error_response(&AppError::NotFound(format!(
            "file {} not found",
            path.repo_path()
        ))),
        Err(e) => {
            error!(path = %path.repo_path(), error = %e, "Failed to look up file");
            error_response(&AppError::from(e))
        }
    }
}

/// GET `/files/{namespace}/{entity_id}/{filename}/content`
/// Read a stored file's bytes.
async fn read_file(
    State(state): State<AppState>,
    Path((namespace, entity_id, filename)): Path<(String, String, String)>,
) -> Response {
    let path = match parse_path(&namespace, &entity_id, &filename) {
        Ok(path) => path,
        Err(e) => return error_response(&e),
    };

    match state
        .storage
        .read(&path.namespace, &path.entity_id, &path.filename)
        .await
    {
        Ok(Some(bytes)) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, content_type_for(&path.filename))],
            bytes,
        )
            .into_response(),
        Ok(None) => error_response(&AppError::NotFound(format!(
            "file {} not found",
            path.repo_path()
        ))),
        Err(e) => {
            error!(path = %path.repo_path(), error = %e, "Failed to read file");
            error_response(&AppError::from(e))
        }
    }
}

/// DELETE `/files/{namespace}`
/// Remove the file a stored public URL points at.
async fn remove_file(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
    Json(payload): Json<RemoveFileRequest>,
) -> Response {
    let namespace = match parse_namespace(&namespace) {
        Ok(ns) => ns,
        Err(e) => return error_response(&e),
    };

    match state.storage.remove(&payload.public_url, &namespace).await {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(e) => {
            error!(
                namespace = %namespace,
                url = %payload.public_url,
                error = %e,
                "Failed to remove file"
            );
            error_response(&AppError::from(e))
        }
    }
}

/// DELETE `/entities/{namespace}/{entity_id}/files`
/// Release every file of a record that is being deleted. Always 200.
async fn release_entity_files(
    State(state): State<AppState>,
    Path((namespace, entity_id)): Path<(String, String)>,
    Json(payload): Json<ReleaseFilesRequest>,
) -> Response {
    let (namespace, entity_id) = match parse_slot(&namespace, &entity_id) {
        Ok(slot) => slot,
        Err(e) => return error_response(&e),
    };

    let report = state
        .attachments
        .release(&namespace, &entity_id, &payload.urls)
        .await;
    let manual_cleanup = report.manual_cleanup_message();
    if let Some(message) = &manual_cleanup {
        warn!(namespace = %namespace, entity_id = %entity_id, "{message}");
    }

    (
        StatusCode::OK,
        Json(ReleaseFilesResponse {
            report,
            manual_cleanup,
        }),
    )
        .into_response()
}
