//! In-memory transports for storage tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::{Method, StatusCode};
use serde_json::{Value, json};

use super::transport::{HttpRequest, HttpResponse, HttpTransport, TransportError};

type Scripted = Result<(StatusCode, String), String>;

/// Replays a fixed list of outcomes, then a fallback status if any.
#[derive(Clone, Default)]
pub(crate) struct ScriptedTransport {
    script: Arc<Mutex<VecDeque<Scripted>>>,
    fallback: Option<StatusCode>,
    calls: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<HttpRequest>>>,
}

impl ScriptedTransport {
    pub(crate) fn new(script: Vec<Scripted>) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into())),
            ..Self::default()
        }
    }

    pub(crate) fn always(status: StatusCode) -> Self {
        Self {
            fallback: Some(status),
            ..Self::default()
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl HttpTransport for ScriptedTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request);

        let next = self.script.lock().unwrap().pop_front();
        match (next, self.fallback) {
            (Some(Ok((status, body))), _) => Ok(HttpResponse::new(status, body)),
            (Some(Err(message)), _) => Err(TransportError(message)),
            (None, Some(status)) => Ok(HttpResponse::new(status, "{}")),
            (None, None) => Err(TransportError("script exhausted".to_string())),
        }
    }
}

#[derive(Default)]
struct OriginState {
    files: HashMap<String, (String, Vec<u8>)>,
    next_sha: u64,
    injected: VecDeque<StatusCode>,
    rejected_put: Option<StatusCode>,
    log: Vec<(Method, String)>,
    messages: Vec<String>,
}

impl OriginState {
    fn mint_sha(&mut self) -> String {
        self.next_sha += 1;
        format!("{:040x}", self.next_sha)
    }
}

/// Minimal contents API: `GET`/`PUT`/`DELETE` on `.../contents/<path>`.
///
/// Follows the origin's rules that matter here: `PUT` on an existing path
/// without a sha is a 422, `DELETE` needs the current sha.
#[derive(Clone, Default)]
pub(crate) struct FakeOrigin {
    state: Arc<Mutex<OriginState>>,
}

impl FakeOrigin {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Store a file directly, returning its sha.
    pub(crate) fn insert(&self, path: &str, content: &[u8]) -> String {
        let mut state = self.state.lock().unwrap();
        let sha = state.mint_sha();
        state
            .files
            .insert(path.to_string(), (sha.clone(), content.to_vec()));
        sha
    }

    pub(crate) fn contains(&self, path: &str) -> bool {
        self.state.lock().unwrap().files.contains_key(path)
    }

    pub(crate) fn content(&self, path: &str) -> Option<Vec<u8>> {
        self.state
            .lock()
            .unwrap()
            .files
            .get(path)
            .map(|(_, bytes)| bytes.clone())
    }

    pub(crate) fn len(&self) -> usize {
        self.state.lock().unwrap().files.len()
    }

    /// Answer the next `count` requests with `status` before touching state.
    pub(crate) fn fail_next(&self, status: StatusCode, count: usize) {
        let mut state = self.state.lock().unwrap();
        state.injected.extend(std::iter::repeat_n(status, count));
    }

    /// Answer every `PUT` with `status`.
    pub(crate) fn reject_puts(&self, status: StatusCode) {
        self.state.lock().unwrap().rejected_put = Some(status);
    }

    pub(crate) fn calls(&self) -> usize {
        self.state.lock().unwrap().log.len()
    }

    pub(crate) fn calls_with(&self, method: &Method) -> usize {
        self.state
            .lock()
            .unwrap()
            .log
            .iter()
            .filter(|(m, _)| m == method)
            .count()
    }

    /// Commit messages of successful writes and deletes, in order.
    pub(crate) fn messages(&self) -> Vec<String> {
        self.state.lock().unwrap().messages.clone()
    }

    fn handle(&self, request: &HttpRequest) -> (StatusCode, Value) {
        let mut state = self.state.lock().unwrap();
        state.log.push((request.method.clone(), request.url.clone()));

        if let Some(status) = state.injected.pop_front() {
            return (status, json!({ "message": "injected failure" }));
        }

        let Some((_, path)) = request.url.split_once("/contents/") else {
            return (StatusCode::NOT_FOUND, json!({ "message": "Not Found" }));
        };
        let path = path.to_string();
        let body: Value = request
            .body
            .as_ref()
            .and_then(|b| serde_json::from_slice(b).ok())
            .unwrap_or(Value::Null);

        match request.method {
            Method::GET => match state.files.get(&path) {
                Some((sha, bytes)) => (
                    StatusCode::OK,
                    json!({
                        "type": "file",
                        "encoding": "base64",
                        "size": bytes.len(),
                        "name": path.rsplit('/').next(),
                        "path": path,
                        "content": wrap_base64(bytes),
                        "sha": sha,
                    }),
                ),
                None => (StatusCode::NOT_FOUND, json!({ "message": "Not Found" })),
            },
            Method::PUT => {
                if let Some(status) = state.rejected_put {
                    return (status, json!({ "message": "Resource not accessible" }));
                }
                let current = state.files.get(&path).map(|(sha, _)| sha.clone());
                let supplied = body["sha"].as_str();
                match (current, supplied) {
                    (Some(_), None) => {
                        return (
                            StatusCode::UNPROCESSABLE_ENTITY,
                            json!({ "message": "Invalid request.\n\n\"sha\" wasn't supplied." }),
                        );
                    }
                    (Some(current), Some(sha)) if current != sha => {
                        return (StatusCode::CONFLICT, json!({ "message": "sha mismatch" }));
                    }
                    _ => {}
                }
                let Some(Ok(bytes)) = body["content"].as_str().map(|c| STANDARD.decode(c)) else {
                    return (
                        StatusCode::UNPROCESSABLE_ENTITY,
                        json!({ "message": "content is not valid Base64" }),
                    );
                };
                let sha = state.mint_sha();
                state.files.insert(path.clone(), (sha.clone(), bytes));
                if let Some(message) = body["message"].as_str() {
                    state.messages.push(message.to_string());
                }
                (
                    StatusCode::CREATED,
                    json!({ "content": { "path": path, "sha": sha } }),
                )
            }
            Method::DELETE => {
                let Some((current, _)) = state.files.get(&path) else {
                    return (StatusCode::NOT_FOUND, json!({ "message": "Not Found" }));
                };
                if body["sha"].as_str() != Some(current.as_str()) {
                    return (StatusCode::CONFLICT, json!({ "message": "sha mismatch" }));
                }
                state.files.remove(&path);
                if let Some(message) = body["message"].as_str() {
                    state.messages.push(message.to_string());
                }
                (StatusCode::OK, json!({ "content": null }))
            }
            _ => (
                StatusCode::METHOD_NOT_ALLOWED,
                json!({ "message": "Method Not Allowed" }),
            ),
        }
    }
}

impl HttpTransport for FakeOrigin {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let (status, body) = self.handle(&request);
        Ok(HttpResponse::new(status, body.to_string()))
    }
}

/// Base64 with a newline every 60 characters, as the origin returns it.
fn wrap_base64(bytes: &[u8]) -> String {
    let encoded = STANDARD.encode(bytes);
    encoded
        .as_bytes()
        .chunks(60)
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
        .collect::<Vec<_>>()
        .join("\n")
}
