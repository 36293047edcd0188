//! Repository-backed file storage served through a CDN.
//!
//! Files are blobs in a git repository, written and deleted through the
//! host's contents API and read by end users through a CDN mirror.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                         ContentStore                             │
//! │        exists / read / put (rename on collision) / remove        │
//! ├───────────────────────────────┬──────────────────────────────────┤
//! │        UrlTranslator          │        ResilientClient           │
//! │  https://<cdn>/gh/<o>/<r>/... │  bearer auth, backoff on 5xx     │
//! │    <-> namespace/id/file      ├──────────────────────────────────┤
//! │                               │  HttpTransport (reqwest::Client) │
//! └───────────────────────────────┴──────────────────────────────────┘
//! ```

mod client;
mod config;
mod error;
mod service;
#[cfg(test)]
pub(crate) mod testing;
mod transport;
mod url;

pub use client::{ResilientClient, RetryPolicy};
pub use config::{Committer, StoreConfig};
pub use error::StorageError;
pub use service::{ContentStore, Lookup, MAX_RENAME_ATTEMPTS, RemoteFileMeta, RemoveOutcome};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, TransportError};
pub use url::{OriginPath, UrlTranslator, compose_public_url};
