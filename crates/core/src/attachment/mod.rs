//! Entity file conventions on top of the content store.
//!
//! Owning records (news posts, board members, sponsors, ...) keep only the
//! public URL of their files. This module:
//! - Sanitises and validates uploads
//! - Stores them under the entity's slot, reporting renames
//! - Removes superseded files after a replacement upload
//! - Releases every file of a deleted record, best-effort

mod error;
mod service;
mod types;

pub use error::AttachmentError;
pub use service::AttachmentService;
pub use types::{CleanupReport, FileCleanup, RemovalStatus, UploadRequest, UploadResult};
