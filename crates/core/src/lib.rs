//! Core file storage logic for the IFMSA Brazil admin.
//!
//! This crate has no web framework dependencies. Outbound HTTP goes through
//! the [`storage::HttpTransport`] seam.
//!
//! # Modules
//!
//! - `storage` - Resilient client, CDN URL translation, content store adapter
//! - `attachment` - Upload and cleanup conventions for owning records

pub mod attachment;
pub mod storage;
