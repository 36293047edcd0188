//! Shared types, errors, and configuration for the IFMSA Brazil admin backend.
//!
//! This crate provides common types used across all other crates:
//! - Validated names addressing stored files (namespace, entity id, filename)
//! - Application-wide error types
//! - Configuration management

pub mod config;
pub mod error;
pub mod types;

pub use config::{AppConfig, RetrySettings, ServerConfig, StorageSettings};
pub use error::{AppError, AppResult};
pub use types::{EntityId, FileName, NameError, Namespace};
