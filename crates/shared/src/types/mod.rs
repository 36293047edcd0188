//! Common types used across the application.

pub mod names;

pub use names::{EntityId, FileName, NameError, Namespace};
