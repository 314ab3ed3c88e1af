//! Upload destinations for images resolved during a seed run.
//!
//! A [`StorageBackend`] stores bytes under a relative path and knows the
//! public URL those bytes will be served from. The seed pipeline only ever
//! talks to the trait; which concrete backend sits behind it (local public
//! directory, in-memory mock, read-only wrapper for dry runs) is decided once
//! at start-up from configuration.

pub mod backend;
pub mod error;
mod models;
mod path;

pub use crate::backend::StorageBackend;
pub use crate::models::FileInfo;
pub use crate::path::{to_key, validate as validate_path};
use std::sync::Arc;

pub type BackendHandle = Arc<dyn StorageBackend + Send + Sync>;
