//! Storage backend trait and implementations.
//!
//! This module defines the `StorageBackend` trait, the upload provider seam of
//! the seed pipeline. Implementations store image bytes under a relative path
//! and map that path to the public URL the web application serves it from.

mod local;
#[cfg(feature = "mock")]
mod mock;
mod ro;

pub use self::local::LocalBackend;
#[cfg(feature = "mock")]
pub use self::mock::MockBackend;
pub use self::ro::ReadOnlyBackend;
use crate::error::Result;
use crate::models::FileInfo;
use async_trait::async_trait;
use futures::{Stream, TryStreamExt};
use std::path::Path;
use std::pin::Pin;

pub(crate) type FileInfoStream<'a> = Pin<Box<dyn Stream<Item = Result<FileInfo>> + Send + 'a>>;

/// Unified interface for upload destinations.
///
/// # Path Handling
/// All paths are relative to the storage root and must be validated using
/// [`validate_path`](crate::validate_path) before use. Implementations
/// enforce this validation.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use tankobon_storage::{backend::StorageBackend, error::Result};
///
/// async fn upload_once(backend: &dyn StorageBackend, path: &Path, bytes: &[u8]) -> Result<String> {
///     if !backend.exists(path).await? {
///         backend.write(path, bytes).await?;
///     }
///     Ok(backend.url(path))
/// }
/// ```
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Name of the configured backend (used for logging only).
    fn name(&self) -> &str;

    /// The public URL a stored path is served from.
    ///
    /// This is a pure mapping: it does not check that anything exists at
    /// `path`.
    fn url(&self, path: &Path) -> String;

    /// List all files matching an optional prefix.
    ///
    /// Default implementation of this method is to collect all the results
    /// from [`list_stream()`](Self::list_stream) into a [`Vec`] before
    /// returning.
    async fn list(&self, prefix: Option<&Path>) -> Result<Vec<FileInfo>> {
        self.list_stream(prefix).try_collect().await
    }

    /// Stream file metadata matching an optional prefix.
    ///
    /// Yields results incrementally. A prefix is matched component-wise, so
    /// `comics/a` matches `comics/a/cover.jpg` but not `comics/ab/cover.jpg`.
    /// Listing a prefix that does not exist yields nothing rather than an
    /// error.
    fn list_stream<'a>(&'a self, prefix: Option<&'a Path>) -> FileInfoStream<'a>;

    /// Check if a file exists.
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Read file contents.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the file
    /// does not exist.
    async fn read(&self, path: &Path) -> Result<Vec<u8>>;

    /// Write file contents, creating a new file or overwriting an existing
    /// one. Parent directories are created as needed.
    async fn write(&self, path: &Path, data: &[u8]) -> Result<()>;

    /// Delete a file.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the file
    /// does not exist.
    async fn delete(&self, path: &Path) -> Result<()>;
}

/// Join a base URL and a relative storage key with exactly one slash.
pub(crate) fn join_url(base: &str, key: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), key.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_url() {
        assert_eq!(join_url("/uploads", "a/b.png"), "/uploads/a/b.png");
        assert_eq!(join_url("/uploads/", "/a/b.png"), "/uploads/a/b.png");
        assert_eq!(join_url("https://cdn.example.com", "a.png"), "https://cdn.example.com/a.png");
        assert_eq!(join_url("", "a.png"), "/a.png");
    }
}
