//! Read-only storage backend, used for dry runs.
//!
//! Wraps another backend and drops every mutating operation while still
//! reporting success, so a dry run exercises the full upload path (including
//! URL generation) without publishing anything.

use async_trait::async_trait;
use std::path::Path;

use crate::{BackendHandle, StorageBackend, backend::FileInfoStream, error::Result};

/// Read-only storage backend.
///
/// Reads and listings are delegated to the inner backend; writes and deletes
/// are logged at `info` level and skipped.
#[derive(Clone)]
pub struct ReadOnlyBackend {
    inner: BackendHandle,
}
impl ReadOnlyBackend {
    pub fn new(inner: BackendHandle) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl StorageBackend for ReadOnlyBackend {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn url(&self, path: &Path) -> String {
        self.inner.url(path)
    }

    fn list_stream<'a>(&'a self, prefix: Option<&'a Path>) -> FileInfoStream<'a> {
        self.inner.list_stream(prefix)
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        self.inner.exists(path).await
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        self.inner.read(path).await
    }

    async fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        tracing::info!(path = %path.display(), bytes = data.len(), "Skipping upload during dry run");
        Ok(())
    }

    async fn delete(&self, path: &Path) -> Result<()> {
        tracing::info!(path = %path.display(), "Skipping delete during dry run");
        Ok(())
    }
}
