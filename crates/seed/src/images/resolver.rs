use exn::{OptionExt, ResultExt};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use tankobon_storage::BackendHandle;
use tokio::sync::OnceCell;
use tracing::instrument;

use super::{ImageCache, ImageContext, ImageFetcher, ImageFormat};
use crate::UploadPathGenerator;
use crate::error::{Error, ErrorKind, Result};

/// How a resolved image was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Fetched and written to the upload backend by this call.
    Downloaded,
    /// Already uploaded, by an earlier or concurrent call, by identical
    /// content under another URL, or by a previous run.
    Cached,
    /// Inline `data:` URLs are stored as they are.
    Inline,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub url: String,
    pub outcome: Outcome,
}

/// Resolves source image URLs to uploaded URLs, uploading each source URL at
/// most once per run.
///
/// Concurrent resolutions of the same URL share one in-flight attempt. If
/// that attempt fails, the failure is reported to the caller that made it
/// and the next caller tries again.
pub struct ImageResolver {
    cache: Arc<ImageCache>,
    fetcher: Arc<dyn ImageFetcher>,
    backend: BackendHandle,
    paths: UploadPathGenerator,
    pending: Mutex<HashMap<String, Arc<OnceCell<String>>>>,
}

impl ImageResolver {
    pub fn new(
        cache: Arc<ImageCache>,
        fetcher: Arc<dyn ImageFetcher>,
        backend: BackendHandle,
        paths: UploadPathGenerator,
    ) -> Self {
        Self { cache, fetcher, backend, paths, pending: Mutex::new(HashMap::new()) }
    }

    pub fn cache(&self) -> &ImageCache {
        &self.cache
    }

    #[instrument(level = "debug", skip(self, context), fields(kind = %context.kind, comic = context.comic))]
    pub async fn resolve(&self, url: &str, context: &ImageContext<'_>) -> Result<Resolved> {
        if url.starts_with("data:") {
            return Ok(Resolved { url: url.to_string(), outcome: Outcome::Inline });
        }
        if let Some(cached) = self.cache.get_cached_url(url) {
            return Ok(Resolved { url: cached, outcome: Outcome::Cached });
        }

        let cell = self.in_flight(url);
        let mut outcome = Outcome::Cached;
        let slot = &mut outcome;
        let settled = cell
            .get_or_try_init(move || async move {
                let (destination, uploaded) = self.upload(url, context).await?;
                *slot = uploaded;
                Ok::<_, Error>(destination)
            })
            .await
            .cloned();
        self.settle(url, &cell);
        Ok(Resolved { url: settled?, outcome })
    }

    fn in_flight(&self, url: &str) -> Arc<OnceCell<String>> {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        pending.entry(url.to_string()).or_default().clone()
    }

    /// Forget a finished attempt. On success the cache already holds the
    /// result, so only uploads in progress are tracked here and clearing the
    /// cache is enough to make the next resolution upload again.
    fn settle(&self, url: &str, cell: &Arc<OnceCell<String>>) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if pending.get(url).is_some_and(|current| Arc::ptr_eq(current, cell)) {
            pending.remove(url);
        }
    }

    #[cfg(test)]
    fn in_flight_count(&self) -> usize {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    async fn upload(&self, url: &str, context: &ImageContext<'_>) -> Result<(String, Outcome)> {
        let bytes = self.fetcher.fetch(url).await?;
        let hash = ImageCache::get_image_hash(&bytes);
        if let Some(existing) = self.cache.get_cached_by_hash(&hash) {
            tracing::debug!(url, destination = existing, "Identical content already uploaded");
            self.cache.cache_image(url, &existing, Some(&hash));
            return Ok((existing, Outcome::Cached));
        }

        let format = ImageFormat::detect(&bytes, url).ok_or_raise(|| ErrorKind::UnknownFormat(url.to_string()))?;
        let key = self.paths.generate(context, &hash, format)?;
        let path = Path::new(&key);
        let outcome = if self.backend.exists(path).await.or_raise(|| ErrorKind::Storage)? {
            tracing::debug!(url, key, "Destination already exists in upload backend");
            Outcome::Cached
        } else {
            self.backend.write(path, &bytes).await.or_raise(|| ErrorKind::Storage)?;
            tracing::debug!(url, key, bytes = bytes.len(), "Uploaded image");
            Outcome::Downloaded
        };
        let destination = self.backend.url(path);
        self.cache.cache_image(url, &destination, Some(&hash));
        Ok((destination, outcome))
    }
}
