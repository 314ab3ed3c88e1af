use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

/// Hit/miss counters and index sizes of an [`ImageCache`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// `hits / (hits + misses)`, or `0.0` before the first lookup.
    pub hit_rate: f64,
    pub url_entries: usize,
    pub hash_entries: usize,
}

/// In-memory map of already-uploaded images, indexed both by source URL and
/// by SHA-256 of the content.
///
/// Lives for one seed run and is shared by every concurrent resolution. There
/// is no eviction or expiry; [`clear_cache`](Self::clear_cache) is the only
/// way to empty it.
#[derive(Debug, Default)]
pub struct ImageCache {
    by_url: RwLock<HashMap<String, String>>,
    by_hash: RwLock<HashMap<String, String>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ImageCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `url` has a cached destination. Does not count as a lookup.
    pub fn is_cached(&self, url: &str) -> bool {
        self.by_url.read().unwrap_or_else(PoisonError::into_inner).contains_key(url)
    }

    /// Destination for a previously cached source URL. Counts a hit or a miss.
    pub fn get_cached_url(&self, url: &str) -> Option<String> {
        let found = self.by_url.read().unwrap_or_else(PoisonError::into_inner).get(url).cloned();
        let counter = if found.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    /// Destination of previously uploaded content with this hash.
    pub fn get_cached_by_hash(&self, hash: &str) -> Option<String> {
        self.by_hash.read().unwrap_or_else(PoisonError::into_inner).get(hash).cloned()
    }

    /// Record that `original` now lives at `uploaded`.
    ///
    /// The first destination recorded for a URL (or hash) wins; later calls
    /// for the same key do not replace it.
    pub fn cache_image(&self, original: &str, uploaded: &str, hash: Option<&str>) {
        self.by_url
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(original.to_string())
            .or_insert_with(|| uploaded.to_string());
        if let Some(hash) = hash {
            self.by_hash
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .entry(hash.to_string())
                .or_insert_with(|| uploaded.to_string());
        }
    }

    /// Lowercase hex SHA-256 of `bytes`.
    pub fn get_image_hash(bytes: &[u8]) -> String {
        format!("{:x}", Sha256::digest(bytes))
    }

    /// Forget every entry and reset the counters.
    pub fn clear_cache(&self) {
        self.by_url.write().unwrap_or_else(PoisonError::into_inner).clear();
        self.by_hash.write().unwrap_or_else(PoisonError::into_inner).clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    pub fn get_cache_stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let lookups = hits + misses;
        CacheStats {
            hits,
            misses,
            hit_rate: if lookups == 0 { 0.0 } else { hits as f64 / lookups as f64 },
            url_entries: self.by_url.read().unwrap_or_else(PoisonError::into_inner).len(),
            hash_entries: self.by_hash.read().unwrap_or_else(PoisonError::into_inner).len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_lookup_counts() {
        let cache = ImageCache::new();
        assert_eq!(cache.get_cached_url("https://cdn/a.jpg"), None);
        cache.cache_image("https://cdn/a.jpg", "/uploads/a.jpg", None);
        assert!(cache.is_cached("https://cdn/a.jpg"));
        assert_eq!(cache.get_cached_url("https://cdn/a.jpg").as_deref(), Some("/uploads/a.jpg"));
        assert_eq!(cache.get_cached_url("https://cdn/a.jpg").as_deref(), Some("/uploads/a.jpg"));

        let stats = cache.get_cache_stats();
        assert_eq!((stats.hits, stats.misses), (2, 1));
        assert!((stats.hit_rate - 2.0 / 3.0).abs() < f64::EPSILON);
        assert_eq!((stats.url_entries, stats.hash_entries), (1, 0));
    }

    #[test]
    fn test_first_destination_wins() {
        let cache = ImageCache::new();
        cache.cache_image("a", "/uploads/first.jpg", Some("h"));
        cache.cache_image("a", "/uploads/second.jpg", Some("h"));
        assert_eq!(cache.get_cached_url("a").as_deref(), Some("/uploads/first.jpg"));
        assert_eq!(cache.get_cached_by_hash("h").as_deref(), Some("/uploads/first.jpg"));
    }

    #[test]
    fn test_hash_index_spans_urls() {
        let cache = ImageCache::new();
        let hash = ImageCache::get_image_hash(b"same bytes");
        cache.cache_image("https://a/x.png", "/uploads/x.png", Some(&hash));
        assert_eq!(cache.get_cached_by_hash(&ImageCache::get_image_hash(b"same bytes")).as_deref(), Some("/uploads/x.png"));
        assert!(!cache.is_cached("https://b/y.png"));
    }

    #[test]
    fn test_hash_is_sha256_hex() {
        assert_eq!(
            ImageCache::get_image_hash(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_clear_cache() {
        let cache = ImageCache::new();
        cache.cache_image("a", "/uploads/a.jpg", Some("h"));
        cache.get_cached_url("a");
        cache.clear_cache();
        assert!(!cache.is_cached("a"));
        assert_eq!(cache.get_cached_by_hash("h"), None);
        let stats = cache.get_cache_stats();
        assert_eq!((stats.hits, stats.misses, stats.url_entries), (0, 0, 0));
        assert_eq!(stats.hit_rate, 0.0);
    }
}
