use async_trait::async_trait;
use exn::ResultExt;
use std::path::PathBuf;
use std::time::Duration;
use tankobon_storage::validate_path;
use tracing::instrument;

use crate::error::{ErrorKind, Result};

const USER_AGENT: &str = concat!("tankobon/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Where source image bytes come from.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Downloads `http(s)` URLs and reads site-relative paths (`/images/a.jpg`)
/// from the public directory.
pub struct DefaultFetcher {
    client: reqwest::Client,
    public_dir: PathBuf,
}

impl DefaultFetcher {
    pub fn new(public_dir: impl Into<PathBuf>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .or_raise(|| ErrorKind::Configuration)?;
        Ok(Self { client, public_dir: public_dir.into() })
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let failed = || ErrorKind::Image(url.to_string());
        let response = self.client.get(url).send().await.or_raise(failed)?;
        let response = response.error_for_status().or_raise(failed)?;
        Ok(response.bytes().await.or_raise(failed)?.to_vec())
    }

    async fn read_public(&self, url: &str) -> Result<Vec<u8>> {
        let failed = || ErrorKind::Image(url.to_string());
        let relative = validate_path(url.trim_start_matches('/')).or_raise(failed)?;
        tokio::fs::read(self.public_dir.join(relative)).await.or_raise(failed)
    }
}

#[async_trait]
impl ImageFetcher for DefaultFetcher {
    #[instrument(level = "debug", skip(self))]
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        if url.starts_with("http://") || url.starts_with("https://") {
            self.download(url).await
        } else if let Some(rest) = url.strip_prefix("//") {
            self.download(&format!("https://{rest}")).await
        } else {
            self.read_public(url).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_reads_site_relative_paths_from_public_dir() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("images")).unwrap();
        std::fs::write(dir.path().join("images/a.jpg"), b"bytes").unwrap();
        let fetcher = DefaultFetcher::new(dir.path()).unwrap();
        assert_eq!(fetcher.fetch("/images/a.jpg").await.unwrap(), b"bytes");
    }

    #[tokio::test]
    async fn test_missing_and_escaping_paths_fail() {
        let dir = TempDir::new().unwrap();
        let fetcher = DefaultFetcher::new(dir.path()).unwrap();
        let err = fetcher.fetch("/images/missing.jpg").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Image(url) if url == "/images/missing.jpg"));
        assert!(fetcher.fetch("/../etc/passwd").await.is_err());
    }
}
