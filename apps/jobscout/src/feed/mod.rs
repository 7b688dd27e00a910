//! Feed Source — fetches an RSS 2.0 or Atom document and yields its items in feed order.
//!
//! Accepts `http(s)://` URLs, `file://` URLs and plain filesystem paths.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info};

use crate::errors::AppError;

pub mod normalizer;
pub mod parser;

const FEED_TIMEOUT_SECS: u64 = 30;

/// One item as it appeared in the feed. Every field may be absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawPosting {
    pub id: Option<String>,
    pub link: Option<String>,
    pub title: Option<String>,
    pub summary: Option<String>,
    pub content: Option<String>,
    pub author: Option<String>,
    pub published: Option<String>,
    pub location: Option<String>,
}

#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch(&self, location: &str) -> Result<Vec<RawPosting>, AppError>;
}

/// Production feed source: HTTP for URLs, the local filesystem otherwise.
pub struct HttpFeedSource {
    client: Client,
}

impl HttpFeedSource {
    pub fn new() -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(FEED_TIMEOUT_SECS))
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::Feed(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, AppError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::Feed(format!("GET {url} failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Feed(format!("GET {url} returned {status}")));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| AppError::Feed(format!("reading body of {url} failed: {e}")))?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    async fn fetch(&self, location: &str) -> Result<Vec<RawPosting>, AppError> {
        let bytes = if location.starts_with("http://") || location.starts_with("https://") {
            self.download(location).await?
        } else {
            let path = location.strip_prefix("file://").unwrap_or(location);
            tokio::fs::read(path)
                .await
                .map_err(|e| AppError::Feed(format!("reading {path} failed: {e}")))?
        };
        debug!("Fetched {} bytes from {}", bytes.len(), location);

        let postings = parser::parse_feed(&bytes)?;
        info!("Feed {} yielded {} postings", location, postings.len());
        Ok(postings)
    }
}

/// Feed source that serves a fixed list of postings, for tests.
#[cfg(test)]
pub struct StaticFeed(pub Vec<RawPosting>);

#[cfg(test)]
#[async_trait]
impl FeedSource for StaticFeed {
    async fn fetch(&self, _location: &str) -> Result<Vec<RawPosting>, AppError> {
        Ok(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[tokio::test]
    async fn test_fetch_reads_local_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"<rss version="2.0"><channel><title>Jobs</title>
               <item><title>Rust Engineer</title><link>https://jobs.example.com/1</link></item>
               </channel></rss>"#
        )
        .unwrap();

        let source = HttpFeedSource::new().unwrap();
        let postings = source.fetch(file.path().to_str().unwrap()).await.unwrap();
        assert_eq!(postings.len(), 1);
        assert_eq!(postings[0].title.as_deref(), Some("Rust Engineer"));
    }

    #[tokio::test]
    async fn test_fetch_missing_file_is_feed_error() {
        let source = HttpFeedSource::new().unwrap();
        let err = source.fetch("/definitely/not/here.xml").await.unwrap_err();
        assert!(matches!(err, AppError::Feed(_)));
    }
}
