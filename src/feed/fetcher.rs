//! Feed fetching over HTTP.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

use crate::config::FetcherConfig;
use crate::error::{FeedmonError, Result};
use crate::feed::parser;
use crate::feed::types::Feed;

/// User agent string for feed fetching.
const USER_AGENT: &str = "feedmon/0.1 (RSS monitor)";

/// Source of parsed feeds the command handler and scheduler depend on.
///
/// A trait so both can be driven by canned feeds in tests.
#[async_trait]
pub trait FeedReader: Send + Sync {
    /// Fetch and parse a feed.
    ///
    /// Every failure mode - bad URL, transport error, oversized response,
    /// content that is not a feed - is logged here and collapses to `None`;
    /// callers skip the feed for this cycle and try again on the next one.
    async fn fetch_and_parse(&self, url: &str) -> Option<Feed>;
}

/// `FeedReader` over a shared HTTP client with timeouts and size limits.
pub struct FeedFetcher {
    client: Client,
    max_feed_size: u64,
}

impl FeedFetcher {
    /// Create a fetcher with the configured limits.
    pub fn new(config: &FetcherConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .read_timeout(Duration::from_secs(config.read_timeout_secs))
            .timeout(Duration::from_secs(config.total_timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| FeedmonError::Feed(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            max_feed_size: config.max_feed_size_bytes,
        })
    }

    async fn try_fetch(&self, url: &str) -> Result<Feed> {
        let parsed_url =
            url::Url::parse(url).map_err(|e| FeedmonError::Feed(format!("invalid URL: {e}")))?;
        match parsed_url.scheme() {
            "http" | "https" => {}
            scheme => {
                return Err(FeedmonError::Feed(format!(
                    "unsupported URL scheme: {scheme}"
                )));
            }
        }

        let response = self
            .client
            .get(parsed_url)
            .send()
            .await
            .map_err(|e| FeedmonError::Feed(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(FeedmonError::Feed(format!(
                "HTTP error: {}",
                response.status()
            )));
        }

        if let Some(content_length) = response.content_length() {
            if content_length > self.max_feed_size {
                return Err(FeedmonError::Feed(format!(
                    "feed too large: {content_length} bytes (max {} bytes)",
                    self.max_feed_size
                )));
            }
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| FeedmonError::Feed(format!("failed to read response: {e}")))?;

        if bytes.len() as u64 > self.max_feed_size {
            return Err(FeedmonError::Feed(format!(
                "feed too large: {} bytes (max {} bytes)",
                bytes.len(),
                self.max_feed_size
            )));
        }

        let text = String::from_utf8_lossy(&bytes);
        parser::parse(&text)
            .ok_or_else(|| FeedmonError::Feed("content is not an RSS or Atom feed".to_string()))
    }
}

#[async_trait]
impl FeedReader for FeedFetcher {
    async fn fetch_and_parse(&self, url: &str) -> Option<Feed> {
        let url = normalize_url(url);
        match self.try_fetch(&url).await {
            Ok(feed) => {
                debug!("fetched {} item(s) from {}", feed.items.len(), url);
                Some(feed)
            }
            Err(e) => {
                warn!("feed fetch failed for {}: {}", url, e);
                None
            }
        }
    }
}

/// Default scheme-less URLs to https.
pub fn normalize_url(url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("https://{url}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_url_adds_https() {
        assert_eq!(
            normalize_url("example.com/feed.xml"),
            "https://example.com/feed.xml"
        );
    }

    #[test]
    fn test_normalize_url_keeps_scheme() {
        assert_eq!(
            normalize_url("http://example.com/feed.xml"),
            "http://example.com/feed.xml"
        );
        assert_eq!(
            normalize_url("https://example.com/feed.xml"),
            "https://example.com/feed.xml"
        );
    }

    #[tokio::test]
    async fn test_fetch_invalid_url_is_none() {
        let fetcher = FeedFetcher::new(&FetcherConfig::default()).unwrap();
        assert!(fetcher.fetch_and_parse("https://%%%/").await.is_none());
    }
}
