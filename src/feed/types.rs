//! Normalized feed records produced by the parser.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

/// A parsed feed, RSS or Atom, reduced to one shape.
///
/// Produced fresh on every fetch and never persisted; only the watermark and
/// recency identifiers derived from it are.
#[derive(Debug, Clone, Default)]
pub struct Feed {
    pub title: String,
    pub link: String,
    pub description: String,
    /// Feed-level publication timestamp, when the feed carries one.
    pub pub_date: Option<DateTime<Utc>>,
    /// Feed-level build timestamp, used as the change-detection watermark.
    pub last_build_date: Option<DateTime<Utc>>,
    pub items: Vec<FeedItem>,
}

/// One item or entry of a feed.
#[derive(Debug, Clone, Default)]
pub struct FeedItem {
    pub title: String,
    pub description: String,
    pub link: String,
    pub pub_date: Option<DateTime<Utc>>,
    pub guid: String,
    pub enclosure_url: String,
}

impl FeedItem {
    /// Identifier used for notification dedup.
    ///
    /// The link when the item has one, otherwise a digest of its content, so
    /// link-less items still dedup stably across cycles.
    pub fn identifier(&self) -> String {
        if !self.link.is_empty() {
            return self.link.clone();
        }

        let mut hasher = Sha256::new();
        hasher.update(self.title.as_bytes());
        hasher.update(b"\n");
        hasher.update(self.description.as_bytes());
        let digest = hasher.finalize();
        digest.iter().map(|b| format!("{b:02x}")).collect()
    }
}
