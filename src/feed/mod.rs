//! Feed fetching and parsing.

pub mod dates;
pub mod fetcher;
pub mod parser;
pub mod types;

pub use dates::{parse_iso_date, parse_rss_date};
pub use fetcher::{normalize_url, FeedFetcher, FeedReader};
pub use parser::parse;
pub use types::{Feed, FeedItem};
