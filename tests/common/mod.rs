//! Shared test fixtures: a recording transport and a canned feed reader.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use feedmon::telegram::{Chat, Message, SendOptions, Update, User};
use feedmon::{BotApi, Feed, FeedItem, FeedReader, Result};

/// One message recorded by [`MockApi`].
#[derive(Debug, Clone)]
pub struct SentMessage {
    pub chat_id: i64,
    pub text: String,
    pub muted: bool,
}

/// `BotApi` that records outbound messages instead of sending them.
#[derive(Default)]
pub struct MockApi {
    sent: Mutex<Vec<SentMessage>>,
}

impl MockApi {
    /// Everything sent so far, in order.
    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }

    /// Number of messages sent so far.
    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl BotApi for MockApi {
    async fn get_me(&self) -> Result<User> {
        Ok(User {
            id: 0,
            first_name: "feedmon".to_string(),
            username: Some("feedmon_bot".to_string()),
        })
    }

    async fn get_updates(
        &self,
        _offset: Option<i64>,
        _limit: i64,
        _timeout_secs: u64,
    ) -> Result<Vec<Update>> {
        Ok(vec![])
    }

    async fn send_message(&self, chat_id: i64, text: &str, opts: &SendOptions) -> Result<Message> {
        self.sent.lock().unwrap().push(SentMessage {
            chat_id,
            text: text.to_string(),
            muted: opts.disable_notification,
        });
        Ok(Message {
            message_id: 0,
            from: None,
            chat: Chat { id: chat_id },
            text: Some(text.to_string()),
        })
    }
}

/// `FeedReader` serving canned feeds by URL; unknown URLs fail the fetch.
#[derive(Default)]
pub struct MockReader {
    feeds: Mutex<HashMap<String, Feed>>,
}

impl MockReader {
    /// Serve `feed` for `url` from now on.
    pub fn set(&self, url: &str, feed: Feed) {
        self.feeds.lock().unwrap().insert(url.to_string(), feed);
    }

    /// Stop serving `url`, making fetches fail again.
    pub fn remove(&self, url: &str) {
        self.feeds.lock().unwrap().remove(url);
    }
}

#[async_trait]
impl FeedReader for MockReader {
    async fn fetch_and_parse(&self, url: &str) -> Option<Feed> {
        self.feeds.lock().unwrap().get(url).cloned()
    }
}

/// An update carrying a plain text message from `user_id`, chatting from the
/// chat with the same id.
pub fn text_update(update_id: i64, user_id: i64, text: &str) -> Update {
    Update {
        update_id,
        message: Some(Message {
            message_id: update_id,
            from: Some(User {
                id: user_id,
                first_name: "Ann".to_string(),
                username: None,
            }),
            chat: Chat { id: user_id },
            text: Some(text.to_string()),
        }),
    }
}

/// A feed with the given build timestamp and items.
pub fn feed(last_build: Option<DateTime<Utc>>, items: Vec<FeedItem>) -> Feed {
    Feed {
        title: "Test Feed".to_string(),
        link: "https://feeds.example".to_string(),
        description: "A feed for tests".to_string(),
        pub_date: last_build,
        last_build_date: last_build,
        items,
    }
}

/// An item with a title, link and optional publication date.
pub fn item(title: &str, link: &str, pub_date: Option<DateTime<Utc>>) -> FeedItem {
    FeedItem {
        title: title.to_string(),
        description: format!("{title} body"),
        link: link.to_string(),
        pub_date,
        guid: link.to_string(),
        enclosure_url: String::new(),
    }
}
