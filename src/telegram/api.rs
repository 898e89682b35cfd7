//! Telegram Bot API client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::{FeedmonError, Result};
use crate::telegram::types::{ApiResponse, Message, Update, User};

/// Extra time on top of the server-side long-poll timeout before the HTTP
/// request itself is abandoned.
const POLL_TIMEOUT_MARGIN_SECS: u64 = 30;

/// Request timeout for ordinary (non-long-poll) calls.
const CALL_TIMEOUT_SECS: u64 = 30;

/// Options for an outbound message.
#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    /// Telegram parse mode, e.g. "Markdown".
    pub parse_mode: Option<String>,
    /// Suppress the link preview below the message.
    pub disable_web_page_preview: bool,
    /// Deliver silently, without a notification alert.
    pub disable_notification: bool,
}

impl SendOptions {
    /// Options for a link-formatted notification message.
    pub fn link_notification(muted: bool) -> Self {
        Self {
            parse_mode: Some("Markdown".to_string()),
            disable_web_page_preview: false,
            disable_notification: muted,
        }
    }
}

/// The outbound/inbound transport surface the bot core depends on.
///
/// Kept as a trait so command handling and scheduling can be exercised in
/// tests without network access.
#[async_trait]
pub trait BotApi: Send + Sync {
    /// `getMe` identity call.
    async fn get_me(&self) -> Result<User>;

    /// `getUpdates` long-poll fetch.
    async fn get_updates(
        &self,
        offset: Option<i64>,
        limit: i64,
        timeout_secs: u64,
    ) -> Result<Vec<Update>>;

    /// `sendMessage` to a chat.
    async fn send_message(&self, chat_id: i64, text: &str, opts: &SendOptions) -> Result<Message>;

    /// Reply into the chat an update came from.
    ///
    /// Updates without a message have no chat to reply into and are ignored.
    async fn respond(&self, update: &Update, text: &str) -> Result<()> {
        if let Some(chat_id) = update.chat_id() {
            self.send_message(chat_id, text, &SendOptions::default())
                .await?;
        }
        Ok(())
    }
}

/// `BotApi` implementation over the real Telegram HTTP API.
pub struct TelegramApi {
    client: Client,
    base_url: String,
}

impl TelegramApi {
    /// Create a client for the given bot API key.
    pub fn new(api_key: &str) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| FeedmonError::Api(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: format!("https://api.telegram.org/bot{api_key}"),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{}", self.base_url, method)
    }

    /// Perform one API call and unwrap the response envelope.
    ///
    /// The bot API key is part of the URL; log only the method name.
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        query: &[(&str, String)],
        timeout: Duration,
    ) -> Result<T> {
        debug!("telegram call: {}", method);

        // reqwest errors carry the request URL, which embeds the bot API
        // key; strip it before the error can reach a log line.
        let response = self
            .client
            .get(self.method_url(method))
            .query(query)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| FeedmonError::Api(format!("{method}: {}", e.without_url())))?;

        let status = response.status();
        let envelope: ApiResponse<T> = response.json().await.map_err(|e| {
            FeedmonError::Api(format!("{method}: bad response ({status}): {}", e.without_url()))
        })?;

        if !envelope.ok {
            let description = envelope
                .description
                .unwrap_or_else(|| "no description".to_string());
            return Err(FeedmonError::Api(format!("{method}: {description}")));
        }

        envelope
            .result
            .ok_or_else(|| FeedmonError::Api(format!("{method}: ok response without result")))
    }
}

#[async_trait]
impl BotApi for TelegramApi {
    async fn get_me(&self) -> Result<User> {
        self.call("getMe", &[], Duration::from_secs(CALL_TIMEOUT_SECS))
            .await
    }

    async fn get_updates(
        &self,
        offset: Option<i64>,
        limit: i64,
        timeout_secs: u64,
    ) -> Result<Vec<Update>> {
        let mut query: Vec<(&str, String)> = vec![
            ("limit", limit.to_string()),
            ("timeout", timeout_secs.to_string()),
        ];
        if let Some(offset) = offset {
            query.push(("offset", offset.to_string()));
        }

        // The server holds the request open for up to `timeout_secs`.
        let timeout = Duration::from_secs(timeout_secs + POLL_TIMEOUT_MARGIN_SECS);
        self.call("getUpdates", &query, timeout).await
    }

    async fn send_message(&self, chat_id: i64, text: &str, opts: &SendOptions) -> Result<Message> {
        let mut query: Vec<(&str, String)> = vec![
            ("chat_id", chat_id.to_string()),
            ("text", text.to_string()),
        ];
        if let Some(mode) = &opts.parse_mode {
            query.push(("parse_mode", mode.clone()));
        }
        if opts.disable_web_page_preview {
            query.push(("disable_web_page_preview", "true".to_string()));
        }
        if opts.disable_notification {
            query.push(("disable_notification", "true".to_string()));
        }

        let sent = self
            .call("sendMessage", &query, Duration::from_secs(CALL_TIMEOUT_SECS))
            .await;
        if let Err(e) = &sent {
            warn!("sendMessage to chat {} failed: {}", chat_id, e);
        }
        sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_url_contains_key_and_method() {
        let api = TelegramApi::new("123456:ABCDEF").unwrap();
        assert_eq!(
            api.method_url("getUpdates"),
            "https://api.telegram.org/bot123456:ABCDEF/getUpdates"
        );
    }

    #[test]
    fn test_link_notification_options() {
        let opts = SendOptions::link_notification(true);
        assert_eq!(opts.parse_mode.as_deref(), Some("Markdown"));
        assert!(!opts.disable_web_page_preview);
        assert!(opts.disable_notification);

        let opts = SendOptions::link_notification(false);
        assert!(!opts.disable_notification);
    }
}
