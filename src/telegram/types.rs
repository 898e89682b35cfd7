//! Telegram Bot API wire types.
//!
//! Only the fields the bot actually consumes are modeled; unknown fields in
//! API responses are ignored by serde.

use serde::Deserialize;

/// One long-poll update from the Bot API.
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    /// Monotonic update sequence offset, assigned by the server.
    pub update_id: i64,
    /// The message carried by this update, if any.
    pub message: Option<Message>,
}

impl Update {
    /// The sender's user id, if this update carries a user message.
    pub fn user_id(&self) -> Option<i64> {
        self.message.as_ref().and_then(|m| m.from.as_ref()).map(|u| u.id)
    }

    /// The chat id to reply into, if any.
    pub fn chat_id(&self) -> Option<i64> {
        self.message.as_ref().map(|m| m.chat.id)
    }
}

/// An incoming chat message.
#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub from: Option<User>,
    pub chat: Chat,
    pub text: Option<String>,
}

/// A Telegram user.
#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    pub first_name: String,
    pub username: Option<String>,
}

/// A chat the bot participates in.
#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

/// Envelope every Bot API call returns.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
}
