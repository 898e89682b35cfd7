//! Telegram transport: wire types and the Bot API client.

pub mod api;
pub mod types;

pub use api::{BotApi, SendOptions, TelegramApi};
pub use types::{ApiResponse, Chat, Message, Update, User};
