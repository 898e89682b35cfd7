//! Command and session handling.

pub mod handler;

pub use handler::CommandHandler;
