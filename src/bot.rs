//! Chat-bot transport and command handling.

pub mod commands;
pub mod error;
pub mod telegram;

use async_trait::async_trait;

use crate::bot::error::BotError;

/// Sends plain text to a recipient. One call is one delivery attempt.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_text(&self, recipient_id: &str, text: &str) -> Result<(), BotError>;
}
