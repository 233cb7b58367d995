use async_trait::async_trait;

use crate::Error;
use crate::models::ChatId;

/// Outbound text to a chat.
#[async_trait]
pub trait ChatMessenger: Send + Sync {
    async fn send_message(&self, chat: ChatId, text: &str) -> Result<(), Error>;
}
