//! Collaborator traits the handler talks to.

use crate::message::ChatMessage;
use async_trait::async_trait;

/// Result type for collaborator operations.
pub type ChannelResult<T> = Result<T, ChannelError>;

/// Collaborator error type.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Unknown conversation: {0}")]
    UnknownConversation(String),

    #[error("Message send failed: {0}")]
    SendFailed(String),
}

/// Chat host operations needed to resolve and answer a substitution.
///
/// Implementations may be slow (network round trips); the handler never
/// calls them while holding its history lock.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Fetch a message by ID. `Ok(None)` means the host does not know it.
    async fn fetch_message(
        &self,
        conversation_id: &str,
        message_id: &str,
    ) -> ChannelResult<Option<ChatMessage>>;

    /// Post `body` in the target's conversation as a reply to `target`.
    ///
    /// Returns the ID of the new message.
    async fn reply_to(&self, target: &ChatMessage, body: &str) -> ChannelResult<String>;

    /// Advisory signal that `message` was consumed as a command.
    async fn mark_handled(&self, _message: &ChatMessage) -> ChannelResult<()> {
        Ok(())
    }
}
