//! Message types exchanged with the chat host.

use serde::{Deserialize, Serialize};

/// A chat message as delivered by the host.
///
/// The handler only reads these; it never mutates a message it did not
/// create.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message ID (host-specific)
    pub id: String,
    /// Conversation (room, chat, channel) the message belongs to
    pub conversation_id: String,
    /// Author identifier
    pub sender: String,
    /// Plain text body
    pub body: String,
    /// ID of the message this one explicitly replies to
    #[serde(default)]
    pub reply_to: Option<String>,
    /// Substitution already extracted by a host-side matcher
    #[serde(default)]
    pub passive_command: Option<PassiveCommand>,
    /// Timestamp (Unix millis)
    #[serde(default)]
    pub timestamp: i64,
}

/// Substitution fields pre-extracted by the host.
///
/// When present on a message, these are used as-is instead of scanning the
/// body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassiveCommand {
    pub delimiter: char,
    pub pattern: String,
    pub replacement: String,
    #[serde(default)]
    pub flags: Option<String>,
}

impl ChatMessage {
    /// Create a text message stamped with the current time.
    pub fn new(
        id: impl Into<String>,
        conversation_id: impl Into<String>,
        sender: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            conversation_id: conversation_id.into(),
            sender: sender.into(),
            body: body.into(),
            reply_to: None,
            passive_command: None,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Mark this message as a reply to `message_id`.
    pub fn with_reply_to(mut self, message_id: impl Into<String>) -> Self {
        self.reply_to = Some(message_id.into());
        self
    }

    /// Attach a host pre-matched command.
    pub fn with_passive_command(mut self, command: PassiveCommand) -> Self {
        self.passive_command = Some(command);
        self
    }
}
