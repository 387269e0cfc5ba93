//! CLI chat client for interactive terminal sessions.
//!
//! Keeps every message in memory and prints replies to stdout. Useful for
//! trying commands locally without a chat server.
//!
//! Input lines look like:
//!
//! ```text
//! alice: teh cat sat
//! >1 bob: s/teh/the/
//! just text, sent as "user"
//! ```
//!
//! A leading `>ID` makes the line an explicit reply to message `ID`.

use crate::message::ChatMessage;
use crate::traits::{ChannelError, ChannelResult, ChatClient};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

/// Conversation ID used for every CLI message.
pub const CLI_CONVERSATION: &str = "cli";

/// Sender used when a line has no `name:` prefix.
pub const DEFAULT_SENDER: &str = "user";

/// Sender of replies posted by the bot.
pub const BOT_SENDER: &str = "sedbot";

/// A parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputLine {
    pub sender: String,
    pub reply_to: Option<String>,
    pub body: String,
}

/// Parse one input line. Blank lines yield `None`.
pub fn parse_line(line: &str) -> Option<InputLine> {
    let mut rest = line.trim();
    if rest.is_empty() {
        return None;
    }

    let mut reply_to = None;
    if let Some(stripped) = rest.strip_prefix('>') {
        if let Some((id, tail)) = stripped.split_once(char::is_whitespace) {
            if !id.is_empty() {
                reply_to = Some(id.to_string());
                rest = tail.trim_start();
            }
        }
    }

    let mut sender = DEFAULT_SENDER.to_string();
    if let Some((name, tail)) = rest.split_once(": ") {
        if !name.is_empty() && !name.contains(char::is_whitespace) {
            sender = name.to_string();
            rest = tail;
        }
    }

    Some(InputLine {
        sender,
        reply_to,
        body: rest.to_string(),
    })
}

/// In-memory chat client backing the CLI.
pub struct CliClient {
    messages: RwLock<HashMap<String, ChatMessage>>,
    next_id: AtomicU64,
    echo: bool,
}

impl CliClient {
    /// Client that prints replies to stdout.
    pub fn new() -> Self {
        Self::with_echo(true)
    }

    /// Client that only stores replies.
    pub fn quiet() -> Self {
        Self::with_echo(false)
    }

    fn with_echo(echo: bool) -> Self {
        Self {
            messages: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            echo,
        }
    }

    fn allocate_id(&self) -> String {
        self.next_id.fetch_add(1, Ordering::Relaxed).to_string()
    }

    /// Store a user line as a new message and return it.
    pub async fn ingest(&self, line: InputLine) -> ChatMessage {
        let mut message =
            ChatMessage::new(self.allocate_id(), CLI_CONVERSATION, line.sender, line.body);
        message.reply_to = line.reply_to;
        self.messages
            .write()
            .await
            .insert(message.id.clone(), message.clone());
        message
    }

    /// Every message posted by the bot, oldest first.
    pub async fn bot_messages(&self) -> Vec<ChatMessage> {
        let messages = self.messages.read().await;
        let mut sent: Vec<ChatMessage> = messages
            .values()
            .filter(|m| m.sender == BOT_SENDER)
            .cloned()
            .collect();
        sent.sort_by_key(|m| m.id.parse::<u64>().unwrap_or_default());
        sent
    }
}

impl Default for CliClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatClient for CliClient {
    async fn fetch_message(
        &self,
        conversation_id: &str,
        message_id: &str,
    ) -> ChannelResult<Option<ChatMessage>> {
        if conversation_id != CLI_CONVERSATION {
            return Err(ChannelError::UnknownConversation(conversation_id.to_string()));
        }
        Ok(self.messages.read().await.get(message_id).cloned())
    }

    async fn reply_to(&self, target: &ChatMessage, body: &str) -> ChannelResult<String> {
        if target.conversation_id != CLI_CONVERSATION {
            return Err(ChannelError::UnknownConversation(
                target.conversation_id.clone(),
            ));
        }
        if !self.messages.read().await.contains_key(&target.id) {
            return Err(ChannelError::SendFailed(format!(
                "no message {} to reply to",
                target.id
            )));
        }

        let reply = ChatMessage::new(
            self.allocate_id(),
            target.conversation_id.clone(),
            BOT_SENDER,
            body,
        )
        .with_reply_to(target.id.clone());

        if self.echo {
            println!("[{}] ↪ {}: {}", reply.id, target.id, reply.body);
        }

        let id = reply.id.clone();
        self.messages.write().await.insert(id.clone(), reply);
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_plain_line() {
        assert_eq!(
            parse_line("hello there"),
            Some(InputLine {
                sender: "user".into(),
                reply_to: None,
                body: "hello there".into(),
            })
        );
    }

    #[test]
    fn parse_sender_prefix() {
        let line = parse_line("alice: s/a/b/").unwrap();
        assert_eq!(line.sender, "alice");
        assert_eq!(line.body, "s/a/b/");
    }

    #[test]
    fn parse_reply_prefix() {
        let line = parse_line(">3 bob: s/a/b/").unwrap();
        assert_eq!(line.reply_to.as_deref(), Some("3"));
        assert_eq!(line.sender, "bob");
        assert_eq!(line.body, "s/a/b/");
    }

    #[test]
    fn parse_colon_in_sentence_is_body() {
        let line = parse_line("note to self: buy milk").unwrap();
        assert_eq!(line.sender, "user");
        assert_eq!(line.body, "note to self: buy milk");
    }

    #[test]
    fn parse_blank_line() {
        assert_eq!(parse_line("   "), None);
    }

    #[tokio::test]
    async fn ingest_assigns_sequential_ids() {
        let client = CliClient::quiet();
        let a = client.ingest(parse_line("one").unwrap()).await;
        let b = client.ingest(parse_line("two").unwrap()).await;
        assert_eq!(a.id, "1");
        assert_eq!(b.id, "2");
        assert_eq!(a.conversation_id, CLI_CONVERSATION);
    }

    #[tokio::test]
    async fn fetch_checks_conversation() {
        let client = CliClient::quiet();
        let a = client.ingest(parse_line("one").unwrap()).await;
        assert!(client.fetch_message(CLI_CONVERSATION, &a.id).await.unwrap().is_some());
        assert!(matches!(
            client.fetch_message("other", &a.id).await,
            Err(ChannelError::UnknownConversation(c)) if c == "other"
        ));
        assert!(client.fetch_message(CLI_CONVERSATION, "99").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn reply_to_unknown_target_fails() {
        let client = CliClient::quiet();
        let stranger = ChatMessage::new("42", CLI_CONVERSATION, "bob", "hi");
        assert!(matches!(
            client.reply_to(&stranger, "x").await,
            Err(ChannelError::SendFailed(_))
        ));

        let elsewhere = ChatMessage::new("1", "room", "bob", "hi");
        assert!(matches!(
            client.reply_to(&elsewhere, "x").await,
            Err(ChannelError::UnknownConversation(_))
        ));
        assert!(client.bot_messages().await.is_empty());
    }

    #[tokio::test]
    async fn replies_are_stored() {
        let client = CliClient::quiet();
        let a = client.ingest(parse_line("one").unwrap()).await;
        let id = client.reply_to(&a, "uno").await.unwrap();
        let sent = client.bot_messages().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].id, id);
        assert_eq!(sent[0].reply_to.as_deref(), Some("1"));
        assert_eq!(sent[0].body, "uno");
    }
}
