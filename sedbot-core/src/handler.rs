//! Resolution of substitution commands against earlier messages.
//!
//! ```text
//! incoming ─▶ parse ─▶ reply target / author's last message ─▶ exec
//!                                  │ unchanged or missing
//!                                  ▼
//!                      recent messages, newest first ─▶ exec
//! ```
//!
//! The first candidate whose body changes gets a reply with the corrected
//! text. The incoming message is recorded afterwards, so a command never
//! rewrites itself.

use crate::grammar::{Matcher, LONG_FORM, SHORT_FORM};
use crate::history::HistoryTracker;
use crate::message::ChatMessage;
use crate::statement::{self, SedError, SedStatement};
use crate::traits::ChatClient;
use sedbot_common::config::SedConfig;
use sedbot_common::logging::generate_trace_id;
use sedbot_common::util::truncate_with_ellipsis;
use std::sync::Arc;
use tracing::Instrument;

/// Max characters of a body shown in debug logs.
const LOG_PREVIEW_CHARS: usize = 80;

/// What happened to an incoming message.
#[derive(Debug)]
pub enum Outcome {
    /// Ordinary message, nothing to do.
    NotACommand,
    /// A corrected copy of `target_id` was posted.
    Rewrote { target_id: String },
    /// The command was malformed.
    Failed(SedError),
    /// Valid command, but no candidate changed under it.
    NoTargetFound,
}

impl Outcome {
    pub fn is_rewrite(&self) -> bool {
        matches!(self, Self::Rewrote { .. })
    }

    /// Whether other handlers should skip this message.
    pub fn stops_propagation(&self) -> bool {
        matches!(self, Self::Rewrote { .. } | Self::Failed(_))
    }

    pub fn target_id(&self) -> Option<&str> {
        match self {
            Self::Rewrote { target_id } => Some(target_id),
            _ => None,
        }
    }
}

/// Handles substitution commands for every conversation.
///
/// Cheap to share: wrap it in an `Arc` and call [`SedHandler::handle`] from
/// as many tasks as needed.
pub struct SedHandler {
    client: Arc<dyn ChatClient>,
    history: HistoryTracker,
    matchers: Vec<Matcher>,
    reply_on_error: bool,
}

impl SedHandler {
    /// Create a handler with default settings.
    pub fn new(client: Arc<dyn ChatClient>) -> Self {
        Self::from_config(client, &SedConfig::default())
    }

    /// Create a handler from the `sed` config section.
    pub fn from_config(client: Arc<dyn ChatClient>, config: &SedConfig) -> Self {
        let mut matchers = vec![SHORT_FORM];
        if config.long_form {
            matchers.push(LONG_FORM);
        }
        Self {
            client,
            history: HistoryTracker::new(config.history_size),
            matchers,
            reply_on_error: config.reply_on_error,
        }
    }

    pub fn history(&self) -> &HistoryTracker {
        &self.history
    }

    /// Process one incoming message and record it in the history.
    pub async fn handle(&self, message: &ChatMessage) -> Outcome {
        let span = tracing::debug_span!(
            "sed",
            trace_id = %generate_trace_id(),
            conversation = %message.conversation_id,
            message_id = %message.id
        );
        let outcome = self.resolve(message).instrument(span).await;
        self.history.record(message).await;
        outcome
    }

    async fn resolve(&self, message: &ChatMessage) -> Outcome {
        let parsed = statement::parse(
            &message.body,
            message.passive_command.as_ref(),
            &self.matchers,
        );
        let statement = match parsed {
            Ok(Some(statement)) => statement,
            Ok(None) => return Outcome::NotACommand,
            Err(err) => {
                tracing::info!(error = %err, "Malformed substitution");
                if self.reply_on_error {
                    if let Err(e) = self.client.reply_to(message, &err.to_string()).await {
                        tracing::warn!(error = %e, "Failed to send error reply");
                    }
                }
                self.mark_handled(message).await;
                return Outcome::Failed(err);
            }
        };

        tracing::debug!(
            pattern = %statement.find().as_str(),
            global = statement.is_global(),
            "Parsed substitution"
        );
        self.mark_handled(message).await;

        if let Some(target) = self.primary_candidate(message).await {
            if self.try_replace(&statement, &target).await {
                return Outcome::Rewrote {
                    target_id: target.id,
                };
            }
        }

        for candidate in self.history.recent(&message.conversation_id).await {
            if self.try_replace(&statement, &candidate).await {
                return Outcome::Rewrote {
                    target_id: candidate.id.clone(),
                };
            }
        }

        tracing::debug!("No recent message matched");
        Outcome::NoTargetFound
    }

    /// The explicit reply target, or else the sender's previous message.
    async fn primary_candidate(&self, message: &ChatMessage) -> Option<ChatMessage> {
        let target_id = match &message.reply_to {
            Some(id) => id.clone(),
            None => {
                self.history
                    .last_by_author(&message.conversation_id, &message.sender)
                    .await?
            }
        };
        self.fetch(&message.conversation_id, &target_id).await
    }

    async fn fetch(&self, conversation_id: &str, message_id: &str) -> Option<ChatMessage> {
        match self.client.fetch_message(conversation_id, message_id).await {
            Ok(found) => {
                if found.is_none() {
                    tracing::debug!(message_id, "Candidate not found");
                }
                found
            }
            Err(e) => {
                tracing::warn!(message_id, error = %e, "Failed to fetch candidate");
                None
            }
        }
    }

    /// Run `statement` on `target` and post the result if anything changed.
    async fn try_replace(&self, statement: &SedStatement, target: &ChatMessage) -> bool {
        let replaced = statement.exec(&target.body);
        if replaced == target.body {
            return false;
        }

        tracing::info!(target_id = %target.id, "Rewriting message");
        tracing::debug!(
            before = %truncate_with_ellipsis(&target.body, LOG_PREVIEW_CHARS),
            after = %truncate_with_ellipsis(&replaced, LOG_PREVIEW_CHARS),
            "Rewrite preview"
        );
        if let Err(e) = self.client.reply_to(target, &replaced).await {
            tracing::warn!(target_id = %target.id, error = %e, "Failed to send rewrite");
        }
        true
    }

    async fn mark_handled(&self, message: &ChatMessage) {
        if let Err(e) = self.client.mark_handled(message).await {
            tracing::debug!(error = %e, "mark_handled failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{ChannelError, ChannelResult};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use tokio::sync::Mutex;

    /// Records calls and serves messages from a map.
    #[derive(Default)]
    struct Recorder {
        store: Mutex<HashMap<String, ChatMessage>>,
        replies: Mutex<Vec<(String, String)>>,
        handled: Mutex<Vec<String>>,
        fail_fetch: bool,
    }

    impl Recorder {
        async fn put(&self, msg: &ChatMessage) {
            self.store.lock().await.insert(msg.id.clone(), msg.clone());
        }
    }

    #[async_trait]
    impl ChatClient for Recorder {
        async fn fetch_message(
            &self,
            conversation_id: &str,
            message_id: &str,
        ) -> ChannelResult<Option<ChatMessage>> {
            if self.fail_fetch {
                return Err(ChannelError::UnknownConversation(conversation_id.to_string()));
            }
            Ok(self.store.lock().await.get(message_id).cloned())
        }

        async fn reply_to(&self, target: &ChatMessage, body: &str) -> ChannelResult<String> {
            self.replies
                .lock()
                .await
                .push((target.id.clone(), body.to_string()));
            Ok(format!("reply-{}", target.id))
        }

        async fn mark_handled(&self, message: &ChatMessage) -> ChannelResult<()> {
            self.handled.lock().await.push(message.id.clone());
            Ok(())
        }
    }

    async fn observe(handler: &SedHandler, client: &Recorder, msg: ChatMessage) -> Outcome {
        client.put(&msg).await;
        handler.handle(&msg).await
    }

    #[tokio::test]
    async fn ordinary_message_is_recorded() {
        let client = Arc::new(Recorder::default());
        let handler = SedHandler::new(client.clone());
        let outcome = observe(&handler, &client, ChatMessage::new("1", "r", "a", "hi")).await;
        assert!(matches!(outcome, Outcome::NotACommand));
        assert!(!outcome.stops_propagation());
        assert_eq!(handler.history().last_by_author("r", "a").await.as_deref(), Some("1"));
        assert!(client.handled.lock().await.is_empty());
    }

    #[tokio::test]
    async fn rewrites_senders_previous_message() {
        let client = Arc::new(Recorder::default());
        let handler = SedHandler::new(client.clone());
        observe(&handler, &client, ChatMessage::new("1", "r", "a", "foo foo")).await;
        let outcome = observe(&handler, &client, ChatMessage::new("2", "r", "a", "s/foo/bar/")).await;

        assert_eq!(outcome.target_id(), Some("1"));
        assert_eq!(
            *client.replies.lock().await,
            vec![("1".to_string(), "bar foo".to_string())]
        );
        assert_eq!(*client.handled.lock().await, vec!["2".to_string()]);
    }

    #[tokio::test]
    async fn explicit_reply_wins_over_history() {
        let client = Arc::new(Recorder::default());
        let handler = SedHandler::new(client.clone());
        observe(&handler, &client, ChatMessage::new("1", "r", "b", "cat one")).await;
        observe(&handler, &client, ChatMessage::new("2", "r", "a", "cat two")).await;
        let cmd = ChatMessage::new("3", "r", "a", "s/cat/dog/").with_reply_to("1");
        let outcome = observe(&handler, &client, cmd).await;

        assert_eq!(outcome.target_id(), Some("1"));
        assert_eq!(client.replies.lock().await[0].1, "dog one");
    }

    #[tokio::test]
    async fn falls_back_to_recent_messages() {
        let client = Arc::new(Recorder::default());
        let handler = SedHandler::new(client.clone());
        observe(&handler, &client, ChatMessage::new("1", "r", "b", "teh cat")).await;
        observe(&handler, &client, ChatMessage::new("2", "r", "a", "hello")).await;
        let outcome = observe(&handler, &client, ChatMessage::new("3", "r", "a", "s/teh/the/")).await;

        assert_eq!(outcome.target_id(), Some("1"));
        assert_eq!(client.replies.lock().await[0].1, "the cat");
    }

    #[tokio::test]
    async fn unknown_reply_target_falls_back_to_recent() {
        let client = Arc::new(Recorder::default());
        let handler = SedHandler::new(client.clone());
        observe(&handler, &client, ChatMessage::new("1", "r", "b", "teh cat")).await;
        let cmd = ChatMessage::new("2", "r", "a", "s/teh/the/").with_reply_to("missing");
        let outcome = observe(&handler, &client, cmd).await;

        assert_eq!(outcome.target_id(), Some("1"));
        assert_eq!(
            *client.replies.lock().await,
            vec![("1".to_string(), "the cat".to_string())]
        );
    }

    #[tokio::test]
    async fn unchanged_reply_target_falls_back_to_recent() {
        let client = Arc::new(Recorder::default());
        let handler = SedHandler::new(client.clone());
        observe(&handler, &client, ChatMessage::new("1", "r", "b", "nothing here")).await;
        observe(&handler, &client, ChatMessage::new("2", "r", "c", "teh dog")).await;
        let cmd = ChatMessage::new("3", "r", "a", "s/teh/the/").with_reply_to("1");
        let outcome = observe(&handler, &client, cmd).await;

        assert_eq!(outcome.target_id(), Some("2"));
        let replies = client.replies.lock().await;
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].1, "the dog");
    }

    #[tokio::test]
    async fn fallback_prefers_newest() {
        let client = Arc::new(Recorder::default());
        let handler = SedHandler::new(client.clone());
        observe(&handler, &client, ChatMessage::new("1", "r", "b", "x old")).await;
        observe(&handler, &client, ChatMessage::new("2", "r", "c", "x new")).await;
        let outcome = observe(&handler, &client, ChatMessage::new("3", "r", "a", "s/x/y/")).await;
        assert_eq!(outcome.target_id(), Some("2"));
    }

    #[tokio::test]
    async fn fetch_failure_is_not_fatal() {
        let client = Arc::new(Recorder {
            fail_fetch: true,
            ..Recorder::default()
        });
        let handler = SedHandler::new(client.clone());
        observe(&handler, &client, ChatMessage::new("1", "r", "a", "foo")).await;
        let outcome = observe(&handler, &client, ChatMessage::new("2", "r", "a", "s/foo/bar/")).await;

        // The ring still holds the body even though fetch is down
        assert_eq!(outcome.target_id(), Some("1"));
        assert_eq!(client.replies.lock().await[0].1, "bar");
    }

    #[tokio::test]
    async fn malformed_pattern_replies_with_error() {
        let client = Arc::new(Recorder::default());
        let handler = SedHandler::new(client.clone());
        observe(&handler, &client, ChatMessage::new("1", "r", "a", "([")).await;
        let outcome = observe(&handler, &client, ChatMessage::new("2", "r", "a", "s/([/x/")).await;

        assert!(matches!(outcome, Outcome::Failed(_)));
        assert!(outcome.stops_propagation());
        let replies = client.replies.lock().await;
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].0, "2");
        assert!(replies[0].1.starts_with("failed to compile regex"));
    }

    #[tokio::test]
    async fn error_reply_can_be_disabled() {
        let client = Arc::new(Recorder::default());
        let config = SedConfig {
            reply_on_error: false,
            ..SedConfig::default()
        };
        let handler = SedHandler::from_config(client.clone(), &config);
        let outcome = observe(&handler, &client, ChatMessage::new("1", "r", "a", "s/([/x/")).await;
        assert!(matches!(outcome, Outcome::Failed(_)));
        assert!(client.replies.lock().await.is_empty());
    }

    #[tokio::test]
    async fn long_form_can_be_disabled() {
        let client = Arc::new(Recorder::default());
        let config = SedConfig {
            long_form: false,
            ..SedConfig::default()
        };
        let handler = SedHandler::from_config(client.clone(), &config);
        observe(&handler, &client, ChatMessage::new("1", "r", "a", "a1")).await;
        let outcome = observe(&handler, &client, ChatMessage::new("2", "r", "a", "pls sed s/a/b/")).await;
        assert!(matches!(outcome, Outcome::NotACommand));
    }

    #[tokio::test]
    async fn command_does_not_target_itself() {
        let client = Arc::new(Recorder::default());
        let handler = SedHandler::new(client.clone());
        let outcome = observe(&handler, &client, ChatMessage::new("1", "r", "a", "s/s/t/")).await;
        assert!(matches!(outcome, Outcome::NoTargetFound));
        assert!(client.replies.lock().await.is_empty());
    }

    #[tokio::test]
    async fn passive_command_is_used() {
        use crate::message::PassiveCommand;

        let client = Arc::new(Recorder::default());
        let handler = SedHandler::new(client.clone());
        observe(&handler, &client, ChatMessage::new("1", "r", "a", "aaa")).await;
        let cmd = ChatMessage::new("2", "r", "a", "whatever the host saw").with_passive_command(
            PassiveCommand {
                delimiter: '/',
                pattern: "a".into(),
                replacement: "b".into(),
                flags: Some("g".into()),
            },
        );
        let outcome = observe(&handler, &client, cmd).await;
        assert!(outcome.is_rewrite());
        assert_eq!(client.replies.lock().await[0].1, "bbb");
    }
}
