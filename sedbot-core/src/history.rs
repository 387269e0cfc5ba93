//! Per-conversation message history.
//!
//! For every conversation the tracker remembers the latest message ID of
//! each author and a small ring of the most recent messages. Both live
//! behind a single reader/writer lock. Lookups copy what they need and
//! release the lock before the caller does anything slow.

use crate::message::ChatMessage;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

pub use sedbot_common::config::DEFAULT_HISTORY_SIZE;

/// Fixed-capacity ring of recent messages.
///
/// Slots start empty. `cursor` is the next slot to write, so the newest
/// message sits just before it.
#[derive(Debug, Clone)]
pub struct RecentRing {
    slots: Vec<Option<Arc<ChatMessage>>>,
    cursor: usize,
}

impl RecentRing {
    /// Create an empty ring. A capacity of zero is bumped to one.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity.max(1)],
            cursor: 0,
        }
    }

    /// Store `message`, overwriting the oldest entry when full.
    pub fn push(&mut self, message: Arc<ChatMessage>) {
        self.slots[self.cursor] = Some(message);
        self.cursor = (self.cursor + 1) % self.slots.len();
    }

    /// Entry written `back` pushes ago, where 1 is the newest.
    fn nth_newest(&self, back: usize) -> Option<&Arc<ChatMessage>> {
        let cap = self.slots.len();
        self.slots[(self.cursor + cap - back) % cap].as_ref()
    }
}

/// History for one conversation.
#[derive(Debug)]
pub struct ConversationHistory {
    last_by_author: HashMap<String, String>,
    recent: RecentRing,
}

impl ConversationHistory {
    fn new(capacity: usize) -> Self {
        Self {
            last_by_author: HashMap::new(),
            recent: RecentRing::with_capacity(capacity),
        }
    }
}

/// Snapshot iterator over a conversation's recent messages, newest first.
///
/// Holds its own copy of the ring, so later records do not affect it.
#[derive(Debug)]
pub struct RecentMessages {
    ring: RecentRing,
    back: usize,
}

impl RecentMessages {
    fn empty() -> Self {
        Self {
            ring: RecentRing::with_capacity(1),
            back: 1,
        }
    }
}

impl From<RecentRing> for RecentMessages {
    fn from(ring: RecentRing) -> Self {
        Self { ring, back: 0 }
    }
}

impl Iterator for RecentMessages {
    type Item = Arc<ChatMessage>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.back < self.ring.slots.len() {
            self.back += 1;
            if let Some(msg) = self.ring.nth_newest(self.back) {
                return Some(Arc::clone(msg));
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.ring.slots.len() - self.back))
    }
}

/// Tracks recent messages for every conversation seen.
#[derive(Debug)]
pub struct HistoryTracker {
    capacity: usize,
    conversations: RwLock<HashMap<String, ConversationHistory>>,
}

impl Default for HistoryTracker {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_SIZE)
    }
}

impl HistoryTracker {
    /// Create a tracker whose rings hold `capacity` messages each.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            conversations: RwLock::new(HashMap::new()),
        }
    }

    /// Remember `message` as its author's latest and push it into the ring.
    pub async fn record(&self, message: &ChatMessage) {
        let entry = Arc::new(message.clone());
        let mut conversations = self.conversations.write().await;
        let history = conversations
            .entry(message.conversation_id.clone())
            .or_insert_with(|| {
                tracing::debug!(conversation = %message.conversation_id, "Tracking new conversation");
                ConversationHistory::new(self.capacity)
            });
        history
            .last_by_author
            .insert(message.sender.clone(), message.id.clone());
        history.recent.push(entry);
    }

    /// ID of the latest message `author` sent in `conversation_id`.
    pub async fn last_by_author(&self, conversation_id: &str, author: &str) -> Option<String> {
        let conversations = self.conversations.read().await;
        conversations
            .get(conversation_id)?
            .last_by_author
            .get(author)
            .cloned()
    }

    /// Recent messages in `conversation_id`, newest first.
    ///
    /// Each call takes a fresh snapshot; the lock is released on return.
    pub async fn recent(&self, conversation_id: &str) -> RecentMessages {
        let ring = {
            let conversations = self.conversations.read().await;
            match conversations.get(conversation_id) {
                Some(history) => history.recent.clone(),
                None => return RecentMessages::empty(),
            }
        };
        RecentMessages::from(ring)
    }

    /// Number of conversations seen so far.
    pub async fn conversation_count(&self) -> usize {
        self.conversations.read().await.len()
    }
}
