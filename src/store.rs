//! In-memory per-conversation history with TTL and size bounds.
//!
//! Each conversation key owns two independent sequences: running dialog
//! entries (role-tagged chat turns) and one-shot completion entries. Eviction
//! is lazy: `clean_old_*` applies the TTL filter and the trailing size cap at
//! read time, there is no background sweeper.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// Identifies one conversation's state.
///
/// Group chats scope history per participant; private chats (where the chat
/// id equals the user id) are keyed by the chat alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConversationKey {
    pub chat_id: i64,
    pub user_id: Option<i64>,
}

impl ConversationKey {
    #[must_use]
    pub fn for_event(chat_id: i64, user_id: i64) -> Self {
        if chat_id == user_id {
            Self {
                chat_id,
                user_id: None,
            }
        } else {
            Self {
                chat_id,
                user_id: Some(user_id),
            }
        }
    }
}

/// Speaker role of a stored dialog message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
}

impl Role {
    /// Classify a message by its leading text: a message starting with
    /// "you are" (any casing) is treated as a system instruction.
    ///
    /// This is a content heuristic inherited from the original bot, not a
    /// protocol requirement.
    #[must_use]
    pub fn infer(message: &str) -> Self {
        if message.to_lowercase().starts_with("you are") {
            Self::System
        } else {
            Self::User
        }
    }
}

/// One turn of a running dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogEntry {
    pub message: String,
    pub role: Role,
    pub response: String,
    pub timestamp: DateTime<Utc>,
}

impl DialogEntry {
    #[must_use]
    pub fn new(message: String, response: String, timestamp: DateTime<Utc>) -> Self {
        let role = Role::infer(&message);
        Self {
            message,
            role,
            response,
            timestamp,
        }
    }
}

/// One one-shot completion exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionEntry {
    pub message: String,
    pub response: String,
    pub timestamp: DateTime<Utc>,
}

impl CompletionEntry {
    #[must_use]
    pub const fn new(message: String, response: String, timestamp: DateTime<Utc>) -> Self {
        Self {
            message,
            response,
            timestamp,
        }
    }
}

trait Timestamped {
    fn timestamp(&self) -> DateTime<Utc>;
}

impl Timestamped for DialogEntry {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

impl Timestamped for CompletionEntry {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// One namespace of the store: key -> chronological entry list.
struct Shelf<T> {
    items: Mutex<HashMap<ConversationKey, Vec<T>>>,
}

impl<T: Timestamped + Clone> Shelf<T> {
    fn new() -> Self {
        Self {
            items: Mutex::new(HashMap::new()),
        }
    }

    fn add(&self, key: ConversationKey, entry: T) {
        let mut items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        items.entry(key).or_default().push(entry);
    }

    fn get(&self, key: ConversationKey) -> Vec<T> {
        let items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        items.get(&key).cloned().unwrap_or_default()
    }

    fn clean_old(&self, key: ConversationKey, now: DateTime<Utc>, ttl: u64, limit: usize) -> Vec<T> {
        let mut items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        let entries = items.entry(key).or_default();
        let cutoff = now - Duration::seconds(i64::try_from(ttl).unwrap_or(i64::MAX));
        let mut kept: Vec<T> = if ttl == 0 {
            Vec::new()
        } else {
            entries
                .iter()
                .filter(|e| e.timestamp() >= cutoff)
                .cloned()
                .collect()
        };
        if kept.len() > limit {
            kept.drain(..kept.len() - limit);
        }
        *entries = kept.clone();
        kept
    }

    fn clear(&self, key: ConversationKey) {
        let mut items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        items.insert(key, Vec::new());
    }
}

/// Multi-tenant conversation history, bounded by TTL and entry count.
pub struct ConversationStore {
    ttl: u64,
    limit: usize,
    dialogs: Shelf<DialogEntry>,
    completions: Shelf<CompletionEntry>,
}

impl ConversationStore {
    /// `ttl` in seconds; `limit` is the post-filter cap per conversation.
    /// Both may be zero, which yields an always-empty effective history.
    #[must_use]
    pub fn new(ttl: u64, limit: usize) -> Self {
        Self {
            ttl,
            limit,
            dialogs: Shelf::new(),
            completions: Shelf::new(),
        }
    }

    pub fn add_dialog(&self, key: ConversationKey, entry: DialogEntry) {
        self.dialogs.add(key, entry);
    }

    /// Raw dialog sequence in insertion order. Eviction may not have been
    /// applied; call [`Self::clean_old_dialogs`] before building provider
    /// context.
    #[must_use]
    pub fn dialogs(&self, key: ConversationKey) -> Vec<DialogEntry> {
        self.dialogs.get(key)
    }

    /// Apply TTL filter and trailing cap, replace the stored sequence, and
    /// return the survivors (oldest first).
    pub fn clean_old_dialogs(&self, key: ConversationKey) -> Vec<DialogEntry> {
        self.clean_old_dialogs_at(key, Utc::now())
    }

    pub(crate) fn clean_old_dialogs_at(
        &self,
        key: ConversationKey,
        now: DateTime<Utc>,
    ) -> Vec<DialogEntry> {
        self.dialogs.clean_old(key, now, self.ttl, self.limit)
    }

    pub fn clear_dialogs(&self, key: ConversationKey) {
        self.dialogs.clear(key);
    }

    pub fn add_completion(&self, key: ConversationKey, entry: CompletionEntry) {
        self.completions.add(key, entry);
    }

    #[must_use]
    pub fn completions(&self, key: ConversationKey) -> Vec<CompletionEntry> {
        self.completions.get(key)
    }

    pub fn clean_old_completions(&self, key: ConversationKey) -> Vec<CompletionEntry> {
        self.clean_old_completions_at(key, Utc::now())
    }

    pub(crate) fn clean_old_completions_at(
        &self,
        key: ConversationKey,
        now: DateTime<Utc>,
    ) -> Vec<CompletionEntry> {
        self.completions.clean_old(key, now, self.ttl, self.limit)
    }

    pub fn clear_completions(&self, key: ConversationKey) {
        self.completions.clear(key);
    }
}
