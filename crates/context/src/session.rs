//! Conversation session state
//!
//! A session owns its conversation history and document store selection.
//! Nothing here is shared across sessions.

use crate::conversation::{ConversationStore, Exchange};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub conversation: ConversationStore,
    selected_stores: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
}

/// Serializable view of a session
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub id: Uuid,
    pub history: Vec<Exchange>,
    pub selected_stores: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self::with_conversation(ConversationStore::new())
    }

    pub fn with_conversation(conversation: ConversationStore) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            conversation,
            selected_stores: Vec::new(),
            created_at: now,
            last_active_at: now,
        }
    }

    /// Stores targeted by vector search; empty means the configured default
    pub fn selected_stores(&self) -> &[String] {
        &self.selected_stores
    }

    /// Replace the store selection. Blank and repeated ids are dropped.
    pub fn set_selected_stores<I, S>(&mut self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut selected: Vec<String> = Vec::new();
        for id in ids {
            let id = id.as_ref().trim();
            if !id.is_empty() && !selected.iter().any(|s| s == id) {
                selected.push(id.to_string());
            }
        }
        self.selected_stores = selected;
        self.touch();
    }

    /// Start over with an empty history, keeping the store selection
    pub fn clear_history(&mut self) {
        self.conversation.clear();
        self.touch();
    }

    pub fn touch(&mut self) {
        self.last_active_at = Utc::now();
    }

    pub fn is_expired(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        now - self.last_active_at > ttl
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id,
            history: self.conversation.exchanges().to_vec(),
            selected_stores: self.selected_stores.clone(),
            created_at: self.created_at,
            last_active_at: self.last_active_at,
        }
    }
}
