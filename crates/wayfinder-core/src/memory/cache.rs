//! In-process cache for user memories and conversation history.
//!
//! Used as the sole backend in volatile mode and as the fallback when the
//! durable record store is unreachable. Contents are lost on restart.
//! Every dimension is bounded: entries per user or session are evicted
//! oldest first, and a new user or session displaces the least recently
//! active one once the key limit is reached.

use std::collections::VecDeque;
use std::hash::Hash;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::debug;
use wayfinder_types::chat::{ConversationMessage, ConversationRole};
use wayfinder_types::config::MemoryConfig;
use wayfinder_types::memory::{MemoryType, NewUserMemory, UserMemory};

pub struct VolatileCache {
    memories: DashMap<i64, VecDeque<UserMemory>>,
    conversations: DashMap<String, VecDeque<ConversationMessage>>,
    conversation_cap: usize,
    memory_cap: usize,
    max_sessions: usize,
    max_users: usize,
    next_memory_id: AtomicI64,
}

impl VolatileCache {
    pub fn new(config: &MemoryConfig) -> Self {
        Self {
            memories: DashMap::new(),
            conversations: DashMap::new(),
            conversation_cap: config.conversation_cap.max(1),
            memory_cap: config.memory_cap.max(1),
            max_sessions: config.max_cached_sessions.max(1),
            max_users: config.max_cached_users.max(1),
            next_memory_id: AtomicI64::new(1),
        }
    }

    pub fn store_memory(&self, memory: NewUserMemory) -> i64 {
        let id = self.next_memory_id.fetch_add(1, Ordering::Relaxed);
        let stored = UserMemory {
            id: Some(id),
            user_id: memory.user_id,
            memory_type: memory.memory_type,
            content: memory.content,
            confidence: memory.confidence,
            metadata: memory.metadata,
            created_at: Utc::now(),
        };
        if !self.memories.contains_key(&memory.user_id) {
            make_room(&self.memories, self.max_users, |m| m.back().map(|m| m.created_at));
        }
        let mut memories = self.memories.entry(memory.user_id).or_default();
        memories.push_back(stored);
        while memories.len() > self.memory_cap {
            memories.pop_front();
        }
        id
    }

    /// Most recent first.
    pub fn user_memories(
        &self,
        user_id: i64,
        memory_type: Option<MemoryType>,
        limit: usize,
    ) -> Vec<UserMemory> {
        let Some(memories) = self.memories.get(&user_id) else {
            return Vec::new();
        };
        memories
            .iter()
            .rev()
            .filter(|m| memory_type.is_none_or(|ty| m.memory_type == ty))
            .take(limit)
            .cloned()
            .collect()
    }

    /// Append a message, evicting the oldest once the session is at capacity.
    pub fn push_message(
        &self,
        session_id: &str,
        user_id: Option<i64>,
        role: ConversationRole,
        content: &str,
    ) {
        let message = ConversationMessage {
            session_id: session_id.to_string(),
            user_id,
            role,
            content: content.to_string(),
            timestamp: Utc::now(),
        };
        if !self.conversations.contains_key(session_id) {
            make_room(&self.conversations, self.max_sessions, |s| s.back().map(|m| m.timestamp));
        }
        let mut session = self.conversations.entry(session_id.to_string()).or_default();
        session.push_back(message);
        while session.len() > self.conversation_cap {
            session.pop_front();
        }
    }

    /// The most recent `limit` messages, oldest first.
    pub fn history(&self, session_id: &str, limit: usize) -> Vec<ConversationMessage> {
        let Some(session) = self.conversations.get(session_id) else {
            return Vec::new();
        };
        let skip = session.len().saturating_sub(limit);
        session.iter().skip(skip).cloned().collect()
    }

    pub fn clear_session(&self, session_id: &str) -> bool {
        self.conversations.remove(session_id).is_some()
    }
}

/// Drop the least recently active keys until one more fits under `max`.
/// Must be called without holding a guard into `map`.
fn make_room<K, V>(
    map: &DashMap<K, V>,
    max: usize,
    last_active: impl Fn(&V) -> Option<DateTime<Utc>>,
) where
    K: Eq + Hash + Clone,
{
    while map.len() >= max {
        let stalest = map
            .iter()
            .min_by_key(|entry| last_active(entry.value()))
            .map(|entry| entry.key().clone());
        let Some(key) = stalest else {
            break;
        };
        map.remove(&key);
        debug!(max, "Evicted least recently active cache entry");
    }
}
