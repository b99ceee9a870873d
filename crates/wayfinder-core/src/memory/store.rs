//! Memory & Conversation Store with an explicit two-tier strategy.
//!
//! The backend is chosen once at construction:
//!
//! - `Durable`: a record store plus the table names to use. Every operation
//!   tries the durable table first (when that table is configured). If the
//!   table is absent or the request fails, the volatile cache is used
//!   instead and no error is surfaced. A record is written to exactly one
//!   tier, and reads merge both tiers by timestamp so records cached during
//!   an outage stay visible after the store recovers.
//! - `Volatile`: the in-process cache only.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde_json::{Value, json};
use tracing::{debug, warn};
use wayfinder_types::chat::{ConversationMessage, ConversationRole};
use wayfinder_types::config::MemoryConfig;
use wayfinder_types::error::ValidationError;
use wayfinder_types::memory::{MemoryType, NewUserMemory, UserMemory};
use wayfinder_types::record::{Record, RecordQuery, SortOrder};

use super::cache::VolatileCache;
use crate::records::fields::{as_i64, first_text, record_id};
use crate::records::store::RecordStore;

/// Durable table names. `None` routes that kind of record to the cache.
#[derive(Debug, Clone, Default)]
pub struct DurableTables {
    pub user_memories: Option<String>,
    pub conversations: Option<String>,
}

pub enum MemoryBackend<R: RecordStore> {
    Durable { store: R, tables: DurableTables },
    Volatile,
}

pub struct MemoryStore<R: RecordStore> {
    backend: MemoryBackend<R>,
    cache: VolatileCache,
}

impl<R: RecordStore> MemoryStore<R> {
    pub fn new(backend: MemoryBackend<R>, config: &MemoryConfig) -> Self {
        Self {
            backend,
            cache: VolatileCache::new(config),
        }
    }

    pub fn volatile(config: &MemoryConfig) -> Self {
        Self::new(MemoryBackend::Volatile, config)
    }

    pub fn durable(store: R, tables: DurableTables, config: &MemoryConfig) -> Self {
        Self::new(MemoryBackend::Durable { store, tables }, config)
    }

    /// Whether any durable table is configured.
    pub fn durable_configured(&self) -> bool {
        match &self.backend {
            MemoryBackend::Durable { tables, .. } => {
                tables.user_memories.is_some() || tables.conversations.is_some()
            }
            MemoryBackend::Volatile => false,
        }
    }

    fn memories_table(&self) -> Option<(&R, &str)> {
        match &self.backend {
            MemoryBackend::Durable { store, tables } => {
                tables.user_memories.as_deref().map(|t| (store, t))
            }
            MemoryBackend::Volatile => None,
        }
    }

    fn conversations_table(&self) -> Option<(&R, &str)> {
        match &self.backend {
            MemoryBackend::Durable { store, tables } => {
                tables.conversations.as_deref().map(|t| (store, t))
            }
            MemoryBackend::Volatile => None,
        }
    }

    /// Store a user memory.
    ///
    /// Returns the assigned id. `None` means the durable backend accepted
    /// the record without reporting an id.
    pub async fn store_memory(&self, memory: NewUserMemory) -> Result<Option<i64>, ValidationError> {
        memory.validate()?;

        if let Some((store, table)) = self.memories_table() {
            let record = memory_to_record(&memory, Utc::now());
            match store.create(table, &record).await {
                Ok(id) => {
                    debug!(user_id = memory.user_id, backend = store.name(), "Memory stored");
                    return Ok(id);
                }
                Err(e) => {
                    warn!(user_id = memory.user_id, error = %e, "Durable memory write failed, caching locally");
                }
            }
        }

        Ok(Some(self.cache.store_memory(memory)))
    }

    /// A user's memories from both tiers, most recent first.
    pub async fn get_user_memories(
        &self,
        user_id: i64,
        memory_type: Option<MemoryType>,
        limit: usize,
    ) -> Vec<UserMemory> {
        let mut memories = Vec::new();
        if let Some((store, table)) = self.memories_table() {
            let mut query = RecordQuery::new().filter("userId", user_id);
            if let Some(ty) = memory_type {
                query = query.filter("memoryType", ty.as_str());
            }
            let query = query.sort("createdAt", SortOrder::Desc).limit(limit);

            match store.query(table, &query).await {
                Ok(records) => memories = records.iter().filter_map(record_to_memory).collect(),
                Err(e) => {
                    warn!(user_id, error = %e, "Durable memory read failed, using local cache");
                }
            }
        }

        memories.extend(self.cache.user_memories(user_id, memory_type, limit));
        memories.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        memories.truncate(limit);
        memories
    }

    /// Append a message to a session's history.
    pub async fn store_conversation_message(
        &self,
        session_id: &str,
        user_id: Option<i64>,
        role: ConversationRole,
        content: &str,
    ) {
        if let Some((store, table)) = self.conversations_table() {
            let record = message_to_record(session_id, user_id, role, content, Utc::now());
            match store.create(table, &record).await {
                Ok(_) => return,
                Err(e) => {
                    warn!(session_id, error = %e, "Durable conversation write failed, caching locally");
                }
            }
        }

        self.cache.push_message(session_id, user_id, role, content);
    }

    /// The most recent `limit` messages of a session across both tiers,
    /// oldest first.
    pub async fn get_conversation_history(
        &self,
        session_id: &str,
        limit: usize,
    ) -> Vec<ConversationMessage> {
        let mut messages = Vec::new();
        if let Some((store, table)) = self.conversations_table() {
            let query = RecordQuery::new()
                .filter("sessionId", session_id)
                .sort("timestamp", SortOrder::Desc)
                .limit(limit);

            match store.query(table, &query).await {
                Ok(records) => messages = records.iter().filter_map(record_to_message).collect(),
                Err(e) => {
                    warn!(session_id, error = %e, "Durable conversation read failed, using local cache");
                }
            }
        }

        messages.extend(self.cache.history(session_id, limit));
        messages.sort_by_key(|m| m.timestamp);
        let skip = messages.len().saturating_sub(limit);
        messages.split_off(skip)
    }

    /// Drop the cached history of a session.
    ///
    /// Durable records are left untouched.
    pub fn clear_session(&self, session_id: &str) -> bool {
        self.cache.clear_session(session_id)
    }
}

fn memory_to_record(memory: &NewUserMemory, created_at: DateTime<Utc>) -> Record {
    let mut record = Record::new();
    record.insert("userId".into(), json!(memory.user_id));
    record.insert("memoryType".into(), json!(memory.memory_type.as_str()));
    record.insert("content".into(), json!(memory.content));
    record.insert("confidence".into(), json!(memory.confidence));
    record.insert("metadata".into(), Value::Object(memory.metadata.clone()));
    record.insert("createdAt".into(), json!(created_at.to_rfc3339_opts(SecondsFormat::Micros, true)));
    record
}

fn message_to_record(
    session_id: &str,
    user_id: Option<i64>,
    role: ConversationRole,
    content: &str,
    timestamp: DateTime<Utc>,
) -> Record {
    let mut record = Record::new();
    record.insert("sessionId".into(), json!(session_id));
    record.insert("userId".into(), json!(user_id));
    record.insert("role".into(), json!(role.to_string()));
    record.insert("content".into(), json!(content));
    record.insert("timestamp".into(), json!(timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)));
    record
}

/// Parse RFC 3339, or a naive ISO-8601 timestamp taken as UTC.
fn parse_timestamp(value: Option<&Value>) -> DateTime<Utc> {
    let Some(text) = value.and_then(Value::as_str) else {
        return DateTime::UNIX_EPOCH;
    };
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f").map(|n| n.and_utc()))
        .unwrap_or(DateTime::UNIX_EPOCH)
}

fn record_to_memory(record: &Record) -> Option<UserMemory> {
    let memory_type = match first_text(record, &["memoryType"])?.parse::<MemoryType>() {
        Ok(ty) => ty,
        Err(e) => {
            warn!(error = %e, "Skipping stored memory with unknown type");
            return None;
        }
    };
    Some(UserMemory {
        id: record_id(record),
        user_id: record.get("userId").and_then(as_i64)?,
        memory_type,
        content: first_text(record, &["content"]).unwrap_or_default(),
        confidence: record
            .get("confidence")
            .and_then(Value::as_f64)
            .unwrap_or(1.0),
        metadata: match record.get("metadata") {
            Some(Value::Object(map)) => map.clone(),
            _ => serde_json::Map::new(),
        },
        created_at: parse_timestamp(record.get("createdAt")),
    })
}

fn record_to_message(record: &Record) -> Option<ConversationMessage> {
    let role = first_text(record, &["role"])?
        .parse::<ConversationRole>()
        .ok()?;
    Some(ConversationMessage {
        session_id: first_text(record, &["sessionId"])?,
        user_id: record.get("userId").and_then(as_i64),
        role,
        content: first_text(record, &["content"]).unwrap_or_default(),
        timestamp: parse_timestamp(record.get("timestamp")),
    })
}
