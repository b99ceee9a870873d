//! Application configuration types.
//!
//! `AppConfig` represents the top-level `config.toml`. Every field has a
//! default so an empty or partial file is valid. Secrets (API keys, record
//! store tokens) are never read from this file; they come from the
//! environment.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::entity::EntityType;

/// Top-level configuration, loaded from `{data_dir}/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub rag: RagConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub records: RecordsConfig,
}

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

fn default_openai_base_url() -> String {
    OPENAI_BASE_URL.to_string()
}

/// Text and image embedding settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
    /// Requested output dimension for text embeddings.
    #[serde(default = "default_text_dimension")]
    pub dimension: usize,
    /// Inputs longer than this many characters are truncated.
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Per-call budget for embedding inference.
    #[serde(default = "default_embedding_timeout")]
    pub request_timeout_secs: u64,
    /// How long a caller waits for the local image model to download and
    /// load. A load that outlives this keeps running for later callers.
    #[serde(default = "default_image_load_timeout")]
    pub image_load_timeout_secs: u64,
    /// Enables the local CLIP image embedder.
    #[serde(default = "default_true")]
    pub image_enabled: bool,
    #[serde(default = "default_image_dimension")]
    pub image_dimension: usize,
    /// Directory for downloaded image model files. Defaults to
    /// `{data_dir}/models`.
    #[serde(default)]
    pub image_model_cache_dir: Option<PathBuf>,
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_text_dimension() -> usize {
    1536
}

fn default_max_input_chars() -> usize {
    8000
}

fn default_batch_size() -> usize {
    100
}

fn default_embedding_timeout() -> u64 {
    30
}

fn default_image_load_timeout() -> u64 {
    600
}

fn default_true() -> bool {
    true
}

fn default_image_dimension() -> usize {
    512
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            base_url: default_openai_base_url(),
            dimension: default_text_dimension(),
            max_input_chars: default_max_input_chars(),
            batch_size: default_batch_size(),
            request_timeout_secs: default_embedding_timeout(),
            image_load_timeout_secs: default_image_load_timeout(),
            image_enabled: true,
            image_dimension: default_image_dimension(),
            image_model_cache_dir: None,
        }
    }
}

/// Generative model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_chat_model")]
    pub model: String,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_generation_timeout")]
    pub request_timeout_secs: u64,
}

fn default_chat_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_temperature() -> f64 {
    0.7
}

fn default_max_tokens() -> u32 {
    1000
}

fn default_generation_timeout() -> u64 {
    60
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: default_chat_model(),
            base_url: default_openai_base_url(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            request_timeout_secs: default_generation_timeout(),
        }
    }
}

/// Vector index settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Directory holding the persisted index artifacts. Defaults to
    /// `{data_dir}/index`.
    #[serde(default)]
    pub dir: Option<PathBuf>,
    /// Candidate window multiplier applied when a type filter is present.
    #[serde(default = "default_overfetch_factor")]
    pub overfetch_factor: usize,
}

fn default_overfetch_factor() -> usize {
    3
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            dir: None,
            overfetch_factor: default_overfetch_factor(),
        }
    }
}

/// Thresholds for the search, suggestion, and recommendation helpers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_suggestion_min_score")]
    pub suggestion_min_score: f32,
    #[serde(default = "default_similar_min_score")]
    pub similar_min_score: f32,
    #[serde(default = "default_preference_min_score")]
    pub preference_min_score: f32,
    #[serde(default = "default_fallback_min_score")]
    pub fallback_min_score: f32,
    /// How many memories are joined into the preference query.
    #[serde(default = "default_preference_memory_count")]
    pub preference_memory_count: usize,
    /// Query used to top up recommendations when preferences run short.
    #[serde(default = "default_fallback_query")]
    pub fallback_query: String,
}

fn default_suggestion_min_score() -> f32 {
    0.3
}

fn default_similar_min_score() -> f32 {
    0.3
}

fn default_preference_min_score() -> f32 {
    0.4
}

fn default_fallback_min_score() -> f32 {
    0.3
}

fn default_preference_memory_count() -> usize {
    5
}

fn default_fallback_query() -> String {
    "popular tourist destination Da Nang Vietnam".to_string()
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            suggestion_min_score: default_suggestion_min_score(),
            similar_min_score: default_similar_min_score(),
            preference_min_score: default_preference_min_score(),
            fallback_min_score: default_fallback_min_score(),
            preference_memory_count: default_preference_memory_count(),
            fallback_query: default_fallback_query(),
        }
    }
}

/// RAG orchestration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagConfig {
    #[serde(default = "default_context_min_score")]
    pub context_min_score: f32,
    /// User memories included in the prompt.
    #[serde(default = "default_memory_limit")]
    pub memory_limit: usize,
    /// Prior conversation messages included in the prompt.
    #[serde(default = "default_history_window")]
    pub history_window: usize,
}

fn default_context_min_score() -> f32 {
    0.5
}

fn default_memory_limit() -> usize {
    3
}

fn default_history_window() -> usize {
    5
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            context_min_score: default_context_min_score(),
            memory_limit: default_memory_limit(),
            history_window: default_history_window(),
        }
    }
}

/// Volatile memory cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Maximum cached messages per session; oldest are evicted first.
    #[serde(default = "default_conversation_cap")]
    pub conversation_cap: usize,
    /// Maximum cached memories per user; oldest are evicted first.
    #[serde(default = "default_memory_cap")]
    pub memory_cap: usize,
    /// Sessions held in the cache. The least recently active one is dropped
    /// to make room for a new session.
    #[serde(default = "default_max_cached_keys")]
    pub max_cached_sessions: usize,
    /// Users held in the cache, evicted the same way as sessions.
    #[serde(default = "default_max_cached_keys")]
    pub max_cached_users: usize,
}

fn default_conversation_cap() -> usize {
    50
}

fn default_memory_cap() -> usize {
    200
}

fn default_max_cached_keys() -> usize {
    10_000
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            conversation_cap: default_conversation_cap(),
            memory_cap: default_memory_cap(),
            max_cached_sessions: default_max_cached_keys(),
            max_cached_users: default_max_cached_keys(),
        }
    }
}

/// Which durable record store backs entities and memories.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordBackend {
    #[default]
    None,
    Nocodb,
    Sqlite,
}

/// One entity category and the table it is read from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySource {
    pub entity_type: EntityType,
    pub table: String,
}

/// Durable record store settings.
///
/// Table names are NocoDB table ids for the `nocodb` backend and plain
/// table names for `sqlite`. An empty string disables that table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordsConfig {
    #[serde(default)]
    pub backend: RecordBackend,
    #[serde(default = "default_nocodb_base_url")]
    pub nocodb_base_url: String,
    #[serde(default = "default_records_timeout")]
    pub request_timeout_secs: u64,
    /// SQLite database path. Defaults to `{data_dir}/records.db`.
    #[serde(default)]
    pub sqlite_path: Option<PathBuf>,
    #[serde(default = "default_user_memories_table")]
    pub user_memories_table: String,
    #[serde(default = "default_conversations_table")]
    pub conversations_table: String,
    #[serde(default = "default_categories")]
    pub categories: Vec<CategorySource>,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_max_records_per_category")]
    pub max_records_per_category: usize,
}

fn default_nocodb_base_url() -> String {
    "https://app.nocodb.com".to_string()
}

fn default_records_timeout() -> u64 {
    30
}

fn default_user_memories_table() -> String {
    "user_memories".to_string()
}

fn default_conversations_table() -> String {
    "conversations".to_string()
}

fn default_categories() -> Vec<CategorySource> {
    vec![
        CategorySource {
            entity_type: EntityType::Location,
            table: "locations".to_string(),
        },
        CategorySource {
            entity_type: EntityType::Festival,
            table: "festivals".to_string(),
        },
        CategorySource {
            entity_type: EntityType::Item,
            table: "items".to_string(),
        },
    ]
}

fn default_page_size() -> usize {
    100
}

fn default_max_records_per_category() -> usize {
    300
}

fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

impl RecordsConfig {
    pub fn user_memories_table(&self) -> Option<&str> {
        non_empty(&self.user_memories_table)
    }

    pub fn conversations_table(&self) -> Option<&str> {
        non_empty(&self.conversations_table)
    }

    /// Categories with a non-empty table.
    pub fn active_categories(&self) -> impl Iterator<Item = &CategorySource> {
        self.categories
            .iter()
            .filter(|c| non_empty(&c.table).is_some())
    }
}

impl Default for RecordsConfig {
    fn default() -> Self {
        Self {
            backend: RecordBackend::default(),
            nocodb_base_url: default_nocodb_base_url(),
            request_timeout_secs: default_records_timeout(),
            sqlite_path: None,
            user_memories_table: default_user_memories_table(),
            conversations_table: default_conversations_table(),
            categories: default_categories(),
            page_size: default_page_size(),
            max_records_per_category: default_max_records_per_category(),
        }
    }
}
