//! Hand-written mock ports shared by the unit tests in this crate.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use wayfinder_types::entity::Modality;
use wayfinder_types::error::{EmbeddingError, IndexError, RepositoryError};
use wayfinder_types::llm::{CompletionRequest, CompletionResponse, Finish, LlmError, TokenUsage};
use wayfinder_types::record::{Record, RecordQuery, SortOrder};

use crate::embedding::embedder::{ImageEmbedder, TextEmbedder};
use crate::index::persistence::IndexPersistence;
use crate::index::vector_index::PersistedIndex;
use crate::llm::provider::LlmProvider;
use crate::records::store::RecordStore;

/// Deterministic, non-zero vector derived from a string.
pub fn hashed_vector(text: &str, dimension: usize) -> Vec<f32> {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in text.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    (0..dimension)
        .map(|i| {
            let mixed = hash.rotate_left((i % 64) as u32) ^ (i as u64);
            ((mixed % 1000) as f32 / 1000.0) + 0.01
        })
        .collect()
}

pub struct MockTextEmbedder {
    dimension: usize,
    vectors: HashMap<String, Vec<f32>>,
    fail_on: Option<String>,
    drop_last: bool,
    delay: Option<Duration>,
    calls: Arc<Mutex<Vec<Vec<String>>>>,
}

impl MockTextEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            vectors: HashMap::new(),
            fail_on: None,
            drop_last: false,
            delay: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Return `vector` whenever exactly `text` is embedded.
    pub fn with_vector(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.vectors.insert(text.to_string(), vector);
        self
    }

    /// Fail any batch containing a text that contains `needle`.
    pub fn failing_on(mut self, needle: &str) -> Self {
        self.fail_on = Some(needle.to_string());
        self
    }

    /// Fail every call.
    pub fn failing(self) -> Self {
        self.failing_on("")
    }

    /// Return one vector fewer than requested.
    pub fn dropping_last(mut self) -> Self {
        self.drop_last = true;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Every batch submitted so far, in call order.
    pub fn calls(&self) -> Arc<Mutex<Vec<Vec<String>>>> {
        Arc::clone(&self.calls)
    }
}

impl TextEmbedder for MockTextEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        self.calls.lock().unwrap().push(texts.to_vec());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(needle) = &self.fail_on {
            if texts.iter().any(|t| t.contains(needle.as_str())) {
                return Err(EmbeddingError::Provider("mock failure".to_string()));
            }
        }
        let mut vectors: Vec<Vec<f32>> = texts
            .iter()
            .map(|t| {
                self.vectors
                    .get(t)
                    .cloned()
                    .unwrap_or_else(|| hashed_vector(t, self.dimension))
            })
            .collect();
        if self.drop_last {
            vectors.pop();
        }
        Ok(vectors)
    }

    fn model_name(&self) -> &str {
        "mock-text"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

pub struct MockImageEmbedder {
    dimension: usize,
    load_delay: Duration,
}

impl MockImageEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            load_delay: Duration::ZERO,
        }
    }

    /// Every `load` sleeps this long before reporting ready.
    pub fn with_load_delay(mut self, delay: Duration) -> Self {
        self.load_delay = delay;
        self
    }
}

impl ImageEmbedder for MockImageEmbedder {
    async fn embed_image(&self, bytes: &[u8]) -> Result<Vec<f32>, EmbeddingError> {
        Ok(hashed_vector(&String::from_utf8_lossy(bytes), self.dimension))
    }

    async fn load(&self) -> Result<(), EmbeddingError> {
        tokio::time::sleep(self.load_delay).await;
        Ok(())
    }

    fn model_name(&self) -> &str {
        "mock-image"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

pub struct MockLlm {
    reply: Option<String>,
    usage: TokenUsage,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl MockLlm {
    pub fn ok(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            usage: TokenUsage {
                prompt_tokens: 40,
                completion_tokens: 10,
            },
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            usage: TokenUsage::default(),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn requests(&self) -> Arc<Mutex<Vec<CompletionRequest>>> {
        Arc::clone(&self.requests)
    }
}

impl LlmProvider for MockLlm {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        match &self.reply {
            Some(content) => Ok(CompletionResponse {
                content: content.clone(),
                model: request.model.clone(),
                finish: Finish::Complete,
                usage: self.usage,
            }),
            None => Err(LlmError::Provider("mock provider down".to_string())),
        }
    }
}

/// Record store backed by in-process tables.
#[derive(Clone, Default)]
pub struct InMemoryRecordStore {
    tables: Arc<Mutex<HashMap<String, Vec<Record>>>>,
    failing: Arc<AtomicBool>,
    failing_tables: Arc<Mutex<Vec<String>>>,
    queries: Arc<AtomicUsize>,
    next_id: Arc<AtomicI64>,
}

impl InMemoryRecordStore {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Make every request against `table` fail.
    pub fn fail_table(&self, table: &str) {
        self.failing_tables.lock().unwrap().push(table.to_string());
    }

    pub fn seed(&self, table: &str, records: Vec<Record>) {
        self.tables
            .lock()
            .unwrap()
            .entry(table.to_string())
            .or_default()
            .extend(records);
    }

    pub fn table_len(&self, table: &str) -> usize {
        self.tables.lock().unwrap().get(table).map_or(0, Vec::len)
    }

    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    fn check(&self, table: &str) -> Result<(), RepositoryError> {
        if self.failing.load(Ordering::SeqCst)
            || self.failing_tables.lock().unwrap().iter().any(|t| t == table)
        {
            return Err(RepositoryError::Request("mock outage".to_string()));
        }
        Ok(())
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> std::cmp::Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .unwrap_or(0.0)
            .total_cmp(&y.as_f64().unwrap_or(0.0)),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(_), None) => std::cmp::Ordering::Greater,
        (None, Some(_)) => std::cmp::Ordering::Less,
        _ => std::cmp::Ordering::Equal,
    }
}

impl RecordStore for InMemoryRecordStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn create(&self, table: &str, record: &Record) -> Result<Option<i64>, RepositoryError> {
        self.check(table)?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let mut stored = record.clone();
        stored.insert("Id".to_string(), Value::from(id));
        self.tables
            .lock()
            .unwrap()
            .entry(table.to_string())
            .or_default()
            .push(stored);
        Ok(Some(id))
    }

    async fn query(&self, table: &str, query: &RecordQuery) -> Result<Vec<Record>, RepositoryError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.check(table)?;
        let tables = self.tables.lock().unwrap();
        let mut rows: Vec<Record> = tables
            .get(table)
            .map(|rows| {
                rows.iter()
                    .filter(|r| query.filters.iter().all(|(f, v)| r.get(f) == Some(v)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        if let Some((field, order)) = &query.sort {
            rows.sort_by(|a, b| {
                let ord = compare_values(a.get(field), b.get(field));
                match order {
                    SortOrder::Asc => ord,
                    SortOrder::Desc => ord.reverse(),
                }
            });
        }
        let offset = query.offset.unwrap_or(0);
        let limit = query.limit.unwrap_or(usize::MAX);
        Ok(rows.into_iter().skip(offset).take(limit).collect())
    }
}

/// Index persistence kept in process memory.
#[derive(Clone, Default)]
pub struct MemoryPersistence {
    snapshots: Arc<Mutex<HashMap<Modality, PersistedIndex>>>,
    saves: Arc<AtomicUsize>,
    failing: Arc<AtomicBool>,
}

impl MemoryPersistence {
    pub fn insert(&self, modality: Modality, index: PersistedIndex) {
        self.snapshots.lock().unwrap().insert(modality, index);
    }

    pub fn get(&self, modality: Modality) -> Option<PersistedIndex> {
        self.snapshots.lock().unwrap().get(&modality).cloned()
    }

    /// Number of successful `save` calls, counted per modality.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl IndexPersistence for MemoryPersistence {
    async fn save(&self, modality: Modality, index: &PersistedIndex) -> Result<(), IndexError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(IndexError::Persistence("mock disk full".to_string()));
        }
        self.insert(modality, index.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn load(&self, modality: Modality) -> Result<Option<PersistedIndex>, IndexError> {
        Ok(self.get(modality))
    }

    async fn discard(&self, modality: Modality) -> Result<(), IndexError> {
        self.snapshots.lock().unwrap().remove(&modality);
        Ok(())
    }
}
