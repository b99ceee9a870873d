//! Startup Indexer: builds the text index from the record store once.
//!
//! A dedicated async mutex guards a completed flag and is held for the whole
//! rebuild, so concurrent callers wait for the first one and then observe
//! `AlreadyCompleted`. The flag is only set after the index has been saved.
//! Categories are fetched and embedded before the text index is swapped, so
//! an unreachable record store never replaces a good index with an empty one.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};
use wayfinder_types::config::{CategorySource, RecordsConfig};
use wayfinder_types::entity::{EntityType, Modality};
use wayfinder_types::error::{IndexError, RepositoryError};
use wayfinder_types::index::NewEmbedding;
use wayfinder_types::record::{Record, RecordQuery};

use super::entity_text::{entity_metadata, entity_text};
use crate::embedding::generator::EmbeddingGenerator;
use crate::index::persistence::IndexPersistence;
use crate::index::store::VectorStore;
use crate::index::vector_index::normalize;
use crate::records::fields::record_id;
use crate::records::store::RecordStore;

/// Which categories to read and how to page through them.
#[derive(Debug, Clone)]
pub struct IndexerSettings {
    pub categories: Vec<CategorySource>,
    pub page_size: usize,
    pub max_records_per_category: usize,
}

impl IndexerSettings {
    pub fn from_config(config: &RecordsConfig) -> Self {
        Self {
            categories: config.active_categories().cloned().collect(),
            page_size: config.page_size.max(1),
            max_records_per_category: config.max_records_per_category,
        }
    }
}

/// Per-category counts from one rebuild.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryReport {
    pub entity_type: EntityType,
    pub table: String,
    pub fetched: usize,
    pub indexed: usize,
    /// Records without an id, without text, or whose embedding was unavailable.
    pub skipped: usize,
    /// Set when the category failed as a whole.
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexingReport {
    pub categories: Vec<CategoryReport>,
}

impl IndexingReport {
    pub fn total_indexed(&self) -> usize {
        self.categories.iter().map(|c| c.indexed).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum IndexingOutcome {
    /// A previous call already finished indexing.
    AlreadyCompleted,
    /// The text index already held this many records.
    ExistingIndex { count: usize },
    /// The index was built from the record store and saved.
    Rebuilt(IndexingReport),
    /// No text embedder is configured. Nothing was built; a later call retries.
    EmbeddingsUnavailable,
}

pub struct StartupIndexer<P: IndexPersistence, R: RecordStore> {
    index: Arc<VectorStore<P>>,
    embeddings: Arc<EmbeddingGenerator>,
    records: Option<R>,
    settings: IndexerSettings,
    completed: tokio::sync::Mutex<bool>,
}

impl<P: IndexPersistence, R: RecordStore> StartupIndexer<P, R> {
    pub fn new(
        index: Arc<VectorStore<P>>,
        embeddings: Arc<EmbeddingGenerator>,
        records: Option<R>,
        settings: IndexerSettings,
    ) -> Self {
        Self {
            index,
            embeddings,
            records,
            settings,
            completed: tokio::sync::Mutex::new(false),
        }
    }

    /// Build the text index unless it is already built or non-empty.
    pub async fn ensure_indexed(&self) -> Result<IndexingOutcome, IndexError> {
        let mut completed = self.completed.lock().await;
        if *completed {
            return Ok(IndexingOutcome::AlreadyCompleted);
        }

        let existing = self.index.len(Modality::Text);
        if existing > 0 {
            info!(count = existing, "Text index already populated, skipping startup indexing");
            *completed = true;
            return Ok(IndexingOutcome::ExistingIndex { count: existing });
        }

        let outcome = self.build(false).await?;
        if matches!(outcome, IndexingOutcome::Rebuilt(_)) {
            *completed = true;
        }
        Ok(outcome)
    }

    /// Build the text index again from the record store and swap it in.
    ///
    /// The current index stays in place, in memory and on disk, until the
    /// new one is ready. Without a record store, or when no category could
    /// be read, nothing changes and `SourceUnavailable` is returned.
    pub async fn rebuild(&self) -> Result<IndexingOutcome, IndexError> {
        let mut completed = self.completed.lock().await;
        let outcome = self.build(true).await?;
        if matches!(outcome, IndexingOutcome::Rebuilt(_)) {
            *completed = true;
        }
        Ok(outcome)
    }

    async fn build(&self, replacing: bool) -> Result<IndexingOutcome, IndexError> {
        if !self.embeddings.text_available() {
            warn!(replacing, "Indexing skipped: no text embedder is configured");
            return Ok(IndexingOutcome::EmbeddingsUnavailable);
        }

        let mut report = IndexingReport::default();
        let mut staged = Vec::new();
        match &self.records {
            Some(records) => {
                for category in &self.settings.categories {
                    let (category_report, batch) = self.stage_category(records, category).await;
                    report.categories.push(category_report);
                    staged.extend(batch);
                }
            }
            None if replacing => {
                return Err(IndexError::SourceUnavailable(
                    "no record store configured".to_string(),
                ));
            }
            None => warn!("No record store configured, saving an empty text index"),
        }

        if !report.categories.is_empty() && report.categories.iter().all(|c| c.error.is_some()) {
            let reasons: Vec<String> = report
                .categories
                .iter()
                .filter_map(|c| c.error.as_deref().map(|e| format!("{}: {e}", c.table)))
                .collect();
            warn!(categories = report.categories.len(), "Every category failed, keeping the current index");
            return Err(IndexError::SourceUnavailable(reasons.join("; ")));
        }

        self.index.replace(Modality::Text, staged).await?;
        self.index.save().await?;
        info!(
            indexed = report.total_indexed(),
            categories = report.categories.len(),
            "Text indexing finished"
        );
        Ok(IndexingOutcome::Rebuilt(report))
    }

    /// Fetch and embed one category without touching the index. Failures
    /// are contained in the returned report.
    async fn stage_category(
        &self,
        records: &R,
        category: &CategorySource,
    ) -> (CategoryReport, Vec<NewEmbedding>) {
        let mut report = CategoryReport {
            entity_type: category.entity_type,
            table: category.table.clone(),
            fetched: 0,
            indexed: 0,
            skipped: 0,
            error: None,
        };

        let rows = match self.fetch_all(records, &category.table).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(entity_type = %category.entity_type, table = %category.table, error = %e, "Failed to fetch category");
                report.error = Some(e.to_string());
                return (report, Vec::new());
            }
        };
        report.fetched = rows.len();

        let mut candidates = Vec::with_capacity(rows.len());
        for row in &rows {
            let text = entity_text(category.entity_type, row);
            match record_id(row) {
                Some(id) if !text.is_empty() => candidates.push((id, text, entity_metadata(row))),
                _ => report.skipped += 1,
            }
        }

        let texts: Vec<String> = candidates.iter().map(|(_, text, _)| text.clone()).collect();
        let vectors = self.embeddings.embed_text_batch(&texts).await;

        let dimension = self.index.dimension(Modality::Text);
        let mut batch = Vec::with_capacity(candidates.len());
        for ((entity_id, _, metadata), vector) in candidates.into_iter().zip(vectors) {
            match vector {
                Some(vector) if normalize(&vector, dimension).is_ok() => batch.push(NewEmbedding {
                    vector,
                    entity_id,
                    entity_type: category.entity_type,
                    metadata,
                }),
                Some(vector) => {
                    warn!(entity_id, len = vector.len(), dimension, "Unusable embedding skipped");
                    report.skipped += 1;
                }
                None => report.skipped += 1,
            }
        }
        report.indexed = batch.len();

        info!(
            entity_type = %category.entity_type,
            fetched = report.fetched,
            indexed = report.indexed,
            skipped = report.skipped,
            "Category staged"
        );
        (report, batch)
    }

    /// Page through `table` until a short page or the per-category cap.
    async fn fetch_all(&self, records: &R, table: &str) -> Result<Vec<Record>, RepositoryError> {
        let cap = self.settings.max_records_per_category;
        let mut rows = Vec::new();
        while rows.len() < cap {
            let limit = self.settings.page_size.min(cap - rows.len());
            let query = RecordQuery::new().limit(limit).offset(rows.len());
            let page = records.query(table, &query).await?;
            let short = page.len() < limit;
            rows.extend(page);
            if short {
                break;
            }
        }
        Ok(rows)
    }
}
