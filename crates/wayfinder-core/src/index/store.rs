//! Vector Index Store: one exact index per modality with snapshot reads.
//!
//! Each modality's committed index sits behind `RwLock<Arc<VectorIndex>>`.
//! Searches clone the `Arc` and rank against that stable snapshot without
//! holding any lock. Mutations are serialized by an async writer mutex
//! (shared by add, replace, and save) and commit through `Arc::make_mut`, so a
//! search that started before an add never observes a half-written record.
//! The std `RwLock` is only held for pointer swaps and appends, never across
//! an `.await`.

use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, info, warn};
use wayfinder_types::entity::{EntityType, Modality};
use wayfinder_types::error::IndexError;
use wayfinder_types::index::{IndexEntry, IndexStats, ModalityStats, NewEmbedding, SearchResult};

use super::persistence::IndexPersistence;
use super::vector_index::{SearchParams, VectorIndex, normalize};

/// Configured vector dimension per modality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexDimensions {
    pub text: usize,
    pub image: usize,
}

impl IndexDimensions {
    pub fn get(&self, modality: Modality) -> usize {
        match modality {
            Modality::Text => self.text,
            Modality::Image => self.image,
        }
    }
}

/// Result of loading one modality from persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// A valid snapshot with this many records was loaded.
    Loaded(usize),
    /// Nothing was stored; the index starts empty.
    Missing,
    /// Stored artifacts were unusable and have been discarded.
    Discarded(String),
}

pub struct VectorStore<P: IndexPersistence> {
    text: RwLock<Arc<VectorIndex>>,
    image: RwLock<Arc<VectorIndex>>,
    writer: tokio::sync::Mutex<()>,
    persistence: P,
    dimensions: IndexDimensions,
    overfetch_factor: usize,
}

impl<P: IndexPersistence> VectorStore<P> {
    /// Create an empty store. Call [`VectorStore::load`] to restore saved
    /// indexes.
    pub fn new(persistence: P, dimensions: IndexDimensions, overfetch_factor: usize) -> Self {
        Self {
            text: RwLock::new(Arc::new(VectorIndex::new(dimensions.text))),
            image: RwLock::new(Arc::new(VectorIndex::new(dimensions.image))),
            writer: tokio::sync::Mutex::new(()),
            persistence,
            dimensions,
            overfetch_factor: overfetch_factor.max(1),
        }
    }

    /// Create a store and load both modalities from persistence.
    pub async fn open(
        persistence: P,
        dimensions: IndexDimensions,
        overfetch_factor: usize,
    ) -> Self {
        let store = Self::new(persistence, dimensions, overfetch_factor);
        store.load().await;
        store
    }

    fn slot(&self, modality: Modality) -> &RwLock<Arc<VectorIndex>> {
        match modality {
            Modality::Text => &self.text,
            Modality::Image => &self.image,
        }
    }

    /// The current committed index for `modality`.
    pub fn snapshot(&self, modality: Modality) -> Arc<VectorIndex> {
        Arc::clone(
            &self
                .slot(modality)
                .read()
                .unwrap_or_else(PoisonError::into_inner),
        )
    }

    fn commit<T>(&self, modality: Modality, mutate: impl FnOnce(&mut VectorIndex) -> T) -> T {
        let mut guard = self
            .slot(modality)
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        mutate(Arc::make_mut(&mut guard))
    }

    pub fn dimension(&self, modality: Modality) -> usize {
        self.dimensions.get(modality)
    }

    pub fn len(&self, modality: Modality) -> usize {
        self.snapshot(modality).len()
    }

    pub fn is_empty(&self, modality: Modality) -> bool {
        self.len(modality) == 0
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            modalities: [Modality::Text, Modality::Image]
                .into_iter()
                .map(|modality| ModalityStats {
                    modality,
                    dimension: self.dimension(modality),
                    count: self.len(modality),
                })
                .collect(),
        }
    }

    /// Add one embedding. Returns its id.
    pub async fn add(&self, modality: Modality, record: NewEmbedding) -> Result<u64, IndexError> {
        let normalized = normalize(&record.vector, self.dimension(modality))?;
        let entry = IndexEntry {
            entity_id: record.entity_id,
            entity_type: record.entity_type,
            metadata: record.metadata,
        };

        let _writer = self.writer.lock().await;
        let id = self.commit(modality, |index| index.push_normalized(normalized, entry));
        debug!(%modality, id, entity_id = record.entity_id, "Embedding added");
        Ok(id)
    }

    fn prepare(
        &self,
        modality: Modality,
        records: Vec<NewEmbedding>,
    ) -> Result<Vec<(Vec<f32>, IndexEntry)>, IndexError> {
        let dimension = self.dimension(modality);
        let prepared = records
            .into_iter()
            .map(|record| {
                normalize(&record.vector, dimension).map(|vector| {
                    (
                        vector,
                        IndexEntry {
                            entity_id: record.entity_id,
                            entity_type: record.entity_type,
                            metadata: record.metadata,
                        },
                    )
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(prepared)
    }

    /// Add many embeddings under a single writer acquisition.
    ///
    /// Every vector is validated before any is committed; one invalid
    /// record rejects the whole batch.
    pub async fn add_batch(
        &self,
        modality: Modality,
        records: Vec<NewEmbedding>,
    ) -> Result<Vec<u64>, IndexError> {
        let prepared = self.prepare(modality, records)?;

        let _writer = self.writer.lock().await;
        let ids = self.commit(modality, |index| {
            prepared
                .into_iter()
                .map(|(vector, entry)| index.push_normalized(vector, entry))
                .collect::<Vec<_>>()
        });
        debug!(%modality, count = ids.len(), "Embedding batch added");
        Ok(ids)
    }

    /// Rank the `modality` index against `query`, highest score first.
    pub fn search(
        &self,
        modality: Modality,
        query: &[f32],
        top_k: usize,
        min_score: f32,
        entity_types: Option<&[EntityType]>,
    ) -> Result<Vec<SearchResult>, IndexError> {
        let snapshot = self.snapshot(modality);
        let results = snapshot.search(
            query,
            SearchParams {
                top_k,
                min_score,
                entity_types,
                overfetch_factor: self.overfetch_factor,
            },
        )?;
        Ok(results)
    }

    /// Reconstruct the stored vector of an indexed entity.
    pub fn vector_for(
        &self,
        modality: Modality,
        entity_type: EntityType,
        entity_id: i64,
    ) -> Option<Vec<f32>> {
        let snapshot = self.snapshot(modality);
        let id = snapshot.find(entity_type, entity_id)?;
        snapshot.vector(id).map(<[f32]>::to_vec)
    }

    /// Swap `modality` for a fresh index holding exactly `records`, with
    /// ids starting at 0.
    ///
    /// On a validation error the committed index is untouched. Searches see
    /// either the old index or the new one.
    pub async fn replace(
        &self,
        modality: Modality,
        records: Vec<NewEmbedding>,
    ) -> Result<Vec<u64>, IndexError> {
        let prepared = self.prepare(modality, records)?;
        let mut fresh = VectorIndex::new(self.dimension(modality));
        let ids: Vec<u64> = prepared
            .into_iter()
            .map(|(vector, entry)| fresh.push_normalized(vector, entry))
            .collect();

        let _writer = self.writer.lock().await;
        *self
            .slot(modality)
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::new(fresh);
        info!(%modality, count = ids.len(), "Index replaced");
        Ok(ids)
    }

    /// Persist both modalities.
    ///
    /// Holds the writer lock for the duration, so the saved snapshots are
    /// consistent with each other and no add interleaves with the write.
    pub async fn save(&self) -> Result<(), IndexError> {
        let _writer = self.writer.lock().await;
        for modality in [Modality::Text, Modality::Image] {
            let snapshot = self.snapshot(modality);
            self.persistence
                .save(modality, &snapshot.to_persisted())
                .await?;
            info!(%modality, count = snapshot.len(), "Index saved");
        }
        Ok(())
    }

    /// Replace both modalities with their persisted snapshots.
    ///
    /// Unusable artifacts are discarded and the modality starts empty.
    pub async fn load(&self) -> Vec<(Modality, LoadOutcome)> {
        let _writer = self.writer.lock().await;
        let mut outcomes = Vec::with_capacity(2);
        for modality in [Modality::Text, Modality::Image] {
            let (index, outcome) = self.load_modality(modality).await;
            *self
                .slot(modality)
                .write()
                .unwrap_or_else(PoisonError::into_inner) = Arc::new(index);
            outcomes.push((modality, outcome));
        }
        outcomes
    }

    async fn load_modality(&self, modality: Modality) -> (VectorIndex, LoadOutcome) {
        let dimension = self.dimension(modality);
        let loaded = match self.persistence.load(modality).await {
            Ok(None) => {
                info!(%modality, "No saved index found, starting empty");
                return (VectorIndex::new(dimension), LoadOutcome::Missing);
            }
            Ok(Some(persisted)) => VectorIndex::from_persisted(persisted, dimension),
            Err(e) => Err(e),
        };

        match loaded {
            Ok(index) => {
                info!(%modality, count = index.len(), "Loaded saved index");
                let count = index.len();
                (index, LoadOutcome::Loaded(count))
            }
            Err(e) => {
                warn!(%modality, error = %e, "Saved index is unusable, discarding and starting empty");
                if let Err(discard_err) = self.persistence.discard(modality).await {
                    warn!(%modality, error = %discard_err, "Failed to discard saved index artifacts");
                }
                (VectorIndex::new(dimension), LoadOutcome::Discarded(e.to_string()))
            }
        }
    }
}
