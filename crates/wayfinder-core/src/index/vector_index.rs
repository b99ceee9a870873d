//! Exact inner-product index over L2-normalized vectors.
//!
//! A `VectorIndex` is a flat, row-major vector buffer paired 1:1 with a
//! side table of entries. The id of a record is its row position: ids start
//! at 0, increase by one per add, and are never reused (the index is
//! append-only). After every completed mutation the entry count equals the
//! vector count.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use wayfinder_types::entity::EntityType;
use wayfinder_types::error::{IndexError, ValidationError};
use wayfinder_types::index::{IndexEntry, SearchResult};

/// Normalize a vector to unit L2 length after validating it.
pub fn normalize(vector: &[f32], dimension: usize) -> Result<Vec<f32>, ValidationError> {
    if vector.len() != dimension {
        return Err(ValidationError::DimensionMismatch {
            expected: dimension,
            actual: vector.len(),
        });
    }
    if vector.iter().any(|v| !v.is_finite()) {
        return Err(ValidationError::NonFiniteVector);
    }
    let norm = vector
        .iter()
        .map(|v| f64::from(*v) * f64::from(*v))
        .sum::<f64>()
        .sqrt();
    if norm == 0.0 || !norm.is_finite() {
        return Err(ValidationError::ZeroNormVector);
    }
    Ok(vector.iter().map(|v| (f64::from(*v) / norm) as f32).collect())
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Serializable snapshot of one modality's index.
///
/// `vectors` is row-major with `dimension` floats per row; `entries` maps
/// each row id to its side-table entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedIndex {
    pub dimension: usize,
    pub vectors: Vec<f32>,
    pub entries: BTreeMap<u64, IndexEntry>,
}

/// Parameters of a single search.
#[derive(Debug, Clone, Copy)]
pub struct SearchParams<'a> {
    pub top_k: usize,
    pub min_score: f32,
    pub entity_types: Option<&'a [EntityType]>,
    /// Candidate window multiplier applied when `entity_types` is set.
    pub overfetch_factor: usize,
}

#[derive(Debug, Clone)]
pub struct VectorIndex {
    dimension: usize,
    vectors: Vec<f32>,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            vectors: Vec::new(),
            entries: Vec::new(),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Validate and normalize `vector`, then append it with `entry`.
    ///
    /// Returns the assigned id.
    pub fn push(&mut self, vector: &[f32], entry: IndexEntry) -> Result<u64, ValidationError> {
        let normalized = normalize(vector, self.dimension)?;
        Ok(self.push_normalized(normalized, entry))
    }

    /// Append a vector already produced by [`normalize`] for this dimension.
    pub(crate) fn push_normalized(&mut self, normalized: Vec<f32>, entry: IndexEntry) -> u64 {
        debug_assert_eq!(normalized.len(), self.dimension);
        let id = self.entries.len() as u64;
        self.vectors.extend_from_slice(&normalized);
        self.entries.push(entry);
        id
    }

    /// Validate every vector first, then append them all.
    ///
    /// Either every record is added or none is.
    pub fn push_many(
        &mut self,
        records: Vec<(Vec<f32>, IndexEntry)>,
    ) -> Result<Vec<u64>, ValidationError> {
        let normalized = records
            .into_iter()
            .map(|(vector, entry)| normalize(&vector, self.dimension).map(|v| (v, entry)))
            .collect::<Result<Vec<_>, _>>()?;

        self.vectors.reserve(normalized.len() * self.dimension);
        self.entries.reserve(normalized.len());
        Ok(normalized
            .into_iter()
            .map(|(vector, entry)| self.push_normalized(vector, entry))
            .collect())
    }

    fn row(&self, id: usize) -> &[f32] {
        &self.vectors[id * self.dimension..(id + 1) * self.dimension]
    }

    /// The stored (normalized) vector for `id`.
    pub fn vector(&self, id: u64) -> Option<&[f32]> {
        let id = usize::try_from(id).ok()?;
        (id < self.entries.len()).then(|| self.row(id))
    }

    pub fn entry(&self, id: u64) -> Option<&IndexEntry> {
        self.entries.get(usize::try_from(id).ok()?)
    }

    /// First id holding the given entity.
    pub fn find(&self, entity_type: EntityType, entity_id: i64) -> Option<u64> {
        self.entries
            .iter()
            .position(|e| e.entity_type == entity_type && e.entity_id == entity_id)
            .map(|p| p as u64)
    }

    /// Rank stored vectors against `query`, highest score first.
    ///
    /// The candidate window is `min(top_k, len)`, widened to
    /// `min(overfetch_factor * top_k, len)` when a type filter is present.
    /// Candidates are filtered by type and `min_score` in rank order and the
    /// scan stops at `top_k` survivors; fewer may be returned. Equal scores
    /// rank by ascending id.
    pub fn search(
        &self,
        query: &[f32],
        params: SearchParams<'_>,
    ) -> Result<Vec<SearchResult>, ValidationError> {
        let query = normalize(query, self.dimension)?;
        if self.is_empty() || params.top_k == 0 {
            return Ok(Vec::new());
        }

        let window = match params.entity_types {
            Some(_) => params.top_k.saturating_mul(params.overfetch_factor.max(1)),
            None => params.top_k,
        }
        .min(self.len());

        let mut scored: Vec<(usize, f32)> = (0..self.len())
            .map(|id| (id, dot(&query, self.row(id))))
            .collect();

        let rank = |a: &(usize, f32), b: &(usize, f32)| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0));
        if window < scored.len() {
            scored.select_nth_unstable_by(window, rank);
            scored.truncate(window);
        }
        scored.sort_unstable_by(rank);

        let mut results = Vec::with_capacity(params.top_k.min(window));
        for (id, score) in scored {
            if score < params.min_score {
                continue;
            }
            let entry = &self.entries[id];
            if let Some(types) = params.entity_types {
                if !types.contains(&entry.entity_type) {
                    continue;
                }
            }
            results.push(SearchResult {
                entity_id: entry.entity_id,
                entity_type: entry.entity_type,
                score,
                metadata: entry.metadata.clone(),
            });
            if results.len() >= params.top_k {
                break;
            }
        }
        Ok(results)
    }

    pub fn to_persisted(&self) -> PersistedIndex {
        PersistedIndex {
            dimension: self.dimension,
            vectors: self.vectors.clone(),
            entries: self
                .entries
                .iter()
                .enumerate()
                .map(|(id, entry)| (id as u64, entry.clone()))
                .collect(),
        }
    }

    /// Rebuild an index from a persisted snapshot, enforcing the pairing
    /// invariant.
    ///
    /// Vectors are taken bit-exact; they were normalized when first added.
    pub fn from_persisted(
        persisted: PersistedIndex,
        expected_dimension: usize,
    ) -> Result<Self, IndexError> {
        if persisted.dimension != expected_dimension {
            return Err(IndexError::DataIntegrity(format!(
                "stored dimension {} does not match configured dimension {expected_dimension}",
                persisted.dimension
            )));
        }
        if persisted.dimension == 0 || persisted.vectors.len() % persisted.dimension != 0 {
            return Err(IndexError::DataIntegrity(format!(
                "vector buffer of {} floats is not a multiple of dimension {}",
                persisted.vectors.len(),
                persisted.dimension
            )));
        }
        let count = persisted.vectors.len() / persisted.dimension;
        if count != persisted.entries.len() {
            return Err(IndexError::DataIntegrity(format!(
                "{count} vectors but {} side-table entries",
                persisted.entries.len()
            )));
        }

        let mut entries = Vec::with_capacity(count);
        for (expected_id, (id, entry)) in persisted.entries.into_iter().enumerate() {
            if id != expected_id as u64 {
                return Err(IndexError::DataIntegrity(format!(
                    "side-table ids are not contiguous: expected {expected_id}, found {id}"
                )));
            }
            entries.push(entry);
        }

        Ok(Self {
            dimension: persisted.dimension,
            vectors: persisted.vectors,
            entries,
        })
    }
}
