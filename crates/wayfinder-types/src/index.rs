//! Vector index record and result types.

use serde::{Deserialize, Serialize};

use crate::entity::{EntityType, Modality};
use crate::metadata::Metadata;

/// Side-table entry paired 1:1 with a stored vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub entity_id: i64,
    pub entity_type: EntityType,
    #[serde(default)]
    pub metadata: Metadata,
}

/// An embedding waiting to be added to an index.
#[derive(Debug, Clone)]
pub struct NewEmbedding {
    pub vector: Vec<f32>,
    pub entity_id: i64,
    pub entity_type: EntityType,
    pub metadata: Metadata,
}

/// A single ranked hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub entity_id: i64,
    pub entity_type: EntityType,
    /// Cosine similarity of the normalized query and stored vector.
    pub score: f32,
    pub metadata: Metadata,
}

impl SearchResult {
    /// Metadata title, if any.
    pub fn title(&self) -> Option<&str> {
        self.metadata.get_str("title")
    }
}

/// Per-modality size summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModalityStats {
    pub modality: Modality,
    pub dimension: usize,
    pub count: usize,
}

/// Size summary of every modality's index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    pub modalities: Vec<ModalityStats>,
}

impl IndexStats {
    pub fn count(&self, modality: Modality) -> usize {
        self.modalities
            .iter()
            .find(|m| m.modality == modality)
            .map(|m| m.count)
            .unwrap_or(0)
    }
}
