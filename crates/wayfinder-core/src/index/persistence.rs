//! Persistence port for vector index snapshots.
//!
//! Implementations (the on-disk blob + JSON side-table format) live in
//! wayfinder-infra.

use wayfinder_types::entity::Modality;
use wayfinder_types::error::IndexError;

use super::vector_index::PersistedIndex;

/// Trait for saving and loading one modality's index snapshot.
///
/// `load` returns `Ok(None)` when nothing has been saved yet. Decode
/// failures are reported as `IndexError::DataIntegrity`.
pub trait IndexPersistence: Send + Sync {
    fn save(
        &self,
        modality: Modality,
        index: &PersistedIndex,
    ) -> impl std::future::Future<Output = Result<(), IndexError>> + Send;

    fn load(
        &self,
        modality: Modality,
    ) -> impl std::future::Future<Output = Result<Option<PersistedIndex>, IndexError>> + Send;

    /// Remove every stored artifact for `modality`.
    fn discard(
        &self,
        modality: Modality,
    ) -> impl std::future::Future<Output = Result<(), IndexError>> + Send;
}
