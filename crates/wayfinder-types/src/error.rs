use thiserror::Error;

use crate::entity::EntityType;

/// Malformed caller input, rejected at the boundary and never coerced.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("unknown entity type: '{0}'")]
    UnknownEntityType(String),

    #[error("unknown memory type: '{0}'")]
    UnknownMemoryType(String),

    #[error("unknown search type: '{0}'")]
    UnknownSearchType(String),

    #[error("unknown modality: '{0}'")]
    UnknownModality(String),

    #[error("invalid conversation role: '{0}'")]
    InvalidRole(String),

    #[error("vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("vector contains non-finite values")]
    NonFiniteVector,

    #[error("vector has zero norm")]
    ZeroNormVector,

    #[error("invalid metadata: {0}")]
    InvalidMetadata(String),

    #[error("{field} out of range: {message}")]
    OutOfRange { field: &'static str, message: String },

    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("invalid image payload: {0}")]
    InvalidImage(String),
}

impl ValidationError {
    /// Shorthand for an out-of-range parameter.
    pub fn out_of_range(field: &'static str, message: impl Into<String>) -> Self {
        ValidationError::OutOfRange {
            field,
            message: message.into(),
        }
    }
}

/// Errors from vector index operations.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("index data integrity violation: {0}")]
    DataIntegrity(String),

    #[error("index persistence error: {0}")]
    Persistence(String),

    /// Nothing could be read from the record store; the index was left as is.
    #[error("record source unavailable: {0}")]
    SourceUnavailable(String),
}

/// Errors from embedding providers.
///
/// The embedding generator never propagates these; they are logged and
/// turned into an "unavailable" outcome.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding provider not configured")]
    Unconfigured,

    #[error("embedding provider error: {0}")]
    Provider(String),

    #[error("embedding request timed out after {0}s")]
    Timeout(u64),

    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),
}

/// Errors from repository operations (used by trait definitions in wayfinder-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("record store not configured")]
    Unconfigured,

    #[error("request error: {0}")]
    Request(String),
}

/// Errors from the search helpers that look up a specific entity.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Entity not found: {entity_type}/{entity_id}")]
    EntityNotFound {
        entity_type: EntityType,
        entity_id: i64,
    },

    #[error(transparent)]
    Index(#[from] IndexError),
}
