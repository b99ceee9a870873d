//! RecordStore trait definition.
//!
//! The durable record store holds entities (locations, festivals, items),
//! user memories, and conversation messages as schemaless records. Only a
//! generic create/query interface is used.

use std::sync::Arc;

use wayfinder_types::error::RepositoryError;
use wayfinder_types::record::{Record, RecordQuery};

/// Port for a table-oriented record store.
///
/// Implementations live in wayfinder-infra (NocoDB REST, SQLite).
/// Uses native async fn in traits (RPITIT, Rust 2024 edition).
pub trait RecordStore: Send + Sync {
    /// Human-readable backend name (e.g., "nocodb", "sqlite").
    fn name(&self) -> &str;

    /// Insert a record. Returns the backend-assigned id when one is reported.
    fn create(
        &self,
        table: &str,
        record: &Record,
    ) -> impl std::future::Future<Output = Result<Option<i64>, RepositoryError>> + Send;

    /// Query records with equality filters, optional sort, and paging.
    fn query(
        &self,
        table: &str,
        query: &RecordQuery,
    ) -> impl std::future::Future<Output = Result<Vec<Record>, RepositoryError>> + Send;
}

/// Forwards to the shared inner store.
impl<T: RecordStore> RecordStore for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn create(&self, table: &str, record: &Record) -> Result<Option<i64>, RepositoryError> {
        (**self).create(table, record).await
    }

    async fn query(&self, table: &str, query: &RecordQuery) -> Result<Vec<Record>, RepositoryError> {
        (**self).query(table, query).await
    }
}
