//! BoxRecordStore -- object-safe dynamic dispatch wrapper for RecordStore.
//!
//! Same blanket-impl pattern as `BoxLlmProvider`. `BoxRecordStore` itself
//! implements `RecordStore`, so services generic over the trait accept a
//! runtime-selected backend.

use std::future::Future;
use std::pin::Pin;

use wayfinder_types::error::RepositoryError;
use wayfinder_types::record::{Record, RecordQuery};

use super::store::RecordStore;

/// Object-safe version of [`RecordStore`] with boxed futures.
pub trait RecordStoreDyn: Send + Sync {
    fn name_dyn(&self) -> &str;

    fn create_boxed<'a>(
        &'a self,
        table: &'a str,
        record: &'a Record,
    ) -> Pin<Box<dyn Future<Output = Result<Option<i64>, RepositoryError>> + Send + 'a>>;

    fn query_boxed<'a>(
        &'a self,
        table: &'a str,
        query: &'a RecordQuery,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Record>, RepositoryError>> + Send + 'a>>;
}

impl<T: RecordStore> RecordStoreDyn for T {
    fn name_dyn(&self) -> &str {
        RecordStore::name(self)
    }

    fn create_boxed<'a>(
        &'a self,
        table: &'a str,
        record: &'a Record,
    ) -> Pin<Box<dyn Future<Output = Result<Option<i64>, RepositoryError>> + Send + 'a>> {
        Box::pin(RecordStore::create(self, table, record))
    }

    fn query_boxed<'a>(
        &'a self,
        table: &'a str,
        query: &'a RecordQuery,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Record>, RepositoryError>> + Send + 'a>> {
        Box::pin(RecordStore::query(self, table, query))
    }
}

/// Type-erased record store for runtime backend selection.
pub struct BoxRecordStore {
    inner: Box<dyn RecordStoreDyn + Send + Sync>,
}

impl BoxRecordStore {
    pub fn new<T: RecordStore + 'static>(store: T) -> Self {
        Self {
            inner: Box::new(store),
        }
    }
}

impl RecordStore for BoxRecordStore {
    fn name(&self) -> &str {
        self.inner.name_dyn()
    }

    async fn create(&self, table: &str, record: &Record) -> Result<Option<i64>, RepositoryError> {
        self.inner.create_boxed(table, record).await
    }

    async fn query(&self, table: &str, query: &RecordQuery) -> Result<Vec<Record>, RepositoryError> {
        self.inner.query_boxed(table, query).await
    }
}
