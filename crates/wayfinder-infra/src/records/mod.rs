//! Record store backends.
//!
//! - `NocoDbRecordStore`: NocoDB v2 REST API
//! - `SqliteRecordStore`: local SQLite file with JSON rows

pub mod nocodb;
pub mod pool;
pub mod sqlite;

use std::path::Path;

use secrecy::SecretString;
use tracing::{info, warn};
use wayfinder_core::records::box_store::BoxRecordStore;
use wayfinder_types::config::{RecordBackend, RecordsConfig};
use wayfinder_types::error::RepositoryError;

pub use nocodb::NocoDbRecordStore;
pub use pool::DatabasePool;
pub use sqlite::SqliteRecordStore;

/// Open the configured record backend.
///
/// Returns `Ok(None)` for `backend = "none"` and for `nocodb` without a
/// token: the application then runs without durable records.
pub async fn open_record_store(
    config: &RecordsConfig,
    sqlite_path: &Path,
    nocodb_token: Option<&SecretString>,
) -> Result<Option<BoxRecordStore>, RepositoryError> {
    match config.backend {
        RecordBackend::None => Ok(None),
        RecordBackend::Nocodb => match nocodb_token {
            Some(token) => {
                let store = NocoDbRecordStore::new(
                    &config.nocodb_base_url,
                    token.clone(),
                    config.request_timeout_secs,
                )?;
                info!(base_url = %config.nocodb_base_url, "Using NocoDB record store");
                Ok(Some(BoxRecordStore::new(store)))
            }
            None => {
                warn!("NocoDB backend selected but NOCODB_API_TOKEN is not set; running without records");
                Ok(None)
            }
        },
        RecordBackend::Sqlite => {
            let pool = DatabasePool::open(sqlite_path).await.map_err(|e| {
                RepositoryError::Query(format!("failed to open {}: {e}", sqlite_path.display()))
            })?;
            info!(path = %sqlite_path.display(), "Using SQLite record store");
            Ok(Some(BoxRecordStore::new(SqliteRecordStore::new(pool))))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wayfinder_core::records::store::RecordStore;

    #[tokio::test]
    async fn test_none_backend_opens_nothing() {
        let config = RecordsConfig::default();
        let store = open_record_store(&config, Path::new("/unused.db"), None)
            .await
            .unwrap();
        assert!(store.is_none());
    }

    #[tokio::test]
    async fn test_nocodb_without_token_opens_nothing() {
        let config = RecordsConfig {
            backend: RecordBackend::Nocodb,
            ..RecordsConfig::default()
        };
        let store = open_record_store(&config, Path::new("/unused.db"), None)
            .await
            .unwrap();
        assert!(store.is_none());
    }

    #[tokio::test]
    async fn test_sqlite_backend_opens_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = RecordsConfig {
            backend: RecordBackend::Sqlite,
            ..RecordsConfig::default()
        };
        let path = dir.path().join("records.db");
        let store = open_record_store(&config, &path, None).await.unwrap().unwrap();
        assert_eq!(store.name(), "sqlite");
        assert!(path.exists());
    }
}
