//! SQLite record store.
//!
//! Implements `RecordStore` from `wayfinder-core` on a single `records`
//! table: every row carries its logical table name and its fields as a JSON
//! object. Filters and sort keys are evaluated with `json_extract`. The row
//! id is exposed to callers as the `Id` field, matching NocoDB.

use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use sqlx::{QueryBuilder, Row, Sqlite};

use wayfinder_core::records::store::RecordStore;
use wayfinder_types::error::RepositoryError;
use wayfinder_types::record::{Record, RecordQuery, SortOrder};

use super::pool::DatabasePool;

const ID_FIELD: &str = "Id";

/// SQLite-backed implementation of `RecordStore`.
pub struct SqliteRecordStore {
    pool: DatabasePool,
}

impl SqliteRecordStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

fn query_error(e: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::Query(e.to_string())
}

fn check_table(table: &str) -> Result<(), RepositoryError> {
    if table.trim().is_empty() {
        return Err(RepositoryError::Query("table name must not be empty".to_string()));
    }
    Ok(())
}

/// Push the SQL expression addressing `field`.
fn push_field(builder: &mut QueryBuilder<'_, Sqlite>, field: &str) {
    if field == ID_FIELD {
        builder.push("id");
    } else {
        builder.push("json_extract(data, ");
        builder.push_bind(format!("$.\"{}\"", field.replace('"', "")));
        builder.push(")");
    }
}

/// Push `= <value>` (or `IS NULL`) for an equality filter.
fn push_equals(builder: &mut QueryBuilder<'_, Sqlite>, value: &Value) -> Result<(), RepositoryError> {
    match value {
        Value::Null => {
            builder.push(" IS NULL");
        }
        Value::Bool(b) => {
            builder.push(" = ");
            builder.push_bind(i64::from(*b));
        }
        Value::Number(n) => {
            builder.push(" = ");
            if let Some(i) = n.as_i64() {
                builder.push_bind(i);
            } else if let Some(f) = n.as_f64() {
                builder.push_bind(f);
            } else {
                return Err(RepositoryError::Query(format!("unsupported number filter: {n}")));
            }
        }
        Value::String(s) => {
            builder.push(" = ");
            builder.push_bind(s.clone());
        }
        Value::Array(_) | Value::Object(_) => {
            return Err(RepositoryError::Query(
                "filters must compare against scalar values".to_string(),
            ));
        }
    }
    Ok(())
}

fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<Record, RepositoryError> {
    let id: i64 = row.try_get("id").map_err(query_error)?;
    let data: String = row.try_get("data").map_err(query_error)?;
    let mut record: Record = serde_json::from_str(&data)
        .map_err(|e| RepositoryError::Query(format!("invalid JSON record: {e}")))?;
    record.insert(ID_FIELD.to_string(), Value::from(id));
    Ok(record)
}

impl RecordStore for SqliteRecordStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn create(&self, table: &str, record: &Record) -> Result<Option<i64>, RepositoryError> {
        check_table(table)?;
        let mut data = record.clone();
        data.remove(ID_FIELD);
        let data = serde_json::to_string(&data)
            .map_err(|e| RepositoryError::Query(format!("failed to serialize record: {e}")))?;

        let result = sqlx::query("INSERT INTO records (table_name, data, created_at) VALUES (?, ?, ?)")
            .bind(table)
            .bind(&data)
            .bind(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true))
            .execute(&self.pool.writer)
            .await
            .map_err(query_error)?;

        Ok(Some(result.last_insert_rowid()))
    }

    async fn query(&self, table: &str, query: &RecordQuery) -> Result<Vec<Record>, RepositoryError> {
        check_table(table)?;

        let mut builder = QueryBuilder::<Sqlite>::new("SELECT id, data FROM records WHERE table_name = ");
        builder.push_bind(table.to_string());

        for (field, value) in &query.filters {
            builder.push(" AND ");
            push_field(&mut builder, field);
            push_equals(&mut builder, value)?;
        }

        builder.push(" ORDER BY ");
        if let Some((field, order)) = &query.sort {
            push_field(&mut builder, field);
            builder.push(match order {
                SortOrder::Asc => " ASC, ",
                SortOrder::Desc => " DESC, ",
            });
        }
        builder.push("id ASC");

        // SQLite needs a LIMIT clause before OFFSET; -1 means unbounded.
        builder.push(" LIMIT ");
        builder.push_bind(query.limit.map_or(-1, |l| l as i64));
        builder.push(" OFFSET ");
        builder.push_bind(query.offset.unwrap_or(0) as i64);

        let rows = builder
            .build()
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_error)?;

        rows.iter().map(row_to_record).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn test_store() -> (SqliteRecordStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let pool = DatabasePool::open(&dir.path().join("records.db")).await.unwrap();
        (SqliteRecordStore::new(pool), dir)
    }

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_create_assigns_increasing_ids() {
        let (store, _dir) = test_store().await;
        let first = store
            .create("locations", &record(json!({"title": "Marble Mountains"})))
            .await
            .unwrap();
        let second = store
            .create("locations", &record(json!({"title": "Son Tra"})))
            .await
            .unwrap();
        assert_eq!(first, Some(1));
        assert_eq!(second, Some(2));

        let rows = store.query("locations", &RecordQuery::new()).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["Id"], json!(1));
        assert_eq!(rows[0]["title"], json!("Marble Mountains"));
    }

    #[tokio::test]
    async fn test_tables_are_isolated() {
        let (store, _dir) = test_store().await;
        store.create("a", &record(json!({"x": 1}))).await.unwrap();
        store.create("b", &record(json!({"x": 2}))).await.unwrap();

        let rows = store.query("b", &RecordQuery::new()).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["x"], json!(2));
    }

    #[tokio::test]
    async fn test_equality_filters_by_type() {
        let (store, _dir) = test_store().await;
        store
            .create("mem", &record(json!({"userId": 7, "memoryType": "preference", "pinned": true})))
            .await
            .unwrap();
        store
            .create("mem", &record(json!({"userId": 7, "memoryType": "fact", "pinned": false})))
            .await
            .unwrap();
        store
            .create("mem", &record(json!({"userId": 8, "memoryType": "preference", "pinned": true})))
            .await
            .unwrap();

        let rows = store
            .query(
                "mem",
                &RecordQuery::new().filter("userId", 7).filter("memoryType", "preference"),
            )
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["Id"], json!(1));

        let pinned = store
            .query("mem", &RecordQuery::new().filter("pinned", true))
            .await
            .unwrap();
        assert_eq!(pinned.len(), 2);

        let by_id = store
            .query("mem", &RecordQuery::new().filter("Id", 3))
            .await
            .unwrap();
        assert_eq!(by_id.len(), 1);
        assert_eq!(by_id[0]["userId"], json!(8));
    }

    #[tokio::test]
    async fn test_null_filter_matches_missing_field() {
        let (store, _dir) = test_store().await;
        store.create("t", &record(json!({"a": 1}))).await.unwrap();
        store.create("t", &record(json!({"a": 2, "b": "x"}))).await.unwrap();

        let rows = store
            .query("t", &RecordQuery::new().filter("b", Value::Null))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["a"], json!(1));
    }

    #[tokio::test]
    async fn test_sort_and_paging() {
        let (store, _dir) = test_store().await;
        for (i, ts) in ["2024-01-02", "2024-01-03", "2024-01-01"].iter().enumerate() {
            store
                .create("conv", &record(json!({"n": i, "timestamp": ts})))
                .await
                .unwrap();
        }

        let desc = store
            .query(
                "conv",
                &RecordQuery::new().sort("timestamp", SortOrder::Desc).limit(2),
            )
            .await
            .unwrap();
        let order: Vec<&Value> = desc.iter().map(|r| &r["timestamp"]).collect();
        assert_eq!(order, vec![&json!("2024-01-03"), &json!("2024-01-02")]);

        let page = store
            .query("conv", &RecordQuery::new().limit(2).offset(2))
            .await
            .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0]["n"], json!(2));

        let offset_only = store
            .query("conv", &RecordQuery::new().offset(1))
            .await
            .unwrap();
        assert_eq!(offset_only.len(), 2);
    }

    #[tokio::test]
    async fn test_nested_filter_value_rejected() {
        let (store, _dir) = test_store().await;
        let err = store
            .query("t", &RecordQuery::new().filter("a", json!([1, 2])))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Query(_)));
    }

    #[tokio::test]
    async fn test_empty_table_name_rejected() {
        let (store, _dir) = test_store().await;
        assert!(store.create("", &Record::new()).await.is_err());
        assert!(store.query(" ", &RecordQuery::new()).await.is_err());
    }
}
