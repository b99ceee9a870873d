//! NocoDB v2 REST record store.
//!
//! Tables are addressed by NocoDB table id:
//! `GET|POST {base}/api/v2/tables/{table}/records`, authenticated with the
//! `xc-token` header.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use wayfinder_core::records::fields::record_id;
use wayfinder_core::records::store::RecordStore;
use wayfinder_types::error::RepositoryError;
use wayfinder_types::record::{Record, RecordQuery, SortOrder};

#[derive(Deserialize)]
struct ListResponse {
    #[serde(default)]
    list: Vec<Record>,
}

/// Record store backed by a NocoDB instance.
///
/// Does NOT derive Debug: holds the API token.
pub struct NocoDbRecordStore {
    client: reqwest::Client,
    base_url: String,
    api_token: SecretString,
    timeout_secs: u64,
}

impl NocoDbRecordStore {
    pub fn new(
        base_url: &str,
        api_token: SecretString,
        timeout_secs: u64,
    ) -> Result<Self, RepositoryError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| RepositoryError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token,
            timeout_secs,
        })
    }

    fn records_url(&self, table: &str) -> String {
        format!("{}/api/v2/tables/{table}/records", self.base_url)
    }

    fn map_send_error(&self, e: reqwest::Error) -> RepositoryError {
        if e.is_timeout() {
            RepositoryError::Request(format!("request timed out after {}s", self.timeout_secs))
        } else if e.is_connect() {
            RepositoryError::Connection
        } else {
            RepositoryError::Request(e.to_string())
        }
    }
}

fn where_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Render equality filters as a NocoDB `where` expression.
///
/// `[("userId", 7), ("memoryType", "fact")]` becomes
/// `(userId,eq,7)~and(memoryType,eq,fact)`.
pub(crate) fn where_clause(filters: &[(String, Value)]) -> Option<String> {
    if filters.is_empty() {
        return None;
    }
    let parts: Vec<String> = filters
        .iter()
        .map(|(field, value)| match value {
            Value::Null => format!("({field},is,null)"),
            other => format!("({field},eq,{})", where_value(other)),
        })
        .collect();
    Some(parts.join("~and"))
}

/// Render a sort key: `-field` for descending.
pub(crate) fn sort_param(sort: &(String, SortOrder)) -> String {
    match sort.1 {
        SortOrder::Asc => sort.0.clone(),
        SortOrder::Desc => format!("-{}", sort.0),
    }
}

fn query_params(query: &RecordQuery) -> Vec<(&'static str, String)> {
    let mut params = Vec::new();
    if let Some(clause) = where_clause(&query.filters) {
        params.push(("where", clause));
    }
    if let Some(sort) = &query.sort {
        params.push(("sort", sort_param(sort)));
    }
    if let Some(limit) = query.limit {
        params.push(("limit", limit.to_string()));
    }
    if let Some(offset) = query.offset {
        params.push(("offset", offset.to_string()));
    }
    params
}

async fn error_for_status(response: reqwest::Response) -> Result<reqwest::Response, RepositoryError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(RepositoryError::NotFound);
    }
    let detail = response.text().await.unwrap_or_default();
    Err(RepositoryError::Request(format!("NocoDB returned {status}: {detail}")))
}

impl RecordStore for NocoDbRecordStore {
    fn name(&self) -> &str {
        "nocodb"
    }

    async fn create(&self, table: &str, record: &Record) -> Result<Option<i64>, RepositoryError> {
        let response = self
            .client
            .post(self.records_url(table))
            .header("xc-token", self.api_token.expose_secret())
            .json(record)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;
        let response = error_for_status(response).await?;

        let created: Record = response
            .json()
            .await
            .map_err(|e| RepositoryError::Query(format!("invalid create response: {e}")))?;
        let id = record_id(&created);
        debug!(table, id = ?id, "NocoDB record created");
        Ok(id)
    }

    async fn query(&self, table: &str, query: &RecordQuery) -> Result<Vec<Record>, RepositoryError> {
        let response = self
            .client
            .get(self.records_url(table))
            .header("xc-token", self.api_token.expose_secret())
            .query(&query_params(query))
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;
        let response = error_for_status(response).await?;

        let body: ListResponse = response
            .json()
            .await
            .map_err(|e| RepositoryError::Query(format!("invalid list response: {e}")))?;
        Ok(body.list)
    }
}
