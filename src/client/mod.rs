//! Typed Meilisearch client over the shared connection pool.

pub mod chat;
mod error;
pub mod network;
mod transport;
pub mod types;

pub use chat::{ChatClient, ChatStream};
pub use network::{ConnectionPool, PoolConfig, PooledClient};
pub use types::{
    ChatMessage, CreateKeyRequest, HybridOptions, IndexUid, Pagination, SearchRequest, TaskFilter,
};

use std::sync::Arc;
use std::time::Duration;

use futures::{StreamExt, TryStreamExt, stream};
use reqwest::Method;
use secrecy::SecretString;
use serde_json::{Value, json};
use url::Url;

use transport::Transport;

use crate::{Error, Result};

const LIST_ALL_PAGE_SIZE: u64 = 100;

/// Per-call limits applied by the engine clients.
#[derive(Clone, Debug)]
pub struct ClientOptions {
    /// Bound on a single engine call, and on each index during a fan-out.
    pub request_timeout: Duration,
    pub health_check_timeout: Duration,
    /// Width of the concurrent fan-out.
    pub fanout_limit: usize,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(300),
            health_check_timeout: Duration::from_secs(5),
            fanout_limit: 16,
        }
    }
}

/// The engine client: one method per engine capability.
///
/// Results are the engine's JSON passed through unmodified, except for the
/// composite monitoring views. Every failure is a typed [`Error`].
#[derive(Debug)]
pub struct MeilisearchClient {
    transport: Transport,
    options: ClientOptions,
}

impl MeilisearchClient {
    pub fn new(
        base_url: Url,
        api_key: Option<SecretString>,
        pool: Arc<ConnectionPool>,
        options: ClientOptions,
    ) -> Self {
        let transport = Transport::new(base_url, api_key, pool, options.request_timeout);
        if !transport.has_api_key() {
            tracing::warn!("Engine client created without an API key; protected endpoints may fail");
        }
        Self { transport, options }
    }

    pub fn base_url(&self) -> &Url {
        self.transport.base_url()
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Stop this handle from starting new requests. In-flight requests finish.
    pub fn close(&self) {
        self.transport.close();
    }

    pub fn is_closed(&self) -> bool {
        self.transport.is_closed()
    }

    // Indexes

    pub async fn create_index(&self, uid: &IndexUid, primary_key: Option<&str>) -> Result<Value> {
        let mut body = json!({ "uid": uid });
        if let Some(pk) = primary_key {
            body["primaryKey"] = json!(pk);
        }
        self.transport.post("create_index", &["indexes"], &[], &body).await
    }

    pub async fn list_indexes(&self, page: Pagination) -> Result<Value> {
        self.transport
            .get("list_indexes", &["indexes"], &page.query_pairs())
            .await
    }

    /// Every index, in the engine's listing order.
    pub async fn list_all_indexes(&self) -> Result<Vec<Value>> {
        let mut all = Vec::new();
        let mut offset = 0;
        loop {
            let page = self
                .list_indexes(Pagination {
                    offset,
                    limit: LIST_ALL_PAGE_SIZE,
                })
                .await?;
            let results = match page.get("results") {
                Some(Value::Array(results)) => results.clone(),
                _ => return Err(unexpected("list_indexes", "missing 'results' array")),
            };
            let fetched = results.len() as u64;
            all.extend(results);
            offset += fetched;

            let total = page.get("total").and_then(Value::as_u64).unwrap_or(offset);
            if fetched == 0 || offset >= total {
                return Ok(all);
            }
        }
    }

    pub async fn index_uids(&self) -> Result<Vec<String>> {
        self.list_all_indexes()
            .await?
            .iter()
            .map(|index| {
                index
                    .get("uid")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .ok_or_else(|| unexpected("list_indexes", "index without 'uid'"))
            })
            .collect()
    }

    pub async fn delete_index(&self, uid: &IndexUid) -> Result<Value> {
        self.transport
            .delete("delete_index", &["indexes", uid.as_str()])
            .await
    }

    pub async fn index_stats(&self, uid: &IndexUid) -> Result<Value> {
        self.index_stats_raw(uid.as_str()).await
    }

    async fn index_stats_raw(&self, uid: &str) -> Result<Value> {
        self.transport
            .get("index_stats", &["indexes", uid, "stats"], &[])
            .await
    }

    // Documents

    pub async fn get_documents(
        &self,
        uid: &IndexUid,
        page: Pagination,
        fields: Option<&[String]>,
    ) -> Result<Value> {
        let mut body = json!({ "offset": page.offset, "limit": page.limit });
        if let Some(fields) = fields {
            body["fields"] = json!(fields);
        }
        self.transport
            .post("get_documents", &["indexes", uid.as_str(), "documents", "fetch"], &[], &body)
            .await
    }

    pub async fn add_documents(
        &self,
        uid: &IndexUid,
        documents: &[Value],
        primary_key: Option<&str>,
    ) -> Result<Value> {
        let query: Vec<(&'static str, String)> = primary_key
            .map(|pk| vec![("primaryKey", pk.to_string())])
            .unwrap_or_default();
        let body = Value::Array(documents.to_vec());
        self.transport
            .put("add_documents", &["indexes", uid.as_str(), "documents"], &query, &body)
            .await
    }

    // Search

    pub async fn search(&self, uid: &IndexUid, request: &SearchRequest) -> Result<Value> {
        self.search_raw(uid.as_str(), request, self.options.request_timeout)
            .await
    }

    /// Search an index by the uid the engine listed, bounded by `timeout`.
    pub(crate) async fn search_raw(
        &self,
        uid: &str,
        request: &SearchRequest,
        timeout: Duration,
    ) -> Result<Value> {
        let body = serde_json::to_value(request)?;
        self.transport
            .call("search", Method::POST, &["indexes", uid, "search"], &[], Some(&body), timeout)
            .await
    }

    // Settings

    pub async fn get_settings(&self, uid: &IndexUid) -> Result<Value> {
        self.transport
            .get("get_settings", &["indexes", uid.as_str(), "settings"], &[])
            .await
    }

    pub async fn update_settings(&self, uid: &IndexUid, settings: &Value) -> Result<Value> {
        if !settings.is_object() {
            return Err(Error::invalid_arguments("settings must be an object"));
        }
        self.transport
            .patch("update_settings", &["indexes", uid.as_str(), "settings"], settings)
            .await
    }

    // Tasks

    pub async fn get_task(&self, task_uid: u64) -> Result<Value> {
        let uid = task_uid.to_string();
        self.transport
            .get("get_task", &["tasks", uid.as_str()], &[])
            .await
    }

    pub async fn get_tasks(&self, filter: &TaskFilter) -> Result<Value> {
        self.transport
            .get("get_tasks", &["tasks"], &filter.query_pairs())
            .await
    }

    /// Cancel matching tasks. Refuses an unfiltered request, which would
    /// cancel every pending task.
    pub async fn cancel_tasks(&self, filter: &TaskFilter) -> Result<Value> {
        if filter.is_unfiltered() {
            return Err(Error::invalid_arguments(
                "cancel-tasks requires at least one of uids, indexUids, types, statuses",
            ));
        }
        self.transport
            .call(
                "cancel_tasks",
                Method::POST,
                &["tasks", "cancel"],
                &filter.query_pairs(),
                None,
                self.options.request_timeout,
            )
            .await
    }

    // Keys

    pub async fn get_keys(&self, page: Pagination) -> Result<Value> {
        self.transport
            .get("get_keys", &["keys"], &page.query_pairs())
            .await
    }

    pub async fn create_key(&self, request: &CreateKeyRequest) -> Result<Value> {
        let body = serde_json::to_value(request)?;
        self.transport.post("create_key", &["keys"], &[], &body).await
    }

    pub async fn delete_key(&self, key: &str) -> Result<Value> {
        let key = key.trim();
        if key.is_empty() {
            return Err(Error::invalid_arguments("key must not be empty"));
        }
        self.transport.delete("delete_key", &["keys", key]).await
    }

    // Monitoring

    /// `true` only when the engine answers `{"status": "available"}` within
    /// the health-check timeout. Never fails.
    pub async fn health(&self) -> bool {
        let result = self
            .transport
            .call(
                "health",
                Method::GET,
                &["health"],
                &[],
                None,
                self.options.health_check_timeout,
            )
            .await;
        match result {
            Ok(body) => body.get("status").and_then(Value::as_str) == Some("available"),
            Err(e) => {
                tracing::debug!(error = %e, "Health check failed");
                false
            }
        }
    }

    pub async fn version(&self) -> Result<Value> {
        self.transport.get("version", &["version"], &[]).await
    }

    pub async fn stats(&self) -> Result<Value> {
        self.transport.get("stats", &["stats"], &[]).await
    }

    /// Database size, last update and per-index document counts in one view.
    pub async fn health_status(&self) -> Result<Value> {
        let stats = self.stats().await?;
        let uids = self.index_uids().await?;

        let indexes_info: Vec<Value> = stream::iter(uids)
            .map(|uid| async move {
                let stats = self.index_stats_raw(&uid).await?;
                Ok::<_, Error>(json!({
                    "uid": uid,
                    "documentsCount": stats.get("numberOfDocuments").cloned().unwrap_or(Value::Null),
                    "isIndexing": stats.get("isIndexing").cloned().unwrap_or(Value::Bool(false)),
                }))
            })
            .buffered(self.options.fanout_limit.max(1))
            .try_collect()
            .await?;

        Ok(json!({
            "isHealthy": true,
            "databaseSize": stats.get("databaseSize").cloned().unwrap_or(Value::Null),
            "lastUpdate": normalize_timestamp(stats.get("lastUpdate")),
            "indexesCount": indexes_info.len(),
            "indexesInfo": indexes_info,
        }))
    }

    pub async fn index_metrics(&self, uid: &IndexUid) -> Result<Value> {
        let stats = self.index_stats(uid).await?;
        let documents = stats
            .get("numberOfDocuments")
            .cloned()
            .ok_or_else(|| unexpected("index_stats", "missing 'numberOfDocuments'"))?;

        let mut metrics = json!({
            "numberOfDocuments": documents,
            "fieldDistribution": stats.get("fieldDistribution").cloned().unwrap_or_else(|| json!({})),
            "isIndexing": stats.get("isIndexing").cloned().unwrap_or(Value::Bool(false)),
        });
        if let Some(size) = stats.get("rawDocumentDbSize").or_else(|| stats.get("indexSize")) {
            metrics["indexSize"] = size.clone();
        }
        Ok(metrics)
    }

    pub async fn system_info(&self) -> Result<Value> {
        let (version, stats) = futures::try_join!(self.version(), self.stats())?;
        Ok(json!({
            "version": version,
            "databaseSize": stats.get("databaseSize").cloned().unwrap_or(Value::Null),
            "lastUpdate": normalize_timestamp(stats.get("lastUpdate")),
            "indexes": stats.get("indexes").cloned().unwrap_or_else(|| json!({})),
        }))
    }
}

fn normalize_timestamp(value: Option<&Value>) -> Value {
    match value {
        Some(Value::String(raw)) => chrono::DateTime::parse_from_rfc3339(raw)
            .map(|ts| {
                Value::String(
                    ts.with_timezone(&chrono::Utc)
                        .to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
                )
            })
            .unwrap_or_else(|_| Value::String(raw.clone())),
        Some(other) => other.clone(),
        None => Value::Null,
    }
}

fn unexpected(op: &str, detail: &str) -> Error {
    Error::Unknown(format!("unexpected {} response: {}", op, detail))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_timestamp() {
        let ts = json!("2024-03-01T12:30:45.123456789+02:00");
        assert_eq!(
            normalize_timestamp(Some(&ts)),
            json!("2024-03-01T10:30:45Z")
        );
        assert_eq!(normalize_timestamp(Some(&json!("yesterday"))), json!("yesterday"));
        assert_eq!(normalize_timestamp(None), Value::Null);
        assert_eq!(normalize_timestamp(Some(&Value::Null)), Value::Null);
    }

    #[test]
    fn test_client_options_default() {
        let options = ClientOptions::default();
        assert_eq!(options.request_timeout, Duration::from_secs(300));
        assert_eq!(options.health_check_timeout, Duration::from_secs(5));
        assert_eq!(options.fanout_limit, 16);
    }
}
