//! Search routing: one index directly, or every index concurrently.

use std::sync::Arc;
use std::time::Duration;

use futures::{StreamExt, stream};
use serde::Serialize;
use serde_json::{Value, json};

use super::args::{ArgType, Arguments, FieldSpec};
use super::registry::{HandlerFuture, OperationPayload, OperationSpec};
use super::router::ErrorDescriptor;
use crate::client::{HybridOptions, IndexUid, MeilisearchClient, Pagination, SearchRequest};
use crate::context::ServerContext;
use crate::{Error, Result};

/// Where a search runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexTarget {
    Single(IndexUid),
    /// Every index the engine lists at call time.
    All,
}

/// One index's share of a fan-out search.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchOutcome {
    pub index_uid: String,
    pub hits: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_total_hits: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_time_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDescriptor>,
}

impl SearchOutcome {
    fn from_response(index_uid: String, response: Value) -> Self {
        let hits = match response.get("hits") {
            Some(Value::Array(hits)) => hits.clone(),
            _ => Vec::new(),
        };
        Self {
            index_uid,
            hits,
            estimated_total_hits: response
                .get("estimatedTotalHits")
                .or_else(|| response.get("totalHits"))
                .and_then(Value::as_u64),
            processing_time_ms: response.get("processingTimeMs").and_then(Value::as_u64),
            error: None,
        }
    }

    fn from_error(index_uid: String, err: &Error) -> Self {
        Self {
            index_uid,
            hits: Vec::new(),
            estimated_total_hits: None,
            processing_time_ms: None,
            error: Some(ErrorDescriptor::from(err)),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Debug, Clone)]
pub enum SearchResponse {
    /// The engine's response for a single index, unmodified.
    Index(Value),
    /// One outcome per listed index, in listing order.
    Aggregate(Vec<SearchOutcome>),
}

/// Runs a search against one index, or fans it out across all of them.
///
/// The fan-out runs at most `fanout_limit` searches at once and bounds each
/// one by the request timeout. A failing or slow index fills its own slot
/// with an error; the others are unaffected. Outcomes keep the engine's
/// listing order regardless of completion order.
pub struct SearchAggregator {
    client: Arc<MeilisearchClient>,
    fanout_limit: usize,
    per_index_timeout: Duration,
}

impl SearchAggregator {
    pub fn new(client: Arc<MeilisearchClient>) -> Self {
        let options = client.options().clone();
        Self {
            client,
            fanout_limit: options.fanout_limit.max(1),
            per_index_timeout: options.request_timeout,
        }
    }

    pub fn fanout_limit(mut self, limit: usize) -> Self {
        self.fanout_limit = limit.max(1);
        self
    }

    pub fn per_index_timeout(mut self, timeout: Duration) -> Self {
        self.per_index_timeout = timeout;
        self
    }

    pub async fn search(&self, target: IndexTarget, request: &SearchRequest) -> Result<SearchResponse> {
        match target {
            IndexTarget::Single(uid) => Ok(SearchResponse::Index(
                self.client.search(&uid, request).await?,
            )),
            IndexTarget::All => {
                let uids = self.client.index_uids().await?;
                Ok(SearchResponse::Aggregate(self.fan_out(uids, request).await))
            }
        }
    }

    async fn fan_out(&self, uids: Vec<String>, request: &SearchRequest) -> Vec<SearchOutcome> {
        tracing::debug!(
            indexes = uids.len(),
            width = self.fanout_limit,
            "Searching across all indexes"
        );
        let timeout = self.per_index_timeout;

        stream::iter(uids)
            .map(|uid| async move {
                let result = tokio::time::timeout(
                    timeout,
                    self.client.search_raw(&uid, request, timeout),
                )
                .await
                .unwrap_or_else(|_| Err(Error::Timeout(timeout)));

                match result {
                    Ok(response) => SearchOutcome::from_response(uid, response),
                    Err(e) => {
                        tracing::warn!(index = %uid, error = %e, "Index search failed");
                        SearchOutcome::from_error(uid, &e)
                    }
                }
            })
            .buffered(self.fanout_limit)
            .collect()
            .await
    }
}

pub(super) static OPERATIONS: &[OperationSpec] = &[OperationSpec {
    name: "search",
    category: "search",
    description: "Search through Meilisearch indices. If indexUid is not provided, it will search across all indices.",
    fields: &[
        FieldSpec::required("query", ArgType::String, "The search query string"),
        FieldSpec::optional(
            "indexUid",
            ArgType::String,
            "Index to search in; searches every index if omitted",
        ),
        FieldSpec::optional("limit", ArgType::Integer, "Maximum number of results to return (default: 20)"),
        FieldSpec::optional("offset", ArgType::Integer, "Number of results to skip (default: 0)"),
        FieldSpec::optional("filter", ArgType::String, "Filter expression, e.g. \"genre = horror\""),
        FieldSpec::optional("sort", ArgType::StringList, "Attributes to sort by, e.g. [\"price:asc\"]"),
        FieldSpec::optional(
            "hybrid",
            ArgType::Object,
            "Hybrid search options: {\"semanticRatio\": 0.0-1.0, \"embedder\": \"name\"}",
        ),
        FieldSpec::optional("vector", ArgType::NumberList, "Query vector for semantic search"),
    ],
    handler: search,
}];

/// Build the search request, rejecting bad hybrid options before any network call.
fn build_request(args: &Arguments) -> Result<(IndexTarget, SearchRequest)> {
    let query = args.require_str("query")?;
    let target = match args.str("indexUid") {
        Some(uid) => IndexTarget::Single(IndexUid::new(uid)?),
        None => IndexTarget::All,
    };

    let mut request =
        SearchRequest::new(query).pagination(Pagination::new(args.u64("offset"), args.u64("limit")));
    if let Some(filter) = args.str("filter") {
        request = request.filter(Value::String(filter.to_string()));
    }
    if let Some(sort) = args.strings("sort") {
        request = request.sort(sort);
    }
    if let Some(hybrid) = args.object("hybrid") {
        request = request.hybrid(HybridOptions::from_value(hybrid)?);
    }
    if let Some(vector) = args.f64s("vector") {
        request = request.vector(vector);
    }
    Ok((target, request))
}

fn search(ctx: &ServerContext, args: Arguments) -> HandlerFuture<'_> {
    Box::pin(async move {
        let (target, request) = build_request(&args)?;
        let client = ctx.engine_client().await?;
        let aggregator = SearchAggregator::new(client);

        match (target.clone(), aggregator.search(target, &request).await?) {
            (IndexTarget::Single(uid), SearchResponse::Index(response)) => Ok(OperationPayload::new(
                format!("Search results for '{}' in index '{}':", request.query(), uid),
                response,
            )),
            (_, SearchResponse::Aggregate(mut outcomes)) => {
                for outcome in &mut outcomes {
                    if let Some(err) = &mut outcome.error {
                        err.message = ctx.redact(&err.message).await;
                    }
                }
                let failed = outcomes.iter().filter(|o| o.is_error()).count();
                let summary = if failed > 0 {
                    format!(
                        "Search results for '{}' ({} of {} indexes failed):",
                        request.query(),
                        failed,
                        outcomes.len()
                    )
                } else {
                    format!("Search results for '{}':", request.query())
                };
                Ok(OperationPayload::new(
                    summary,
                    json!({
                        "multiIndex": true,
                        "query": request.query(),
                        "results": outcomes,
                    }),
                ))
            }
            (_, SearchResponse::Index(response)) => Ok(OperationPayload::new(
                format!("Search results for '{}':", request.query()),
                response,
            )),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    fn args(value: Value) -> Arguments {
        Arguments::validate(OPERATIONS[0].fields, value).unwrap()
    }

    #[test]
    fn test_build_request_single_index() {
        let (target, request) = build_request(&args(json!({
            "query": "shoe",
            "indexUid": "products",
            "limit": 3,
            "sort": ["price:asc"]
        })))
        .unwrap();
        assert_eq!(target, IndexTarget::Single(IndexUid::new("products").unwrap()));
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"q": "shoe", "limit": 3, "offset": 0, "sort": ["price:asc"]})
        );
    }

    #[test]
    fn test_build_request_rejects_out_of_range_ratio() {
        let err = build_request(&args(json!({
            "query": "shoe",
            "hybrid": {"semanticRatio": 1.5, "embedder": "default"}
        })))
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArguments);
    }

    #[test]
    fn test_build_request_hybrid_and_vector_coexist() {
        let (target, request) = build_request(&args(json!({
            "query": "shoe",
            "hybrid": {"semanticRatio": 0.5, "embedder": "default"},
            "vector": [0.25, 0.5]
        })))
        .unwrap();
        assert_eq!(target, IndexTarget::All);
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["hybrid"], json!({"semanticRatio": 0.5, "embedder": "default"}));
        assert_eq!(body["vector"], json!([0.25, 0.5]));
    }

    #[test]
    fn test_outcome_from_response() {
        let outcome = SearchOutcome::from_response(
            "products".into(),
            json!({"hits": [{"id": 1}], "estimatedTotalHits": 1, "processingTimeMs": 2, "query": "shoe"}),
        );
        assert_eq!(outcome.hits.len(), 1);
        assert_eq!(outcome.estimated_total_hits, Some(1));
        assert!(!outcome.is_error());

        let failed = SearchOutcome::from_error("b".into(), &Error::Timeout(Duration::from_secs(1)));
        let value = serde_json::to_value(&failed).unwrap();
        assert_eq!(value["indexUid"], "b");
        assert_eq!(value["error"]["kind"], "EngineUnavailable");
        assert_eq!(value["hits"], json!([]));
    }
}
