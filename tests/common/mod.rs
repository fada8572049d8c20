#![allow(dead_code)]

use std::time::Duration;

use meilisearch_mcp::{
    ClientOptions, ConnectionSettings, OperationRequest, OperationResult, PoolConfig, Router,
    ServerContext,
};
use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub fn context(uri: &str, api_key: Option<&str>) -> ServerContext {
    context_with(uri, api_key, ClientOptions::default())
}

pub fn context_with(uri: &str, api_key: Option<&str>, options: ClientOptions) -> ServerContext {
    let settings = ConnectionSettings::parse(uri, api_key).expect("valid test URL");
    ServerContext::new(settings, PoolConfig::default(), options)
}

pub fn short_timeouts() -> ClientOptions {
    ClientOptions {
        request_timeout: Duration::from_secs(2),
        health_check_timeout: Duration::from_secs(1),
        fanout_limit: 16,
    }
}

pub async fn call(ctx: &ServerContext, name: &str, args: Value) -> OperationResult {
    Router::new()
        .dispatch(ctx, OperationRequest::new(name, args))
        .await
}

pub async fn request_count(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .map(|requests| requests.len())
        .unwrap_or(0)
}

/// Mount `GET /indexes` listing `uids` in order.
pub async fn mount_index_listing(server: &MockServer, uids: &[&str]) {
    let results: Vec<Value> = uids
        .iter()
        .map(|uid| json!({ "uid": uid, "primaryKey": "id" }))
        .collect();
    Mock::given(method("GET"))
        .and(path("/indexes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": results,
            "offset": 0,
            "limit": 100,
            "total": uids.len(),
        })))
        .mount(server)
        .await;
}

pub fn search_hits(hits: Value) -> ResponseTemplate {
    let total = hits.as_array().map(Vec::len).unwrap_or(0);
    ResponseTemplate::new(200).set_body_json(json!({
        "hits": hits,
        "estimatedTotalHits": total,
        "processingTimeMs": 1,
        "query": "",
    }))
}
