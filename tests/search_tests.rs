//! Single-index and fan-out search against a mocked engine.

mod common;

use std::time::{Duration, Instant};

use common::{call, context, context_with, mount_index_listing, request_count, search_hits};
use meilisearch_mcp::{ClientOptions, ErrorKind};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_search_across_single_listed_index() {
    let server = MockServer::start().await;
    mount_index_listing(&server, &["products"]).await;
    Mock::given(method("POST"))
        .and(path("/indexes/products/search"))
        .and(body_partial_json(json!({ "q": "shoe", "limit": 20, "offset": 0 })))
        .respond_with(search_hits(json!([{ "id": 1, "name": "Running shoe" }])))
        .expect(1)
        .mount(&server)
        .await;

    let ctx = context(&server.uri(), None);
    let result = call(&ctx, "search", json!({ "query": "shoe" })).await;

    assert!(result.is_success(), "{}", result.text());
    assert!(result.text().starts_with("Search results for 'shoe':"));
    let data = result.structured();
    assert_eq!(data["multiIndex"], true);
    let results = data["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["indexUid"], "products");
    assert_eq!(results[0]["hits"][0]["name"], "Running shoe");
}

#[tokio::test]
async fn test_search_in_named_index_returns_engine_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/indexes/movies/search"))
        .and(body_partial_json(json!({ "q": "alien", "filter": "year > 1970", "sort": ["year:asc"] })))
        .respond_with(search_hits(json!([{ "id": 7, "title": "Alien" }])))
        .expect(1)
        .mount(&server)
        .await;

    let ctx = context(&server.uri(), None);
    let result = call(
        &ctx,
        "search",
        json!({ "query": "alien", "indexUid": "movies", "filter": "year > 1970", "sort": ["year:asc"] }),
    )
    .await;

    assert!(result.is_success(), "{}", result.text());
    assert!(result.text().starts_with("Search results for 'alien' in index 'movies':"));
    assert_eq!(result.structured()["hits"][0]["title"], "Alien");
}

#[tokio::test]
async fn test_named_index_failure_is_typed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/indexes/ghost/search"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "message": "Index `ghost` not found.",
            "code": "index_not_found",
            "type": "invalid_request",
        })))
        .mount(&server)
        .await;

    let ctx = context(&server.uri(), None);
    let result = call(&ctx, "search", json!({ "query": "x", "indexUid": "ghost" })).await;
    assert_eq!(result.error_kind(), Some(ErrorKind::NotFound));
}

#[tokio::test]
async fn test_failing_index_is_isolated_and_order_kept() {
    let server = MockServer::start().await;
    mount_index_listing(&server, &["books", "movies", "songs"]).await;
    Mock::given(method("POST"))
        .and(path("/indexes/books/search"))
        .respond_with(search_hits(json!([{ "id": 1, "title": "Dune" }])).set_delay(Duration::from_millis(150)))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/indexes/movies/search"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "message": "internal failure",
            "code": "internal",
            "type": "internal",
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/indexes/songs/search"))
        .respond_with(search_hits(json!([{ "id": 9, "title": "Dune Suite" }])))
        .mount(&server)
        .await;

    let ctx = context(&server.uri(), None);
    let result = call(&ctx, "search", json!({ "query": "dune" })).await;

    assert!(result.is_success(), "{}", result.text());
    assert!(result.text().contains("1 of 3 indexes failed"));

    let data = result.structured();
    let results = data["results"].as_array().unwrap();
    let order: Vec<&str> = results.iter().map(|r| r["indexUid"].as_str().unwrap()).collect();
    assert_eq!(order, ["books", "movies", "songs"]);

    assert_eq!(results[0]["hits"][0]["title"], "Dune");
    assert!(results[0].get("error").is_none());
    assert!(results[1]["error"]["message"].as_str().unwrap().contains("internal failure"));
    assert_eq!(results[1]["hits"], json!([]));
    assert_eq!(results[2]["hits"][0]["title"], "Dune Suite");
    assert!(results[2].get("error").is_none());
}

#[tokio::test]
async fn test_fan_out_runs_concurrently() {
    let server = MockServer::start().await;
    let uids = ["alpha", "beta", "gamma", "delta"];
    mount_index_listing(&server, &uids).await;
    for uid in uids {
        Mock::given(method("POST"))
            .and(path(format!("/indexes/{}/search", uid)))
            .respond_with(search_hits(json!([{ "id": uid }])).set_delay(Duration::from_millis(400)))
            .mount(&server)
            .await;
    }

    let ctx = context(&server.uri(), None);
    let started = Instant::now();
    let result = call(&ctx, "search", json!({ "query": "anything" })).await;
    let elapsed = started.elapsed();

    assert!(result.is_success(), "{}", result.text());
    assert_eq!(result.structured()["results"].as_array().unwrap().len(), 4);
    assert!(elapsed >= Duration::from_millis(400));
    assert!(elapsed < Duration::from_millis(1200), "fan-out took {:?}", elapsed);
}

#[tokio::test]
async fn test_slow_index_times_out_alone() {
    let server = MockServer::start().await;
    mount_index_listing(&server, &["fast", "slow"]).await;
    Mock::given(method("POST"))
        .and(path("/indexes/fast/search"))
        .respond_with(search_hits(json!([{ "id": 1 }])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/indexes/slow/search"))
        .respond_with(search_hits(json!([])).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let options = ClientOptions {
        request_timeout: Duration::from_secs(1),
        ..ClientOptions::default()
    };
    let ctx = context_with(&server.uri(), None, options);
    let result = call(&ctx, "search", json!({ "query": "q" })).await;

    assert!(result.is_success(), "{}", result.text());
    let data = result.structured();
    let results = data["results"].as_array().unwrap();
    assert_eq!(results[0]["hits"][0]["id"], 1);
    assert_eq!(results[1]["error"]["kind"], "EngineUnavailable");
}

#[tokio::test]
async fn test_out_of_range_semantic_ratio_rejected_locally() {
    let server = MockServer::start().await;
    let ctx = context(&server.uri(), None);

    for ratio in [1.5, -0.1] {
        let result = call(
            &ctx,
            "search",
            json!({ "query": "shoe", "indexUid": "products", "hybrid": { "semanticRatio": ratio, "embedder": "default" } }),
        )
        .await;
        assert_eq!(result.error_kind(), Some(ErrorKind::InvalidArguments));
    }

    let no_embedder = call(
        &ctx,
        "search",
        json!({ "query": "shoe", "hybrid": { "semanticRatio": 0.5 } }),
    )
    .await;
    assert_eq!(no_embedder.error_kind(), Some(ErrorKind::InvalidArguments));

    assert_eq!(request_count(&server).await, 0);
}

#[tokio::test]
async fn test_hybrid_options_forwarded() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/indexes/products/search"))
        .and(body_partial_json(json!({
            "q": "shoe",
            "hybrid": { "semanticRatio": 0.5, "embedder": "default" },
        })))
        .respond_with(search_hits(json!([{ "id": 3 }])))
        .expect(1)
        .mount(&server)
        .await;

    let ctx = context(&server.uri(), None);
    let result = call(
        &ctx,
        "search",
        json!({ "query": "shoe", "indexUid": "products", "hybrid": { "semanticRatio": 0.5, "embedder": "default" } }),
    )
    .await;
    assert!(result.is_success(), "{}", result.text());
}
