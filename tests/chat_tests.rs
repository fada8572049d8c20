mod common;

use common::{call, context, request_count};
use meilisearch_mcp::ErrorKind;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn sse(chunks: &[&str]) -> String {
    let mut body = String::new();
    for chunk in chunks {
        let event = json!({ "choices": [{ "delta": { "content": chunk } }] });
        body.push_str(&format!("data: {}\n\n", event));
    }
    body.push_str("data: [DONE]\n\n");
    body
}

#[tokio::test]
async fn test_streamed_completion_is_assembled() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chats/support/chat/completions"))
        .and(body_partial_json(json!({ "model": "gpt-3.5-turbo", "stream": true })))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(sse(&["Try the ", "trail ", "runners."])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let ctx = context(&server.uri(), Some("masterKey"));
    let result = call(
        &ctx,
        "create-chat-completion",
        json!({
            "workspace_uid": "support",
            "messages": [{ "role": "user", "content": "Which shoes for mud?" }],
        }),
    )
    .await;

    assert!(result.is_success(), "{}", result.text());
    assert_eq!(
        result.text().lines().take(2).collect::<Vec<_>>(),
        ["Chat completion response:", "Try the trail runners."]
    );
    assert_eq!(result.structured()["content"], "Try the trail runners.");
}

#[tokio::test]
async fn test_non_streamed_completion() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chats/support/chat/completions"))
        .and(body_partial_json(json!({ "model": "gpt-4o", "stream": false })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "role": "assistant", "content": "Hello." } }],
        })))
        .mount(&server)
        .await;

    let ctx = context(&server.uri(), None);
    let result = call(
        &ctx,
        "create-chat-completion",
        json!({
            "workspace_uid": "support",
            "model": "gpt-4o",
            "stream": false,
            "messages": [{ "role": "user", "content": "Hi" }],
        }),
    )
    .await;

    assert!(result.is_success(), "{}", result.text());
    assert_eq!(result.structured()["content"], "Hello.");
}

#[tokio::test]
async fn test_malformed_messages_rejected_locally() {
    let server = MockServer::start().await;
    let ctx = context(&server.uri(), None);

    let result = call(
        &ctx,
        "create-chat-completion",
        json!({ "workspace_uid": "support", "messages": [{ "role": "user" }] }),
    )
    .await;
    assert_eq!(result.error_kind(), Some(ErrorKind::InvalidArguments));

    let empty = call(
        &ctx,
        "create-chat-completion",
        json!({ "workspace_uid": "support", "messages": [] }),
    )
    .await;
    assert_eq!(empty.error_kind(), Some(ErrorKind::InvalidArguments));

    assert_eq!(request_count(&server).await, 0);
}

#[tokio::test]
async fn test_workspace_settings_update() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/chats/support/settings"))
        .and(body_partial_json(json!({ "source": "openAi" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "source": "openAi", "apiKey": "XXX..." })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/chats"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "results": [{ "uid": "support" }], "total": 1 })))
        .mount(&server)
        .await;

    let ctx = context(&server.uri(), None);

    let updated = call(
        &ctx,
        "update-chat-workspace-settings",
        json!({ "workspace_uid": "support", "settings": { "source": "openAi" } }),
    )
    .await;
    assert!(updated.is_success(), "{}", updated.text());

    let listed = call(&ctx, "get-chat-workspaces", json!({})).await;
    assert_eq!(listed.structured()["results"][0]["uid"], "support");
}
