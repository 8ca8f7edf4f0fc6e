//! End-to-end ingestion scenarios through the HTTP router
//!
//! Each test builds the router from a feed file and script directory on
//! disk and checks what ends up in the store.

mod common;

use axum::body::Body;
use axum::http::StatusCode;
use common::{post_json, request, TestHarness};
use hookfeed_api::StorageBackend;
use hookfeed_core::MessageId;
use serde_json::json;

fn message_id(body: &serde_json::Value) -> MessageId {
    body["messageId"].as_str().unwrap().parse().unwrap()
}

/// Scenario A: a JSON body on the generic route becomes a new message.
#[tokio::test]
async fn test_generic_route_stores_json_body() {
    let harness = TestHarness::new().await;

    let response = harness.send(post_json("/hooks/f1", r#"{"a":1}"#)).await;

    assert_eq!(response.status, StatusCode::ACCEPTED);
    assert_eq!(response.body["success"], true);
    assert_eq!(response.body["feedId"], "f1");

    let stored = tokio_test::assert_ok!(harness.store.get(message_id(&response.body)).await);
    assert_eq!(stored.feed_id, "f1");
    assert_eq!(stored.raw_request.as_str(), r#"{"a":1}"#);
    assert_eq!(stored.state.as_str(), "new");
    assert_eq!(stored.priority.value(), 3);
}

/// Scenario B: an ntfy publish carried entirely in the query string.
#[tokio::test]
async fn test_ntfy_query_publish() {
    let harness = TestHarness::new().await;

    let response = harness
        .send(
            request("POST", "/f1?title=Hi&priority=max")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["title"], "Hi");
    assert_eq!(response.body["priority"], 5);
    assert_eq!(response.body["rawQueryParams"], json!({"title": "Hi", "priority": "max"}));
}

/// Scenario C: an unknown routing key stores nothing on either route.
#[tokio::test]
async fn test_unknown_routing_key() {
    let harness = TestHarness::new().await;

    let generic = harness.send(post_json("/hooks/missing", "{}")).await;
    let ntfy = harness
        .send(request("PUT", "/missing").body(Body::from("hi")).unwrap())
        .await;

    assert_eq!(generic.status, StatusCode::NOT_FOUND);
    assert_eq!(ntfy.status, StatusCode::NOT_FOUND);
    assert_eq!(harness.stored_count().await, 0);
}

/// Scenario D: feed middleware uppercases the message after global middleware ran.
#[tokio::test]
async fn test_middleware_chain() {
    let harness = TestHarness::new().await;

    let response = harness
        .send(post_json(
            "/hooks/deploy-hook-7f3a",
            r#"{"title":"Deploy","message":"release 1.2 shipped","tags":["prod"]}"#,
        ))
        .await;

    assert_eq!(response.status, StatusCode::ACCEPTED);
    assert_eq!(response.body["feedId"], "deployments");

    let stored = harness.store.get(message_id(&response.body)).await.unwrap();
    assert_eq!(stored.message.as_deref(), Some("RELEASE 1.2 SHIPPED"));
    assert_eq!(stored.tags, vec!["prod".to_string(), "stamped".to_string()]);
    assert_eq!(
        stored.logs,
        vec![
            "middleware stamp.rhai applied".to_string(),
            "middleware uppercase.rhai applied".to_string(),
        ]
    );
}

/// Verify that a feed with adapters disabled keeps only the captured request.
#[tokio::test]
async fn test_captured_feed_keeps_raw_request() {
    let harness = TestHarness::new().await;

    let response = harness
        .send(
            request("POST", "/hooks/captured?source=ci")
                .header("content-type", "text/plain")
                .header("authorization", "Bearer abc123")
                .body(Body::from("plain text event"))
                .unwrap(),
        )
        .await;

    assert_eq!(response.status, StatusCode::ACCEPTED);
    let stored = harness.store.get(message_id(&response.body)).await.unwrap();
    assert_eq!(stored.title, None);
    assert_eq!(stored.message, None);
    assert_eq!(stored.raw_request.to_value(), json!({"$body": "plain text event"}));
    assert_eq!(stored.raw_query_params.to_value(), json!({"source": "ci"}));

    let headers = stored.raw_headers.to_value();
    assert_eq!(headers["authorization"], "Bearer <redacted>");
    assert!(!stored.raw_headers.as_str().contains("abc123"));
}

/// Verify that a transform failure on one request does not affect the next.
#[tokio::test]
async fn test_script_failure_is_isolated() {
    let harness = TestHarness::new().await;
    std::fs::write(
        harness.dir.path().join("middleware").join("uppercase.rhai"),
        "fn transform(input) { throw \"refusing\"; }",
    )
    .unwrap();

    let failed = harness.send(post_json("/hooks/deployments", r#"{"message":"x"}"#)).await;
    let ok = harness.send(post_json("/hooks/f1", r#"{"message":"x"}"#)).await;

    assert_eq!(failed.status, StatusCode::BAD_REQUEST);
    assert!(failed.body["error"]
        .as_str()
        .unwrap()
        .contains("uppercase.rhai"));
    assert_eq!(ok.status, StatusCode::ACCEPTED);
    assert_eq!(harness.stored_count().await, 1);
}

/// Verify that messages written to the filesystem store are readable through the API.
#[tokio::test]
async fn test_filesystem_backend_round_trip() {
    let harness = TestHarness::with_backend(StorageBackend::Filesystem).await;

    let response = harness
        .send(post_json("/hooks/f1", r#"{ "title": "on disk",  "n": 1 }"#))
        .await;
    assert_eq!(response.status, StatusCode::ACCEPTED);
    let id = response.body["messageId"].as_str().unwrap().to_string();

    let file = harness
        .dir
        .path()
        .join("data")
        .join("messages")
        .join(format!("{}.json", id));
    assert!(file.is_file());

    let fetched = harness
        .send(
            request("GET", &format!("/api/v1/feed-messages/{}", id))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(fetched.status, StatusCode::OK);
    assert_eq!(fetched.body["title"], "on disk");

    let stored = harness.store.get(id.parse().unwrap()).await.unwrap();
    assert_eq!(stored.raw_request.as_str(), r#"{ "title": "on disk",  "n": 1 }"#);
}
