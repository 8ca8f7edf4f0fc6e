//! Tests for the raw adapter

use super::*;
use crate::webhook::RequestValues;
use crate::Timestamp;
use bytes::Bytes;
use serde_json::json;

fn request(body: &str) -> WebhookRequest {
    WebhookRequest::new(
        "builds",
        RequestValues::headers()
            .with("Content-Type", "application/json")
            .with("X-Request-Id", "req-1"),
        RequestValues::query().with("env", "prod"),
        Bytes::from(body.to_string()),
    )
}

fn unmarshal(body: &str) -> RawAdapter {
    let mut adapter = RawAdapter::new();
    adapter.unmarshal_request(&request(body)).unwrap();
    adapter
}

mod raw_fields {
    use super::*;

    /// Verify that a caller supplied rawRequest is kept byte for byte.
    #[test]
    fn test_explicit_raw_request_preserved() {
        let adapter = unmarshal(
            r#"{"title": "Deploy", "rawRequest": {"b":   2, "a" :1}, "rawHeaders": {"x": "y"}}"#,
        );
        let payload = adapter.to_canonical_payload();

        assert_eq!(payload.raw_request.as_str(), r#"{"b":   2, "a" :1}"#);
        assert_eq!(payload.raw_headers.as_str(), r#"{"x": "y"}"#);
    }

    /// Verify that a missing rawRequest is synthesized from the body itself.
    #[test]
    fn test_synthesized_raw_request_equals_body() {
        let body = r#"{"title": "Deploy", "priority": 4}"#;
        let payload = unmarshal(body).to_canonical_payload();

        assert_eq!(payload.raw_request.as_str(), body);
        assert_eq!(
            payload.raw_headers.to_value(),
            json!({ "content-type": "application/json", "x-request-id": "req-1" })
        );
        assert_eq!(payload.raw_query_params.to_value(), json!({ "env": "prod" }));
    }
}

mod fields {
    use super::*;

    /// Verify that canonical fields are read from the body.
    #[test]
    fn test_canonical_fields() {
        let payload = unmarshal(
            r#"{
                "feedId": "somewhere-else",
                "title": "Build failed",
                "message": "main is red",
                "priority": "high",
                "tags": ["ci", "main"],
                "logs": ["queued"],
                "metadata": {"run": 42}
            }"#,
        )
        .to_canonical_payload();

        assert_eq!(payload.feed_id, "builds");
        assert_eq!(payload.title.as_deref(), Some("Build failed"));
        assert_eq!(payload.message.as_deref(), Some("main is red"));
        assert_eq!(payload.priority, Priority::HIGH);
        assert_eq!(payload.tags, vec!["ci", "main"]);
        assert_eq!(payload.logs, vec!["queued"]);
        assert_eq!(payload.metadata, json!({ "run": 42 }));
    }

    /// Verify defaults for an empty object body.
    #[test]
    fn test_defaults_for_empty_object() {
        let payload = unmarshal("{}").to_canonical_payload();

        assert_eq!(payload.title, None);
        assert_eq!(payload.priority, Priority::DEFAULT);
        assert!(payload.tags.is_empty());
        assert_eq!(payload.metadata, json!({}));
    }

    /// Verify that numeric priorities clamp and garbage falls back with a warning.
    #[test]
    fn test_priority_parsing() {
        assert_eq!(
            unmarshal(r#"{"priority": 9}"#).to_canonical_payload().priority,
            Priority::MAX
        );
        assert_eq!(
            unmarshal(r#"{"priority": 0}"#).to_canonical_payload().priority,
            Priority::MIN
        );

        let adapter = unmarshal(r#"{"priority": "whenever"}"#);
        assert_eq!(adapter.to_canonical_payload().priority, Priority::DEFAULT);
        assert_eq!(adapter.warnings().len(), 1);
        assert_eq!(adapter.warnings()[0].field, "priority");
    }

    /// Verify that the receive time comes from the request.
    #[test]
    fn test_received_at_from_request() {
        let at = Timestamp::from_rfc3339("2025-01-02T03:04:05Z").unwrap();
        let mut adapter = RawAdapter::new();
        adapter
            .unmarshal_request(&request("{}").with_received_at(at))
            .unwrap();
        assert_eq!(adapter.to_canonical_payload().received_at, at);
    }
}

mod errors {
    use super::*;

    /// Verify that bodies that are not JSON fail with an invalid JSON error.
    #[test]
    fn test_non_json_body_rejected() {
        let mut adapter = RawAdapter::new();
        let result = adapter.unmarshal_request(&request("hello world"));
        assert!(matches!(result, Err(AdapterError::InvalidJson { .. })));
    }

    /// Verify that JSON of the wrong shape fails with an invalid payload error.
    #[test]
    fn test_wrong_shape_rejected() {
        let mut adapter = RawAdapter::new();
        let result = adapter.unmarshal_request(&request(r#"{"tags": "not-a-list"}"#));
        assert!(matches!(result, Err(AdapterError::InvalidPayload { .. })));

        let result = adapter.unmarshal_request(&request(r#""just text""#));
        assert!(matches!(result, Err(AdapterError::InvalidPayload { .. })));
    }
}
