//! Common test utilities for hookfeed integration tests
//!
//! Builds a full router from a feed file and script directory on disk, the
//! same way the service binary wires it.

use axum::{
    body::{to_bytes, Body},
    http::{header, HeaderMap, Request, StatusCode},
    Router,
};
use hookfeed_api::{create_router, AppState, ServiceConfig, ServiceMetrics, StorageBackend};
use hookfeed_core::feeds::{FeedCache, FeedFile};
use hookfeed_core::messages::MessageStore;
use hookfeed_core::storage::{FilesystemMessageStore, InMemoryMessageStore};
use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

pub const FEEDS_YAML: &str = r#"
middleware:
  - stamp.rhai
feeds:
  - name: Feed One
    id: f1
    category: general
    keys: [f1]
  - name: Deployments
    id: deployments
    keys: [deployments, deploy-hook-7f3a]
    middleware: [uppercase.rhai]
    adapters: [raw]
  - name: Captured
    id: captured
    keys: [captured]
    adapters_enabled: false
"#;

/// Tags every message so global middleware is observable
pub const STAMP_SCRIPT: &str = r#"
fn transform(input) {
    input.tags.push("stamped");
    input
}
"#;

pub const UPPERCASE_SCRIPT: &str = r#"
fn transform(input) {
    if input.message != () {
        input.message = input.message.to_upper();
    }
    input
}
"#;

#[allow(dead_code)]
pub struct TestHarness {
    pub router: Router,
    pub store: Arc<dyn MessageStore>,
    pub dir: TempDir,
}

impl TestHarness {
    /// Harness backed by the in-memory store
    pub async fn new() -> Self {
        Self::with_backend(StorageBackend::Memory).await
    }

    pub async fn with_backend(backend: StorageBackend) -> Self {
        let dir = TempDir::new().expect("temp dir");
        let scripts = dir.path().join("middleware");
        std::fs::create_dir_all(&scripts).expect("scripts dir");
        std::fs::write(scripts.join("stamp.rhai"), STAMP_SCRIPT).expect("stamp script");
        std::fs::write(scripts.join("uppercase.rhai"), UPPERCASE_SCRIPT).expect("upper script");

        let feeds_path = dir.path().join("feeds.yaml");
        std::fs::write(&feeds_path, FEEDS_YAML).expect("feed file");

        let mut config = ServiceConfig::default();
        config.feeds.path = feeds_path.clone();
        config.transform.scripts_dir = scripts;
        config.storage.backend = backend;
        config.storage.path = dir.path().join("data");

        let file = FeedFile::load_from_file(&feeds_path).expect("feeds should load");
        let feeds = Arc::new(FeedCache::from_file(&file));

        let store: Arc<dyn MessageStore> = match backend {
            StorageBackend::Memory => Arc::new(InMemoryMessageStore::new()),
            StorageBackend::Filesystem => Arc::new(
                FilesystemMessageStore::new(config.storage.path.clone())
                    .await
                    .expect("filesystem store"),
            ),
        };

        let metrics = ServiceMetrics::new().expect("metrics");
        let state = AppState::new(config, feeds, Arc::clone(&store), metrics);

        Self {
            router: create_router(state),
            store,
            dir,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router should respond");
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }

    /// Number of stored messages across all feeds
    pub async fn stored_count(&self) -> usize {
        self.store
            .query(
                &hookfeed_core::messages::MessageFilter::default(),
                hookfeed_core::messages::Pagination::default(),
            )
            .await
            .expect("query")
            .total
    }
}

#[allow(dead_code)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

pub fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[allow(dead_code)]
pub fn request(method: &str, uri: &str) -> axum::http::request::Builder {
    Request::builder().method(method).uri(uri)
}
