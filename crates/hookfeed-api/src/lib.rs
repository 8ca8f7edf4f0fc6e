//! # Hookfeed HTTP Service
//!
//! HTTP surface for the hookfeed webhook intake service.
//!
//! This service provides:
//! - Generic webhook ingress at `POST /hooks/{routingKey}`
//! - ntfy compatible publishing at `POST|PUT /{routingKey}`
//! - A message triage API under `/api/v1`
//! - Health, service information and Prometheus metrics endpoints

pub mod config;
pub mod errors;
pub mod metrics;
pub mod responses;
mod triage;

pub use config::{
    FeedsConfig, LoggingConfig, RetentionConfig, ServerConfig, ServiceConfig, StorageBackend,
    StorageConfig,
};
pub use errors::{ConfigError, MessageHandlerError, ServiceError, WebhookHandlerError};
pub use metrics::ServiceMetrics;

use axum::{
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{HeaderMap, StatusCode},
    middleware,
    response::{Json, Response},
    routing::{get, post},
    Router,
};
use bytes::Bytes;
use hookfeed_core::adapters::AdapterKind;
use hookfeed_core::feeds::FeedCache;
use hookfeed_core::messages::{FeedMessage, MessageFilter, MessageStore, Pagination};
use hookfeed_core::transform::TransformEngine;
use hookfeed_core::webhook::{
    AdapterSelection, RequestValues, WebhookRequest, WebhookResponse, WebhookService,
};
use hookfeed_core::Timestamp;
use responses::{HealthResponse, InfoResponse};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer,
};
use tracing::{error, info, instrument, warn};

/// Single-segment paths owned by the service. They cannot be used as ntfy
/// topics.
const RESERVED_ROUTING_KEYS: &[&str] = &["health", "metrics", "api", "hooks"];

// ============================================================================
// Application State
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Configuration for the service
    pub config: Arc<ServiceConfig>,

    /// Ingestion pipeline
    pub webhook_service: WebhookService,

    /// Read-only feed lookup
    pub feeds: Arc<FeedCache>,

    /// Message persistence
    pub store: Arc<dyn MessageStore>,

    /// Metrics collector for observability
    pub metrics: Arc<ServiceMetrics>,
}

impl AppState {
    /// Create new application state, wiring the ingestion pipeline from its parts
    pub fn new(
        config: ServiceConfig,
        feeds: Arc<FeedCache>,
        store: Arc<dyn MessageStore>,
        metrics: Arc<ServiceMetrics>,
    ) -> Self {
        let transforms = TransformEngine::new(config.transform.clone());
        let webhook_service =
            WebhookService::new(Arc::clone(&feeds), Arc::clone(&store), transforms);

        Self {
            config: Arc::new(config),
            webhook_service,
            feeds,
            store,
            metrics,
        }
    }
}

// ============================================================================
// HTTP Server
// ============================================================================

/// Create HTTP router with all endpoints
pub fn create_router(state: AppState) -> Router {
    let server = state.config.server.clone();

    let webhook_routes = Router::new()
        .route("/hooks/{routing_key}", post(handle_webhook))
        .route(
            "/{routing_key}",
            post(handle_ntfy_publish).put(handle_ntfy_publish),
        );

    let health_routes = Router::new()
        .route("/health", get(handle_health_check))
        .route("/api/v1/info", get(handle_info));

    let observability_routes = Router::new().route("/metrics", get(metrics_endpoint));

    let mut router = Router::new()
        .merge(webhook_routes)
        .merge(health_routes)
        .merge(triage::routes())
        .merge(observability_routes);

    if server.enable_compression {
        router = router.layer(CompressionLayer::new());
    }
    if server.enable_cors {
        router = router.layer(CorsLayer::permissive());
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(server.timeout()))
                .layer(middleware::from_fn(request_logging_middleware))
                .into_inner(),
        )
        .layer(DefaultBodyLimit::max(server.max_body_size))
        .with_state(state)
}

/// Serve the router until SIGINT or SIGTERM, then drain in-flight requests
pub async fn start_server(state: AppState) -> Result<(), ServiceError> {
    let server = state.config.server.clone();
    let app = create_router(state);

    let address = format!("{}:{}", server.host, server.port);
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .map_err(|e| ServiceError::BindFailed {
            address: address.clone(),
            message: e.to_string(),
        })?;

    info!(address = %address, "Starting HTTP server");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(server.shutdown_timeout_seconds))
        .await
        .map_err(|e| ServiceError::ServerFailed {
            message: e.to_string(),
        })?;

    info!("HTTP server shutdown complete");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM
pub async fn shutdown_signal(shutdown_timeout_seconds: u64) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!(timeout_seconds = shutdown_timeout_seconds, "Received SIGINT (Ctrl+C), initiating graceful shutdown");
        },
        _ = terminate => {
            info!(timeout_seconds = shutdown_timeout_seconds, "Received SIGTERM, initiating graceful shutdown");
        },
    }
}

// ============================================================================
// Webhook Handlers
// ============================================================================

fn build_request(
    routing_key: String,
    headers: &HeaderMap,
    query: Vec<(String, String)>,
    body: Bytes,
) -> WebhookRequest {
    let mut header_values = RequestValues::headers();
    for (name, value) in headers {
        header_values.append(
            name.as_str(),
            String::from_utf8_lossy(value.as_bytes()).into_owned(),
        );
    }

    let mut query_values = RequestValues::query();
    for (key, value) in query {
        query_values.append(&key, value);
    }

    WebhookRequest::new(routing_key, header_values, query_values, body)
}

/// Generic webhook ingress.
///
/// Uses the feed's configured adapter and answers `202 Accepted` with a
/// summary of the stored message.
#[instrument(skip(state, headers, query, body))]
pub async fn handle_webhook(
    State(state): State<AppState>,
    Path(routing_key): Path<String>,
    Query(query): Query<Vec<(String, String)>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<WebhookResponse>), WebhookHandlerError> {
    let started = std::time::Instant::now();
    let request = build_request(routing_key, &headers, query, body);

    let result = state
        .webhook_service
        .process_webhook(request, AdapterSelection::FeedDefault)
        .await;
    state
        .metrics
        .record_webhook("hooks", started.elapsed(), result.as_ref());

    let response = result?;
    Ok((StatusCode::ACCEPTED, Json(response)))
}

/// ntfy compatible publish.
///
/// Always uses the ntfy adapter and answers `200 OK` with the stored message.
#[instrument(skip(state, headers, query, body))]
pub async fn handle_ntfy_publish(
    State(state): State<AppState>,
    Path(routing_key): Path<String>,
    Query(query): Query<Vec<(String, String)>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<FeedMessage>, WebhookHandlerError> {
    if RESERVED_ROUTING_KEYS.contains(&routing_key.as_str()) {
        return Err(WebhookHandlerError::ReservedRoutingKey { routing_key });
    }

    let started = std::time::Instant::now();
    let request = build_request(routing_key, &headers, query, body);

    let result = state
        .webhook_service
        .ingest(request, AdapterSelection::Explicit(AdapterKind::Ntfy))
        .await;
    let summary = result.as_ref().map(WebhookResponse::from);
    state
        .metrics
        .record_webhook("ntfy", started.elapsed(), summary.as_ref().map_err(|e| *e));

    Ok(Json(result?))
}

// ============================================================================
// Health and Observability Handlers
// ============================================================================

/// Health check; unhealthy when the store cannot answer a query
#[instrument(skip(state))]
async fn handle_health_check(
    State(state): State<AppState>,
) -> (StatusCode, Json<HealthResponse>) {
    let probe = state
        .store
        .query(&MessageFilter::default(), Pagination::new(0, 1))
        .await;

    let (status, label) = match probe {
        Ok(_) => (StatusCode::OK, "healthy"),
        Err(e) => {
            warn!(error = %e, "Store health probe failed");
            (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
        }
    };

    (
        status,
        Json(HealthResponse {
            status: label.to_string(),
            timestamp: Timestamp::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

async fn handle_info(State(state): State<AppState>) -> Json<InfoResponse> {
    Json(InfoResponse {
        name: "hookfeed".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        feed_count: state.feeds.len(),
        storage: state.config.storage.backend.as_str().to_string(),
    })
}

/// Prometheus metrics endpoint
#[instrument(skip_all)]
async fn metrics_endpoint(State(state): State<AppState>) -> Result<String, StatusCode> {
    state.metrics.encode().map_err(|e| {
        error!(error = %e, "Failed to encode metrics");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

// ============================================================================
// Middleware
// ============================================================================

/// Tags each request with a request id, echoed in the `x-request-id` response
/// header, and logs completion at a level matching the status.
#[instrument(skip(request, next), fields(
    method = %request.method(),
    path = %request.uri().path(),
    request_id
))]
async fn request_logging_middleware(
    request: axum::extract::Request,
    next: axum::middleware::Next,
) -> Response {
    let start = std::time::Instant::now();

    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    tracing::Span::current().record("request_id", request_id.as_str());

    let mut response = next.run(request).await;
    let duration_ms = start.elapsed().as_millis();

    if let Ok(header_value) = request_id.parse() {
        response.headers_mut().insert("x-request-id", header_value);
    }

    let status = response.status();
    if status.is_server_error() {
        error!(status = %status, duration_ms = %duration_ms, "Request completed with server error");
    } else if status.is_client_error() {
        warn!(status = %status, duration_ms = %duration_ms, "Request completed with client error");
    } else {
        info!(status = %status, duration_ms = %duration_ms, "Request completed");
    }

    response
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
