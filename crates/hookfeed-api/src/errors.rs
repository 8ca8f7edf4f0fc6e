//! Error types for the HTTP service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use hookfeed_core::messages::StoreError;
use hookfeed_core::webhook::WebhookError;
use tracing::{error, warn};

/// Seconds a client should wait before retrying a transient failure
const RETRY_AFTER_SECONDS: u64 = 30;

/// Webhook ingress errors with HTTP status code mapping
///
/// - `404 Not Found`: no feed owns the routing key
/// - `400 Bad Request`: the adapter rejected the request, or a transform
///   script failed on this request's input
/// - `502 Bad Gateway`: a transform script could not be loaded or compiled
/// - `503 Service Unavailable`: the store is temporarily unavailable; carries
///   a `Retry-After` header
/// - `500 Internal Server Error`: any other store or server failure
#[derive(Debug, thiserror::Error)]
pub enum WebhookHandlerError {
    #[error("{0}")]
    Processing(#[from] WebhookError),

    /// The path segment names a route reserved by the service
    #[error("'{routing_key}' is reserved and cannot be used as a routing key")]
    ReservedRoutingKey { routing_key: String },

    #[error("Internal server error: {message}")]
    InternalError { message: String },
}

impl WebhookHandlerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Processing(WebhookError::FeedNotFound { .. }) => StatusCode::NOT_FOUND,
            Self::Processing(WebhookError::AdapterParse(_)) => StatusCode::BAD_REQUEST,
            Self::Processing(WebhookError::Script(e)) if e.is_load_failure() => {
                StatusCode::BAD_GATEWAY
            }
            Self::Processing(WebhookError::Script(_)) => StatusCode::BAD_REQUEST,
            Self::Processing(WebhookError::Store(e)) => store_status(e),
            Self::ReservedRoutingKey { .. } => StatusCode::NOT_FOUND,
            Self::InternalError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for WebhookHandlerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match self {
            Self::InternalError { ref message } => {
                error!(error = %message, "Internal server error occurred");
                "Internal server error occurred. Please try again later.".to_string()
            }
            Self::Processing(WebhookError::Store(ref e))
                if status == StatusCode::INTERNAL_SERVER_ERROR =>
            {
                error!(error = %e, "Store failure while ingesting webhook");
                "Failed to store message".to_string()
            }
            _ => {
                warn!(status = %status, error = %self, "Webhook rejected");
                self.to_string()
            }
        };

        error_response(status, message)
    }
}

/// Message triage API errors
#[derive(Debug, thiserror::Error)]
pub enum MessageHandlerError {
    #[error("Feed not found: {feed_id}")]
    FeedNotFound { feed_id: String },

    #[error("Invalid message id '{id}'")]
    InvalidMessageId { id: String },

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("{0}")]
    Store(#[from] StoreError),
}

impl MessageHandlerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::FeedNotFound { .. } => StatusCode::NOT_FOUND,
            Self::InvalidMessageId { .. } | Self::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
            Self::Store(e) => store_status(e),
        }
    }
}

impl IntoResponse for MessageHandlerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %self, "Message API failure");
            "Internal server error occurred. Please try again later.".to_string()
        } else {
            self.to_string()
        };

        error_response(status, message)
    }
}

fn store_status(error: &StoreError) -> StatusCode {
    match error {
        StoreError::NotFound { .. } => StatusCode::NOT_FOUND,
        StoreError::Validation { .. } => StatusCode::BAD_REQUEST,
        StoreError::Unavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        StoreError::OperationFailed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// JSON error body shared by all handlers, with `Retry-After` on 503
fn error_response(status: StatusCode, message: String) -> Response {
    let body = serde_json::json!({
        "error": message,
        "status": status.as_u16(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    let mut response = (status, Json(body)).into_response();

    if status == StatusCode::SERVICE_UNAVAILABLE {
        if let Ok(header_value) = RETRY_AFTER_SECONDS.to_string().parse() {
            response.headers_mut().insert("Retry-After", header_value);
        }
    }

    response
}

/// Service-level errors
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Failed to bind to address {address}: {message}")]
    BindFailed { address: String, message: String },

    #[error("Server failed: {message}")]
    ServerFailed { message: String },

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {}", errors.join("; "))]
    ValidationFailed { errors: Vec<String> },

    #[error("Failed to load configuration: {message}")]
    Load { message: String },
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;
