//! # Webhook Ingestion Module
//!
//! Entry point for inbound webhook requests. The HTTP layer converts each
//! request into a [`WebhookRequest`] and hands it to [`WebhookService`], which
//! runs the ingestion pipeline:
//!
//! 1. Resolve the routing key to a feed through the [`FeedCache`](crate::feeds::FeedCache)
//! 2. Normalize the request with the selected [`RequestAdapter`](crate::adapters::RequestAdapter)
//! 3. Run the feed's transform scripts in order
//! 4. Persist the result through the [`MessageStore`](crate::messages::MessageStore)
//!
//! Steps 1 to 3 are in-memory. Exactly one store write happens per
//! successful request and none on failure.

use crate::adapters::{AdapterError, AdapterKind};
use crate::messages::{FeedMessage, StoreError};
use crate::transform::TransformError;
use crate::{ErrorCategory, MessageId, Timestamp};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;

mod service;

pub use service::WebhookService;

// ============================================================================
// Request Types
// ============================================================================

/// Multi-valued request fields such as headers or query parameters.
///
/// Header maps compare keys case-insensitively and store them lowercased;
/// query maps keep keys exactly as received.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestValues {
    entries: BTreeMap<String, Vec<String>>,
    case_insensitive: bool,
}

impl RequestValues {
    /// Empty header map
    pub fn headers() -> Self {
        Self {
            entries: BTreeMap::new(),
            case_insensitive: true,
        }
    }

    /// Empty query parameter map
    pub fn query() -> Self {
        Self::default()
    }

    fn normalize<'k>(&self, key: &'k str) -> Cow<'k, str> {
        if self.case_insensitive {
            Cow::Owned(key.to_ascii_lowercase())
        } else {
            Cow::Borrowed(key)
        }
    }

    /// Add a value, keeping any earlier values for the same key
    pub fn append(&mut self, key: &str, value: impl Into<String>) {
        let key = self.normalize(key).into_owned();
        self.entries.entry(key).or_default().push(value.into());
    }

    /// Builder form of [`RequestValues::append`]
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.append(key, value);
        self
    }

    /// First non-blank value for the key
    pub fn get(&self, key: &str) -> Option<&str> {
        self.get_all(key)
            .iter()
            .map(String::as_str)
            .find(|value| !value.trim().is_empty())
    }

    /// All values for the key, in the order received
    pub fn get_all(&self, key: &str) -> &[String] {
        self.entries
            .get(self.normalize(key).as_ref())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// First non-blank value among several alias keys, tried in order
    pub fn first_of(&self, keys: &[&str]) -> Option<&str> {
        keys.iter().find_map(|key| self.get(key))
    }

    /// Entries in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(key, values)| (key.as_str(), values.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Inbound webhook request, independent of the HTTP framework
#[derive(Debug, Clone)]
pub struct WebhookRequest {
    /// Path segment used to resolve the feed
    pub routing_key: String,
    pub headers: RequestValues,
    pub query: RequestValues,
    pub body: Bytes,
    pub received_at: Timestamp,
}

impl WebhookRequest {
    /// Create a request received now
    pub fn new(
        routing_key: impl Into<String>,
        headers: RequestValues,
        query: RequestValues,
        body: Bytes,
    ) -> Self {
        Self {
            routing_key: routing_key.into(),
            headers,
            query,
            body,
            received_at: Timestamp::now(),
        }
    }

    /// Override the receive time
    pub fn with_received_at(mut self, received_at: Timestamp) -> Self {
        self.received_at = received_at;
        self
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("content-type")
    }

    /// Whether the declared content type is JSON (`application/json` or `*/*+json`)
    pub fn is_json(&self) -> bool {
        self.content_type()
            .and_then(|ct| ct.split(';').next())
            .map(|media| {
                let media = media.trim().to_ascii_lowercase();
                media == "application/json" || media.ends_with("+json")
            })
            .unwrap_or(false)
    }
}

/// Which adapter the pipeline should use for a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterSelection {
    /// Use the adapter configured on the resolved feed
    FeedDefault,
    /// Use this adapter regardless of feed configuration
    Explicit(AdapterKind),
}

// ============================================================================
// Response Types
// ============================================================================

/// Summary returned to the webhook caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookResponse {
    pub success: bool,
    pub message_id: MessageId,
    pub feed_id: String,
}

impl From<&FeedMessage> for WebhookResponse {
    fn from(message: &FeedMessage) -> Self {
        Self {
            success: true,
            message_id: message.id,
            feed_id: message.feed_id.clone(),
        }
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur during webhook ingestion
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("No feed configured for routing key '{routing_key}'")]
    FeedNotFound { routing_key: String },

    #[error("Failed to parse request: {0}")]
    AdapterParse(#[from] AdapterError),

    #[error("Transform failed: {0}")]
    Script(#[from] TransformError),

    #[error("Failed to store message: {0}")]
    Store(#[from] StoreError),
}

impl WebhookError {
    /// Check if error is transient and should be retried
    pub fn is_transient(&self) -> bool {
        match self {
            Self::FeedNotFound { .. } => false,
            Self::AdapterParse(e) => e.is_transient(),
            Self::Script(e) => e.is_transient(),
            Self::Store(e) => e.is_transient(),
        }
    }

    /// Get error category for monitoring and alerting
    pub fn error_category(&self) -> ErrorCategory {
        match self {
            Self::FeedNotFound { .. } => ErrorCategory::Permanent,
            Self::AdapterParse(e) => e.error_category(),
            Self::Script(e) => e.error_category(),
            Self::Store(e) => e.error_category(),
        }
    }

    /// Short label for metrics and logs
    pub fn reason(&self) -> &'static str {
        match self {
            Self::FeedNotFound { .. } => "feed_not_found",
            Self::AdapterParse(_) => "adapter_parse",
            Self::Script(_) => "script",
            Self::Store(_) => "store",
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
