//! # Request Adapters
//!
//! Adapters turn an inbound [`WebhookRequest`] into a [`CanonicalPayload`].
//! A fresh adapter is created for every request, fed the request through
//! [`RequestAdapter::unmarshal_request`], and then asked for the payload.
//!
//! Two adapters exist:
//! - [`RawAdapter`] expects a JSON body already shaped like the canonical payload
//! - [`NtfyAdapter`] accepts ntfy style publishes from headers, query parameters
//!   or a JSON body

use crate::messages::CanonicalPayload;
use crate::webhook::WebhookRequest;
use crate::ErrorCategory;
use serde::{Deserialize, Serialize};
use std::fmt;

mod capture;
mod ntfy;
mod raw;

pub use capture::{capture_body, capture_headers, capture_query, REDACTED};
pub use ntfy::{NtfyAdapter, NtfyMessage};
pub use raw::RawAdapter;

// ============================================================================
// Adapter Contract
// ============================================================================

/// Normalizes one inbound request into a canonical payload
pub trait RequestAdapter: Send {
    /// Read the request into adapter-local state
    fn unmarshal_request(&mut self, request: &WebhookRequest) -> Result<(), AdapterError>;

    /// The canonical payload for the last unmarshalled request
    fn to_canonical_payload(&self) -> CanonicalPayload;

    /// Recoverable problems found while unmarshalling, in the order they occurred
    fn warnings(&self) -> &[AdapterWarning];
}

/// Available request adapters, as named in feed configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdapterKind {
    Raw,
    Ntfy,
}

impl AdapterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Ntfy => "ntfy",
        }
    }

    /// Create a new adapter instance for a single request
    pub fn create(&self) -> Box<dyn RequestAdapter> {
        match self {
            Self::Raw => Box::new(RawAdapter::new()),
            Self::Ntfy => Box::new(NtfyAdapter::new()),
        }
    }
}

impl fmt::Display for AdapterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build a payload that only captures the request, without interpreting it.
///
/// Used for feeds that have adapters disabled.
pub fn capture_request(request: &WebhookRequest) -> CanonicalPayload {
    CanonicalPayload::captured(
        request.routing_key.clone(),
        capture_body(&request.body),
        capture_headers(&request.headers),
        capture_query(&request.query),
        request.received_at,
    )
}

/// Split a comma separated list, trimming entries and dropping empty ones
pub fn split_and_trim(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

// ============================================================================
// Diagnostics
// ============================================================================

/// A recoverable parsing problem; the field fell back to its default
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterWarning {
    pub field: &'static str,
    pub message: String,
}

impl AdapterWarning {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for AdapterWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Errors that abort normalization of a request
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("{adapter} adapter requires a JSON body: {message}")]
    InvalidJson {
        adapter: AdapterKind,
        message: String,
    },

    #[error("{adapter} adapter rejected the payload: {message}")]
    InvalidPayload {
        adapter: AdapterKind,
        message: String,
    },
}

impl AdapterError {
    /// Adapter errors depend only on the request, so retrying never helps
    pub fn is_transient(&self) -> bool {
        false
    }

    pub fn error_category(&self) -> ErrorCategory {
        ErrorCategory::Permanent
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
