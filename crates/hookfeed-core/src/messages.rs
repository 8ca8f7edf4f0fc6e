//! # Feed Messages
//!
//! The canonical payload produced by request adapters, the stored
//! [`FeedMessage`] record, the query types used for triage, and the
//! [`MessageStore`] contract implemented by the storage adapters.

use crate::{ErrorCategory, MessageId, MessageState, Priority, Timestamp, ValidationError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use serde_json::{json, Map, Value};
use std::fmt;

/// Default number of items returned by a query
pub const DEFAULT_PAGE_LIMIT: usize = 50;

/// Upper bound on the number of items returned by a query
pub const MAX_PAGE_LIMIT: usize = 500;

// ============================================================================
// Opaque JSON
// ============================================================================

/// A JSON document kept exactly as it was received.
///
/// Used for the captured request, headers and query parameters. The text is
/// stored verbatim, so a document supplied by a caller keeps its original
/// formatting through storage and back out of the API.
#[derive(Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawJson(Box<RawValue>);

impl RawJson {
    /// Parse a JSON document, keeping its text
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        RawValue::from_string(text.trim().to_owned()).map(Self)
    }

    /// Serialize a JSON value
    pub fn from_value(value: &Value) -> Self {
        match serde_json::value::to_raw_value(value) {
            Ok(raw) => Self(raw),
            Err(_) => Self(RawValue::NULL.to_owned()),
        }
    }

    /// An empty JSON object
    pub fn empty_object() -> Self {
        Self::from_value(&Value::Object(Map::new()))
    }

    /// The JSON text
    pub fn as_str(&self) -> &str {
        self.0.get()
    }

    /// Parse into a JSON value
    pub fn to_value(&self) -> Value {
        serde_json::from_str(self.0.get()).unwrap_or(Value::Null)
    }
}

impl Default for RawJson {
    fn default() -> Self {
        Self::empty_object()
    }
}

impl PartialEq for RawJson {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for RawJson {}

impl fmt::Debug for RawJson {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RawJson({})", self.as_str())
    }
}

impl fmt::Display for RawJson {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

// ============================================================================
// Canonical Payload
// ============================================================================

/// Adapter output: the fields needed to create a feed message.
///
/// Built fresh for every request and owned by the pipeline until it is handed
/// to the [`MessageStore`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalPayload {
    pub feed_id: String,
    pub raw_request: RawJson,
    pub raw_headers: RawJson,
    pub raw_query_params: RawJson,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub logs: Vec<String>,
    #[serde(default = "empty_object")]
    pub metadata: Value,
    pub received_at: Timestamp,
}

impl CanonicalPayload {
    /// Payload holding only the captured request
    pub fn captured(
        feed_id: impl Into<String>,
        raw_request: RawJson,
        raw_headers: RawJson,
        raw_query_params: RawJson,
        received_at: Timestamp,
    ) -> Self {
        Self {
            feed_id: feed_id.into(),
            raw_request,
            raw_headers,
            raw_query_params,
            title: None,
            message: None,
            priority: Priority::DEFAULT,
            tags: Vec::new(),
            logs: Vec::new(),
            metadata: empty_object(),
            received_at,
        }
    }

    /// JSON document handed to transform scripts
    pub fn to_json(&self) -> Value {
        json!({
            "feedId": self.feed_id,
            "rawRequest": self.raw_request.to_value(),
            "rawHeaders": self.raw_headers.to_value(),
            "rawQueryParams": self.raw_query_params.to_value(),
            "title": self.title,
            "message": self.message,
            "priority": self.priority.value(),
            "tags": self.tags,
            "logs": self.logs,
            "metadata": self.metadata,
            "receivedAt": self.received_at.to_rfc3339(),
        })
    }

    /// Apply a transformed document produced from [`CanonicalPayload::to_json`].
    ///
    /// Keys missing from the document keep their current value. `feedId` and
    /// `receivedAt` are owned by the pipeline and ignored. Raw documents whose
    /// content is unchanged keep their original text.
    pub fn apply_json(&mut self, document: Value) -> Result<(), ValidationError> {
        let Value::Object(mut fields) = document else {
            return Err(ValidationError::InvalidFormat {
                field: "output".to_string(),
                message: format!("expected an object, got {}", json_type_name(&document)),
            });
        };

        if let Some(value) = fields.remove("title") {
            self.title = optional_text("title", value)?;
        }
        if let Some(value) = fields.remove("message") {
            self.message = optional_text("message", value)?;
        }
        if let Some(value) = fields.remove("priority") {
            self.priority = match value {
                Value::Null => Priority::DEFAULT,
                other => serde_json::from_value(other).map_err(|e| {
                    ValidationError::InvalidFormat {
                        field: "priority".to_string(),
                        message: e.to_string(),
                    }
                })?,
            };
        }
        if let Some(value) = fields.remove("tags") {
            self.tags = text_list("tags", value)?;
        }
        if let Some(value) = fields.remove("logs") {
            self.logs = text_list("logs", value)?;
        }
        if let Some(value) = fields.remove("metadata") {
            self.metadata = match value {
                Value::Null => empty_object(),
                other => other,
            };
        }

        replace_raw(&mut self.raw_request, fields.remove("rawRequest"));
        replace_raw(&mut self.raw_headers, fields.remove("rawHeaders"));
        replace_raw(&mut self.raw_query_params, fields.remove("rawQueryParams"));

        Ok(())
    }
}

fn replace_raw(current: &mut RawJson, value: Option<Value>) {
    if let Some(value) = value {
        if current.to_value() != value {
            *current = RawJson::from_value(&value);
        }
    }
}

fn optional_text(field: &str, value: Value) -> Result<Option<String>, ValidationError> {
    match value {
        Value::Null => Ok(None),
        Value::String(text) if text.is_empty() => Ok(None),
        Value::String(text) => Ok(Some(text)),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::Bool(b) => Ok(Some(b.to_string())),
        other => Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            message: format!("expected a string, got {}", json_type_name(&other)),
        }),
    }
}

fn text_list(field: &str, value: Value) -> Result<Vec<String>, ValidationError> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::String(text) => Ok(text),
                other => Err(ValidationError::InvalidFormat {
                    field: field.to_string(),
                    message: format!(
                        "expected a list of strings, found {}",
                        json_type_name(&other)
                    ),
                }),
            })
            .collect(),
        other => Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            message: format!("expected a list of strings, got {}", json_type_name(&other)),
        }),
    }
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ============================================================================
// Stored Message
// ============================================================================

/// A normalized webhook event as persisted by a [`MessageStore`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedMessage {
    pub id: MessageId,
    pub feed_id: String,
    pub raw_request: RawJson,
    pub raw_headers: RawJson,
    pub raw_query_params: RawJson,
    pub title: Option<String>,
    pub message: Option<String>,
    pub priority: Priority,
    pub tags: Vec<String>,
    pub logs: Vec<String>,
    pub metadata: Value,
    pub state: MessageState,
    pub received_at: Timestamp,
    pub processed_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl FeedMessage {
    /// Create a new message in the `new` state from a canonical payload
    pub fn from_payload(payload: CanonicalPayload) -> Self {
        let now = Timestamp::now();
        Self {
            id: MessageId::new(),
            feed_id: payload.feed_id,
            raw_request: payload.raw_request,
            raw_headers: payload.raw_headers,
            raw_query_params: payload.raw_query_params,
            title: payload.title,
            message: payload.message,
            priority: payload.priority,
            tags: payload.tags,
            logs: payload.logs,
            metadata: payload.metadata,
            state: MessageState::New,
            received_at: payload.received_at,
            processed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Move the message to a new triage state.
    ///
    /// The first move away from `new` also stamps `processed_at`.
    pub fn transition_to(&mut self, state: MessageState, at: Timestamp) {
        if self.processed_at.is_none() && state != MessageState::New {
            self.processed_at = Some(at);
        }
        self.state = state;
        self.updated_at = at;
    }
}

// ============================================================================
// Queries
// ============================================================================

/// Criteria for listing and searching messages. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageFilter {
    pub feed_id: Option<String>,
    pub priority: Option<Priority>,
    pub state: Option<MessageState>,
    /// Inclusive lower bound on `received_at`
    pub since: Option<Timestamp>,
    /// Inclusive upper bound on `received_at`
    pub until: Option<Timestamp>,
    /// Case-insensitive free text matched against title, message, tags and the raw request
    pub text: Option<String>,
}

impl MessageFilter {
    /// Filter scoped to a single feed
    pub fn for_feed(feed_id: impl Into<String>) -> Self {
        Self {
            feed_id: Some(feed_id.into()),
            ..Default::default()
        }
    }

    pub fn matches(&self, message: &FeedMessage) -> bool {
        if let Some(ref feed_id) = self.feed_id {
            if &message.feed_id != feed_id {
                return false;
            }
        }
        if self.priority.is_some_and(|p| p != message.priority) {
            return false;
        }
        if self.state.is_some_and(|s| s != message.state) {
            return false;
        }
        if self.since.is_some_and(|since| message.received_at < since) {
            return false;
        }
        if self.until.is_some_and(|until| message.received_at > until) {
            return false;
        }
        match self.text.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => matches_text(message, &text.to_lowercase()),
            _ => true,
        }
    }
}

fn matches_text(message: &FeedMessage, needle: &str) -> bool {
    let contains = |haystack: &str| haystack.to_lowercase().contains(needle);

    message.title.as_deref().is_some_and(contains)
        || message.message.as_deref().is_some_and(contains)
        || message.tags.iter().any(|t| contains(t))
        || contains(message.raw_request.as_str())
}

/// Offset pagination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub skip: usize,
    pub limit: usize,
}

impl Pagination {
    /// Create pagination, bounding the limit to `1..=MAX_PAGE_LIMIT`
    pub fn new(skip: usize, limit: usize) -> Self {
        Self {
            skip,
            limit: limit.clamp(1, MAX_PAGE_LIMIT),
        }
    }

    /// A page covering everything, for internal bulk operations
    pub fn unbounded() -> Self {
        Self {
            skip: 0,
            limit: usize::MAX,
        }
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(0, DEFAULT_PAGE_LIMIT)
    }
}

/// One page of results plus the number of matches overall
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub total: usize,
    pub items: Vec<T>,
}

/// Sort matches newest first and cut out the requested page
pub(crate) fn paginate(mut matches: Vec<FeedMessage>, page: Pagination) -> Page<FeedMessage> {
    matches.sort_by(|a, b| {
        b.received_at
            .cmp(&a.received_at)
            .then_with(|| b.id.cmp(&a.id))
    });
    let total = matches.len();
    let items = matches.into_iter().skip(page.skip).take(page.limit).collect();
    Page { total, items }
}

/// Messages selected for a bulk delete
#[derive(Debug, Clone, PartialEq)]
pub enum DeleteSelector {
    /// Delete exactly these messages; unknown ids are skipped
    Ids(Vec<MessageId>),
    /// Delete every message matching the filter
    Filter(DeleteFilter),
}

/// Filter for bulk deletes. At least one criterion must be set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeleteFilter {
    pub feed_id: Option<String>,
    pub priority: Option<Priority>,
    /// Delete messages received strictly before this instant
    pub older_than: Option<Timestamp>,
}

impl DeleteFilter {
    pub fn is_empty(&self) -> bool {
        self.priority.is_none() && self.older_than.is_none()
    }

    pub fn matches(&self, message: &FeedMessage) -> bool {
        if let Some(ref feed_id) = self.feed_id {
            if &message.feed_id != feed_id {
                return false;
            }
        }
        if self.priority.is_some_and(|p| p != message.priority) {
            return false;
        }
        if self.older_than.is_some_and(|t| message.received_at >= t) {
            return false;
        }
        true
    }
}

impl DeleteSelector {
    /// Reject selectors that would match everything
    pub fn validate(&self) -> Result<(), StoreError> {
        match self {
            Self::Filter(filter) if filter.is_empty() => Err(StoreError::Validation {
                message: "bulk delete filter needs a priority or an age threshold".to_string(),
            }),
            _ => Ok(()),
        }
    }

    pub fn matches(&self, message: &FeedMessage) -> bool {
        match self {
            Self::Ids(ids) => ids.contains(&message.id),
            Self::Filter(filter) => filter.matches(message),
        }
    }
}

// ============================================================================
// Store Contract
// ============================================================================

/// Durable persistence and query surface for feed messages.
///
/// Each call is expected to be atomic: a failed call leaves no partial
/// message behind.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persist a new message in the `new` state
    async fn create(&self, payload: CanonicalPayload) -> Result<FeedMessage, StoreError>;

    async fn get(&self, id: MessageId) -> Result<FeedMessage, StoreError>;

    /// Matching messages, newest `received_at` first
    async fn query(
        &self,
        filter: &MessageFilter,
        page: Pagination,
    ) -> Result<Page<FeedMessage>, StoreError>;

    async fn update_state(
        &self,
        id: MessageId,
        state: MessageState,
    ) -> Result<FeedMessage, StoreError>;

    /// Update the state of every listed message. Returns the number updated.
    async fn bulk_update_state(
        &self,
        ids: &[MessageId],
        state: MessageState,
    ) -> Result<usize, StoreError>;

    async fn delete(&self, id: MessageId) -> Result<(), StoreError>;

    /// Delete the selected messages. Returns the number deleted.
    async fn bulk_delete(&self, selector: &DeleteSelector) -> Result<usize, StoreError>;
}

/// Errors reported by message stores
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Message not found: {id}")]
    NotFound { id: MessageId },

    #[error("Invalid store request: {message}")]
    Validation { message: String },

    #[error("Storage unavailable: {message}")]
    Unavailable { message: String },

    #[error("Storage operation failed: {message}")]
    OperationFailed { message: String },
}

impl StoreError {
    /// Check if error is transient and should be retried
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }

    /// Get error category for monitoring and alerting
    pub fn error_category(&self) -> ErrorCategory {
        if self.is_transient() {
            ErrorCategory::Transient
        } else {
            ErrorCategory::Permanent
        }
    }
}

#[cfg(test)]
#[path = "messages_tests.rs"]
mod tests;
