//! Request bodies, query parameters and response types for the API.

use crate::errors::MessageHandlerError;
use hookfeed_core::adapters::AdapterKind;
use hookfeed_core::feeds::{Feed, RetentionPolicy};
use hookfeed_core::messages::{
    DeleteFilter, DeleteSelector, MessageFilter, Pagination, DEFAULT_PAGE_LIMIT,
};
use hookfeed_core::{MessageId, MessageState, Priority, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Response Types
// ============================================================================

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: Timestamp,
    pub version: String,
}

/// Service information
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoResponse {
    pub name: String,
    pub version: String,
    pub feed_count: usize,
    pub storage: String,
}

/// A feed as shown by the API. Routing keys act as shared secrets and are
/// never listed.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedSummary {
    pub id: String,
    pub name: String,
    pub category: String,
    pub description: String,
    pub middleware: Vec<String>,
    pub adapters_enabled: bool,
    pub adapters: Vec<AdapterKind>,
    pub retention: RetentionPolicy,
}

impl From<&Feed> for FeedSummary {
    fn from(feed: &Feed) -> Self {
        Self {
            id: feed.id.clone(),
            name: feed.name.clone(),
            category: feed.category.clone(),
            description: feed.description.clone(),
            middleware: feed.middleware.clone(),
            adapters_enabled: feed.adapters_enabled,
            adapters: feed.adapters.clone(),
            retention: feed.retention,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BulkStateResponse {
    pub updated: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BulkDeleteResponse {
    pub deleted: usize,
}

// ============================================================================
// Request Bodies
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct StateUpdateRequest {
    pub state: MessageState,
}

#[derive(Debug, Deserialize)]
pub struct BulkStateRequest {
    pub ids: Vec<MessageId>,
    pub state: MessageState,
}

/// Either an explicit id list or a filter.
///
/// Filter values are kept as received and checked strictly by
/// [`BulkDeleteRequest::filter_for`]: a value that does not name exactly one
/// priority or instant is rejected instead of falling back to a default.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkDeleteRequest {
    #[serde(default)]
    pub ids: Option<Vec<MessageId>>,
    #[serde(default)]
    pub priority: Option<Value>,
    #[serde(default)]
    pub older_than: Option<String>,
}

impl BulkDeleteRequest {
    /// Validate the filter fields into a selector scoped to `feed_id`
    pub fn filter_for(&self, feed_id: &str) -> Result<DeleteSelector, MessageHandlerError> {
        let priority = self.priority.as_ref().map(strict_priority).transpose()?;
        let older_than = parse_time("olderThan", self.older_than.as_deref().map(str::trim))?;

        Ok(DeleteSelector::Filter(DeleteFilter {
            feed_id: Some(feed_id.to_string()),
            priority,
            older_than,
        }))
    }
}

/// Accept only an integer in 1..=5, its decimal text, or a priority name
fn strict_priority(value: &Value) -> Result<Priority, MessageHandlerError> {
    let parsed = match value {
        Value::Number(n) => n
            .as_i64()
            .filter(|v| (1..=5).contains(v))
            .map(Priority::new),
        Value::String(text) => match text.trim() {
            "" => None,
            digits if digits.bytes().all(|b| b.is_ascii_digit()) => digits
                .parse::<i64>()
                .ok()
                .filter(|v| (1..=5).contains(v))
                .map(Priority::new),
            name if name.bytes().all(|b| b.is_ascii_alphabetic()) => Priority::parse(name).ok(),
            _ => None,
        },
        _ => None,
    };

    parsed.ok_or_else(|| MessageHandlerError::InvalidRequest {
        message: format!("priority: expected 1-5 or a priority name, got {}", value),
    })
}

// ============================================================================
// Query Parameters
// ============================================================================

/// Search and listing parameters. All values arrive as text and are checked
/// by [`MessageQueryParams::to_query`].
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageQueryParams {
    pub feed_id: Option<String>,
    pub priority: Option<String>,
    pub state: Option<String>,
    pub since: Option<String>,
    pub until: Option<String>,
    pub q: Option<String>,
    pub skip: Option<usize>,
    pub limit: Option<usize>,
}

impl MessageQueryParams {
    /// Validate the parameters into a store filter and page
    pub fn to_query(&self) -> Result<(MessageFilter, Pagination), MessageHandlerError> {
        let priority = non_blank(&self.priority)
            .map(|text| {
                Priority::parse(text).map_err(|e| MessageHandlerError::InvalidRequest {
                    message: format!("priority: {}", e),
                })
            })
            .transpose()?;

        let state = non_blank(&self.state)
            .map(|text| {
                text.parse::<MessageState>()
                    .map_err(|e| MessageHandlerError::InvalidRequest {
                        message: format!("state: {}", e),
                    })
            })
            .transpose()?;

        let since = parse_time("since", non_blank(&self.since))?;
        let until = parse_time("until", non_blank(&self.until))?;

        let filter = MessageFilter {
            feed_id: non_blank(&self.feed_id).map(str::to_string),
            priority,
            state,
            since,
            until,
            text: non_blank(&self.q).map(str::to_string),
        };
        let page = Pagination::new(
            self.skip.unwrap_or(0),
            self.limit.unwrap_or(DEFAULT_PAGE_LIMIT),
        );

        Ok((filter, page))
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn parse_time(
    field: &str,
    value: Option<&str>,
) -> Result<Option<Timestamp>, MessageHandlerError> {
    value
        .map(|text| {
            Timestamp::from_rfc3339(text).map_err(|e| MessageHandlerError::InvalidRequest {
                message: format!("{}: {}", field, e),
            })
        })
        .transpose()
}
