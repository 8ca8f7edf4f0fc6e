//! # Hookfeed Core
//!
//! Core business logic for the hookfeed webhook intake service.
//!
//! This crate resolves inbound webhook requests to statically configured feeds,
//! normalizes each request into a canonical message through a request adapter,
//! optionally rewrites it through user supplied transform scripts, and hands the
//! result to a message store for later triage.
//!
//! ## Architecture
//!
//! - [`feeds`] loads the declarative feed configuration and builds the read-only
//!   [`feeds::FeedCache`] used for routing key resolution
//! - [`adapters`] turns raw HTTP request data into a [`messages::CanonicalPayload`]
//! - [`transform`] runs Rhai transform scripts over the canonical payload
//! - [`messages`] defines the stored message model and the [`messages::MessageStore`] trait
//! - [`storage`] contains the in-memory and filesystem message stores
//! - [`webhook`] orchestrates the full ingestion pipeline
//! - [`retention`] applies per-feed retention policies to stored messages
//!
//! ## Usage
//!
//! ```rust
//! use hookfeed_core::{MessageState, Priority};
//!
//! let priority: Priority = "high".parse().unwrap();
//! assert_eq!(priority.value(), 4);
//! assert_eq!(MessageState::default().as_str(), "new");
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub use uuid::Uuid;

/// Standard result type for hookfeed operations
pub type HookfeedResult<T> = Result<T, HookfeedError>;

// ============================================================================
// Domain Identifier Types
// ============================================================================

/// Unique identifier for a stored feed message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(Uuid);

impl MessageId {
    /// Generate a new random message identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MessageId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let uuid = Uuid::parse_str(s).map_err(|_| ParseError::InvalidFormat {
            expected: "UUID".to_string(),
            actual: s.to_string(),
        })?;
        Ok(Self(uuid))
    }
}

// ============================================================================
// Message Attributes
// ============================================================================

/// Message priority, always within `[1, 5]`
///
/// Named buckets follow the ntfy conventions: `min` (1), `low` (2),
/// `default` (3), `high` (4) and `max`/`urgent` (5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "PriorityRepr", into = "u8")]
pub struct Priority(u8);

impl Priority {
    pub const MIN: Priority = Priority(1);
    pub const LOW: Priority = Priority(2);
    pub const DEFAULT: Priority = Priority(3);
    pub const HIGH: Priority = Priority(4);
    pub const MAX: Priority = Priority(5);

    /// Create a priority, clamping the value into `[1, 5]`
    pub fn new(value: i64) -> Self {
        Self(value.clamp(1, 5) as u8)
    }

    /// Get the numeric priority
    pub fn value(&self) -> u8 {
        self.0
    }

    /// Parse a priority from its textual form.
    ///
    /// Accepts the named buckets (case-insensitive) and integers. Integers
    /// outside `[1, 5]` are clamped. An empty string yields the default.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let normalized = text.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "" | "default" => Ok(Self::DEFAULT),
            "min" => Ok(Self::MIN),
            "low" => Ok(Self::LOW),
            "high" => Ok(Self::HIGH),
            "max" | "urgent" => Ok(Self::MAX),
            digits => digits
                .parse::<i64>()
                .map(Self::new)
                .map_err(|_| ParseError::InvalidFormat {
                    expected: "priority name or number between 1 and 5".to_string(),
                    actual: text.to_string(),
                }),
        }
    }

    /// Parse a priority, falling back to the default for unrecognized input.
    ///
    /// The parse error is returned alongside the fallback so callers can log it.
    pub fn parse_lenient(text: &str) -> (Self, Option<ParseError>) {
        match Self::parse(text) {
            Ok(priority) => (priority, None),
            Err(e) => (Self::DEFAULT, Some(e)),
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl From<i64> for Priority {
    fn from(value: i64) -> Self {
        Self::new(value)
    }
}

impl From<Priority> for u8 {
    fn from(priority: Priority) -> Self {
        priority.0
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Priority {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Accepted wire encodings for a priority
#[derive(Deserialize)]
#[serde(untagged)]
enum PriorityRepr {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl From<PriorityRepr> for Priority {
    fn from(repr: PriorityRepr) -> Self {
        match repr {
            PriorityRepr::Integer(value) => Priority::new(value),
            PriorityRepr::Float(value) if value.is_finite() => Priority::new(value.round() as i64),
            PriorityRepr::Float(_) => Priority::DEFAULT,
            PriorityRepr::Text(text) => Priority::parse_lenient(&text).0,
        }
    }
}

/// Triage state of a stored message
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageState {
    #[default]
    New,
    Acknowledged,
    Resolved,
    Archived,
}

impl MessageState {
    /// Wire representation of the state
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Acknowledged => "acknowledged",
            Self::Resolved => "resolved",
            Self::Archived => "archived",
        }
    }
}

impl fmt::Display for MessageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageState {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(Self::New),
            "acknowledged" => Ok(Self::Acknowledged),
            "resolved" => Ok(Self::Resolved),
            "archived" => Ok(Self::Archived),
            _ => Err(ParseError::InvalidFormat {
                expected: "one of new, acknowledged, resolved, archived".to_string(),
                actual: s.to_string(),
            }),
        }
    }
}

// ============================================================================
// Time Types
// ============================================================================

/// UTC timestamp with microsecond precision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create timestamp for current moment
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Parse timestamp from RFC3339 string
    pub fn from_rfc3339(s: &str) -> Result<Self, ParseError> {
        let dt = DateTime::parse_from_rfc3339(s)
            .map_err(|_| ParseError::InvalidFormat {
                expected: "RFC3339 datetime".to_string(),
                actual: s.to_string(),
            })?
            .with_timezone(&Utc);
        Ok(Self(dt))
    }

    /// Convert to RFC3339 string
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339()
    }

    /// Get underlying DateTime
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Subtract duration from timestamp, saturating at the earliest representable time
    pub fn subtract_duration(&self, duration: Duration) -> Self {
        let earliest = Self(DateTime::<Utc>::MIN_UTC);
        match chrono::Duration::from_std(duration) {
            Ok(delta) => self
                .0
                .checked_sub_signed(delta)
                .map(Self)
                .unwrap_or(earliest),
            Err(_) => earliest,
        }
    }

    /// Timestamp the given number of whole days before this one, saturating
    /// at the earliest representable time
    pub fn days_before(&self, days: u32) -> Self {
        let earliest = Self(DateTime::<Utc>::MIN_UTC);
        chrono::Duration::try_days(i64::from(days))
            .and_then(|delta| self.0.checked_sub_signed(delta))
            .map(Self)
            .unwrap_or(earliest)
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(value: DateTime<Utc>) -> Self {
        Self(value)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// High-level error categorization for retry and alerting decisions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCategory {
    /// Temporary failures that should be retried
    Transient,
    /// Permanent failures that won't succeed on retry
    Permanent,
    /// Configuration errors preventing startup or processing
    Configuration,
}

/// Error type for input validation failures
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize, Deserialize)]
pub enum ValidationError {
    #[error("Field '{field}' is required")]
    Required { field: String },

    #[error("Field '{field}' has invalid format: {message}")]
    InvalidFormat { field: String, message: String },

    #[error("Field '{field}' exceeds maximum length of {max_length}")]
    TooLong { field: String, max_length: usize },
}

/// Error type for string parsing failures
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("Invalid format: expected {expected}, got '{actual}'")]
    InvalidFormat { expected: String, actual: String },
}

/// Top-level error type for hookfeed operations
#[derive(Debug, thiserror::Error)]
pub enum HookfeedError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl HookfeedError {
    /// Check if error is transient and should be retried
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Internal { .. } => true,
            Self::Validation(_) | Self::Parse(_) | Self::Configuration { .. } => false,
        }
    }

    /// Get error category for monitoring and alerting
    pub fn error_category(&self) -> ErrorCategory {
        match self {
            Self::Validation(_) | Self::Parse(_) => ErrorCategory::Permanent,
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::Internal { .. } => ErrorCategory::Transient,
        }
    }
}

// ============================================================================
// Module declarations
// ============================================================================

/// Request adapters normalizing inbound requests into canonical payloads
pub mod adapters;

/// Feed configuration model and the read-only feed cache
pub mod feeds;

/// Stored message model and message store contract
pub mod messages;

/// Retention policy enforcement
pub mod retention;

/// Message store implementations
pub mod storage;

/// Rhai transform scripts
pub mod transform;

/// Webhook ingestion pipeline
pub mod webhook;

pub use feeds::{Feed, FeedCache};
pub use messages::{CanonicalPayload, FeedMessage, MessageStore, RawJson, StoreError};
pub use webhook::{WebhookError, WebhookRequest, WebhookResponse, WebhookService};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
