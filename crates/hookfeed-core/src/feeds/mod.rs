//! # Feed Configuration Module
//!
//! Declarative feed definitions loaded once at startup. A feed file has a
//! global `middleware` list that runs for every feed, followed by the feed
//! definitions themselves:
//!
//! ```yaml
//! middleware:
//!   - stamp.rhai
//! feeds:
//!   - name: Deployments
//!     id: deployments
//!     keys: [deployments, deploy-hook-7f3a]
//!     category: ops
//!     middleware: [uppercase.rhai]
//!     adapters: [raw]
//!     retention:
//!       max_count: 500
//!       max_age_days: 30
//! ```
//!
//! Definitions are validated as a whole and then converted into [`Feed`]
//! values with every optional field filled in.

use crate::adapters::AdapterKind;
use crate::ErrorCategory;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

mod cache;

pub use cache::FeedCache;

/// Retention limit applied when a feed does not set one
pub const DEFAULT_RETENTION_LIMIT: u32 = 10_000;

/// Largest accepted `max_age_days` (about 10,000 years)
pub const MAX_RETENTION_AGE_DAYS: u32 = 3_650_000;

// ============================================================================
// Configuration Types
// ============================================================================

/// Contents of a feed configuration file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedFile {
    /// Transform scripts applied to every feed, before the feed's own scripts
    #[serde(default)]
    pub middleware: Vec<String>,

    /// Feed definitions in display order
    #[serde(default)]
    pub feeds: Vec<FeedDefinition>,
}

/// A single feed as written in the configuration file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedDefinition {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub category: String,

    #[serde(default)]
    pub id: String,

    /// Routing keys accepted in the URL path for this feed
    #[serde(default)]
    pub keys: Vec<String>,

    #[serde(default)]
    pub description: String,

    /// Transform scripts to run, in order
    #[serde(default)]
    pub middleware: Vec<String>,

    #[serde(default)]
    pub adapters_enabled: Option<bool>,

    #[serde(default)]
    pub adapters: Vec<AdapterKind>,

    #[serde(default)]
    pub retention: RetentionDefinition,
}

/// Retention limits as written in the configuration file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionDefinition {
    #[serde(default)]
    pub max_count: Option<u32>,

    #[serde(default)]
    pub max_age_days: Option<u32>,
}

impl FeedFile {
    /// Load and validate a feed configuration file.
    ///
    /// The format is chosen from the file extension: `.yaml`/`.yml` or `.json`.
    /// Any other extension is tried as JSON first and then as YAML.
    ///
    /// # Errors
    ///
    /// - `FeedConfigError::FileNotFound` - Configuration file missing
    /// - `FeedConfigError::ParseError` - Invalid YAML/JSON syntax or unknown adapter name
    /// - `FeedConfigError::ValidationError` - Structurally valid file describing an invalid feed set
    pub fn load_from_file(path: &Path) -> Result<Self, FeedConfigError> {
        if !path.exists() {
            return Err(FeedConfigError::FileNotFound {
                path: path.display().to_string(),
            });
        }

        let contents = std::fs::read_to_string(path).map_err(|e| FeedConfigError::ParseError {
            message: format!("Failed to read file: {}", e),
        })?;

        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let file: FeedFile = match extension.to_lowercase().as_str() {
            "yaml" | "yml" => {
                serde_yaml::from_str(&contents).map_err(|e| FeedConfigError::ParseError {
                    message: format!("Invalid YAML: {}", e),
                })?
            }
            "json" => serde_json::from_str(&contents).map_err(|e| FeedConfigError::ParseError {
                message: format!("Invalid JSON: {}", e),
            })?,
            _ => serde_json::from_str(&contents)
                .or_else(|_| serde_yaml::from_str(&contents))
                .map_err(|e| FeedConfigError::ParseError {
                    message: format!("Failed to parse as JSON or YAML: {}", e),
                })?,
        };

        file.validate()?;

        Ok(file)
    }

    /// Parse and validate a YAML feed configuration
    pub fn from_yaml_str(contents: &str) -> Result<Self, FeedConfigError> {
        let file: FeedFile =
            serde_yaml::from_str(contents).map_err(|e| FeedConfigError::ParseError {
                message: format!("Invalid YAML: {}", e),
            })?;
        file.validate()?;
        Ok(file)
    }

    /// Validate the feed set as a whole.
    ///
    /// Rejects an empty feed list, feeds without a name, id or routing keys,
    /// duplicate feed ids, routing keys claimed by more than one feed, blank
    /// middleware entries and `max_age_days` above [`MAX_RETENTION_AGE_DAYS`].
    /// All problems are reported together.
    pub fn validate(&self) -> Result<(), FeedConfigError> {
        let mut errors = Vec::new();

        if self.feeds.is_empty() {
            errors.push("No feeds configured".to_string());
        }

        if self.middleware.iter().any(|m| m.trim().is_empty()) {
            errors.push("Global middleware list contains an empty script name".to_string());
        }

        let mut seen_ids = HashSet::new();
        let mut key_owners: HashMap<&str, &str> = HashMap::new();

        for (index, feed) in self.feeds.iter().enumerate() {
            let label = feed.label(index);

            if feed.name.trim().is_empty() {
                errors.push(format!("{}: missing name", label));
            }

            if feed.id.trim().is_empty() {
                errors.push(format!("{}: missing id", label));
            } else if !seen_ids.insert(feed.id.as_str()) {
                errors.push(format!("Duplicate feed id: {}", feed.id));
            }

            if feed.keys.is_empty() {
                errors.push(format!("{}: must have at least one routing key", label));
            }

            for key in &feed.keys {
                if key.trim().is_empty() {
                    errors.push(format!("{}: routing keys must not be empty", label));
                    continue;
                }

                match key_owners.get(key.as_str()) {
                    Some(owner) if *owner != feed.id.as_str() => errors.push(format!(
                        "Routing key '{}' is used by both '{}' and '{}'",
                        key, owner, feed.id
                    )),
                    Some(_) => {}
                    None => {
                        key_owners.insert(key.as_str(), feed.id.as_str());
                    }
                }
            }

            if feed.middleware.iter().any(|m| m.trim().is_empty()) {
                errors.push(format!("{}: middleware contains an empty script name", label));
            }

            if let Some(days) = feed.retention.max_age_days {
                if days > MAX_RETENTION_AGE_DAYS {
                    errors.push(format!(
                        "{}: retention max_age_days {} exceeds the limit of {}",
                        label, days, MAX_RETENTION_AGE_DAYS
                    ));
                }
            }
        }

        if !errors.is_empty() {
            return Err(FeedConfigError::ValidationError { errors });
        }

        Ok(())
    }

    /// Convert every definition into a fully defaulted [`Feed`]
    pub fn to_feeds(&self) -> Vec<Feed> {
        self.feeds.iter().cloned().map(Feed::from).collect()
    }
}

impl FeedDefinition {
    fn label(&self, index: usize) -> String {
        if self.name.trim().is_empty() {
            format!("Feed #{}", index + 1)
        } else {
            format!("Feed '{}'", self.name)
        }
    }
}

// ============================================================================
// Resolved Feed
// ============================================================================

/// A configured feed with defaults applied
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feed {
    pub id: String,
    pub name: String,
    pub category: String,
    pub description: String,
    pub routing_keys: Vec<String>,
    pub middleware: Vec<String>,
    pub adapters_enabled: bool,
    pub adapters: Vec<AdapterKind>,
    pub retention: RetentionPolicy,
}

impl Feed {
    /// Adapter used by the generic webhook route.
    ///
    /// Returns `None` when adapters are disabled for the feed, in which case
    /// the request is stored as captured. Otherwise the first configured
    /// adapter is used, falling back to [`AdapterKind::Raw`].
    pub fn primary_adapter(&self) -> Option<AdapterKind> {
        if !self.adapters_enabled {
            return None;
        }
        Some(self.adapters.first().copied().unwrap_or(AdapterKind::Raw))
    }
}

impl From<FeedDefinition> for Feed {
    fn from(definition: FeedDefinition) -> Self {
        let mut routing_keys: Vec<String> = Vec::with_capacity(definition.keys.len());
        for key in definition.keys {
            if !routing_keys.contains(&key) {
                routing_keys.push(key);
            }
        }

        Self {
            id: definition.id,
            name: definition.name,
            category: definition.category,
            description: definition.description,
            routing_keys,
            middleware: definition.middleware,
            adapters_enabled: definition.adapters_enabled.unwrap_or(true),
            adapters: definition.adapters,
            retention: RetentionPolicy {
                max_count: definition
                    .retention
                    .max_count
                    .unwrap_or(DEFAULT_RETENTION_LIMIT),
                max_age_days: definition
                    .retention
                    .max_age_days
                    .unwrap_or(DEFAULT_RETENTION_LIMIT),
            },
        }
    }
}

/// Retention limits for the messages of one feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetentionPolicy {
    pub max_count: u32,
    pub max_age_days: u32,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            max_count: DEFAULT_RETENTION_LIMIT,
            max_age_days: DEFAULT_RETENTION_LIMIT,
        }
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur while loading feed configuration
#[derive(Debug, thiserror::Error)]
pub enum FeedConfigError {
    #[error("Feed configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("Failed to parse feed configuration: {message}")]
    ParseError { message: String },

    #[error("Feed configuration validation failed: {errors:?}")]
    ValidationError { errors: Vec<String> },
}

impl FeedConfigError {
    pub fn is_transient(&self) -> bool {
        false
    }

    pub fn error_category(&self) -> ErrorCategory {
        ErrorCategory::Configuration
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
