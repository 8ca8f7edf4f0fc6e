//! ntfy compatible publishing.
//!
//! Each field can be given in three places. Resolution walks the sources in
//! precedence order and takes the first non-empty value:
//!
//! | Field    | Headers                    | Query               | JSON body  |
//! |----------|----------------------------|---------------------|------------|
//! | title    | `X-Title`, `Title`         | `title`, `t`        | `title`    |
//! | message  | `X-Message`, `Message`     | `message`, `m`      | `message`  |
//! | priority | `X-Priority`, `Priority`   | `priority`, `p`     | `priority` |
//! | tags     | `X-Tags`, `Tags`           | `tags`, `ta`        | `tags`     |
//! | click    | `X-Click`, `Click`         | `click`             | `click`    |
//! | icon     | `X-Icon`, `Icon`           | `icon`              | `icon`     |
//! | markdown | `X-Markdown`, `Markdown`   | `markdown`, `md`    | `markdown` |
//! | actions  |                            |                     | `actions`  |
//!
//! The JSON body is only consulted when the request declares a JSON content
//! type. The topic always comes from the URL path.

use super::{
    capture_body, capture_headers, capture_query, split_and_trim, AdapterError, AdapterWarning,
    RequestAdapter,
};
use crate::messages::{json_type_name, CanonicalPayload, RawJson};
use crate::webhook::{RequestValues, WebhookRequest};
use crate::{Priority, Timestamp};
use serde::Serialize;
use serde_json::{Map, Value};

// ============================================================================
// Fields and Sources
// ============================================================================

/// A publishable ntfy field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Field {
    Title,
    Message,
    Priority,
    Tags,
    Click,
    Icon,
    Markdown,
    Actions,
}

impl Field {
    fn name(self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Message => "message",
            Self::Priority => "priority",
            Self::Tags => "tags",
            Self::Click => "click",
            Self::Icon => "icon",
            Self::Markdown => "markdown",
            Self::Actions => "actions",
        }
    }

    fn header_names(self) -> &'static [&'static str] {
        match self {
            Self::Title => &["x-title", "title"],
            Self::Message => &["x-message", "message"],
            Self::Priority => &["x-priority", "priority"],
            Self::Tags => &["x-tags", "tags"],
            Self::Click => &["x-click", "click"],
            Self::Icon => &["x-icon", "icon"],
            Self::Markdown => &["x-markdown", "markdown"],
            Self::Actions => &[],
        }
    }

    fn query_names(self) -> &'static [&'static str] {
        match self {
            Self::Title => &["title", "t"],
            Self::Message => &["message", "m"],
            Self::Priority => &["priority", "p"],
            Self::Tags => &["tags", "ta"],
            Self::Click => &["click"],
            Self::Icon => &["icon"],
            Self::Markdown => &["markdown", "md"],
            Self::Actions => &[],
        }
    }
}

/// One place a field value can come from
#[derive(Debug, Clone, Copy)]
pub(crate) enum Source<'a> {
    Headers(&'a RequestValues),
    Query(&'a RequestValues),
    Body(Option<&'a Map<String, Value>>),
}

impl Source<'_> {
    fn extract(&self, field: Field) -> Option<Value> {
        match self {
            Self::Headers(headers) => headers
                .first_of(field.header_names())
                .map(|v| Value::String(v.to_string())),
            Self::Query(query) => query
                .first_of(field.query_names())
                .map(|v| Value::String(v.to_string())),
            Self::Body(body) => body
                .and_then(|object| object.get(field.name()))
                .filter(|value| is_present(value))
                .cloned(),
        }
    }
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(text) => !text.trim().is_empty(),
        Value::Array(items) => !items.is_empty(),
        _ => true,
    }
}

/// First non-empty value for `field`, walking `sources` in order
pub(crate) fn resolve(sources: &[Source<'_>], field: Field) -> Option<Value> {
    sources.iter().find_map(|source| source.extract(field))
}

// ============================================================================
// Adapter
// ============================================================================

/// Fields of an ntfy publish after resolution
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NtfyMessage {
    pub topic: String,
    pub title: Option<String>,
    pub message: Option<String>,
    pub priority: Priority,
    pub tags: Vec<String>,
    pub click: Option<String>,
    pub icon: Option<String>,
    pub actions: Vec<Value>,
    pub markdown: bool,
}

impl NtfyMessage {
    /// Metadata object holding only the extras that were actually set
    pub fn metadata(&self) -> Value {
        let mut metadata = Map::new();
        if !self.tags.is_empty() {
            metadata.insert("tags".to_string(), Value::from(self.tags.clone()));
        }
        if let Some(ref click) = self.click {
            metadata.insert("click".to_string(), Value::String(click.clone()));
        }
        if let Some(ref icon) = self.icon {
            metadata.insert("icon".to_string(), Value::String(icon.clone()));
        }
        if !self.actions.is_empty() {
            metadata.insert("actions".to_string(), Value::Array(self.actions.clone()));
        }
        if self.markdown {
            metadata.insert("markdown".to_string(), Value::Bool(true));
        }
        Value::Object(metadata)
    }
}

/// Adapter for ntfy style publishes
#[derive(Debug)]
pub struct NtfyAdapter {
    message: NtfyMessage,
    raw_request: RawJson,
    raw_headers: RawJson,
    raw_query_params: RawJson,
    received_at: Timestamp,
    warnings: Vec<AdapterWarning>,
}

impl NtfyAdapter {
    pub fn new() -> Self {
        Self {
            message: NtfyMessage::default(),
            raw_request: RawJson::empty_object(),
            raw_headers: RawJson::empty_object(),
            raw_query_params: RawJson::empty_object(),
            received_at: Timestamp::now(),
            warnings: Vec::new(),
        }
    }

    /// The resolved ntfy fields
    pub fn message(&self) -> &NtfyMessage {
        &self.message
    }

    fn json_body(&mut self, request: &WebhookRequest) -> Option<Map<String, Value>> {
        if !request.is_json() || request.body.iter().all(u8::is_ascii_whitespace) {
            return None;
        }

        match serde_json::from_slice::<Value>(&request.body) {
            Ok(Value::Object(object)) => Some(object),
            Ok(other) => {
                self.warnings.push(AdapterWarning::new(
                    "body",
                    format!("expected a JSON object, got {}", json_type_name(&other)),
                ));
                None
            }
            Err(e) => {
                self.warnings
                    .push(AdapterWarning::new("body", format!("invalid JSON: {}", e)));
                None
            }
        }
    }

    fn text(&mut self, field: Field, value: Option<Value>) -> Option<String> {
        match value? {
            Value::String(text) => Some(text),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            other => {
                self.warnings.push(AdapterWarning::new(
                    field.name(),
                    format!("expected text, got {}", json_type_name(&other)),
                ));
                None
            }
        }
    }

    fn priority(&mut self, value: Option<Value>) -> Priority {
        match value {
            None => Priority::DEFAULT,
            Some(Value::Number(n)) => match (n.as_i64(), n.as_f64()) {
                (Some(i), _) => Priority::new(i),
                (None, Some(f)) if f.is_finite() => Priority::new(f.round() as i64),
                _ => Priority::DEFAULT,
            },
            Some(Value::String(text)) => {
                let (priority, error) = Priority::parse_lenient(&text);
                if let Some(e) = error {
                    self.warnings.push(AdapterWarning::new("priority", e.to_string()));
                }
                priority
            }
            Some(other) => {
                self.warnings.push(AdapterWarning::new(
                    "priority",
                    format!("expected a number or name, got {}", json_type_name(&other)),
                ));
                Priority::DEFAULT
            }
        }
    }

    fn tags(&mut self, value: Option<Value>) -> Vec<String> {
        match value {
            None => Vec::new(),
            Some(Value::String(text)) => split_and_trim(&text),
            Some(Value::Array(items)) => items
                .into_iter()
                .filter_map(|item| match item {
                    Value::String(text) => Some(text.trim().to_string()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .filter(|tag| !tag.is_empty())
                .collect(),
            Some(other) => {
                self.warnings.push(AdapterWarning::new(
                    "tags",
                    format!("expected a list, got {}", json_type_name(&other)),
                ));
                Vec::new()
            }
        }
    }

    fn markdown(&mut self, value: Option<Value>) -> bool {
        match value {
            None => false,
            Some(Value::Bool(flag)) => flag,
            Some(Value::Number(n)) => n.as_i64() == Some(1),
            Some(Value::String(text)) => match text.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => true,
                "false" | "0" | "no" => false,
                _ => {
                    self.warnings.push(AdapterWarning::new(
                        "markdown",
                        format!("unrecognized flag '{}'", text),
                    ));
                    false
                }
            },
            Some(other) => {
                self.warnings.push(AdapterWarning::new(
                    "markdown",
                    format!("expected a boolean, got {}", json_type_name(&other)),
                ));
                false
            }
        }
    }

    fn actions(&mut self, value: Option<Value>) -> Vec<Value> {
        match value {
            None => Vec::new(),
            Some(Value::Array(actions)) => actions,
            Some(other) => {
                self.warnings.push(AdapterWarning::new(
                    "actions",
                    format!("expected a list, got {}", json_type_name(&other)),
                ));
                Vec::new()
            }
        }
    }
}

impl Default for NtfyAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestAdapter for NtfyAdapter {
    fn unmarshal_request(&mut self, request: &WebhookRequest) -> Result<(), AdapterError> {
        self.warnings.clear();

        let body = self.json_body(request);
        let sources = [
            Source::Headers(&request.headers),
            Source::Query(&request.query),
            Source::Body(body.as_ref()),
        ];

        let title = resolve(&sources, Field::Title);
        let message = resolve(&sources, Field::Message);
        let priority = resolve(&sources, Field::Priority);
        let tags = resolve(&sources, Field::Tags);
        let click = resolve(&sources, Field::Click);
        let icon = resolve(&sources, Field::Icon);
        let markdown = resolve(&sources, Field::Markdown);
        let actions = resolve(&sources, Field::Actions);

        let mut resolved = NtfyMessage {
            topic: request.routing_key.clone(),
            title: self.text(Field::Title, title),
            message: self.text(Field::Message, message),
            priority: self.priority(priority),
            tags: self.tags(tags),
            click: self.text(Field::Click, click),
            icon: self.text(Field::Icon, icon),
            actions: self.actions(actions),
            markdown: self.markdown(markdown),
        };

        if resolved.message.is_none() {
            let body_text = String::from_utf8_lossy(&request.body);
            if !body_text.trim().is_empty() {
                resolved.message = Some(body_text.into_owned());
            }
        }

        self.message = resolved;
        self.raw_request = capture_body(&request.body);
        self.raw_headers = capture_headers(&request.headers);
        self.raw_query_params = capture_query(&request.query);
        self.received_at = request.received_at;

        Ok(())
    }

    fn to_canonical_payload(&self) -> CanonicalPayload {
        CanonicalPayload {
            feed_id: self.message.topic.clone(),
            raw_request: self.raw_request.clone(),
            raw_headers: self.raw_headers.clone(),
            raw_query_params: self.raw_query_params.clone(),
            title: self.message.title.clone(),
            message: self.message.message.clone(),
            priority: self.message.priority,
            tags: self.message.tags.clone(),
            logs: Vec::new(),
            metadata: self.message.metadata(),
            received_at: self.received_at,
        }
    }

    fn warnings(&self) -> &[AdapterWarning] {
        &self.warnings
    }
}

#[cfg(test)]
#[path = "ntfy_tests.rs"]
mod tests;
