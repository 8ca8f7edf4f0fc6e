//! Adapter for bodies that are already shaped like the canonical payload.

use super::{
    capture_body, capture_headers, capture_query, AdapterError, AdapterKind, AdapterWarning,
    RequestAdapter,
};
use crate::messages::{json_type_name, CanonicalPayload, RawJson};
use crate::webhook::WebhookRequest;
use crate::Priority;
use serde::Deserialize;
use serde_json::{Map, Value};

/// Body accepted by the raw adapter. Every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBody {
    #[serde(default)]
    raw_request: Option<RawJson>,
    #[serde(default)]
    raw_headers: Option<RawJson>,
    #[serde(default)]
    raw_query_params: Option<RawJson>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    priority: Option<Value>,
    #[serde(default)]
    tags: Option<Vec<String>>,
    #[serde(default)]
    logs: Option<Vec<String>>,
    #[serde(default)]
    metadata: Option<Value>,
}

/// Passes a canonical-shaped JSON body through, filling in whatever the
/// caller left out from the actual request.
///
/// Caller supplied `rawRequest`, `rawHeaders` and `rawQueryParams` are kept
/// byte for byte. A `feedId` in the body is ignored; the routing key decides.
#[derive(Debug, Default)]
pub struct RawAdapter {
    payload: Option<CanonicalPayload>,
    warnings: Vec<AdapterWarning>,
}

impl RawAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    fn resolve_priority(&mut self, value: Option<Value>) -> Priority {
        match value {
            None | Some(Value::Null) => Priority::DEFAULT,
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
}

impl RequestAdapter for RawAdapter {
    fn unmarshal_request(&mut self, request: &WebhookRequest) -> Result<(), AdapterError> {
        self.warnings.clear();

        let body: RawBody = serde_json::from_slice(&request.body).map_err(|e| {
            if e.is_data() {
                AdapterError::InvalidPayload {
                    adapter: AdapterKind::Raw,
                    message: e.to_string(),
                }
            } else {
                AdapterError::InvalidJson {
                    adapter: AdapterKind::Raw,
                    message: e.to_string(),
                }
            }
        })?;

        let priority = self.resolve_priority(body.priority);

        self.payload = Some(CanonicalPayload {
            feed_id: request.routing_key.clone(),
            raw_request: body
                .raw_request
                .unwrap_or_else(|| capture_body(&request.body)),
            raw_headers: body
                .raw_headers
                .unwrap_or_else(|| capture_headers(&request.headers)),
            raw_query_params: body
                .raw_query_params
                .unwrap_or_else(|| capture_query(&request.query)),
            title: body.title.filter(|t| !t.is_empty()),
            message: body.message.filter(|m| !m.is_empty()),
            priority,
            tags: body.tags.unwrap_or_default(),
            logs: body.logs.unwrap_or_default(),
            metadata: body
                .metadata
                .filter(|m| !m.is_null())
                .unwrap_or_else(|| Value::Object(Map::new())),
            received_at: request.received_at,
        });

        Ok(())
    }

    fn to_canonical_payload(&self) -> CanonicalPayload {
        self.payload.clone().unwrap_or_else(|| {
            CanonicalPayload::captured(
                String::new(),
                RawJson::empty_object(),
                RawJson::empty_object(),
                RawJson::empty_object(),
                crate::Timestamp::now(),
            )
        })
    }

    fn warnings(&self) -> &[AdapterWarning] {
        &self.warnings
    }
}

#[cfg(test)]
#[path = "raw_tests.rs"]
mod tests;
